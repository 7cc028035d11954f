//! Vigil filter/sort: derives the operator's display list from a result
//! snapshot plus the chosen filter and sort key. Pure; no I/O, no state.

#![forbid(unsafe_code)]

use std::cmp::Reverse;
use std::time::Instant;

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde::{Deserialize, Serialize};
use tracing::debug;
use vigil_core::{AnalysisResult, ResultId, ResultSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Newest first.
    #[default]
    Date,
    /// Lowest (worst) accuracy first.
    Accuracy,
    /// Website name, case-insensitive.
    Website,
}

impl SortKey {
    pub const ALL: [SortKey; 3] = [SortKey::Date, SortKey::Accuracy, SortKey::Website];

    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::Date => "date",
            SortKey::Accuracy => "accuracy",
            SortKey::Website => "website",
        }
    }
}

impl std::fmt::Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

impl std::str::FromStr for SortKey {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "date" => Ok(SortKey::Date),
            "accuracy" => Ok(SortKey::Accuracy),
            "website" => Ok(SortKey::Website),
            other => Err(format!("unknown sort key '{}' (expected date, accuracy or website)", other)),
        }
    }
}

/// Operator-chosen view criteria.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewQuery {
    pub misrepresentations_only: bool,
    pub sort: SortKey,
    /// Free-text filter over website, url, question and service. Empty = off.
    #[serde(default)]
    pub text: String,
}

/// Filtered and ordered rows, plus the unfiltered count for "Showing X of Y".
#[derive(Debug, Clone)]
pub struct DisplayList<'a> {
    pub rows: Vec<&'a AnalysisResult>,
    pub total: usize,
}

impl<'a> DisplayList<'a> {
    pub fn ids(&self) -> Vec<ResultId> { self.rows.iter().map(|r| r.id).collect() }
    pub fn len(&self) -> usize { self.rows.len() }
    pub fn is_empty(&self) -> bool { self.rows.is_empty() }
}

/// Derive the display list. Deterministic for identical input: every sort
/// key falls back to `id` ascending.
pub fn display_list<'a>(results: &'a [AnalysisResult], query: &ViewQuery) -> DisplayList<'a> {
    let started = Instant::now();
    let text = query.text.trim();
    let matcher = if text.is_empty() { None } else { Some(SkimMatcherV2::default().ignore_case()) };

    let mut rows: Vec<&AnalysisResult> = results
        .iter()
        .filter(|r| !query.misrepresentations_only || r.misrepresentation_detected)
        .filter(|r| match &matcher {
            Some(m) => m.fuzzy_match(&haystack(r), text).is_some(),
            None => true,
        })
        .collect();
    sort_rows(&mut rows, query.sort);

    metrics::histogram!("filter_sort_ms", started.elapsed().as_secs_f64() * 1_000.0);
    debug!(total = results.len(), shown = rows.len(), sort = %query.sort, "filter/sort applied");
    DisplayList { rows, total: results.len() }
}

fn haystack(r: &AnalysisResult) -> String {
    format!("{} {} {} {}", r.website_name, r.website_url, r.question_text, r.llm_service)
}

fn sort_rows(rows: &mut [&AnalysisResult], key: SortKey) {
    match key {
        // Unparseable timestamps compare as None and land after every dated row.
        SortKey::Date => rows.sort_by_cached_key(|r| (Reverse(r.analyzed_ts()), r.id)),
        SortKey::Accuracy => rows.sort_by(|a, b| a.accuracy().total_cmp(&b.accuracy()).then_with(|| a.id.cmp(&b.id))),
        SortKey::Website => rows.sort_by_cached_key(|r| (r.website_name.to_lowercase(), r.id)),
    }
}

/// Outcome of checking the open selection against a fresh snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionStatus {
    /// Nothing selected.
    None,
    Valid(ResultId),
    /// The id vanished from the snapshot; the caller must close the detail view.
    Invalidated(ResultId),
}

pub fn check_selection(snap: &ResultSnapshot, selected: Option<ResultId>) -> SelectionStatus {
    match selected {
        None => SelectionStatus::None,
        Some(id) if snap.contains(id) => SelectionStatus::Valid(id),
        Some(id) => SelectionStatus::Invalidated(id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::Summary;

    fn rec(id: ResultId, site: &str, score: f64, detected: bool, at: &str) -> AnalysisResult {
        AnalysisResult {
            id,
            website_name: site.to_string(),
            website_url: format!("https://{}.example", site.to_lowercase()),
            content_title: String::new(),
            question_text: format!("question {}", id),
            llm_service: "openai".to_string(),
            response_text: String::new(),
            accuracy_score: score,
            misrepresentation_detected: detected,
            analyzed_at: at.to_string(),
            analysis_details: None,
        }
    }

    fn pair() -> Vec<AnalysisResult> {
        vec![
            rec(1, "Alpha", 0.9, false, "2024-01-02"),
            rec(2, "Beta", 0.3, true, "2024-01-01"),
        ]
    }

    #[test]
    fn misrepresentations_only_sorted_by_accuracy() {
        let results = pair();
        let q = ViewQuery { misrepresentations_only: true, sort: SortKey::Accuracy, text: String::new() };
        let list = display_list(&results, &q);
        assert_eq!(list.ids(), vec![2]);
        assert_eq!(list.total, 2);
    }

    #[test]
    fn unfiltered_by_date_is_newest_first() {
        let results = pair();
        let q = ViewQuery { sort: SortKey::Date, ..Default::default() };
        assert_eq!(display_list(&results, &q).ids(), vec![1, 2]);
    }

    #[test]
    fn date_ties_break_by_id_and_undated_rows_sort_last() {
        let results = vec![
            rec(9, "a", 0.5, false, "not a date"),
            rec(4, "a", 0.5, false, "2024-05-01 10:00:00"),
            rec(3, "a", 0.5, false, "2024-05-01T10:00:00"),
            rec(5, "a", 0.5, false, "2024-06-01"),
            rec(1, "a", 0.5, false, ""),
        ];
        let q = ViewQuery { sort: SortKey::Date, ..Default::default() };
        assert_eq!(display_list(&results, &q).ids(), vec![5, 3, 4, 1, 9]);
    }

    #[test]
    fn accuracy_uses_clamped_scores() {
        let results = vec![
            rec(3, "a", 1.4, false, ""),
            rec(1, "a", 1.0, false, ""),
            rec(2, "a", -0.5, true, ""),
            rec(4, "a", 0.0, true, ""),
        ];
        let q = ViewQuery { sort: SortKey::Accuracy, ..Default::default() };
        // -0.5 clamps to 0.0 and ties with id 4; 1.4 clamps to 1.0 and ties with id 1
        assert_eq!(display_list(&results, &q).ids(), vec![2, 4, 1, 3]);
    }

    #[test]
    fn website_sort_ignores_case() {
        let results = vec![
            rec(1, "beta", 0.5, false, ""),
            rec(2, "Alpha", 0.5, false, ""),
            rec(3, "alpha", 0.5, false, ""),
            rec(4, "Gamma", 0.5, false, ""),
        ];
        let q = ViewQuery { sort: SortKey::Website, ..Default::default() };
        assert_eq!(display_list(&results, &q).ids(), vec![2, 3, 1, 4]);
    }

    #[test]
    fn text_filter_matches_case_insensitively() {
        let results = vec![
            rec(1, "Health Agency", 0.5, false, ""),
            rec(2, "Tax Office", 0.5, true, ""),
            rec(3, "Health Board", 0.5, true, ""),
        ];
        let q = ViewQuery { text: "HEALTH".into(), sort: SortKey::Website, ..Default::default() };
        assert_eq!(display_list(&results, &q).ids(), vec![1, 3]);
        let q = ViewQuery { text: "health".into(), misrepresentations_only: true, ..Default::default() };
        assert_eq!(display_list(&results, &q).ids(), vec![3]);
        let q = ViewQuery { text: "   ".into(), ..Default::default() };
        assert_eq!(display_list(&results, &q).len(), 3);
    }

    #[test]
    fn sort_key_parses_and_prints() {
        for k in SortKey::ALL {
            assert_eq!(k.to_string().parse::<SortKey>().unwrap(), k);
        }
        assert_eq!(" Accuracy ".parse::<SortKey>().unwrap(), SortKey::Accuracy);
        assert!("score".parse::<SortKey>().is_err());
    }

    #[test]
    fn selection_check_tracks_snapshot_membership() {
        let snap = ResultSnapshot::new(1, pair(), Summary::default());
        assert_eq!(check_selection(&snap, None), SelectionStatus::None);
        assert_eq!(check_selection(&snap, Some(2)), SelectionStatus::Valid(2));
        assert_eq!(check_selection(&snap, Some(77)), SelectionStatus::Invalidated(77));
    }
}
