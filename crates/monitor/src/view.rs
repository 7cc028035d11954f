//! Operator view state and the per-redraw results frame.

#![forbid(unsafe_code)]

use serde::Serialize;
use tracing::info;
use vigil_core::{percent, ResultId, ResultSnapshot, Severity};
use vigil_search::{check_selection, display_list, SelectionStatus, SortKey, ViewQuery};

use crate::detail::{render_detail, DetailView};

/// Client-side state that survives refreshes: the filter/sort query and the
/// open detail selection. Owned by one front end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ViewState {
    pub query: ViewQuery,
    selected: Option<ResultId>,
}

impl ViewState {
    pub fn new(query: ViewQuery) -> Self { Self { query, selected: None } }

    pub fn selected(&self) -> Option<ResultId> { self.selected }

    pub fn select(&mut self, id: ResultId) { self.selected = Some(id); }

    pub fn close(&mut self) { self.selected = None; }

    pub fn set_sort(&mut self, sort: SortKey) { self.query.sort = sort; }

    pub fn toggle_misrepresentations_only(&mut self) {
        self.query.misrepresentations_only = !self.query.misrepresentations_only;
    }

    /// Reconcile the selection with a newly published snapshot. The
    /// selection is kept while its id exists and cleared once it vanishes.
    pub fn on_snapshot(&mut self, snap: &ResultSnapshot) -> SelectionStatus {
        let status = check_selection(snap, self.selected);
        if let SelectionStatus::Invalidated(id) = status {
            info!(id, version = snap.version, "view: selection invalidated");
            self.selected = None;
        }
        status
    }

    /// Detail view of the current selection, if it is still present.
    pub fn detail(&self, snap: &ResultSnapshot) -> Option<DetailView> {
        self.selected.and_then(|id| snap.get(id)).map(render_detail)
    }

    pub fn frame(&self, snap: &ResultSnapshot) -> ResultsFrame {
        ResultsFrame::build(snap, &self.query)
    }
}

/// Summary tiles above the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryTiles {
    pub total_misrepresentations: u64,
    pub affected_websites: usize,
    pub recent_issues: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    pub id: ResultId,
    pub website_name: String,
    pub question_text: String,
    pub llm_service: String,
    pub accuracy: String,
    pub severity: Severity,
    pub misrepresentation_detected: bool,
    pub analyzed_at: String,
}

/// One redraw worth of list data: tiles, rows in display order, and counts
/// for "Showing X of Y".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultsFrame {
    pub version: u64,
    pub tiles: SummaryTiles,
    pub rows: Vec<ResultRow>,
    pub shown: usize,
    pub total: usize,
}

impl ResultsFrame {
    pub fn build(snap: &ResultSnapshot, query: &ViewQuery) -> Self {
        let list = display_list(&snap.results, query);
        let rows: Vec<ResultRow> = list
            .rows
            .iter()
            .map(|r| ResultRow {
                id: r.id,
                website_name: r.website_name.clone(),
                question_text: r.question_text.clone(),
                llm_service: r.llm_service.clone(),
                accuracy: percent(r.accuracy_score),
                severity: r.severity(),
                misrepresentation_detected: r.misrepresentation_detected,
                analyzed_at: r.analyzed_at.clone(),
            })
            .collect();
        Self {
            version: snap.version,
            tiles: SummaryTiles {
                total_misrepresentations: snap.summary.total_misrepresentations,
                affected_websites: snap.summary.affected_websites(),
                recent_issues: snap.summary.recent_issues(),
            },
            shown: rows.len(),
            total: list.total,
            rows,
        }
    }

    pub fn ids(&self) -> Vec<ResultId> { self.rows.iter().map(|r| r.id).collect() }
}
