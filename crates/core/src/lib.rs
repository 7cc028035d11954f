//! Vigil core types: analysis results as served by the monitoring backend,
//! the misrepresentation summary, and the immutable snapshot the store swaps.

#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

pub mod score;
pub mod time;
pub mod wire;

pub use score::{clamp_unit, percent, Severity};

/// Server-assigned row id of an analysis result.
pub type ResultId = i64;

/// One analyzed LLM answer. Received read-only; never mutated client-side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisResult {
    pub id: ResultId,
    #[serde(default, deserialize_with = "wire::string_or_null")]
    pub website_name: String,
    #[serde(default, deserialize_with = "wire::string_or_null")]
    pub website_url: String,
    #[serde(default, deserialize_with = "wire::string_or_null")]
    pub content_title: String,
    #[serde(default, deserialize_with = "wire::string_or_null")]
    pub question_text: String,
    #[serde(default, deserialize_with = "wire::string_or_null")]
    pub llm_service: String,
    #[serde(default, deserialize_with = "wire::string_or_null")]
    pub response_text: String,
    /// Raw score as sent; use [`AnalysisResult::accuracy`] for display.
    #[serde(default, deserialize_with = "wire::number_or_null")]
    pub accuracy_score: f64,
    #[serde(default, deserialize_with = "wire::flag")]
    pub misrepresentation_detected: bool,
    #[serde(default, deserialize_with = "wire::string_or_null")]
    pub analyzed_at: String,
    /// Expected to hold JSON, but not guaranteed to.
    #[serde(default, deserialize_with = "wire::text", skip_serializing_if = "Option::is_none")]
    pub analysis_details: Option<String>,
}

impl AnalysisResult {
    /// Accuracy clamped to [0, 1].
    pub fn accuracy(&self) -> f64 { clamp_unit(self.accuracy_score) }

    pub fn severity(&self) -> Severity { Severity::from_score(self.accuracy_score) }

    pub fn analyzed_ts(&self) -> Option<DateTime<Utc>> { time::parse_timestamp(&self.analyzed_at) }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct WebsiteMisreps {
    #[serde(default, deserialize_with = "wire::string_or_null")]
    pub name: String,
    #[serde(default, deserialize_with = "wire::string_or_null")]
    pub url: String,
    #[serde(default)]
    pub misrepresentation_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RecentMisrepresentation {
    #[serde(default, deserialize_with = "wire::string_or_null")]
    pub analyzed_at: String,
    #[serde(default, deserialize_with = "wire::string_or_null")]
    pub website_name: String,
    #[serde(default, deserialize_with = "wire::string_or_null")]
    pub question_text: String,
    #[serde(default, deserialize_with = "wire::number_or_null")]
    pub accuracy_score: f64,
}

/// Server-side misrepresentation rollup (`GET /api/analysis/summary`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Summary {
    #[serde(default)]
    pub total_misrepresentations: u64,
    #[serde(default)]
    pub by_website: Vec<WebsiteMisreps>,
    #[serde(default)]
    pub recent_misrepresentations: Vec<RecentMisrepresentation>,
}

impl Summary {
    pub fn affected_websites(&self) -> usize { self.by_website.len() }
    pub fn recent_issues(&self) -> usize { self.recent_misrepresentations.len() }
}

/// Immutable result set published by the store. `version` 0 is the empty
/// snapshot before the first successful fetch.
#[derive(Debug, Clone, Serialize, Default)]
pub struct ResultSnapshot {
    pub version: u64,
    pub results: Vec<AnalysisResult>,
    pub summary: Summary,
    #[serde(skip)]
    index: FxHashMap<ResultId, usize>,
}

impl ResultSnapshot {
    pub fn new(version: u64, results: Vec<AnalysisResult>, summary: Summary) -> Self {
        let mut index = FxHashMap::default();
        index.reserve(results.len());
        for (i, r) in results.iter().enumerate() {
            // first occurrence wins if the server ever repeats an id
            index.entry(r.id).or_insert(i);
        }
        Self { version, results, summary, index }
    }

    pub fn contains(&self, id: ResultId) -> bool { self.index.contains_key(&id) }

    pub fn get(&self, id: ResultId) -> Option<&AnalysisResult> {
        self.index.get(&id).and_then(|&i| self.results.get(i))
    }

    pub fn len(&self) -> usize { self.results.len() }
    pub fn is_empty(&self) -> bool { self.results.is_empty() }
}

pub mod prelude {
    pub use super::{AnalysisResult, ResultId, ResultSnapshot, Severity, Summary, WebsiteMisreps, RecentMisrepresentation};
}
