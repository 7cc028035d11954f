//! Vigil API façade over the monitoring backend's REST surface.
//!
//! Front ends and the refresh coordinator depend on [`MonitorApi`] only; the
//! HTTP implementation lives in [`http`], and [`MockApi`] backs tests.

#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use vigil_core::{wire, AnalysisResult, Summary};

pub mod http;

pub use http::HttpApi;

/// Backend default from the server's launcher.
pub const DEFAULT_BASE_URL: &str = "http://localhost:54943";

/// A monitored website (`GET /api/websites`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Website {
    pub id: i64,
    #[serde(default, deserialize_with = "wire::string_or_null")]
    pub url: String,
    #[serde(default, deserialize_with = "wire::string_or_null")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "wire::flag")]
    pub is_active: bool,
    #[serde(default, deserialize_with = "wire::string_or_null")]
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_scraped: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebsiteCreate {
    pub url: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Body of `POST /api/monitoring/start`. Absent fields are omitted on the wire;
/// no `website_ids` means every active website.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct MonitoringRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website_ids: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct MonitoringStatus {
    #[serde(default, deserialize_with = "wire::flag")]
    pub is_running: bool,
    #[serde(default)]
    pub current_session_id: Option<i64>,
    #[serde(default)]
    pub scheduled_jobs: u64,
    #[serde(default)]
    pub active_websites: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct HealthComponents {
    #[serde(default, deserialize_with = "wire::flag")]
    pub database: bool,
    #[serde(default, deserialize_with = "wire::flag")]
    pub llm_client: bool,
    #[serde(default, deserialize_with = "wire::flag")]
    pub web_scraper: bool,
    #[serde(default, deserialize_with = "wire::flag")]
    pub overall: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct HealthReport {
    /// `healthy` or `degraded`.
    #[serde(default, deserialize_with = "wire::string_or_null")]
    pub status: String,
    #[serde(default, deserialize_with = "wire::string_or_null")]
    pub timestamp: String,
    #[serde(default)]
    pub components: HealthComponents,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool { self.status == "healthy" }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DashboardStats {
    #[serde(default)]
    pub total_websites: u64,
    #[serde(default)]
    pub total_analyses: u64,
    #[serde(default)]
    pub total_misrepresentations: u64,
    /// Analyses in the last 24 hours.
    #[serde(default)]
    pub recent_activity: u64,
    #[serde(default, deserialize_with = "wire::number_or_null")]
    pub average_accuracy: f64,
    /// Already a percentage (0..=100).
    #[serde(default, deserialize_with = "wire::number_or_null")]
    pub misrepresentation_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Question {
    pub id: i64,
    #[serde(default)]
    pub website_id: Option<i64>,
    #[serde(default, deserialize_with = "wire::string_or_null")]
    pub question_text: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "wire::flag")]
    pub is_active: bool,
    #[serde(default, deserialize_with = "wire::string_or_null")]
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionCreate {
    pub website_id: i64,
    pub question_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Acknowledgement returned by the mutating endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Ack {
    #[serde(default, deserialize_with = "wire::string_or_null")]
    pub message: String,
    #[serde(default, deserialize_with = "wire::flag")]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website_ids: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_hours: Option<u32>,
}

impl Ack {
    pub fn ok(message: impl Into<String>) -> Self { Self { message: message.into(), success: true, ..Default::default() } }
}

/// API errors. `Clone` so one fetch outcome can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("transport: {0}")]
    Transport(String),
    #[error("status {code}: {detail}")]
    Status { code: u16, detail: String },
    #[error("decode: {0}")]
    Decode(String),
    #[error("config: {0}")]
    Config(String),
}

impl ApiError {
    /// Worth retrying on the next attempt: network trouble, 5xx or 429.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Transport(_) => true,
            ApiError::Status { code, .. } => *code >= 500 || *code == 429,
            ApiError::Decode(_) | ApiError::Config(_) => false,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// The backend's REST surface, one method per endpoint.
#[async_trait::async_trait]
pub trait MonitorApi: Send + Sync {
    /// `GET /api/analysis/results?limit=N`
    async fn results(&self, limit: usize) -> ApiResult<Vec<AnalysisResult>>;

    /// `GET /api/analysis/summary`
    async fn summary(&self) -> ApiResult<Summary>;

    /// `GET /api/websites?active_only=…`
    async fn websites(&self, active_only: bool) -> ApiResult<Vec<Website>>;

    async fn create_website(&self, website: &WebsiteCreate) -> ApiResult<Ack>;

    /// Deactivates; the backend never hard-deletes.
    async fn delete_website(&self, id: i64) -> ApiResult<Ack>;

    async fn start_monitoring(&self, request: &MonitoringRequest) -> ApiResult<Ack>;

    async fn monitoring_status(&self) -> ApiResult<MonitoringStatus>;

    async fn schedule_monitoring(&self, interval_hours: u32) -> ApiResult<Ack>;

    async fn stop_monitoring(&self) -> ApiResult<Ack>;

    async fn health(&self) -> ApiResult<HealthReport>;

    async fn dashboard_stats(&self) -> ApiResult<DashboardStats>;

    async fn create_question(&self, question: &QuestionCreate) -> ApiResult<Ack>;

    async fn questions(&self, website_id: i64) -> ApiResult<Vec<Question>>;
}

// ----------------- Mock implementation -----------------

#[derive(Debug, Default)]
struct MockState {
    results: Vec<AnalysisResult>,
    summary: Summary,
    websites: Vec<Website>,
    questions: Vec<Question>,
    status: MonitoringStatus,
    fail_next: usize,
    fail_all: Option<ApiError>,
}

/// In-memory implementation for tests. Website and question writes are
/// applied to its own state so reads observe them.
#[derive(Debug, Default)]
pub struct MockApi {
    state: Mutex<MockState>,
    result_calls: AtomicUsize,
    summary_calls: AtomicUsize,
}

impl MockApi {
    pub fn new() -> Self { Self::default() }

    pub fn with_results(results: Vec<AnalysisResult>, summary: Summary) -> Self {
        let api = Self::new();
        api.set_results(results, summary);
        api
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn set_results(&self, results: Vec<AnalysisResult>, summary: Summary) {
        let mut st = self.state();
        st.results = results;
        st.summary = summary;
    }

    pub fn set_websites(&self, websites: Vec<Website>) { self.state().websites = websites; }

    /// Fail the next `n` result/summary calls with a 503.
    pub fn fail_next(&self, n: usize) { self.state().fail_next = n; }

    /// Fail every call with `err` until cleared with `None`.
    pub fn fail_all(&self, err: Option<ApiError>) { self.state().fail_all = err; }

    /// Number of `results` calls served or failed so far.
    pub fn result_calls(&self) -> usize { self.result_calls.load(Ordering::SeqCst) }

    pub fn summary_calls(&self) -> usize { self.summary_calls.load(Ordering::SeqCst) }

    fn check_fail(&self, consume: bool) -> ApiResult<()> {
        let mut st = self.state();
        if let Some(e) = &st.fail_all {
            return Err(e.clone());
        }
        if consume && st.fail_next > 0 {
            st.fail_next -= 1;
            return Err(ApiError::Status { code: 503, detail: "injected failure".into() });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl MonitorApi for MockApi {
    async fn results(&self, limit: usize) -> ApiResult<Vec<AnalysisResult>> {
        self.result_calls.fetch_add(1, Ordering::SeqCst);
        self.check_fail(true)?;
        Ok(self.state().results.iter().take(limit).cloned().collect())
    }

    async fn summary(&self) -> ApiResult<Summary> {
        self.summary_calls.fetch_add(1, Ordering::SeqCst);
        self.check_fail(false)?;
        Ok(self.state().summary.clone())
    }

    async fn websites(&self, active_only: bool) -> ApiResult<Vec<Website>> {
        self.check_fail(false)?;
        Ok(self.state().websites.iter().filter(|w| !active_only || w.is_active).cloned().collect())
    }

    async fn create_website(&self, website: &WebsiteCreate) -> ApiResult<Ack> {
        self.check_fail(false)?;
        let mut st = self.state();
        if st.websites.iter().any(|w| w.url == website.url) {
            return Err(ApiError::Status { code: 400, detail: "UNIQUE constraint failed: websites.url".into() });
        }
        let id = st.websites.iter().map(|w| w.id).max().unwrap_or(0) + 1;
        st.websites.push(Website {
            id,
            url: website.url.clone(),
            name: website.name.clone(),
            description: Some(website.description.clone()).filter(|d| !d.is_empty()),
            is_active: true,
            created_at: String::new(),
            last_scraped: None,
        });
        Ok(Ack { id: Some(id), ..Ack::ok("Website added successfully") })
    }

    async fn delete_website(&self, id: i64) -> ApiResult<Ack> {
        self.check_fail(false)?;
        let mut st = self.state();
        match st.websites.iter_mut().find(|w| w.id == id) {
            Some(w) => {
                w.is_active = false;
                Ok(Ack::ok("Website deactivated successfully"))
            }
            None => Err(ApiError::Status { code: 404, detail: "Website not found".into() }),
        }
    }

    async fn start_monitoring(&self, request: &MonitoringRequest) -> ApiResult<Ack> {
        self.check_fail(false)?;
        Ok(match &request.website_ids {
            Some(ids) => Ack {
                website_ids: Some(ids.clone()),
                ..Ack::ok(format!("Started monitoring {} websites", ids.len()))
            },
            None => Ack::ok("Started monitoring all active websites"),
        })
    }

    async fn monitoring_status(&self) -> ApiResult<MonitoringStatus> {
        self.check_fail(false)?;
        let st = self.state();
        let mut status = st.status.clone();
        status.active_websites = st.websites.iter().filter(|w| w.is_active).count() as u64;
        Ok(status)
    }

    async fn schedule_monitoring(&self, interval_hours: u32) -> ApiResult<Ack> {
        self.check_fail(false)?;
        self.state().status.scheduled_jobs = 1;
        Ok(Ack {
            interval_hours: Some(interval_hours),
            ..Ack::ok(format!("Scheduled monitoring set up for every {} hours", interval_hours))
        })
    }

    async fn stop_monitoring(&self) -> ApiResult<Ack> {
        self.check_fail(false)?;
        self.state().status.scheduled_jobs = 0;
        Ok(Ack::ok("Scheduled monitoring stopped"))
    }

    async fn health(&self) -> ApiResult<HealthReport> {
        self.check_fail(false)?;
        Ok(HealthReport {
            status: "healthy".into(),
            timestamp: String::new(),
            components: HealthComponents { database: true, llm_client: true, web_scraper: true, overall: true },
        })
    }

    async fn dashboard_stats(&self) -> ApiResult<DashboardStats> {
        self.check_fail(false)?;
        let st = self.state();
        let total = st.results.len() as u64;
        let misreps = st.results.iter().filter(|r| r.misrepresentation_detected).count() as u64;
        let avg = if st.results.is_empty() {
            0.0
        } else {
            st.results.iter().map(|r| r.accuracy_score).sum::<f64>() / total as f64
        };
        Ok(DashboardStats {
            total_websites: st.websites.iter().filter(|w| w.is_active).count() as u64,
            total_analyses: total,
            total_misrepresentations: misreps,
            recent_activity: 0,
            average_accuracy: avg,
            misrepresentation_rate: misreps as f64 / total.max(1) as f64 * 100.0,
        })
    }

    async fn create_question(&self, question: &QuestionCreate) -> ApiResult<Ack> {
        self.check_fail(false)?;
        let mut st = self.state();
        let id = st.questions.iter().map(|q| q.id).max().unwrap_or(0) + 1;
        st.questions.push(Question {
            id,
            website_id: Some(question.website_id),
            question_text: question.question_text.clone(),
            category: Some(question.category.clone().unwrap_or_else(|| "manual".into())),
            is_active: true,
            created_at: String::new(),
        });
        Ok(Ack { id: Some(id), ..Ack::ok("Question added successfully") })
    }

    async fn questions(&self, website_id: i64) -> ApiResult<Vec<Question>> {
        self.check_fail(false)?;
        Ok(self
            .state()
            .questions
            .iter()
            .filter(|q| q.website_id == Some(website_id) && q.is_active)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monitoring_request_omits_absent_fields() {
        let body = serde_json::to_value(MonitoringRequest::default()).unwrap();
        assert_eq!(body, serde_json::json!({}));
        let body = serde_json::to_value(MonitoringRequest { website_ids: Some(vec![1, 2]), session_name: None }).unwrap();
        assert_eq!(body, serde_json::json!({ "website_ids": [1, 2] }));
    }

    #[test]
    fn website_decodes_sqlite_row() {
        let w: Website = serde_json::from_value(serde_json::json!({
            "id": 3,
            "url": "https://x.example",
            "name": "X",
            "description": null,
            "is_active": 1,
            "created_at": "2024-01-01 00:00:00",
            "last_scraped": null
        }))
        .unwrap();
        assert!(w.is_active);
        assert!(w.description.is_none());
        assert!(w.last_scraped.is_none());
    }

    #[test]
    fn transient_classification() {
        assert!(ApiError::Transport("reset".into()).is_transient());
        assert!(ApiError::Status { code: 503, detail: String::new() }.is_transient());
        assert!(ApiError::Status { code: 429, detail: String::new() }.is_transient());
        assert!(!ApiError::Status { code: 404, detail: String::new() }.is_transient());
        assert!(!ApiError::Decode("eof".into()).is_transient());
    }

    #[tokio::test]
    async fn mock_injects_failures_then_recovers() {
        let api = MockApi::new();
        api.fail_next(1);
        assert!(matches!(api.results(10).await, Err(ApiError::Status { code: 503, .. })));
        assert!(api.results(10).await.is_ok());
        assert_eq!(api.result_calls(), 2);
    }

    #[tokio::test]
    async fn mock_website_crud_is_visible_to_reads() {
        let api = MockApi::new();
        let ack = api
            .create_website(&WebsiteCreate { url: "https://a.example".into(), name: "A".into(), description: String::new() })
            .await
            .unwrap();
        assert_eq!(ack.id, Some(1));
        assert!(api
            .create_website(&WebsiteCreate { url: "https://a.example".into(), name: "dup".into(), description: String::new() })
            .await
            .is_err());
        api.delete_website(1).await.unwrap();
        assert!(api.websites(true).await.unwrap().is_empty());
        assert_eq!(api.websites(false).await.unwrap().len(), 1);
        assert!(matches!(api.delete_website(9).await, Err(ApiError::Status { code: 404, .. })));
    }
}
