//! reqwest-backed [`MonitorApi`].

#![forbid(unsafe_code)]

use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;
use vigil_core::{AnalysisResult, Summary};

use crate::{
    Ack, ApiError, ApiResult, DashboardStats, HealthReport, MonitorApi, MonitoringRequest, MonitoringStatus, Question,
    QuestionCreate, Website, WebsiteCreate,
};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the monitoring backend. Cheap to clone; connections are
/// pooled by reqwest.
#[derive(Clone)]
pub struct HttpApi {
    base_url: Url,
    http: Client,
}

impl std::fmt::Debug for HttpApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpApi").field("base_url", &self.base_url.as_str()).finish()
    }
}

impl HttpApi {
    pub fn new(base_url: impl AsRef<str>) -> ApiResult<Self> { Self::with_timeout(base_url, DEFAULT_TIMEOUT) }

    pub fn with_timeout(base_url: impl AsRef<str>, timeout: Duration) -> ApiResult<Self> {
        let mut base_url = Url::parse(base_url.as_ref())
            .map_err(|e| ApiError::Config(format!("invalid base url '{}': {}", base_url.as_ref(), e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::Config(format!("base url '{}' cannot carry a path", base_url)));
        }
        // endpoints are appended to any path prefix, so it must end in '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let http = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .user_agent(format!("vigil/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Config(format!("failed to build http client: {}", e)))?;
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &Url { &self.base_url }

    fn endpoint(&self, path: &str) -> ApiResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::Config(format!("invalid endpoint path '{}': {}", path, e)))
    }

    /// Send, check status, decode. `name` is the low-cardinality metrics label.
    async fn call<T: DeserializeOwned>(&self, name: &'static str, req: RequestBuilder) -> ApiResult<T> {
        let started = Instant::now();
        let res = self.call_inner(name, req).await;
        let outcome = match &res {
            Ok(_) => "ok",
            Err(ApiError::Status { .. }) => "status",
            Err(ApiError::Decode(_)) => "decode",
            Err(_) => "transport",
        };
        metrics::counter!("api_requests_total", 1u64, "endpoint" => name, "outcome" => outcome);
        metrics::histogram!("api_request_ms", started.elapsed().as_secs_f64() * 1_000.0, "endpoint" => name);
        res
    }

    async fn call_inner<T: DeserializeOwned>(&self, name: &'static str, req: RequestBuilder) -> ApiResult<T> {
        let resp = req.send().await.map_err(|e| {
            warn!(endpoint = name, error = %e, "api: request failed");
            ApiError::Transport(e.to_string())
        })?;
        let status = resp.status();
        debug!(endpoint = name, status = status.as_u16(), "api: response");
        if !status.is_success() {
            return Err(status_error(resp).await);
        }
        let bytes = resp.bytes().await.map_err(|e| ApiError::Transport(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(format!("{}: {}", name, e)))
    }

    fn get(&self, path: &str) -> ApiResult<RequestBuilder> {
        let url = self.endpoint(path)?;
        debug!(%url, "api: GET {}", path);
        Ok(self.http.get(url))
    }

    fn post(&self, path: &str) -> ApiResult<RequestBuilder> {
        let url = self.endpoint(path)?;
        debug!(%url, "api: POST {}", path);
        Ok(self.http.post(url))
    }
}

/// Map a non-2xx response. The backend reports `{"detail": "..."}`; anything
/// else falls back to the body text or the reason phrase.
async fn status_error(resp: Response) -> ApiError {
    let code = resp.status().as_u16();
    let reason = resp.status().canonical_reason().unwrap_or("error").to_string();
    let body = resp.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("detail").cloned())
        .map(|d| match d {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        })
        .or_else(|| Some(body.trim().to_string()).filter(|b| !b.is_empty()))
        .unwrap_or(reason);
    ApiError::Status { code, detail }
}

#[async_trait::async_trait]
impl MonitorApi for HttpApi {
    async fn results(&self, limit: usize) -> ApiResult<Vec<AnalysisResult>> {
        let req = self.get("/api/analysis/results")?.query(&[("limit", limit)]);
        self.call("results", req).await
    }

    async fn summary(&self) -> ApiResult<Summary> {
        let req = self.get("/api/analysis/summary")?;
        self.call("summary", req).await
    }

    async fn websites(&self, active_only: bool) -> ApiResult<Vec<Website>> {
        let req = self.get("/api/websites")?.query(&[("active_only", active_only)]);
        self.call("websites", req).await
    }

    async fn create_website(&self, website: &WebsiteCreate) -> ApiResult<Ack> {
        let req = self.post("/api/websites")?.json(website);
        self.call("create_website", req).await
    }

    async fn delete_website(&self, id: i64) -> ApiResult<Ack> {
        let path = format!("/api/websites/{}", id);
        let url = self.endpoint(&path)?;
        debug!(%url, "api: DELETE {}", path);
        self.call("delete_website", self.http.delete(url)).await
    }

    async fn start_monitoring(&self, request: &MonitoringRequest) -> ApiResult<Ack> {
        let req = self.post("/api/monitoring/start")?.json(request);
        self.call("start_monitoring", req).await
    }

    async fn monitoring_status(&self) -> ApiResult<MonitoringStatus> {
        let req = self.get("/api/monitoring/status")?;
        self.call("monitoring_status", req).await
    }

    async fn schedule_monitoring(&self, interval_hours: u32) -> ApiResult<Ack> {
        let req = self.post("/api/monitoring/schedule")?.query(&[("interval_hours", interval_hours)]);
        self.call("schedule_monitoring", req).await
    }

    async fn stop_monitoring(&self) -> ApiResult<Ack> {
        let req = self.post("/api/monitoring/stop")?;
        self.call("stop_monitoring", req).await
    }

    async fn health(&self) -> ApiResult<HealthReport> {
        let req = self.get("/api/health")?;
        self.call("health", req).await
    }

    async fn dashboard_stats(&self) -> ApiResult<DashboardStats> {
        let req = self.get("/api/dashboard/stats")?;
        self.call("dashboard_stats", req).await
    }

    async fn create_question(&self, question: &QuestionCreate) -> ApiResult<Ack> {
        let req = self.post("/api/questions")?.json(question);
        self.call("create_question", req).await
    }

    async fn questions(&self, website_id: i64) -> ApiResult<Vec<Question>> {
        let req = self.get(&format!("/api/questions/{}", website_id))?;
        self.call("questions", req).await
    }
}
