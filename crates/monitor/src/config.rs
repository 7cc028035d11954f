#![forbid(unsafe_code)]

use std::time::Duration;

use vigil_api::DEFAULT_BASE_URL;

pub const DEFAULT_RESULTS_LIMIT: usize = 100;
pub const DEFAULT_REFRESH: Duration = Duration::from_millis(5_000);
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Runtime settings, read from `VIGIL_*` environment variables. Unset or
/// unparseable values fall back to defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub api_url: String,
    pub results_limit: usize,
    pub refresh_interval: Duration,
    pub http_timeout: Duration,
    pub metrics_addr: Option<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_BASE_URL.to_string(),
            results_limit: DEFAULT_RESULTS_LIMIT,
            refresh_interval: DEFAULT_REFRESH,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            metrics_addr: None,
        }
    }
}

impl MonitorConfig {
    pub fn from_env() -> Self { Self::from_lookup(|k| std::env::var(k).ok()) }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        Self {
            api_url: get("VIGIL_API_URL").filter(|s| !s.trim().is_empty()).unwrap_or(d.api_url),
            results_limit: get("VIGIL_RESULTS_LIMIT").and_then(|s| s.parse().ok()).filter(|n| *n > 0).unwrap_or(d.results_limit),
            refresh_interval: get("VIGIL_REFRESH_MS").and_then(|s| s.parse().ok()).map(Duration::from_millis).unwrap_or(d.refresh_interval),
            http_timeout: get("VIGIL_HTTP_TIMEOUT_SECS").and_then(|s| s.parse().ok()).map(Duration::from_secs).unwrap_or(d.http_timeout),
            metrics_addr: get("VIGIL_METRICS_ADDR").filter(|s| !s.trim().is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_and_overrides() {
        assert_eq!(MonitorConfig::from_lookup(|_| None), MonitorConfig::default());

        let env: HashMap<&str, &str> = [
            ("VIGIL_API_URL", "http://monitor:8000"),
            ("VIGIL_RESULTS_LIMIT", "250"),
            ("VIGIL_REFRESH_MS", "oops"),
            ("VIGIL_HTTP_TIMEOUT_SECS", "5"),
            ("VIGIL_METRICS_ADDR", "127.0.0.1:9100"),
        ]
        .into_iter()
        .collect();
        let cfg = MonitorConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.api_url, "http://monitor:8000");
        assert_eq!(cfg.results_limit, 250);
        assert_eq!(cfg.refresh_interval, DEFAULT_REFRESH);
        assert_eq!(cfg.http_timeout, Duration::from_secs(5));
        assert_eq!(cfg.metrics_addr.as_deref(), Some("127.0.0.1:9100"));
    }

    #[test]
    fn zero_limit_is_ignored() {
        let cfg = MonitorConfig::from_lookup(|k| (k == "VIGIL_RESULTS_LIMIT").then(|| "0".to_string()));
        assert_eq!(cfg.results_limit, DEFAULT_RESULTS_LIMIT);
    }
}
