//! Detail view model for one analysis result.
//!
//! `analysis_details` is supposed to be a JSON object but upstream has been
//! seen writing truncated text or a non-JSON repr. Rendering never fails:
//! anything that is not a JSON object degrades to the raw string plus a
//! warning.

#![forbid(unsafe_code)]

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use smallvec::SmallVec;
use tracing::debug;
use vigil_core::{clamp_unit, percent, AnalysisResult, ResultId, Severity};

pub const FALLBACK_WARNING: &str = "Unable to parse analysis details. Showing raw data";

/// A clamped [0, 1] score with its severity band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Score {
    pub value: f64,
    pub severity: Severity,
}

impl Score {
    pub fn new(raw: f64) -> Self {
        Self { value: clamp_unit(raw), severity: Severity::from_score(raw) }
    }

    pub fn percent(&self) -> String { percent(self.value) }
}

/// Recognized fields of a well-formed details object. Each is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Score>,
    #[serde(skip_serializing_if = "SmallVec::is_empty")]
    pub specific_issues: SmallVec<[String; 4]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_analysis: Option<String>,
}

impl ParsedDetails {
    pub fn is_empty(&self) -> bool {
        self.analysis_summary.is_none() && self.confidence.is_none() && self.specific_issues.is_empty() && self.raw_analysis.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AnalysisDetails {
    Parsed(ParsedDetails),
    Unparsed { raw: String, warning: &'static str },
    /// The record carries no details at all.
    Absent,
}

impl AnalysisDetails {
    pub fn is_fallback(&self) -> bool { matches!(self, AnalysisDetails::Unparsed { .. }) }
}

/// Everything the detail pane shows for one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailView {
    pub id: ResultId,
    pub website_name: String,
    pub website_url: String,
    pub content_title: String,
    pub question_text: String,
    pub llm_service: String,
    pub response_text: String,
    pub accuracy: Score,
    pub misrepresentation_detected: bool,
    pub analyzed_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analyzed_ts: Option<DateTime<Utc>>,
    pub details: AnalysisDetails,
}

/// Build the detail view for `result`. Never fails.
pub fn render_detail(result: &AnalysisResult) -> DetailView {
    DetailView {
        id: result.id,
        website_name: result.website_name.clone(),
        website_url: result.website_url.clone(),
        content_title: result.content_title.clone(),
        question_text: result.question_text.clone(),
        llm_service: result.llm_service.clone(),
        response_text: result.response_text.clone(),
        accuracy: Score::new(result.accuracy_score),
        misrepresentation_detected: result.misrepresentation_detected,
        analyzed_at: result.analyzed_at.clone(),
        analyzed_ts: result.analyzed_ts(),
        details: parse_details(result.analysis_details.as_deref()),
    }
}

pub fn parse_details(raw: Option<&str>) -> AnalysisDetails {
    let raw = match raw {
        Some(s) if !s.trim().is_empty() => s,
        _ => return AnalysisDetails::Absent,
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => AnalysisDetails::Parsed(extract(&map)),
        Ok(other) => fallback(raw, &format!("expected object, got {}", kind(&other))),
        Err(e) => fallback(raw, &e.to_string()),
    }
}

fn fallback(raw: &str, reason: &str) -> AnalysisDetails {
    debug!(reason, len = raw.len(), "detail: analysis details unparsed");
    metrics::counter!("detail_parse_fallback_total", 1u64);
    AnalysisDetails::Unparsed { raw: raw.to_string(), warning: FALLBACK_WARNING }
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn extract(map: &Map<String, Value>) -> ParsedDetails {
    let text = |key: &str| map.get(key).and_then(Value::as_str).filter(|s| !s.trim().is_empty()).map(str::to_string);
    let confidence = map
        .get("confidence")
        .and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        })
        .map(Score::new);
    let specific_issues = match map.get("specific_issues") {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).map(str::to_string).collect(),
        _ => SmallVec::new(),
    };
    ParsedDetails {
        analysis_summary: text("analysis_summary"),
        confidence,
        specific_issues,
        raw_analysis: text("raw_analysis"),
    }
}

impl DetailView {
    /// Plain-text rendering for terminals.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Analysis #{}", self.id);
        let _ = writeln!(out, "\nWebsite Information");
        let _ = writeln!(out, "  Name:          {}", self.website_name);
        let _ = writeln!(out, "  URL:           {}", self.website_url);
        let _ = writeln!(out, "  Content Title: {}", self.content_title);
        let _ = writeln!(out, "\nQuestion Asked\n  {}", self.question_text);
        let _ = writeln!(out, "\nLLM Response ({})", self.llm_service);
        for line in self.response_text.lines() {
            let _ = writeln!(out, "  {}", line);
        }
        let _ = writeln!(out, "\nAnalysis Results");
        let _ = writeln!(out, "  Accuracy Score:    {} ({})", self.accuracy.percent(), self.accuracy.severity);
        let _ = writeln!(out, "  Misrepresentation: {}", if self.misrepresentation_detected { "Detected" } else { "None" });
        let _ = writeln!(out, "  Analyzed At:       {}", self.analyzed_at);

        match &self.details {
            AnalysisDetails::Absent => {}
            AnalysisDetails::Unparsed { raw, warning } => {
                let _ = writeln!(out, "\nDetailed Analysis\n  ! {}", warning);
                for line in raw.lines() {
                    let _ = writeln!(out, "  {}", line);
                }
            }
            AnalysisDetails::Parsed(d) => {
                let _ = writeln!(out, "\nDetailed Analysis");
                if let Some(s) = &d.analysis_summary {
                    let _ = writeln!(out, "  Summary: {}", s);
                }
                if let Some(c) = &d.confidence {
                    let _ = writeln!(out, "  Confidence: {} ({})", c.percent(), c.severity);
                }
                if !d.specific_issues.is_empty() {
                    let _ = writeln!(out, "  Specific Issues:");
                    for issue in &d.specific_issues {
                        let _ = writeln!(out, "    - {}", issue);
                    }
                }
                if let Some(r) = &d.raw_analysis {
                    let _ = writeln!(out, "  Full Analysis:");
                    for line in r.lines() {
                        let _ = writeln!(out, "    {}", line);
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_details(details: Option<&str>) -> AnalysisResult {
        AnalysisResult {
            id: 5,
            website_name: "Agency".into(),
            website_url: "https://agency.example.gov".into(),
            content_title: "Home".into(),
            question_text: "What does it do?".into(),
            llm_service: "openai".into(),
            response_text: "It does things.".into(),
            accuracy_score: 0.42,
            misrepresentation_detected: true,
            analyzed_at: "2024-01-01 00:00:00".into(),
            analysis_details: details.map(str::to_string),
        }
    }

    #[test]
    fn truncated_json_falls_back_to_raw() {
        let v = render_detail(&with_details(Some("{not json")));
        assert_eq!(v.details, AnalysisDetails::Unparsed { raw: "{not json".into(), warning: FALLBACK_WARNING });
        assert!(v.details.is_fallback());
    }

    #[test]
    fn python_repr_falls_back() {
        let raw = "{'analysis_summary': 'ok', 'confidence': 0.9}";
        assert!(parse_details(Some(raw)).is_fallback());
    }

    #[test]
    fn confidence_above_one_clamps() {
        let AnalysisDetails::Parsed(d) = parse_details(Some(r#"{"confidence": 1.4}"#)) else { panic!("expected parsed") };
        let c = d.confidence.unwrap();
        assert_eq!(c.value, 1.0);
        assert_eq!(c.percent(), "100.0%");
        assert_eq!(c.severity, Severity::High);
        assert!(d.analysis_summary.is_none());
        assert!(d.specific_issues.is_empty());
    }

    #[test]
    fn out_of_range_numeric_string_confidence_clamps() {
        let AnalysisDetails::Parsed(d) = parse_details(Some(r#"{"confidence": "1e400"}"#)) else { panic!("expected parsed") };
        assert_eq!(d.confidence.map(|c| c.percent()), Some("100.0%".to_string()));
        let AnalysisDetails::Parsed(d) = parse_details(Some(r#"{"confidence": "-1e400"}"#)) else { panic!("expected parsed") };
        assert_eq!(d.confidence.map(|c| c.value), Some(0.0));
    }

    #[test]
    fn fields_extract_independently() {
        let raw = r#"{
            "analysis_summary": "Mostly right",
            "confidence": "0.65",
            "specific_issues": ["wrong date", 3, "missing fee"],
            "raw_analysis": "",
            "extra": true
        }"#;
        let AnalysisDetails::Parsed(d) = parse_details(Some(raw)) else { panic!("expected parsed") };
        assert_eq!(d.analysis_summary.as_deref(), Some("Mostly right"));
        assert_eq!(d.confidence.map(|c| c.severity), Some(Severity::Medium));
        assert_eq!(d.specific_issues.as_slice(), ["wrong date".to_string(), "missing fee".to_string()]);
        assert!(d.raw_analysis.is_none());
    }

    #[test]
    fn wrong_typed_fields_are_omitted() {
        let AnalysisDetails::Parsed(d) = parse_details(Some(r#"{"confidence": "high", "specific_issues": "x", "analysis_summary": 4}"#))
        else {
            panic!("expected parsed")
        };
        assert!(d.is_empty());
    }

    #[test]
    fn non_object_json_is_unparsed() {
        assert!(parse_details(Some("[1,2]")).is_fallback());
        assert!(parse_details(Some("\"text\"")).is_fallback());
    }

    #[test]
    fn missing_or_blank_details_are_absent() {
        assert_eq!(parse_details(None), AnalysisDetails::Absent);
        assert_eq!(parse_details(Some("  ")), AnalysisDetails::Absent);
    }

    #[test]
    fn header_fields_and_text_rendering() {
        let mut r = with_details(Some("{broken"));
        r.accuracy_score = -0.3;
        let v = render_detail(&r);
        assert_eq!(v.accuracy.value, 0.0);
        assert_eq!(v.accuracy.severity, Severity::Low);
        assert!(v.analyzed_ts.is_some());
        let text = v.to_text();
        assert!(text.contains("0.0% (Low)"));
        assert!(text.contains(FALLBACK_WARNING));
        assert!(text.contains("{broken"));
        assert!(text.contains("Misrepresentation: Detected"));
    }
}
