//! Score clamping and severity bands shared by the list and detail views.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

/// Clamp to [0, 1]; NaN becomes 0.
pub fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

/// Clamped value rendered as a percentage with one decimal, e.g. `87.5%`.
pub fn percent(v: f64) -> String {
    format!("{:.1}%", clamp_unit(v) * 100.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    /// Same bands for accuracy and confidence: `>= 0.8` high, `>= 0.6` medium.
    pub fn from_score(v: f64) -> Self {
        let v = clamp_unit(v);
        if v >= 0.8 {
            Severity::High
        } else if v >= 0.6 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Severity::High => "#28a745",
            Severity::Medium => "#ffc107",
            Severity::Low => "#dc3545",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_out_of_range_and_nan() {
        assert_eq!(clamp_unit(1.4), 1.0);
        assert_eq!(clamp_unit(-0.2), 0.0);
        assert_eq!(clamp_unit(f64::NAN), 0.0);
        assert_eq!(clamp_unit(0.35), 0.35);
    }

    #[test]
    fn bands_on_boundaries() {
        assert_eq!(Severity::from_score(0.8), Severity::High);
        assert_eq!(Severity::from_score(0.79), Severity::Medium);
        assert_eq!(Severity::from_score(0.6), Severity::Medium);
        assert_eq!(Severity::from_score(0.59), Severity::Low);
        assert_eq!(Severity::from_score(7.0), Severity::High);
    }

    #[test]
    fn percent_formatting() {
        assert_eq!(percent(0.875), "87.5%");
        assert_eq!(percent(1.4), "100.0%");
        assert_eq!(percent(0.0), "0.0%");
    }
}
