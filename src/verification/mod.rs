//! Verification gate: checks the draft against the computed EBITDA
//!
//! Unverified → Verified | Flagged. A flagged draft is never rejected; the
//! authoritative figure is appended so the report always carries it.

use crate::config::VerificationMode;
use crate::models::{
    group_thousands, AnalysisResult, Amount, Draft, VerificationState, VerifiedReport,
};
use chrono::Utc;
use regex::Regex;
use tracing::{info, warn};

/// Decides whether a text states a given figure
pub trait FigureMatcher: Send + Sync {
    fn name(&self) -> &'static str;

    fn matches(&self, text: &str, value: Amount) -> bool;
}

/// Substring search for the exact and thousands-grouped forms
pub struct LiteralFigureMatcher;

impl FigureMatcher for LiteralFigureMatcher {
    fn name(&self) -> &'static str {
        "literal"
    }

    fn matches(&self, text: &str, value: Amount) -> bool {
        text.contains(&value.to_string()) || text.contains(&group_thousands(value))
    }
}

/// Extracts every numeric claim and accepts one within a relative tolerance.
///
/// Understands grouped digits, decimals and `k` / `thousand` / `m` /
/// `million` suffixes. The absolute tolerance never drops below one unit.
pub struct ToleranceFigureMatcher {
    tolerance_pct: f64,
    pattern: Option<Regex>,
}

impl ToleranceFigureMatcher {
    pub fn new(tolerance_pct: f64) -> Self {
        let pattern = Regex::new(
            r"(?i)(-)?\$?(\d{1,3}(?:,\d{3})+|\d+)(\.\d+)?\s?(thousand|million|k|m)?\b",
        )
        .ok();

        Self {
            tolerance_pct: tolerance_pct.abs(),
            pattern,
        }
    }

    /// Every number stated in the text, scaled by its suffix
    pub fn extract_claims(&self, text: &str) -> Vec<f64> {
        let Some(pattern) = &self.pattern else {
            return Vec::new();
        };

        pattern
            .captures_iter(text)
            .filter_map(|caps| {
                let integer = caps.get(2)?.as_str().replace(',', "");
                let fraction = caps.get(3).map(|m| m.as_str()).unwrap_or("");
                let mut value: f64 = format!("{}{}", integer, fraction).parse().ok()?;

                value *= match caps.get(4).map(|m| m.as_str().to_lowercase()).as_deref() {
                    Some("k") | Some("thousand") => 1_000.0,
                    Some("m") | Some("million") => 1_000_000.0,
                    _ => 1.0,
                };

                if caps.get(1).is_some() {
                    value = -value;
                }

                Some(value)
            })
            .collect()
    }
}

impl FigureMatcher for ToleranceFigureMatcher {
    fn name(&self) -> &'static str {
        "tolerance"
    }

    fn matches(&self, text: &str, value: Amount) -> bool {
        let target = value as f64;
        let allowed = (target.abs() * self.tolerance_pct / 100.0).max(1.0);

        self.extract_claims(text)
            .into_iter()
            .any(|claim| (claim - target).abs() <= allowed)
    }
}

pub struct VerificationGate {
    matcher: Box<dyn FigureMatcher>,
}

impl VerificationGate {
    pub fn new(matcher: Box<dyn FigureMatcher>) -> Self {
        Self { matcher }
    }

    pub fn from_mode(mode: VerificationMode) -> Self {
        match mode {
            VerificationMode::Literal => Self::new(Box::new(LiteralFigureMatcher)),
            VerificationMode::Tolerance { tolerance_pct } => {
                Self::new(Box::new(ToleranceFigureMatcher::new(tolerance_pct)))
            }
        }
    }

    /// Check a draft against the authoritative analysis.
    pub fn verify(&self, draft: Draft, analysis: &AnalysisResult) -> VerifiedReport {
        let mut state = VerificationState::Unverified;
        let ebitda = analysis.ebitda;

        info!(
            matcher = self.matcher.name(),
            ebitda,
            state = %state,
            "Verification: checking numerical accuracy"
        );

        if self.matcher.matches(&draft.text, ebitda) {
            state = VerificationState::Verified;
            info!(state = %state, "Verification passed: figures match calculation engine");

            return VerifiedReport {
                text: draft.text.clone(),
                draft,
                verified: true,
                state,
                correction: None,
                verified_at: Utc::now(),
            };
        }

        state = VerificationState::Flagged;
        warn!(
            state = %state,
            ebitda,
            "Verification failed: appending audit note"
        );

        let correction = correction_note(analysis);
        let text = format!("{}{}", draft.text, correction);

        VerifiedReport {
            text,
            draft,
            verified: false,
            state,
            correction: Some(correction),
            verified_at: Utc::now(),
        }
    }
}

impl Default for VerificationGate {
    fn default() -> Self {
        Self::new(Box::new(LiteralFigureMatcher))
    }
}

/// Deterministic correction block carrying the authoritative value
pub fn correction_note(analysis: &AnalysisResult) -> String {
    format!(
        "\n\n[AUDIT NOTE]: The calculated EBITDA of {} {} was verified by code execution.",
        analysis.ebitda, analysis.currency
    )
}
