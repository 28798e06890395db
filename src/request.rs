//! Report request parsing
//!
//! Keyword extraction only: the region and reporting period are pulled out of
//! the request text, everything else is ignored.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use uuid::Uuid;

/// Regions the pipeline knows how to query
const KNOWN_REGIONS: &[&str] = &["EMEA", "APAC", "AMER", "LATAM", "NA"];

const DEFAULT_PERIOD: &str = "Q4";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRequest {
    pub request_id: Uuid,
    pub text: String,
    pub region: String,
    pub period: String,
    pub received_at: DateTime<Utc>,
}

pub fn parse_request(text: &str, default_region: &str) -> ReportRequest {
    ReportRequest {
        request_id: Uuid::new_v4(),
        text: text.to_string(),
        region: extract_region(text).unwrap_or_else(|| default_region.to_string()),
        period: extract_period(text).unwrap_or_else(|| DEFAULT_PERIOD.to_string()),
        received_at: Utc::now(),
    }
}

fn extract_region(text: &str) -> Option<String> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .map(|token| token.to_ascii_uppercase())
        .find(|token| KNOWN_REGIONS.contains(&token.as_str()))
}

fn period_pattern() -> Option<&'static Regex> {
    static PERIOD: OnceLock<Option<Regex>> = OnceLock::new();
    PERIOD
        .get_or_init(|| Regex::new(r"(?i)\b(q[1-4])(?:\s+(\d{4}))?\b").ok())
        .as_ref()
}

fn extract_period(text: &str) -> Option<String> {
    let re = period_pattern()?;

    let caps = re.captures(text)?;
    let quarter = caps.get(1)?.as_str().to_uppercase();

    Some(match caps.get(2) {
        Some(year) => format!("{} {}", quarter, year.as_str()),
        None => quarter,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_pattern_compiles() {
        assert!(period_pattern().is_some());
    }

    #[test]
    fn test_region_and_period_extracted() {
        let req = parse_request(
            "Generate the Q4 2025 Variance Analysis Report for the EMEA region.",
            "APAC",
        );
        assert_eq!(req.region, "EMEA");
        assert_eq!(req.period, "Q4 2025");
    }

    #[test]
    fn test_region_is_case_insensitive_whole_word() {
        let req = parse_request("q2 numbers for apac please", "EMEA");
        assert_eq!(req.region, "APAC");
        assert_eq!(req.period, "Q2");

        // "national" contains "na" but is not the NA region
        let req = parse_request("national summary", "EMEA");
        assert_eq!(req.region, "EMEA");
    }

    #[test]
    fn test_defaults_when_unparseable() {
        let req = parse_request("give me the report", "EMEA");
        assert_eq!(req.region, "EMEA");
        assert_eq!(req.period, "Q4");
        assert_eq!(req.text, "give me the report");
    }
}
