//! Runtime configuration
//!
//! Everything comes from the environment (a `.env` file is honored).
//! The Gemini API key is mandatory: startup fails closed without it.

use crate::error::ReportError;
use crate::Result;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// How the verification gate looks for the authoritative figure in a draft
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VerificationMode {
    /// Exact and thousands-grouped substring search
    Literal,
    /// Parse numeric claims and accept one within `tolerance_pct` percent
    Tolerance { tolerance_pct: f64 },
}

#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub default_region: String,
    pub source_timeout: Duration,
    pub generation_timeout: Duration,
    pub max_generation_attempts: u32,
    pub generation_retry_backoff: Duration,
    pub report_deadline: Duration,
    pub ledger_latency: Duration,
    pub budget_latency: Duration,
    pub verification_mode: VerificationMode,
    pub api_port: u16,
    pub log_level: String,
}

impl ReportConfig {
    /// Defaults for everything except the API key.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            gemini_api_key: api_key.into(),
            gemini_model: "gemini-1.5-flash".to_string(),
            default_region: "EMEA".to_string(),
            source_timeout: Duration::from_millis(10_000),
            generation_timeout: Duration::from_millis(30_000),
            max_generation_attempts: 3,
            generation_retry_backoff: Duration::from_millis(500),
            report_deadline: Duration::from_millis(60_000),
            ledger_latency: Duration::from_millis(1_500),
            budget_latency: Duration::from_millis(1_500),
            verification_mode: VerificationMode::Literal,
            api_port: 8080,
            log_level: "info".to_string(),
        }
    }

    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("GEMINI_API_KEY")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                ReportError::Config(
                    "GEMINI_API_KEY is not set; refusing to start without a credential"
                        .to_string(),
                )
            })?;

        let mut config = Self::with_api_key(api_key);

        if let Some(model) = lookup("GEMINI_MODEL").filter(|v| !v.trim().is_empty()) {
            config.gemini_model = model.trim().to_string();
        }
        if let Some(region) = lookup("DEFAULT_REGION").filter(|v| !v.trim().is_empty()) {
            config.default_region = region.trim().to_uppercase();
        }

        config.source_timeout = millis(&lookup, "SOURCE_TIMEOUT_MS", config.source_timeout)?;
        config.generation_timeout =
            millis(&lookup, "GENERATION_TIMEOUT_MS", config.generation_timeout)?;
        config.generation_retry_backoff = millis(
            &lookup,
            "GENERATION_RETRY_BACKOFF_MS",
            config.generation_retry_backoff,
        )?;
        config.report_deadline = millis(&lookup, "REPORT_DEADLINE_MS", config.report_deadline)?;
        config.ledger_latency = millis(&lookup, "LEDGER_LATENCY_MS", config.ledger_latency)?;
        config.budget_latency = millis(&lookup, "BUDGET_LATENCY_MS", config.budget_latency)?;

        config.max_generation_attempts = parsed(
            &lookup,
            "MAX_GENERATION_ATTEMPTS",
            config.max_generation_attempts,
        )?;
        if config.max_generation_attempts == 0 {
            return Err(ReportError::Config(
                "MAX_GENERATION_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        let tolerance_pct: f64 = parsed(&lookup, "VERIFICATION_TOLERANCE_PCT", 0.5)?;
        config.verification_mode = match lookup("VERIFICATION_MODE")
            .map(|v| v.trim().to_lowercase())
            .as_deref()
        {
            None | Some("") | Some("literal") => VerificationMode::Literal,
            Some("tolerance") => VerificationMode::Tolerance { tolerance_pct },
            Some(other) => {
                return Err(ReportError::Config(format!(
                    "VERIFICATION_MODE must be 'literal' or 'tolerance', got '{}'",
                    other
                )))
            }
        };

        let port = lookup("PORT").or_else(|| lookup("API_PORT"));
        if let Some(port) = port {
            config.api_port = port.trim().parse().map_err(|_| {
                ReportError::Config(format!("Invalid port: {}", port))
            })?;
        }

        if let Some(level) = lookup("LOG_LEVEL").filter(|v| !v.trim().is_empty()) {
            config.log_level = level.trim().to_string();
        }

        Ok(config)
    }
}

fn parsed<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| ReportError::Config(format!("Invalid value for {}: {}", key, raw))),
        _ => Ok(default),
    }
}

fn millis<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let ms: u64 = parsed(lookup, key, default.as_millis() as u64)?;
    Ok(Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_key_fails_closed() {
        let err = ReportConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ReportError::Config(_)));

        let err = ReportConfig::from_lookup(lookup_from(&[("GEMINI_API_KEY", "   ")])).unwrap_err();
        assert!(matches!(err, ReportError::Config(_)));
    }

    #[test]
    fn test_defaults() {
        let config = ReportConfig::from_lookup(lookup_from(&[("GEMINI_API_KEY", "k")])).unwrap();
        assert_eq!(config.default_region, "EMEA");
        assert_eq!(config.max_generation_attempts, 3);
        assert_eq!(config.verification_mode, VerificationMode::Literal);
        assert_eq!(config.ledger_latency, Duration::from_millis(1_500));
        assert_eq!(config.api_port, 8080);
    }

    #[test]
    fn test_overrides() {
        let config = ReportConfig::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", "k"),
            ("DEFAULT_REGION", "apac"),
            ("SOURCE_TIMEOUT_MS", "250"),
            ("VERIFICATION_MODE", "tolerance"),
            ("VERIFICATION_TOLERANCE_PCT", "1.5"),
            ("API_PORT", "9090"),
        ]))
        .unwrap();

        assert_eq!(config.default_region, "APAC");
        assert_eq!(config.source_timeout, Duration::from_millis(250));
        assert_eq!(
            config.verification_mode,
            VerificationMode::Tolerance { tolerance_pct: 1.5 }
        );
        assert_eq!(config.api_port, 9090);
    }

    #[test]
    fn test_invalid_values_rejected() {
        for pairs in [
            vec![("GEMINI_API_KEY", "k"), ("SOURCE_TIMEOUT_MS", "soon")],
            vec![("GEMINI_API_KEY", "k"), ("MAX_GENERATION_ATTEMPTS", "0")],
            vec![("GEMINI_API_KEY", "k"), ("VERIFICATION_MODE", "fuzzy")],
        ] {
            let result = ReportConfig::from_lookup(lookup_from(&pairs));
            assert!(matches!(result, Err(ReportError::Config(_))));
        }
    }
}
