//! Error types for the financial report orchestrator

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, ReportError>;

/// Which upstream data provider a retrieval failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Ledger,
    Budget,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Ledger => write!(f, "ledger"),
            SourceKind::Budget => write!(f, "budget"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ReportError {

    // =============================
    // Retrieval
    // =============================

    #[error("Source unavailable ({source_kind}): {reason}")]
    SourceUnavailable {
        source_kind: SourceKind,
        reason: String,
    },

    // =============================
    // Data Integrity (Analysis)
    // =============================

    #[error("Join mismatch: ledger-only {ledger_only:?}, budget-only {budget_only:?}")]
    JoinMismatch {
        ledger_only: Vec<String>,
        budget_only: Vec<String>,
    },

    #[error("Missing category {category}: expected exactly one row, found {found}")]
    MissingCategory { category: String, found: usize },

    #[error("Duplicate category {category} in {source_kind} data: found {found} rows")]
    DuplicateCategory {
        category: String,
        source_kind: SourceKind,
        found: usize,
    },

    #[error("Division by zero: budget for {category} is zero")]
    DivisionByZero { category: String },

    #[error("Amount overflow while computing {category}")]
    AmountOverflow { category: String },

    // =============================
    // Generation
    // =============================

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    // =============================
    // Run control & startup
    // =============================

    #[error("Report deadline exceeded after {0} ms")]
    DeadlineExceeded(u64),

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ReportError {
    /// Only generation failures are worth retrying in place.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReportError::GenerationFailed(_))
    }

    /// Malformed upstream data; the run cannot be repaired.
    pub fn is_integrity_error(&self) -> bool {
        matches!(
            self,
            ReportError::JoinMismatch { .. }
                | ReportError::MissingCategory { .. }
                | ReportError::DuplicateCategory { .. }
                | ReportError::DivisionByZero { .. }
                | ReportError::AmountOverflow { .. }
        )
    }

    pub(crate) fn source_unavailable(source_kind: SourceKind, reason: impl Into<String>) -> Self {
        ReportError::SourceUnavailable {
            source_kind,
            reason: reason.into(),
        }
    }
}
