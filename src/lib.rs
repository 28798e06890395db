//! Financial Report Orchestrator
//!
//! Produces a verified variance-analysis report by composing four stages
//! under a stateless supervisor:
//! - Retrieval: ledger and budget sources queried in parallel
//! - Analysis: deterministic join, variance and EBITDA (LLM excluded)
//! - Narrative: executive summary drafted by a generative backend
//! - Verification: the draft is checked against the computed EBITDA and
//!   annotated when it does not state it
//!
//! PIPELINE:
//! REQUEST → RETRIEVE → ANALYZE → DRAFT → VERIFY → REPORT

pub mod analysis;
pub mod api;
pub mod audit;
pub mod config;
pub mod error;
pub mod gemini;
pub mod models;
pub mod narrative;
pub mod request;
pub mod retrieval;
pub mod sources;
pub mod supervisor;
pub mod verification;

pub use error::{ReportError, Result};

// Re-export common types
pub use models::*;
pub use supervisor::Supervisor;
