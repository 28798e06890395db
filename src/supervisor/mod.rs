//! Supervisor - sequences the report pipeline
//!
//! REQUEST → RETRIEVE → ANALYZE → DRAFT (retry?) → VERIFY → COMPLETE
//!
//! Holds only immutable collaborators, so a single instance can serve
//! concurrent requests.

use crate::analysis::AnalysisEngine;
use crate::config::ReportConfig;
use crate::error::ReportError;
use crate::models::{AnalysisResult, Draft, VerifiedReport};
use crate::narrative::{NarrativeGenerator, TextGenerator};
use crate::request::{parse_request, ReportRequest};
use crate::retrieval::RetrievalCoordinator;
use crate::sources::{BudgetSource, LedgerSource};
use crate::verification::VerificationGate;
use crate::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Retry policy for the generation stage
#[derive(Debug, Clone, Copy)]
pub struct GenerationPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl GenerationPolicy {
    /// Linear backoff, saturating for oversized configured delays
    pub fn delay_before_retry(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }
}

impl Default for GenerationPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

pub struct Supervisor {
    retrieval: RetrievalCoordinator,
    analysis: AnalysisEngine,
    narrative: NarrativeGenerator,
    gate: VerificationGate,
    policy: GenerationPolicy,
    default_region: String,
}

impl Supervisor {
    pub fn new(
        retrieval: RetrievalCoordinator,
        analysis: AnalysisEngine,
        narrative: NarrativeGenerator,
        gate: VerificationGate,
        policy: GenerationPolicy,
        default_region: impl Into<String>,
    ) -> Self {
        Self {
            retrieval,
            analysis,
            narrative,
            gate,
            policy,
            default_region: default_region.into(),
        }
    }

    /// Wire a supervisor from configuration and injected collaborators.
    pub fn from_config(
        config: &ReportConfig,
        ledger: Arc<dyn LedgerSource>,
        budget: Arc<dyn BudgetSource>,
        backend: Arc<dyn TextGenerator>,
    ) -> Self {
        Self::new(
            RetrievalCoordinator::new(ledger, budget, config.source_timeout),
            AnalysisEngine::new(),
            NarrativeGenerator::new(backend, config.generation_timeout),
            VerificationGate::from_mode(config.verification_mode),
            GenerationPolicy {
                max_attempts: config.max_generation_attempts.max(1),
                backoff: config.generation_retry_backoff,
            },
            config.default_region.clone(),
        )
    }

    pub fn parse(&self, request: &str) -> ReportRequest {
        parse_request(request, &self.default_region)
    }

    /// Run the pipeline for a natural-language request
    pub async fn run(&self, request: &str) -> Result<VerifiedReport> {
        let request = self.parse(request);
        self.run_request(&request).await
    }

    /// Run with a caller deadline. Expiry drops every in-flight stage.
    pub async fn run_with_deadline(
        &self,
        request: &str,
        deadline: Duration,
    ) -> Result<VerifiedReport> {
        let request = self.parse(request);
        self.run_request_with_deadline(&request, deadline).await
    }

    pub async fn run_request_with_deadline(
        &self,
        request: &ReportRequest,
        deadline: Duration,
    ) -> Result<VerifiedReport> {
        tokio::time::timeout(deadline, self.run_request(request))
            .await
            .map_err(|_| {
                warn!(request_id = %request.request_id, "Report deadline exceeded");
                ReportError::DeadlineExceeded(deadline.as_millis() as u64)
            })?
    }

    /// Run the pipeline for an already parsed request
    pub async fn run_request(&self, request: &ReportRequest) -> Result<VerifiedReport> {
        let start = Instant::now();

        info!(
            request_id = %request.request_id,
            region = %request.region,
            period = %request.period,
            "Supervisor: starting report"
        );

        // === RETRIEVE + ANALYZE ===
        let analysis = Arc::new(self.analyze_region(&request.region).await?);
        info!(
            ebitda = analysis.ebitda,
            health = %analysis.health_status,
            "Supervisor: calculated EBITDA"
        );

        // === DRAFT ===
        let draft = self.draft_with_retry(analysis.clone(), request).await?;

        // === VERIFY ===
        let report = self.gate.verify(draft, &analysis);

        info!(
            request_id = %request.request_id,
            state = %report.state,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Supervisor: report complete"
        );

        Ok(report)
    }

    /// Retrieve and analyze a region without generating a narrative.
    /// Used to replay a recorded report's numbers.
    pub async fn analyze_region(&self, region: &str) -> Result<AnalysisResult> {
        let (ledger, budget) = self.retrieval.fetch(region).await?;
        self.analysis.analyze(&ledger, &budget)
    }

    async fn draft_with_retry(
        &self,
        analysis: Arc<AnalysisResult>,
        request: &ReportRequest,
    ) -> Result<Draft> {
        let mut attempt = 1;

        loop {
            match self
                .narrative
                .draft(analysis.clone(), &request.region, &request.period, attempt)
                .await
            {
                Ok(draft) => {
                    debug!(attempt, "Draft generated");
                    return Ok(draft);
                }
                Err(e) if e.is_retryable() && attempt < self.policy.max_attempts => {
                    warn!(
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        error = %e,
                        "Generation failed - retrying"
                    );
                    tokio::time::sleep(self.policy.delay_before_retry(attempt)).await;
                    attempt += 1;
                }
                Err(ReportError::GenerationFailed(reason)) => {
                    return Err(ReportError::GenerationFailed(format!(
                        "gave up after {} attempt(s): {}",
                        attempt, reason
                    )));
                }
                Err(e) => return Err(e),
            }
        }
    }
}
