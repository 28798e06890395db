//! Narrative generator: turns analysis output into an executive summary draft
//!
//! The only non-deterministic stage. Its output is not checked here; the
//! verification gate does that.

use crate::error::ReportError;
use crate::models::{AnalysisResult, Draft};
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Generative text backend
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

pub struct NarrativeGenerator {
    backend: Arc<dyn TextGenerator>,
    timeout: Duration,
}

impl NarrativeGenerator {
    pub fn new(backend: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Draft an executive summary. `attempt` is recorded on the draft.
    pub async fn draft(
        &self,
        analysis: Arc<AnalysisResult>,
        region: &str,
        period: &str,
        attempt: u32,
    ) -> Result<Draft> {
        info!(region, period, attempt, "Narrative: generating executive summary");

        let prompt = build_prompt(&analysis, region, period);
        debug!(prompt_len = prompt.len(), "Prompt built");

        let text = tokio::time::timeout(self.timeout, self.backend.generate(&prompt))
            .await
            .map_err(|_| {
                ReportError::GenerationFailed(format!(
                    "backend timed out after {} ms",
                    self.timeout.as_millis()
                ))
            })?
            .map_err(|e| match e {
                ReportError::GenerationFailed(_) => e,
                other => ReportError::GenerationFailed(other.to_string()),
            })?;

        if text.trim().is_empty() {
            return Err(ReportError::GenerationFailed(
                "backend returned empty output".to_string(),
            ));
        }

        Ok(Draft {
            text,
            analysis,
            region: region.to_string(),
            attempts: attempt,
            generated_at: Utc::now(),
        })
    }
}

/// Build the drafting prompt
pub fn build_prompt(analysis: &AnalysisResult, region: &str, period: &str) -> String {
    format!(
        r#"You are a senior financial analyst. Write a brief executive summary for the {period} Financial Report for region {region}.

Data Context:
{table}
Calculated EBITDA: {ebitda} {currency}
Financial Health: {health}

Requirements:
1. Summarize Revenue and OpEx performance.
2. Highlight the Variance (Actual vs Budget).
3. Keep it professional and strategic.
4. State the EBITDA figure exactly as given above.
"#,
        period = period,
        region = region,
        table = analysis.metrics.render_table(),
        ebitda = analysis.ebitda,
        currency = analysis.currency,
        health = analysis.health_status,
    )
}
