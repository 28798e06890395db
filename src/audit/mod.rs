//! Audit records for completed reports
//!
//! Analysis results are fingerprinted so a replay can be compared against
//! the original run.

use crate::models::{AnalysisResult, Amount, HealthStatus, VerificationState, VerifiedReport};
use crate::request::ReportRequest;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRecord {
    pub report_id: Uuid,
    pub request: ReportRequest,
    pub analysis_fingerprint: String,
    pub ebitda: Amount,
    pub health_status: HealthStatus,
    pub state: VerificationState,
    pub verified: bool,
    pub report_text: String,
    pub created_at: DateTime<Utc>,
    pub execution_time_ms: u64,
}

impl ReportRecord {
    pub fn new(
        request: ReportRequest,
        report: &VerifiedReport,
        execution_time_ms: u64,
    ) -> Result<Self> {
        let analysis = report.analysis();
        Ok(Self {
            report_id: request.request_id,
            analysis_fingerprint: fingerprint(analysis)?,
            ebitda: analysis.ebitda,
            health_status: analysis.health_status,
            state: report.state,
            verified: report.verified,
            report_text: report.text.clone(),
            created_at: Utc::now(),
            execution_time_ms,
            request,
        })
    }
}

/// Audit trail storage
pub struct AuditLog {
    records: Arc<RwLock<HashMap<Uuid, ReportRecord>>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Store a report record
    pub async fn record(&self, record: ReportRecord) -> Result<Uuid> {
        let report_id = record.report_id;
        let mut records = self.records.write().await;
        records.insert(report_id, record);
        Ok(report_id)
    }

    pub async fn get(&self, report_id: Uuid) -> Result<Option<ReportRecord>> {
        let records = self.records.read().await;
        Ok(records.get(&report_id).cloned())
    }

    /// Report ids for a region, oldest first
    pub async fn list_for_region(&self, region: &str) -> Result<Vec<Uuid>> {
        let records = self.records.read().await;

        let mut items: Vec<_> = records
            .values()
            .filter(|record| record.request.region.eq_ignore_ascii_case(region))
            .map(|record| (record.report_id, record.created_at))
            .collect();

        items.sort_by_key(|(_, created_at)| *created_at);

        Ok(items.into_iter().map(|(id, _)| id).collect())
    }

    /// Whether a replayed analysis matches the recorded one.
    /// `None` when the report id is unknown.
    pub async fn verify_replay(
        &self,
        report_id: Uuid,
        replay: &AnalysisResult,
    ) -> Result<Option<bool>> {
        let replayed = fingerprint(replay)?;
        let records = self.records.read().await;

        Ok(records
            .get(&report_id)
            .map(|record| record.analysis_fingerprint == replayed))
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

/// SHA256 of the serialized analysis, hex encoded.
/// Streams JSON straight into the hasher.
pub fn fingerprint(analysis: &AnalysisResult) -> Result<String> {
    let mut hasher = Sha256::new();
    serde_json::to_writer(&mut HashWriter(&mut hasher), analysis)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
