//! Retrieval coordinator: parallel fan-out to the ledger and budget sources
//!
//! Both queries are in flight at the same time and the call returns only
//! once both have completed. Either failure fails the whole call.

use crate::error::{ReportError, SourceKind};
use crate::models::{BudgetDataset, LedgerDataset};
use crate::sources::{BudgetSource, LedgerSource};
use crate::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub struct RetrievalCoordinator {
    ledger: Arc<dyn LedgerSource>,
    budget: Arc<dyn BudgetSource>,
    source_timeout: Duration,
}

impl RetrievalCoordinator {
    pub fn new(
        ledger: Arc<dyn LedgerSource>,
        budget: Arc<dyn BudgetSource>,
        source_timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            budget,
            source_timeout,
        }
    }

    /// Fetch both datasets for a region.
    ///
    /// `try_join!` returns on the first error and drops the other branch,
    /// which cancels its in-flight query. Dropping the returned future
    /// cancels both.
    pub async fn fetch(&self, region: &str) -> Result<(LedgerDataset, BudgetDataset)> {
        let start = Instant::now();
        info!(region, "Retrieval: starting parallel extraction");

        let ledger = async {
            match tokio::time::timeout(self.source_timeout, self.ledger.get_ledger(region)).await {
                Ok(result) => result.map_err(|e| tag_source(e, SourceKind::Ledger)),
                Err(_) => Err(ReportError::source_unavailable(
                    SourceKind::Ledger,
                    format!("timed out after {} ms", self.source_timeout.as_millis()),
                )),
            }
        };

        let budget = async {
            match tokio::time::timeout(self.source_timeout, self.budget.get_budget(region)).await {
                Ok(result) => result.map_err(|e| tag_source(e, SourceKind::Budget)),
                Err(_) => Err(ReportError::source_unavailable(
                    SourceKind::Budget,
                    format!("timed out after {} ms", self.source_timeout.as_millis()),
                )),
            }
        };

        let (ledger, budget) = tokio::try_join!(ledger, budget).map_err(|e| {
            warn!(region, error = %e, "Retrieval failed");
            e
        })?;

        debug!(
            region,
            ledger_rows = ledger.rows.len(),
            budget_rows = budget.rows.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Retrieval: data fetch complete"
        );

        Ok((ledger, budget))
    }
}

/// Any error escaping a source becomes `SourceUnavailable` for that source.
fn tag_source(err: ReportError, source_kind: SourceKind) -> ReportError {
    match err {
        ReportError::SourceUnavailable { reason, .. } => {
            ReportError::source_unavailable(source_kind, reason)
        }
        other => ReportError::source_unavailable(source_kind, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BudgetRow, Category, LedgerRow};
    use crate::sources::{MockBudgetSource, MockLedgerSource};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FailingLedger;

    #[async_trait]
    impl LedgerSource for FailingLedger {
        async fn get_ledger(&self, _region: &str) -> Result<LedgerDataset> {
            Err(ReportError::IoError(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "ledger offline",
            )))
        }
    }

    /// Records whether the query ran to completion.
    struct SlowBudget {
        latency: Duration,
        completed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl BudgetSource for SlowBudget {
        async fn get_budget(&self, region: &str) -> Result<BudgetDataset> {
            tokio::time::sleep(self.latency).await;
            self.completed.store(true, Ordering::SeqCst);
            Ok(BudgetDataset {
                region: region.to_string(),
                rows: vec![BudgetRow {
                    category: Category::Revenue,
                    budget_amount: 1,
                }],
            })
        }
    }

    struct SlowLedger(Duration);

    #[async_trait]
    impl LedgerSource for SlowLedger {
        async fn get_ledger(&self, region: &str) -> Result<LedgerDataset> {
            tokio::time::sleep(self.0).await;
            Ok(LedgerDataset {
                region: region.to_string(),
                rows: vec![LedgerRow {
                    category: Category::Revenue,
                    actual_amount: 1,
                    currency: "USD".to_string(),
                }],
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_latency_is_max_not_sum() {
        let coordinator = RetrievalCoordinator::new(
            Arc::new(MockLedgerSource::new(Duration::from_millis(300))),
            Arc::new(MockBudgetSource::new(Duration::from_millis(500))),
            Duration::from_secs(10),
        );

        let start = tokio::time::Instant::now();
        let (ledger, budget) = coordinator.fetch("EMEA").await.unwrap();
        let elapsed = start.elapsed();

        assert_eq!(ledger.rows.len(), 4);
        assert_eq!(budget.rows.len(), 4);
        assert!(elapsed >= Duration::from_millis(500));
        assert!(elapsed < Duration::from_millis(800), "elapsed {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_names_source_and_cancels_sibling() {
        let completed = Arc::new(AtomicBool::new(false));
        let coordinator = RetrievalCoordinator::new(
            Arc::new(FailingLedger),
            Arc::new(SlowBudget {
                latency: Duration::from_secs(5),
                completed: completed.clone(),
            }),
            Duration::from_secs(30),
        );

        let err = coordinator.fetch("EMEA").await.unwrap_err();
        match err {
            ReportError::SourceUnavailable { source_kind, reason } => {
                assert_eq!(source_kind, SourceKind::Ledger);
                assert!(reason.contains("ledger offline"));
            }
            other => panic!("unexpected error: {other}"),
        }

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!completed.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_source_timeout_is_source_unavailable() {
        let coordinator = RetrievalCoordinator::new(
            Arc::new(SlowLedger(Duration::from_millis(10))),
            Arc::new(SlowBudget {
                latency: Duration::from_secs(60),
                completed: Arc::new(AtomicBool::new(false)),
            }),
            Duration::from_secs(1),
        );

        let err = coordinator.fetch("APAC").await.unwrap_err();
        assert!(matches!(
            err,
            ReportError::SourceUnavailable {
                source_kind: SourceKind::Budget,
                ..
            }
        ));
    }
}
