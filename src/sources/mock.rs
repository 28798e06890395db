//! Simulated ledger and ERP sources serving the sample Q4 dataset
//!
//! Keeps the pipeline runnable without a real backend.

use super::{BudgetSource, LedgerSource};
use crate::models::{BudgetDataset, BudgetRow, Category, LedgerDataset, LedgerRow};
use crate::Result;
use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

pub struct MockLedgerSource {
    latency: Duration,
}

impl MockLedgerSource {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl LedgerSource for MockLedgerSource {
    async fn get_ledger(&self, region: &str) -> Result<LedgerDataset> {
        info!(region, "Connecting to general ledger");
        tokio::time::sleep(self.latency).await;

        let rows = [
            (Category::Revenue, 500_000),
            (Category::CostOfGoodsSold, 200_000),
            (Category::OperatingExpense, 150_000),
            (Category::Tax, 30_000),
        ]
        .into_iter()
        .map(|(category, actual_amount)| LedgerRow {
            category,
            actual_amount,
            currency: "USD".to_string(),
        })
        .collect();

        Ok(LedgerDataset {
            region: region.to_string(),
            rows,
        })
    }
}

pub struct MockBudgetSource {
    latency: Duration,
}

impl MockBudgetSource {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl BudgetSource for MockBudgetSource {
    async fn get_budget(&self, region: &str) -> Result<BudgetDataset> {
        info!(region, "Connecting to ERP system");
        tokio::time::sleep(self.latency).await;

        let rows = [
            (Category::Revenue, 480_000),
            (Category::CostOfGoodsSold, 190_000),
            (Category::OperatingExpense, 140_000),
            (Category::Tax, 30_000),
        ]
        .into_iter()
        .map(|(category, budget_amount)| BudgetRow {
            category,
            budget_amount,
        })
        .collect();

        Ok(BudgetDataset {
            region: region.to_string(),
            rows,
        })
    }
}
