//! Data source traits and implementations
//!
//! The ledger and ERP systems live outside this crate. Only their query
//! contract is modeled here; latency is unbounded by contract, so callers
//! impose their own timeouts.

use crate::models::{BudgetDataset, LedgerDataset};
use crate::Result;
use async_trait::async_trait;

pub mod mock;
pub use mock::{MockBudgetSource, MockLedgerSource};

/// General ledger: actual amounts per category
#[async_trait]
pub trait LedgerSource: Send + Sync {
    async fn get_ledger(&self, region: &str) -> Result<LedgerDataset>;
}

/// ERP system: budgeted amounts per category
#[async_trait]
pub trait BudgetSource: Send + Sync {
    async fn get_budget(&self, region: &str) -> Result<BudgetDataset>;
}
