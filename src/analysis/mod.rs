//! Analysis engine: joins actuals with budget and derives variance and EBITDA
//!
//! Pure function of its inputs. LLM is NOT allowed here.

use crate::error::{ReportError, SourceKind};
use crate::models::{
    AnalysisResult, Amount, BudgetDataset, BudgetRow, Category, CategoryRecord, HealthStatus,
    LedgerDataset, MergedMetrics, MetricRow,
};
use crate::Result;
use std::collections::BTreeMap;
use tracing::debug;

/// Categories EBITDA is derived from
const EBITDA_INPUTS: [Category; 3] = [
    Category::Revenue,
    Category::CostOfGoodsSold,
    Category::OperatingExpense,
];

#[derive(Debug, Default, Clone, Copy)]
pub struct AnalysisEngine;

impl AnalysisEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, ledger: &LedgerDataset, budget: &BudgetDataset) -> Result<AnalysisResult> {
        let metrics = join(ledger, budget)?;

        let revenue = single_actual(&metrics, &EBITDA_INPUTS[0])?;
        let cogs = single_actual(&metrics, &EBITDA_INPUTS[1])?;
        let opex = single_actual(&metrics, &EBITDA_INPUTS[2])?;

        let ebitda = revenue
            .record
            .actual_amount
            .checked_sub(cogs.record.actual_amount)
            .and_then(|gross| gross.checked_sub(opex.record.actual_amount))
            .ok_or_else(|| ReportError::AmountOverflow {
                category: "EBITDA".to_string(),
            })?;
        let currency = revenue.record.currency.clone();
        let health_status = HealthStatus::from_ebitda(ebitda);

        debug!(
            region = %ledger.region,
            rows = metrics.len(),
            ebitda,
            health = %health_status,
            "Analysis complete"
        );

        Ok(AnalysisResult {
            region: ledger.region.clone(),
            metrics,
            ebitda,
            currency,
            health_status,
        })
    }
}

/// Inner join on category. Rows keep ledger order; each category must appear
/// exactly once on each side.
fn join(ledger: &LedgerDataset, budget: &BudgetDataset) -> Result<MergedMetrics> {
    let mut budget_by_category: BTreeMap<&Category, &BudgetRow> = BTreeMap::new();
    let mut budget_counts: BTreeMap<&Category, usize> = BTreeMap::new();
    for row in &budget.rows {
        *budget_counts.entry(&row.category).or_default() += 1;
        budget_by_category.entry(&row.category).or_insert(row);
    }

    let mut ledger_counts: BTreeMap<&Category, usize> = BTreeMap::new();
    for row in &ledger.rows {
        *ledger_counts.entry(&row.category).or_default() += 1;
    }

    let ledger_only: Vec<String> = ledger_counts
        .keys()
        .filter(|c| !budget_by_category.contains_key(*c))
        .map(|c| c.to_string())
        .collect();
    let budget_only: Vec<String> = budget_by_category
        .keys()
        .filter(|c| !ledger_counts.contains_key(*c))
        .map(|c| c.to_string())
        .collect();

    if !ledger_only.is_empty() || !budget_only.is_empty() {
        return Err(ReportError::JoinMismatch {
            ledger_only,
            budget_only,
        });
    }

    reject_repeats(&ledger_counts, SourceKind::Ledger)?;
    reject_repeats(&budget_counts, SourceKind::Budget)?;

    let mut rows = Vec::with_capacity(ledger.rows.len());
    for actual in &ledger.rows {
        let Some(planned) = budget_by_category.get(&actual.category) else {
            continue;
        };
        let record = CategoryRecord {
            category: actual.category.clone(),
            actual_amount: actual.actual_amount,
            budget_amount: planned.budget_amount,
            currency: actual.currency.clone(),
        };
        rows.push(metric_row(record)?);
    }

    Ok(MergedMetrics { rows })
}

/// One record per category per run. EBITDA inputs report through
/// `MissingCategory` so callers see a single shape for "not exactly one".
fn reject_repeats(counts: &BTreeMap<&Category, usize>, source_kind: SourceKind) -> Result<()> {
    let Some((category, found)) = counts.iter().find(|(_, n)| **n > 1) else {
        return Ok(());
    };

    if EBITDA_INPUTS.contains(*category) {
        return Err(ReportError::MissingCategory {
            category: category.to_string(),
            found: *found,
        });
    }

    Err(ReportError::DuplicateCategory {
        category: category.to_string(),
        source_kind,
        found: *found,
    })
}

fn metric_row(record: CategoryRecord) -> Result<MetricRow> {
    if record.budget_amount == 0 {
        return Err(ReportError::DivisionByZero {
            category: record.category.to_string(),
        });
    }

    let variance: Amount = record
        .actual_amount
        .checked_sub(record.budget_amount)
        .ok_or_else(|| ReportError::AmountOverflow {
            category: record.category.to_string(),
        })?;
    let variance_pct = variance as f64 / record.budget_amount as f64 * 100.0;

    Ok(MetricRow {
        record,
        variance,
        variance_pct,
    })
}

fn single_actual<'a>(metrics: &'a MergedMetrics, category: &Category) -> Result<&'a MetricRow> {
    let matches: Vec<&MetricRow> = metrics
        .rows
        .iter()
        .filter(|row| &row.record.category == category)
        .collect();

    match matches.as_slice() {
        [row] => Ok(*row),
        _ => Err(ReportError::MissingCategory {
            category: category.to_string(),
            found: matches.len(),
        }),
    }
}
