//! Core data models for the report pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Whole currency units
pub type Amount = i64;

//
// ================= Category =================
//

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Revenue,
    CostOfGoodsSold,
    OperatingExpense,
    Tax,
    Other(String),
}

impl Category {
    /// Short label used in tables and prompts
    pub fn label(&self) -> &str {
        match self {
            Category::Revenue => "Revenue",
            Category::CostOfGoodsSold => "COGS",
            Category::OperatingExpense => "OpEx",
            Category::Tax => "Tax",
            Category::Other(name) => name,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Category {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let category = match trimmed.to_lowercase().as_str() {
            "revenue" | "sales" => Category::Revenue,
            "cogs" | "cost of goods sold" | "cost_of_goods_sold" => Category::CostOfGoodsSold,
            "opex" | "operating expense" | "operating expenses" | "operating_expense" => {
                Category::OperatingExpense
            }
            "tax" | "taxes" => Category::Tax,
            _ => Category::Other(trimmed.to_string()),
        };
        Ok(category)
    }
}

//
// ================= Source Rows =================
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub category: Category,
    pub actual_amount: Amount,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetRow {
    pub category: Category,
    pub budget_amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerDataset {
    pub region: String,
    pub rows: Vec<LedgerRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetDataset {
    pub region: String,
    pub rows: Vec<BudgetRow>,
}

//
// ================= Analysis =================
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub category: Category,
    pub actual_amount: Amount,
    pub budget_amount: Amount,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub record: CategoryRecord,
    pub variance: Amount,
    pub variance_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedMetrics {
    pub rows: Vec<MetricRow>,
}

impl MergedMetrics {
    pub fn get(&self, category: &Category) -> Option<&MetricRow> {
        self.rows.iter().find(|row| &row.record.category == category)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render as a markdown table for prompts and console output.
    pub fn render_table(&self) -> String {
        let mut out = String::new();
        out.push_str("| Category | Actual | Budget | Currency | Variance | Variance % |\n");
        out.push_str("|----------|--------|--------|----------|----------|------------|\n");

        for row in &self.rows {
            out.push_str(&format!(
                "| {} | {} | {} | {} | {} | {:.2}% |\n",
                row.record.category,
                row.record.actual_amount,
                row.record.budget_amount,
                row.record.currency,
                row.variance,
                row.variance_pct,
            ));
        }

        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    AtRisk,
}

impl HealthStatus {
    /// Strictly positive EBITDA is healthy; zero is not.
    pub fn from_ebitda(ebitda: Amount) -> Self {
        if ebitda > 0 {
            HealthStatus::Healthy
        } else {
            HealthStatus::AtRisk
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthStatus::Healthy => "Healthy",
            HealthStatus::AtRisk => "At Risk",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub region: String,
    pub metrics: MergedMetrics,
    pub ebitda: Amount,
    pub currency: String,
    pub health_status: HealthStatus,
}

//
// ================= Narrative & Verification =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Draft {
    pub text: String,
    pub analysis: Arc<AnalysisResult>,
    pub region: String,
    pub attempts: u32,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationState {
    Unverified,
    Verified,
    Flagged,
}

impl fmt::Display for VerificationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VerificationState::Unverified => "unverified",
            VerificationState::Verified => "verified",
            VerificationState::Flagged => "flagged",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedReport {
    pub draft: Draft,
    pub verified: bool,
    pub state: VerificationState,
    pub correction: Option<String>,
    /// Draft text, with the correction block appended when flagged
    pub text: String,
    pub verified_at: DateTime<Utc>,
}

impl VerifiedReport {
    pub fn analysis(&self) -> &AnalysisResult {
        &self.draft.analysis
    }
}

/// Group the digits of an amount by thousands (`150000` → `150,000`).
pub fn group_thousands(value: Amount) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if value < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}
