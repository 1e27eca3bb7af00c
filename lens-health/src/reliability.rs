//! Ledger reliability scoring.
//!
//! Two strategies are offered side by side and callers pick one explicitly:
//!
//! - **Completeness**: `round(100 × (1 − missing/total), 2)`, the share of
//!   populated cells.
//! - **Red flags**: start at 100 and subtract fixed penalties:
//!
//! | Flag | Condition | Penalty |
//! |------|-----------|---------|
//! | Burn exceeds revenue | Σexpenses > Σrevenue | −30 |
//! | Cash below half burn | Σcash < ½ × mean(expenses) | −20 |
//!
//! Both strategies score an empty ledger (no cells) as 0 and clamp to [0, 100].

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::LedgerError;
use crate::ledger::{Column, Ledger};
use crate::util::round_to;

/// Penalty for aggregate expenses exceeding aggregate revenue.
pub const BURN_EXCEEDS_REVENUE_PENALTY: f64 = 30.0;
/// Penalty for cash below half of the monthly burn.
pub const CASH_BELOW_HALF_BURN_PENALTY: f64 = 20.0;

/// Named reliability strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Completeness,
    RedFlags,
}

impl StrategyKind {
    /// Instantiate the strategy this name refers to.
    pub fn strategy(self) -> Box<dyn ReliabilityStrategy> {
        match self {
            Self::Completeness => Box::new(CompletenessStrategy),
            Self::RedFlags => Box::new(RedFlagStrategy),
        }
    }
}

impl FromStr for StrategyKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completeness" => Ok(Self::Completeness),
            "red_flags" => Ok(Self::RedFlags),
            other => Err(LedgerError::invalid(
                "strategy",
                format!("unknown reliability strategy '{}'", other),
            )),
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completeness => write!(f, "completeness"),
            Self::RedFlags => write!(f, "red_flags"),
        }
    }
}

/// A rule-based warning sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedFlag {
    BurnExceedsRevenue,
    CashBelowHalfBurn,
}

impl RedFlag {
    pub fn penalty(self) -> f64 {
        match self {
            Self::BurnExceedsRevenue => BURN_EXCEEDS_REVENUE_PENALTY,
            Self::CashBelowHalfBurn => CASH_BELOW_HALF_BURN_PENALTY,
        }
    }
}

/// Reliability percentage plus what it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReliabilityScore {
    pub strategy: StrategyKind,
    /// Score in [0, 100], two decimals
    pub value: f64,
    pub missing_cells: usize,
    pub total_cells: usize,
    /// Flags that fired (red-flag strategy only)
    pub red_flags: Vec<RedFlag>,
}

/// A way of turning a ledger into a reliability percentage.
pub trait ReliabilityStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    fn score(&self, ledger: &Ledger) -> ReliabilityScore;
}

/// Null-ratio scoring.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompletenessStrategy;

impl ReliabilityStrategy for CompletenessStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Completeness
    }

    fn score(&self, ledger: &Ledger) -> ReliabilityScore {
        let total = ledger.total_cells();
        let missing = ledger.missing_cells();

        // zero cells: nothing to trust
        let value = if total == 0 {
            0.0
        } else {
            round_to(100.0 * (1.0 - missing as f64 / total as f64), 2).clamp(0.0, 100.0)
        };

        tracing::debug!(missing, total, value, "Completeness score computed");

        ReliabilityScore {
            strategy: self.kind(),
            value,
            missing_cells: missing,
            total_cells: total,
            red_flags: Vec::new(),
        }
    }
}

/// Rule-penalty scoring.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedFlagStrategy;

impl RedFlagStrategy {
    /// Flags raised by a ledger, in table order.
    pub fn flags(ledger: &Ledger) -> Vec<RedFlag> {
        let revenue = ledger.sum(Column::Revenue);
        let expenses = ledger.sum(Column::Expenses);
        let cash = ledger.sum(Column::Cash);
        let burn = ledger.mean(Column::Expenses);

        let mut flags = Vec::new();
        if expenses > revenue {
            flags.push(RedFlag::BurnExceedsRevenue);
        }
        if cash < burn * 0.5 {
            flags.push(RedFlag::CashBelowHalfBurn);
        }
        flags
    }
}

impl ReliabilityStrategy for RedFlagStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::RedFlags
    }

    fn score(&self, ledger: &Ledger) -> ReliabilityScore {
        let total = ledger.total_cells();
        let missing = ledger.missing_cells();

        let (value, red_flags) = if total == 0 {
            (0.0, Vec::new())
        } else {
            let flags = Self::flags(ledger);
            let penalty: f64 = flags.iter().map(|f| f.penalty()).sum();
            ((100.0 - penalty).max(0.0), flags)
        };

        if !red_flags.is_empty() {
            tracing::info!(flags = ?red_flags, value, "Red flags lowered reliability");
        }

        ReliabilityScore {
            strategy: self.kind(),
            value,
            missing_cells: missing,
            total_cells: total,
            red_flags,
        }
    }
}

/// Score a ledger with the named strategy.
pub fn score(ledger: &Ledger, kind: StrategyKind) -> ReliabilityScore {
    kind.strategy().score(ledger)
}
