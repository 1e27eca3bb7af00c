//! Liquidity diagnosis.
//!
//! Computes aggregate sums over a ledger and flags the **paper-profit trap**:
//! accounting profit is positive, yet cash on hand covers less than half of
//! total expenses.
//!
//! ```text
//! net_profit        = Σrevenue − Σexpenses
//! liquidity_ratio   = Σcash / (Σexpenses + ε)        ε = 1e-6
//! paper_profit_trap = net_profit > 0 ∧ liquidity_ratio < 0.5
//! monthly_expenses  = mean(expenses)
//! ```

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::LedgerError;
use crate::ledger::{Column, Denomination, Ledger};

/// Added to the expense total so an expense-free ledger never divides by zero.
pub const LIQUIDITY_EPSILON: f64 = 1e-6;

/// Liquidity ratio strictly below this, with positive profit, is a trap.
pub const TRAP_LIQUIDITY_THRESHOLD: f64 = 0.5;

/// Derived, immutable liquidity picture of one ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub denomination: Denomination,
    pub periods: usize,
    pub total_revenue: f64,
    pub total_expenses: f64,
    pub total_cash: f64,
    pub total_receivables: f64,
    pub total_payables: f64,
    pub net_profit: f64,
    pub liquidity_ratio: f64,
    pub paper_profit_trap: bool,
    /// Average burn per period
    pub monthly_expenses: f64,
}

impl Diagnosis {
    /// Amount a liquidity bridge would need to cover under `policy`.
    pub fn funding_need(&self, policy: FundingPolicy) -> f64 {
        match policy {
            FundingPolicy::ProfitPlusBuffer { buffer } => self.net_profit.abs() + buffer,
            FundingPolicy::ReceivablesFraction { fraction } => self.total_receivables * fraction,
        }
    }
}

/// How the caller sizes the loan it asks the bridge for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FundingPolicy {
    /// |net profit| plus a fixed buffer
    ProfitPlusBuffer { buffer: f64 },
    /// A share of outstanding receivables
    ReceivablesFraction { fraction: f64 },
}

impl FundingPolicy {
    /// Build a policy from its config name and parameters.
    pub fn from_config(name: &str, buffer: f64, fraction: f64) -> Result<Self, LedgerError> {
        let policy = match FundingPolicyKind::from_str(name)? {
            FundingPolicyKind::ProfitPlusBuffer => Self::ProfitPlusBuffer { buffer },
            FundingPolicyKind::ReceivablesFraction => Self::ReceivablesFraction { fraction },
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Buffer must be finite and non-negative; fraction must lie in (0, 1].
    pub fn validate(&self) -> Result<(), LedgerError> {
        match *self {
            Self::ProfitPlusBuffer { buffer } if !buffer.is_finite() || buffer < 0.0 => Err(
                LedgerError::invalid("funding_policy", format!("buffer {} must be >= 0", buffer)),
            ),
            Self::ReceivablesFraction { fraction }
                if !fraction.is_finite() || fraction <= 0.0 || fraction > 1.0 =>
            {
                Err(LedgerError::invalid(
                    "funding_policy",
                    format!("fraction {} is outside (0, 1]", fraction),
                ))
            }
            _ => Ok(()),
        }
    }
}

enum FundingPolicyKind {
    ProfitPlusBuffer,
    ReceivablesFraction,
}

impl FromStr for FundingPolicyKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "profit_plus_buffer" => Ok(Self::ProfitPlusBuffer),
            "receivables_fraction" => Ok(Self::ReceivablesFraction),
            other => Err(LedgerError::invalid(
                "funding_policy",
                format!("unknown funding policy '{}'", other),
            )),
        }
    }
}

/// Computes [`Diagnosis`] values.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiquidityDiagnoser;

impl LiquidityDiagnoser {
    pub fn new() -> Self {
        Self
    }

    /// Diagnose a ledger.
    ///
    /// Missing cells count as zero in every sum. A required column that is
    /// absent altogether fails with [`LedgerError::MissingColumn`]. An empty
    /// ledger is not an error: all figures are zero and no trap is flagged.
    pub fn diagnose(&self, ledger: &Ledger) -> Result<Diagnosis, LedgerError> {
        for column in Column::REQUIRED {
            ledger.require(column)?;
        }

        let total_revenue = ledger.sum(Column::Revenue);
        let total_expenses = ledger.sum(Column::Expenses);
        let total_cash = ledger.sum(Column::Cash);
        let total_receivables = ledger.sum(Column::Receivables);
        let total_payables = ledger.sum(Column::Payables);

        let net_profit = total_revenue - total_expenses;
        let liquidity_ratio = total_cash / (total_expenses + LIQUIDITY_EPSILON);
        let paper_profit_trap = is_paper_profit_trap(net_profit, liquidity_ratio);
        let monthly_expenses = ledger.mean(Column::Expenses);

        if paper_profit_trap {
            tracing::warn!(
                net_profit,
                liquidity_ratio,
                denomination = %ledger.denomination(),
                "Paper-profit trap detected"
            );
        } else {
            tracing::debug!(net_profit, liquidity_ratio, "No paper-profit trap");
        }

        Ok(Diagnosis {
            denomination: ledger.denomination().clone(),
            periods: ledger.len(),
            total_revenue,
            total_expenses,
            total_cash,
            total_receivables,
            total_payables,
            net_profit,
            liquidity_ratio,
            paper_profit_trap,
            monthly_expenses,
        })
    }
}

/// Both conditions are strict; a loss-making ledger is never a paper-profit trap.
pub fn is_paper_profit_trap(net_profit: f64, liquidity_ratio: f64) -> bool {
    net_profit > 0.0 && liquidity_ratio < TRAP_LIQUIDITY_THRESHOLD
}

/// Diagnose with the default diagnoser.
pub fn diagnose(ledger: &Ledger) -> Result<Diagnosis, LedgerError> {
    LiquidityDiagnoser::new().diagnose(ledger)
}
