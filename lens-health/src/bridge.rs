//! Liquidity bridge simulator.
//!
//! Synthesizes a short-term loan offer when the paper-profit trap fires. The
//! interest rate is a random draw from a bounded range, not a quote. The
//! random source is injected so tests and reproducible deployments can pin it.
//!
//! Offers are never persisted and nothing is ever executed. The approval gate
//! is a plain string comparison against one literal token; it is a placeholder
//! for a real authorization flow and provides no security.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::diagnosis::Diagnosis;
use crate::error::BridgeError;
use crate::util::round_to;

/// Decimal places of the repayment figure.
pub const REPAYMENT_DECIMALS: u32 = 4;

/// Inclusive bounds of the simulated interest rate, as fractions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateRange {
    min: f64,
    max: f64,
}

impl RateRange {
    pub fn new(min: f64, max: f64) -> Result<Self, BridgeError> {
        if !(min.is_finite() && max.is_finite()) || min < 0.0 || min > max {
            return Err(BridgeError::InvalidRateRange { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn contains(&self, rate: f64) -> bool {
        (self.min..=self.max).contains(&rate)
    }
}

impl Default for RateRange {
    /// 1% to 5%.
    fn default() -> Self {
        Self {
            min: 0.01,
            max: 0.05,
        }
    }
}

/// Source of simulated interest rates.
pub trait RateSource {
    /// Draw a rate within `range`.
    fn draw(&mut self, range: &RateRange) -> f64;
}

/// Uniform draws from any `rand` generator.
#[derive(Debug, Clone)]
pub struct RandomRate<R: Rng>(pub R);

impl RandomRate<StdRng> {
    /// Reproducible generator.
    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }

    /// Generator seeded from the operating system.
    pub fn from_entropy() -> Self {
        Self(StdRng::from_entropy())
    }
}

impl<R: Rng> RateSource for RandomRate<R> {
    fn draw(&mut self, range: &RateRange) -> f64 {
        if range.min == range.max {
            return range.min;
        }
        self.0.gen_range(range.min..=range.max)
    }
}

/// Always the same rate, clamped into the range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedRate(pub f64);

impl RateSource for FixedRate {
    fn draw(&mut self, range: &RateRange) -> f64 {
        self.0.clamp(range.min, range.max)
    }
}

/// Lifecycle marker of an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    /// Shown to the operator only; no funds move
    Simulated,
}

/// Ephemeral loan offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanOffer {
    pub offer_id: String,
    pub amount: f64,
    pub interest_rate: f64,
    /// `amount × (1 + interest_rate)`, 4 decimals
    pub repayment: f64,
    pub status: OfferStatus,
    pub issued_at: DateTime<Utc>,
}

/// Loan offer generator.
pub struct LiquidityBridge<S: RateSource> {
    range: RateRange,
    source: S,
}

impl<S: RateSource> LiquidityBridge<S> {
    pub fn new(range: RateRange, source: S) -> Self {
        Self { range, source }
    }

    pub fn range(&self) -> &RateRange {
        &self.range
    }

    /// Offer a loan of `amount_needed`.
    ///
    /// The amount is computed by the caller; it must be finite and positive.
    pub fn offer_loan(&mut self, amount_needed: f64) -> Result<LoanOffer, BridgeError> {
        if !amount_needed.is_finite() || amount_needed <= 0.0 {
            return Err(BridgeError::InvalidAmount {
                amount: amount_needed,
            });
        }

        let interest_rate = self.source.draw(&self.range);
        let repayment = round_to(amount_needed * (1.0 + interest_rate), REPAYMENT_DECIMALS);

        let offer = LoanOffer {
            offer_id: uuid::Uuid::new_v4().to_string(),
            amount: amount_needed,
            interest_rate,
            repayment,
            status: OfferStatus::Simulated,
            issued_at: Utc::now(),
        };

        tracing::info!(
            offer_id = %offer.offer_id,
            amount = offer.amount,
            interest_rate = offer.interest_rate,
            repayment = offer.repayment,
            "Simulated liquidity bridge offered"
        );

        Ok(offer)
    }

    /// Offer a loan only when `diagnosis` flags the paper-profit trap.
    pub fn offer_for(
        &mut self,
        diagnosis: &Diagnosis,
        amount_needed: f64,
    ) -> Result<LoanOffer, BridgeError> {
        if !diagnosis.paper_profit_trap {
            return Err(BridgeError::NotEligible);
        }
        self.offer_loan(amount_needed)
    }
}

/// Result of presenting a token to the approval gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalOutcome {
    /// Token matched; execution is simulated, nothing changes
    Executed,
    PendingAuthorization,
}

/// Stateless literal-token gate.
#[derive(Clone)]
pub struct ApprovalGate {
    token: String,
}

impl ApprovalGate {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Exact, case-sensitive comparison. No trimming.
    pub fn evaluate(&self, input: &str) -> ApprovalOutcome {
        let outcome = if input == self.token {
            ApprovalOutcome::Executed
        } else {
            ApprovalOutcome::PendingAuthorization
        };
        tracing::info!(outcome = ?outcome, "Bridge approval evaluated");
        outcome
    }
}

impl std::fmt::Debug for ApprovalGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalGate").field("token", &"<redacted>").finish()
    }
}
