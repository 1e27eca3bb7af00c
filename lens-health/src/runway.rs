//! Runway and price-shock stress simulation.
//!
//! Burn is always supplied as a per-month figure. The caller picks the unit
//! runway is reported in; days use a flat 30-day month.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::diagnosis::Diagnosis;
use crate::error::LedgerError;
use crate::ledger::valuate;

/// Days in a month for the monthly → daily burn conversion.
pub const DAYS_PER_MONTH: f64 = 30.0;

/// Unit runway is reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunwayUnit {
    #[default]
    Months,
    Days,
}

impl FromStr for RunwayUnit {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "months" => Ok(Self::Months),
            "days" => Ok(Self::Days),
            other => Err(LedgerError::invalid(
                "runway_unit",
                format!("unknown runway unit '{}'", other),
            )),
        }
    }
}

impl std::fmt::Display for RunwayUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Months => write!(f, "months"),
            Self::Days => write!(f, "days"),
        }
    }
}

/// How long cash lasts at the current burn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Runway {
    Finite { value: f64, unit: RunwayUnit },
    /// No burn: cash is never depleted
    Unbounded { unit: RunwayUnit },
}

impl Runway {
    /// Numeric value, `f64::INFINITY` for an unbounded runway.
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Finite { value, .. } => *value,
            Self::Unbounded { .. } => f64::INFINITY,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, Self::Unbounded { .. })
    }

    pub fn unit(&self) -> RunwayUnit {
        match self {
            Self::Finite { unit, .. } | Self::Unbounded { unit } => *unit,
        }
    }
}

impl std::fmt::Display for Runway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Finite { value, unit } => write!(f, "{:.1} {}", value, unit),
            Self::Unbounded { .. } => write!(f, "unbounded"),
        }
    }
}

/// Runway of `cash` at `monthly_expenses` burn per month.
///
/// Zero burn yields [`Runway::Unbounded`]. Negative or NaN burn, which means
/// the ledger is not burning cash at all, is treated the same way.
pub fn runway(cash: f64, monthly_expenses: f64, unit: RunwayUnit) -> Runway {
    if monthly_expenses.is_nan() || monthly_expenses <= 0.0 {
        return Runway::Unbounded { unit };
    }
    let value = match unit {
        RunwayUnit::Months => cash / monthly_expenses,
        RunwayUnit::Days => cash / (monthly_expenses / DAYS_PER_MONTH),
    };
    Runway::Finite { value, unit }
}

/// Value of an asset position after a `drop_percent` price fall.
///
/// `drop_percent` must lie in [0, 100]; anything else, NaN included, is
/// rejected instead of clamped.
pub fn stress_test(asset_value: f64, drop_percent: f64) -> Result<f64, LedgerError> {
    if !(0.0..=100.0).contains(&drop_percent) {
        tracing::warn!(drop_percent, "Rejected out-of-range stress drop");
        return Err(LedgerError::invalid(
            "drop_percent",
            format!("{} is outside [0, 100]", drop_percent),
        ));
    }
    Ok(asset_value * (1.0 - drop_percent / 100.0))
}

/// Cash position and runway under a price shock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressProjection {
    /// Cash figure before the shock
    pub asset_value: f64,
    pub drop_percent: f64,
    pub shocked_value: f64,
    pub loss: f64,
    /// Runway the shocked cash buys at the current burn
    pub runway: Runway,
    /// Shocked value converted at a caller-supplied price
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native_value: Option<f64>,
}

impl StressProjection {
    /// Shock a diagnosis's cash total by `drop_percent`.
    pub fn project(
        diagnosis: &Diagnosis,
        drop_percent: f64,
        unit: RunwayUnit,
    ) -> Result<Self, LedgerError> {
        let asset_value = diagnosis.total_cash;
        let shocked_value = stress_test(asset_value, drop_percent)?;
        let runway = runway(shocked_value, diagnosis.monthly_expenses, unit);

        tracing::debug!(asset_value, drop_percent, shocked_value, %runway, "Stress projection");

        Ok(Self {
            asset_value,
            drop_percent,
            shocked_value,
            loss: asset_value - shocked_value,
            runway,
            native_value: None,
        })
    }

    /// Attach the native-currency value of the shocked position.
    pub fn with_price(mut self, price: f64) -> Result<Self, LedgerError> {
        self.native_value = Some(valuate(self.shocked_value, price)?);
        Ok(self)
    }
}
