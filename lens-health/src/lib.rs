//! lens-health - Ledger reliability, liquidity diagnosis and runway simulation.
//!
//! A ledger of per-period figures is scored for trustworthiness, checked for
//! the paper-profit trap (profitable on paper, short of cash), projected
//! forward as runway and stress-tested against a price shock. A simulated
//! liquidity bridge can size and offer a short-term loan when the trap fires.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod bridge;
pub mod diagnosis;
pub mod error;
pub mod ledger;
pub mod narrative;
pub mod reliability;
pub mod report;
pub mod routes;
pub mod runway;
mod util;

pub use bridge::{
    ApprovalGate, ApprovalOutcome, FixedRate, LiquidityBridge, LoanOffer, OfferStatus, RandomRate,
    RateRange, RateSource,
};
pub use diagnosis::{diagnose, Diagnosis, FundingPolicy, LiquidityDiagnoser};
pub use error::{BridgeError, HealthError, LedgerError};
pub use ledger::{valuate, Column, Denomination, Ledger, PeriodRecord};
pub use narrative::{ChatNarrator, NarrativeContext, NarrativeError, Narrator};
pub use reliability::{score, ReliabilityScore, ReliabilityStrategy, StrategyKind};
pub use report::{DiagnosisReport, ExamineOptions, HealthDoctor};
pub use routes::{build_router, AppState};
pub use runway::{runway, stress_test, Runway, RunwayUnit, StressProjection};
