//! Full diagnosis pipeline.
//!
//! ```text
//! ledger ─┬─> reliability score
//!         └─> diagnosis ──> runway, stress projection ──> funding need (trap only)
//! ```
//!
//! Every report is computed fresh from its ledger; nothing is cached.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::diagnosis::{Diagnosis, FundingPolicy, LiquidityDiagnoser};
use crate::error::LedgerError;
use crate::ledger::Ledger;
use crate::narrative::{NarrativeContext, Narrator};
use crate::reliability::{ReliabilityScore, StrategyKind};
use crate::runway::{runway, Runway, RunwayUnit, StressProjection};

/// Caller-chosen parameters of one examination.
#[derive(Debug, Clone, PartialEq)]
pub struct ExamineOptions {
    pub strategy: StrategyKind,
    pub drop_percent: f64,
    pub runway_unit: RunwayUnit,
    pub funding_policy: FundingPolicy,
    /// Native price of one ledger unit, for asset-denominated ledgers
    pub price: Option<f64>,
}

impl Default for ExamineOptions {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Completeness,
            drop_percent: 30.0,
            runway_unit: RunwayUnit::Months,
            funding_policy: FundingPolicy::ProfitPlusBuffer { buffer: 0.0 },
            price: None,
        }
    }
}

/// Result of examining one ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisReport {
    pub report_id: String,
    pub generated_at: DateTime<Utc>,
    pub reliability: ReliabilityScore,
    pub diagnosis: Diagnosis,
    pub runway: Runway,
    pub stress: StressProjection,
    /// Amount a liquidity bridge would cover; only when the trap fires
    pub funding_need: Option<f64>,
    pub narrative: Option<String>,
    pub narrative_error: Option<String>,
    #[serde(skip)]
    context: Option<NarrativeContext>,
}

impl DiagnosisReport {
    /// Data context for the narrative service.
    pub fn narrative_context(&self) -> Option<&NarrativeContext> {
        self.context.as_ref()
    }

    /// Ask `narrator` for display text. Provider failures are recorded
    /// verbatim and never fail the report.
    pub async fn attach_narrative(&mut self, narrator: &dyn Narrator) {
        let Some(context) = self.context.as_ref() else {
            return;
        };
        match narrator.narrate(&context.render()).await {
            Ok(text) => self.narrative = Some(text),
            Err(e) => {
                tracing::warn!(report_id = %self.report_id, error = %e, "Narrative generation failed");
                self.narrative_error = Some(e.to_string());
            }
        }
    }
}

/// Runs the scorer, diagnoser and simulators over a ledger.
#[derive(Debug, Clone, Default)]
pub struct HealthDoctor {
    diagnoser: LiquidityDiagnoser,
}

impl HealthDoctor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn examine(
        &self,
        ledger: &Ledger,
        options: &ExamineOptions,
    ) -> Result<DiagnosisReport, LedgerError> {
        let reliability = options.strategy.strategy().score(ledger);
        let diagnosis = self.diagnoser.diagnose(ledger)?;

        let runway = runway(
            diagnosis.total_cash,
            diagnosis.monthly_expenses,
            options.runway_unit,
        );
        let mut stress =
            StressProjection::project(&diagnosis, options.drop_percent, options.runway_unit)?;
        if let Some(price) = options.price {
            stress = stress.with_price(price)?;
        }

        let funding_need = diagnosis
            .paper_profit_trap
            .then(|| diagnosis.funding_need(options.funding_policy));

        let context = NarrativeContext::new(ledger, &reliability, &diagnosis, runway, &stress);
        let report_id = uuid::Uuid::new_v4().to_string();

        tracing::info!(
            report_id = %report_id,
            periods = diagnosis.periods,
            reliability = reliability.value,
            trap = diagnosis.paper_profit_trap,
            runway = %runway,
            "Ledger examined"
        );

        Ok(DiagnosisReport {
            report_id,
            generated_at: Utc::now(),
            reliability,
            diagnosis,
            runway,
            stress,
            funding_need,
            narrative: None,
            narrative_error: None,
            context: Some(context),
        })
    }
}
