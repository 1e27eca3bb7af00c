//! Narrative collaborator boundary.
//!
//! The diagnosis is summarized into plain text and handed to an external
//! text-generation service. Whatever comes back is opaque display text; it is
//! never parsed for structure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::fmt::Write as _;
use std::time::Duration;

use lens_common::config::NarrativeConfig;

use crate::diagnosis::Diagnosis;
use crate::ledger::{Column, Denomination, Ledger};
use crate::reliability::ReliabilityScore;
use crate::runway::{Runway, StressProjection};

const SYSTEM_PROMPT: &str = "You are a pragmatic senior CFO. Using only the figures provided, \
give a short reality check of the liquidity position and concrete recommendations.";

/// Descriptive statistics of one ledger column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub column: Column,
    pub populated: usize,
    pub missing: usize,
    pub total: f64,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Sample standard deviation, absent below two values
    pub std_dev: Option<f64>,
}

impl ColumnSummary {
    fn of(ledger: &Ledger, column: Column) -> Self {
        let values: Vec<f64> = ledger.values(column).collect();
        let populated = values.len();
        let non_empty = |v: f64| if populated > 0 { Some(v) } else { None };

        Self {
            column,
            populated,
            missing: ledger.len() - populated,
            total: values.iter().sum(),
            mean: non_empty(Statistics::mean(&values)),
            min: non_empty(Statistics::min(&values)),
            max: non_empty(Statistics::max(&values)),
            std_dev: Some(Statistics::std_dev(&values)).filter(|_| populated > 1),
        }
    }
}

/// Everything the narrative service is told about one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeContext {
    pub denomination: Denomination,
    pub periods: usize,
    pub columns: Vec<ColumnSummary>,
    pub reliability: ReliabilityScore,
    pub diagnosis: Diagnosis,
    pub runway: Runway,
    pub stress: StressProjection,
}

impl NarrativeContext {
    pub fn new(
        ledger: &Ledger,
        reliability: &ReliabilityScore,
        diagnosis: &Diagnosis,
        runway: Runway,
        stress: &StressProjection,
    ) -> Self {
        Self {
            denomination: ledger.denomination().clone(),
            periods: ledger.len(),
            columns: ledger
                .columns()
                .iter()
                .map(|c| ColumnSummary::of(ledger, *c))
                .collect(),
            reliability: reliability.clone(),
            diagnosis: diagnosis.clone(),
            runway,
            stress: stress.clone(),
        }
    }

    /// Plain-text data context.
    pub fn render(&self) -> String {
        let d = &self.diagnosis;
        let mut out = String::new();

        let _ = writeln!(
            out,
            "Ledger: {} periods, denominated in {}",
            self.periods, self.denomination
        );
        let _ = writeln!(
            out,
            "Data reliability: {:.2}% ({}, {} of {} cells missing)",
            self.reliability.value,
            self.reliability.strategy,
            self.reliability.missing_cells,
            self.reliability.total_cells
        );
        for flag in &self.reliability.red_flags {
            let _ = writeln!(out, "  red flag: {:?}", flag);
        }

        let _ = writeln!(out, "Column summary:");
        for c in &self.columns {
            let _ = write!(out, "- {}: total {:.2}", c.column, c.total);
            if let (Some(mean), Some(min), Some(max)) = (c.mean, c.min, c.max) {
                let _ = write!(out, ", mean {:.2}, min {:.2}, max {:.2}", mean, min, max);
            }
            if let Some(sd) = c.std_dev {
                let _ = write!(out, ", std dev {:.2}", sd);
            }
            let _ = writeln!(out, ", missing {}", c.missing);
        }

        let _ = writeln!(out, "Diagnosis:");
        let _ = writeln!(out, "- net profit: {:.2}", d.net_profit);
        let _ = writeln!(out, "- liquidity ratio: {:.4}", d.liquidity_ratio);
        let _ = writeln!(
            out,
            "- paper-profit trap: {}",
            if d.paper_profit_trap { "yes" } else { "no" }
        );
        let _ = writeln!(out, "- monthly expenses: {:.2}", d.monthly_expenses);
        let _ = writeln!(out, "- receivables: {:.2}, payables: {:.2}", d.total_receivables, d.total_payables);
        let _ = writeln!(out, "- runway: {}", self.runway);

        let s = &self.stress;
        let _ = write!(
            out,
            "Stress test ({}% drop): cash {:.4} -> {:.4} (loss {:.4}), runway {}",
            s.drop_percent, s.asset_value, s.shocked_value, s.loss, s.runway
        );
        if let Some(native) = s.native_value {
            let _ = write!(out, ", native value {:.2}", native);
        }
        out.push('\n');

        out
    }
}

/// Failure reported by the narrative service.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NarrativeError {
    /// Provider message, passed through verbatim
    #[error("{message}")]
    Provider { status: u16, message: String },

    #[error("Narrative service unreachable: {0}")]
    Transport(String),

    #[error("Narrative client could not be built: {0}")]
    Client(String),

    #[error("Narrative service returned no text")]
    EmptyResponse,
}

/// External text generator.
#[async_trait]
pub trait Narrator: Send + Sync {
    async fn narrate(&self, context: &str) -> Result<String, NarrativeError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat-completions client.
pub struct ChatNarrator {
    endpoint: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl ChatNarrator {
    /// Build a narrator, or `None` when narration is disabled or unconfigured.
    ///
    /// A client that cannot be built with the configured timeout is an error;
    /// there is no fallback to an unbounded client.
    pub fn from_config(config: &NarrativeConfig) -> Result<Option<Self>, NarrativeError> {
        if !config.enabled {
            return Ok(None);
        }
        let Some(endpoint) = config.endpoint.clone().filter(|e| !e.is_empty()) else {
            return Ok(None);
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NarrativeError::Client(e.to_string()))?;

        Ok(Some(Self {
            endpoint,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            api_key: config.api_key.clone(),
            client,
        }))
    }
}

#[async_trait]
impl Narrator for ChatNarrator {
    async fn narrate(&self, context: &str) -> Result<String, NarrativeError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: format!("Analyze this financial data:\n{}", context),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NarrativeError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
                .unwrap_or(text);
            tracing::warn!(status = status.as_u16(), "Narrative provider returned an error");
            return Err(NarrativeError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| NarrativeError::Transport(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(NarrativeError::EmptyResponse)
    }
}
