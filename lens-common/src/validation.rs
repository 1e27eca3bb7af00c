//! Configuration validation for Lens services.
//!
//! Checks that configured values are present and within valid ranges before
//! the service starts serving requests.

use thiserror::Error;

use crate::config::{BridgeConfig, Config, DiagnosisConfig, NarrativeConfig, ServerConfig};

/// Reliability strategies the diagnosis config may name.
pub const RELIABILITY_STRATEGIES: &[&str] = &["completeness", "red_flags"];

/// Runway units the diagnosis config may name.
pub const RUNWAY_UNITS: &[&str] = &["months", "days"];

/// Funding policies the bridge config may name.
pub const FUNDING_POLICIES: &[&str] = &["profit_plus_buffer", "receivables_fraction"];

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let sections: [&dyn Validate; 4] = [
            &self.server,
            &self.diagnosis,
            &self.bridge,
            &self.narrative,
        ];

        let mut errors: Vec<ValidationError> = sections
            .iter()
            .filter_map(|section| section.validate().err())
            .collect();

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }

    /// Load and validate configuration.
    pub fn load_and_validate() -> anyhow::Result<Self> {
        let config = Self::load()?;
        config.validate().map_err(|e| anyhow::anyhow!("{}", e))?;
        Ok(config)
    }
}

fn one_of(field: &str, value: &str, allowed: &[&str]) -> ValidationResult<()> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidValue {
            field: field.into(),
            reason: format!("'{}' is not one of {:?}", value, allowed),
        })
    }
}

impl Validate for ServerConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.host.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "server.host".into(),
            });
        }
        if self.port == 0 {
            return Err(ValidationError::InvalidValue {
                field: "server.port".into(),
                reason: "must be between 1 and 65535".into(),
            });
        }
        Ok(())
    }
}

impl Validate for DiagnosisConfig {
    fn validate(&self) -> ValidationResult<()> {
        one_of(
            "diagnosis.reliability_strategy",
            &self.reliability_strategy,
            RELIABILITY_STRATEGIES,
        )?;
        one_of("diagnosis.runway_unit", &self.runway_unit, RUNWAY_UNITS)?;
        if self.default_drop_percent > 100 {
            return Err(ValidationError::InvalidValue {
                field: "diagnosis.default_drop_percent".into(),
                reason: "must be between 0 and 100".into(),
            });
        }
        Ok(())
    }
}

impl Validate for BridgeConfig {
    fn validate(&self) -> ValidationResult<()> {
        for (field, rate) in [("bridge.rate_min", self.rate_min), ("bridge.rate_max", self.rate_max)] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(ValidationError::InvalidValue {
                    field: field.into(),
                    reason: format!("{} is outside [0, 1]", rate),
                });
            }
        }
        if self.rate_min > self.rate_max {
            return Err(ValidationError::InvalidValue {
                field: "bridge.rate_min".into(),
                reason: "must not exceed bridge.rate_max".into(),
            });
        }
        if self.approval_token.is_empty() {
            return Err(ValidationError::MissingField {
                field: "bridge.approval_token".into(),
            });
        }
        if !self.buffer.is_finite() || self.buffer < 0.0 {
            return Err(ValidationError::InvalidValue {
                field: "bridge.buffer".into(),
                reason: "must be a non-negative number".into(),
            });
        }
        one_of("bridge.funding_policy", &self.funding_policy, FUNDING_POLICIES)?;
        if !(self.receivables_fraction > 0.0 && self.receivables_fraction <= 1.0) {
            return Err(ValidationError::InvalidValue {
                field: "bridge.receivables_fraction".into(),
                reason: "must be within (0, 1]".into(),
            });
        }
        Ok(())
    }
}

impl Validate for NarrativeConfig {
    fn validate(&self) -> ValidationResult<()> {
        if !self.enabled {
            return Ok(());
        }
        match self.endpoint.as_deref() {
            None | Some("") => Err(ValidationError::MissingField {
                field: "narrative.endpoint".into(),
            }),
            Some(_) if self.max_tokens == 0 => Err(ValidationError::InvalidValue {
                field: "narrative.max_tokens".into(),
                reason: "must be greater than 0".into(),
            }),
            Some(_) => Ok(()),
        }
    }
}
