//! Lens Common - Shared configuration, validation and logging for Liquidity Lens.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Configuration validation
//! - Logging setup

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod logging;
pub mod validation;

pub use config::{
    BridgeConfig, Config, DiagnosisConfig, NarrativeConfig, ObservabilityConfig, ServerConfig,
};
pub use validation::{Validate, ValidationError, ValidationResult};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::config::{BridgeConfig, Config, DiagnosisConfig, NarrativeConfig};
    pub use crate::logging::init_logging;
    pub use crate::validation::{Validate, ValidationError};
}
