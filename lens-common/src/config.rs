//! Configuration management for Liquidity Lens.
//!
//! The service reads a single JSON file at `~/.liquidity-lens/config.json`.
//! Every field has a default, so a missing file yields a working setup.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (LENS_* prefix)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `LENS_HOST` → server.host
//! - `LENS_PORT` → server.port
//! - `LENS_LOG_LEVEL` → observability.log_level
//! - `LENS_LOG_FORMAT` → observability.log_format
//! - `LENS_APPROVAL_TOKEN` → bridge.approval_token
//! - `LENS_NARRATIVE_API_KEY` → narrative.api_key

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Literal token accepted by the bridge approval gate when none is configured.
pub const DEFAULT_APPROVAL_TOKEN: &str = "APPROVE-BRIDGE";

/// Stand-in printed for secrets in `Debug` output.
const REDACTED: &str = "<redacted>";

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".liquidity-lens"),
        |dirs| dirs.home_dir().join(".liquidity-lens"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Server
// ============================================================================

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address. Default "127.0.0.1" (local only)
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    4480
}

// ============================================================================
// Observability
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Diagnosis
// ============================================================================

/// Defaults applied to diagnosis requests that leave a parameter unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisConfig {
    /// Reliability strategy: "completeness" or "red_flags"
    #[serde(default = "default_reliability_strategy")]
    pub reliability_strategy: String,

    /// Runway unit: "months" or "days"
    #[serde(default = "default_runway_unit")]
    pub runway_unit: String,

    /// Stress-test price drop used when a request omits one (0-100)
    #[serde(default = "default_drop_percent")]
    pub default_drop_percent: u8,
}

impl Default for DiagnosisConfig {
    fn default() -> Self {
        Self {
            reliability_strategy: default_reliability_strategy(),
            runway_unit: default_runway_unit(),
            default_drop_percent: default_drop_percent(),
        }
    }
}

fn default_reliability_strategy() -> String {
    "completeness".into()
}

fn default_runway_unit() -> String {
    "months".into()
}

fn default_drop_percent() -> u8 {
    30
}

// ============================================================================
// Liquidity Bridge
// ============================================================================

/// Simulated loan offer configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Lower bound of the simulated interest rate (fraction, 0.01 = 1%)
    #[serde(default = "default_rate_min")]
    pub rate_min: f64,

    /// Upper bound of the simulated interest rate
    #[serde(default = "default_rate_max")]
    pub rate_max: f64,

    /// Literal token that unlocks simulated execution
    #[serde(default = "default_approval_token")]
    pub approval_token: String,

    /// Fixed seed for the rate generator. Each request gets a fresh
    /// generator seeded with this value, so offers are reproducible.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Buffer added to net profit by the "profit_plus_buffer" policy
    #[serde(default)]
    pub buffer: f64,

    /// Funding policy: "profit_plus_buffer" or "receivables_fraction"
    #[serde(default = "default_funding_policy")]
    pub funding_policy: String,

    /// Share of receivables requested by the "receivables_fraction" policy
    #[serde(default = "default_receivables_fraction")]
    pub receivables_fraction: f64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            rate_min: default_rate_min(),
            rate_max: default_rate_max(),
            approval_token: default_approval_token(),
            seed: None,
            buffer: 0.0,
            funding_policy: default_funding_policy(),
            receivables_fraction: default_receivables_fraction(),
        }
    }
}

impl fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("rate_min", &self.rate_min)
            .field("rate_max", &self.rate_max)
            .field("approval_token", &REDACTED)
            .field("seed", &self.seed)
            .field("buffer", &self.buffer)
            .field("funding_policy", &self.funding_policy)
            .field("receivables_fraction", &self.receivables_fraction)
            .finish()
    }
}

fn default_rate_min() -> f64 {
    0.01
}

fn default_rate_max() -> f64 {
    0.05
}

fn default_approval_token() -> String {
    DEFAULT_APPROVAL_TOKEN.into()
}

fn default_funding_policy() -> String {
    "profit_plus_buffer".into()
}

fn default_receivables_fraction() -> f64 {
    0.5
}

// ============================================================================
// Narrative collaborator
// ============================================================================

/// External text-generation service used for the narrative section.
#[derive(Clone, Serialize, Deserialize)]
pub struct NarrativeConfig {
    /// Whether narrative generation is available at all
    #[serde(default)]
    pub enabled: bool,

    /// OpenAI-compatible chat completions URL
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Model identifier passed through to the provider
    #[serde(default = "default_narrative_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Bearer token. Prefer `LENS_NARRATIVE_API_KEY` over the file.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            model: default_narrative_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl fmt::Debug for NarrativeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NarrativeConfig")
            .field("enabled", &self.enabled)
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_key", &self.api_key.as_ref().map(|_| REDACTED))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn default_narrative_model() -> String {
    "llama-3.3-70b-versatile".into()
}

fn default_temperature() -> f64 {
    0.1
}

fn default_max_tokens() -> u32 {
    700
}

fn default_timeout_secs() -> u64 {
    30
}

// ============================================================================
// Root
// ============================================================================

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub diagnosis: DiagnosisConfig,

    #[serde(default)]
    pub bridge: BridgeConfig,

    #[serde(default)]
    pub narrative: NarrativeConfig,
}

impl Config {
    /// Load configuration from the default path, falling back to defaults
    /// when the file does not exist. Environment overrides are applied.
    pub fn load() -> Result<Self> {
        let path = config_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            tracing::info!("Config file not found, using defaults");
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Apply LENS_* environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("LENS_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("LENS_PORT") {
            match port.parse() {
                Ok(p) => self.server.port = p,
                Err(_) => tracing::warn!(value = %port, "Ignoring unparsable LENS_PORT"),
            }
        }
        if let Some(level) = lookup("LENS_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("LENS_LOG_FORMAT") {
            self.observability.log_format = format;
        }
        if let Some(token) = lookup("LENS_APPROVAL_TOKEN") {
            self.bridge.approval_token = token;
        }
        if let Some(key) = lookup("LENS_NARRATIVE_API_KEY") {
            self.narrative.api_key = Some(key);
        }
    }

    /// Address the HTTP server binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 4480);
        assert_eq!(config.diagnosis.reliability_strategy, "completeness");
        assert_eq!(config.diagnosis.default_drop_percent, 30);
        assert_eq!(config.bridge.approval_token, DEFAULT_APPROVAL_TOKEN);
        assert!((config.bridge.rate_min - 0.01).abs() < f64::EPSILON);
        assert!((config.bridge.rate_max - 0.05).abs() < f64::EPSILON);
        assert!(!config.narrative.enabled);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "server": {{ "port": 9000 }}, "bridge": {{ "seed": 7 }} }}"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.bridge.seed, Some(7));
        assert_eq!(config.diagnosis.runway_unit, "months");
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(Config::load_from(file.path()).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("LENS_PORT", "5050"),
            ("LENS_APPROVAL_TOKEN", "let-me-in"),
            ("LENS_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.port, 5050);
        assert_eq!(config.bridge.approval_token, "let-me-in");
        assert_eq!(config.observability.log_format, "json");
        assert_eq!(config.bind_address(), "127.0.0.1:5050");
    }

    #[test]
    fn test_bad_port_override_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|key| (key == "LENS_PORT").then(|| "not-a-port".to_string()));
        assert_eq!(config.server.port, 4480);
    }

    #[test]
    fn test_api_key_not_serialized() {
        let mut config = Config::default();
        config.narrative.api_key = Some("secret".into());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }

    #[test]
    fn test_secrets_redacted_from_debug() {
        let mut config = Config::default();
        config.bridge.approval_token = "open-sesame".into();
        config.narrative.api_key = Some("sk-live-123".into());

        let debug = format!("{:?}", config);
        assert!(!debug.contains("open-sesame"));
        assert!(!debug.contains("sk-live-123"));
        assert!(debug.contains("<redacted>"));
        assert!(debug.contains("rate_max"));

        config.narrative.api_key = None;
        assert!(format!("{:?}", config.narrative).contains("api_key: None"));
    }
}
