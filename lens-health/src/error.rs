//! Error types for lens-health.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Errors raised while reading or diagnosing a ledger.
///
/// Data-quality problems inside a well-formed table never surface here; they
/// lower the reliability score instead.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("Missing required column: {column}")]
    MissingColumn { column: String },

    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Ledger is empty: no header row")]
    EmptyLedger,

    #[error("Mixed units in one ledger: {first} and {second}")]
    MixedUnits { first: String, second: String },

    #[error("Malformed CSV: {reason}")]
    Malformed { reason: String },
}

impl LedgerError {
    pub(crate) fn invalid(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by the liquidity bridge simulator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BridgeError {
    #[error("Invalid loan amount: {amount}")]
    InvalidAmount { amount: f64 },

    #[error("Invalid rate range: [{min}, {max}]")]
    InvalidRateRange { min: f64, max: f64 },

    #[error("No paper-profit trap detected; liquidity bridge not offered")]
    NotEligible,
}

/// Service-level error returned by HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// Request body that could not be extracted (bad JSON, wrong types,
    /// missing content type)
    #[error("{}", .0.body_text())]
    InvalidBody(#[from] JsonRejection),
}

/// API error body.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl HealthError {
    /// Status and machine-readable code for this error.
    pub fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Ledger(LedgerError::MissingColumn { .. }) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "MISSING_COLUMN")
            }
            Self::Ledger(LedgerError::InvalidParameter { .. }) => {
                (StatusCode::BAD_REQUEST, "INVALID_PARAMETER")
            }
            Self::Ledger(LedgerError::EmptyLedger) => (StatusCode::BAD_REQUEST, "EMPTY_LEDGER"),
            Self::Ledger(LedgerError::MixedUnits { .. }) => (StatusCode::BAD_REQUEST, "MIXED_UNITS"),
            Self::Ledger(LedgerError::Malformed { .. }) => (StatusCode::BAD_REQUEST, "MALFORMED_CSV"),
            Self::Bridge(BridgeError::NotEligible) => (StatusCode::CONFLICT, "NOT_ELIGIBLE"),
            Self::Bridge(_) => (StatusCode::BAD_REQUEST, "INVALID_PARAMETER"),
            Self::InvalidBody(rejection) => (rejection.status(), "INVALID_REQUEST"),
        }
    }
}

impl IntoResponse for HealthError {
    fn into_response(self) -> Response {
        let (status, code) = self.classify();

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, code, "Request rejected");
        }

        let body = serde_json::json!({
            "success": false,
            "error": ApiError {
                code: code.to_string(),
                message: self.to_string(),
            }
        });

        (status, axum::Json(body)).into_response()
    }
}
