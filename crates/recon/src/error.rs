use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::model::CarrierVariant;

/// Failure of a single carrier `lookup` call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// Carrier secrets are not configured. Raised before any network call.
    #[error("credentials not configured")]
    CredentialsMissing,
    /// Token acquisition or the tracking call was rejected (401/403).
    #[error("authentication failed: {0}")]
    AuthFailed(String),
    /// The call succeeded but the carrier has no record of the number.
    #[error("not found: {0}")]
    NotFound(String),
    /// Timeout, network failure, 429 or 5xx. Eligible for a bounded retry.
    #[error("transient failure: {message}")]
    Transient {
        message: String,
        retry_after: Option<Duration>,
    },
    /// Response body could not be parsed.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl LookupError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient { message: message.into(), retry_after: None }
    }
}

/// Error class, counted per run in `RunTotals::error_classes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Carrier credentials missing. Scoped to that carrier's shipments.
    Configuration,
    /// Carrier label not recognized. Scoped to one shipment.
    Classification,
    /// Auth failure, not found, or retries exhausted. Scoped to one shipment.
    TerminalLookup,
}

/// Per-shipment error recorded in a decision. Never aborts a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShipmentError {
    #[error("{carrier} credentials not configured")]
    Configuration { carrier: CarrierVariant },

    #[error("Unknown carrier '{label}'")]
    Classification { label: String },

    #[error("{carrier} authentication failed: {message}")]
    AuthFailed { carrier: CarrierVariant, message: String },

    #[error("{carrier} has no record: {message}")]
    NotFound { carrier: CarrierVariant, message: String },

    #[error("{carrier} lookup failed after {attempts} attempts: {message}")]
    RetryExhausted {
        carrier: CarrierVariant,
        attempts: u32,
        message: String,
    },
}

impl ShipmentError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Configuration { .. } => ErrorClass::Configuration,
            Self::Classification { .. } => ErrorClass::Classification,
            Self::AuthFailed { .. } | Self::NotFound { .. } | Self::RetryExhausted { .. } => {
                ErrorClass::TerminalLookup
            }
        }
    }

    /// Map a terminal lookup error to its per-shipment form.
    ///
    /// `Transient` and `Malformed` only reach here once the retry budget is
    /// spent, so both become `RetryExhausted`.
    pub fn from_lookup(carrier: CarrierVariant, err: LookupError, attempts: u32) -> Self {
        match err {
            LookupError::CredentialsMissing => Self::Configuration { carrier },
            LookupError::AuthFailed(message) => Self::AuthFailed { carrier, message },
            LookupError::NotFound(message) => Self::NotFound { carrier, message },
            LookupError::Transient { message, .. } | LookupError::Malformed(message) => {
                Self::RetryExhausted { carrier, attempts, message }
            }
        }
    }
}
