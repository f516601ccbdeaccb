//! Error definitions for the relay system.
//!
//! Two layers live here:
//!
//! - [`RelayError`]: infrastructure errors (config, transport, parsing) raised
//!   inside plugins and at the binary edge. Implements `std::error::Error` via
//!   `thiserror`, so it travels through `anyhow::Result` chains.
//! - [`DomainError`]: the structured error carried by a failed
//!   [`Outcome`](crate::outcome::Outcome). This is what callers inspect.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Infrastructure errors raised by plugins, config loading and transports.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),

    /// Transport-level failure (connect, DNS, reset). Reported to callers
    /// with the `Network` category.
    #[error("network error: {0}")]
    Network(String),

    /// The plugin gave up waiting on its backend. Reported with the `System`
    /// category.
    #[error("timed out: {0}")]
    Timeout(String),

    /// HTTP request completed with an unexpected status.
    #[error("http error: {status} {body}")]
    Http { status: u16, body: String },

    /// Message-broker publish/poll error.
    #[error("broker error: {0}")]
    Broker(String),

    /// Time-series store insert/query error.
    #[error("store error: {0}")]
    Store(String),

    /// Raw payload parsing error.
    #[error("parse error: {0}")]
    Parse(String),
}

// ---------------------------------------------------------------------------
// Stable error codes
// ---------------------------------------------------------------------------

/// Machine-matchable error codes. `<OPERATION>_FAILED` codes are derived at
/// runtime from the operation name, see [`failed_code`].
pub mod codes {
    pub const NO_CLIENT: &str = "NO_CLIENT";
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
    pub const NO_VALID_DATA: &str = "NO_VALID_DATA";
    pub const READER_NOT_INITIALIZED: &str = "READER_NOT_INITIALIZED";
    pub const WRITER_NOT_INITIALIZED: &str = "WRITER_NOT_INITIALIZED";
    pub const UNSUPPORTED_OPERATION: &str = "UNSUPPORTED_OPERATION";
    pub const INITIALIZATION_FAILED: &str = "INITIALIZATION_FAILED";
    pub const CLEANUP_FAILED: &str = "CLEANUP_FAILED";
}

/// Build the `<OPERATION>_FAILED` code for an operation name such as
/// `"get_current_price"` → `"GET_CURRENT_PRICE_FAILED"`.
pub fn failed_code(operation: &str) -> String {
    format!("{}_FAILED", operation.to_uppercase().replace(['-', ' ', '.'], "_"))
}

// ---------------------------------------------------------------------------
// DomainError
// ---------------------------------------------------------------------------

/// Whether a failure is the caller's problem or the system's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ErrorCategory {
    /// Bad input, missing client, unsupported operation. Retrying won't help.
    Business,
    /// A plugin or transform failed.
    System,
    /// The backend could not be reached.
    Network,
}

impl ErrorCategory {
    /// `System` and `Network` failures may succeed on retry.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::System | Self::Network)
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Business => write!(f, "BUSINESS"),
            Self::System => write!(f, "SYSTEM"),
            Self::Network => write!(f, "NETWORK"),
        }
    }
}

/// Structured error returned inside [`Outcome::Failure`](crate::outcome::Outcome).
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("[{category}] {code}: {message}")]
pub struct DomainError {
    pub code: String,
    pub message: String,
    pub category: ErrorCategory,
    #[serde(default)]
    pub context: BTreeMap<String, serde_json::Value>,
}

impl DomainError {
    pub fn new(code: impl Into<String>, message: impl Into<String>, category: ErrorCategory) -> Self {
        Self { code: code.into(), message: message.into(), category, context: BTreeMap::new() }
    }

    pub fn business(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, message, ErrorCategory::Business)
    }

    pub fn system(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, message, ErrorCategory::System)
    }

    /// Attach a context entry. Values that fail to serialize are stored as `null`.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
        self.context.insert(key.into(), value);
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.category.is_retryable()
    }

    /// Operation attempted before `initialize()` succeeded (or after `cleanup()`).
    pub fn not_initialized(code: &str, actor: &str, operation: &str) -> Self {
        Self::business(code, format!("actor '{actor}' is not initialized"))
            .with_context("actor", actor)
            .with_context("operation", operation)
    }

    /// The actor does not implement this DSL operation.
    pub fn unsupported(actor: &str, operation: &str) -> Self {
        Self::business(codes::UNSUPPORTED_OPERATION, format!("actor '{actor}' does not support {operation}"))
            .with_context("actor", actor)
            .with_context("operation", operation)
    }
}

/// Pick the category for an error raised by a plugin or transform.
///
/// Any [`RelayError::Network`] in the chain means the backend was
/// unreachable; everything else is a system failure.
pub fn categorize(err: &anyhow::Error) -> ErrorCategory {
    let network = err
        .chain()
        .any(|cause| matches!(cause.downcast_ref::<RelayError>(), Some(RelayError::Network(_))));
    if network { ErrorCategory::Network } else { ErrorCategory::System }
}
