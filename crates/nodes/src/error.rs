//! Node-level error type.

use thiserror::Error;

/// Errors returned by a node's `execute` method.
///
/// The engine uses the variant to decide retry behaviour:
/// - `Retryable`     — the node is re-run with exponential back-off.
/// - `Fatal`         — the execution is immediately marked as failed.
/// - `Configuration` — a parameter is missing or invalid; never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// Transient failure; the engine should re-try the node.
    #[error("retryable node error: {0}")]
    Retryable(String),

    /// Permanent failure; no retry should be attempted.
    #[error("fatal node error: {0}")]
    Fatal(String),

    /// Required parameter missing or parameter combination invalid.
    #[error("invalid parameter '{parameter}': {message}")]
    Configuration { parameter: String, message: String },
}

impl NodeError {
    pub fn configuration(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            parameter: parameter.into(),
            message: message.into(),
        }
    }
}
