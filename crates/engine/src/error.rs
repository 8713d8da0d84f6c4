//! Engine-level error types.

use thiserror::Error;

/// Errors produced by the workflow engine (validation + execution).
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Validation errors ------

    /// Two or more nodes share the same ID.
    #[error("duplicate node ID: '{0}'")]
    DuplicateNodeId(String),

    /// An edge references a node ID that doesn't exist in the workflow.
    #[error("edge references unknown node '{node_id}' ({side} side)")]
    UnknownNodeReference {
        node_id: String,
        side: &'static str,
    },

    /// An edge addresses an input or output slot its node does not have.
    #[error("edge '{from}' -> '{to}' uses {slot} index {index}; only 0..{limit} exist")]
    InvalidSlot {
        from: String,
        to: String,
        slot: &'static str,
        index: usize,
        limit: usize,
    },

    /// Topological sort detected a cycle.
    #[error("workflow graph contains a cycle")]
    CycleDetected,

    // ------ Execution errors ------

    /// No implementation is registered for a node's type.
    #[error("node '{node_id}' has unregistered type '{node_type}'")]
    UnknownNodeType {
        node_id: String,
        node_type: String,
    },

    /// A node's parameters could not be resolved.
    #[error("node '{node_id}' is misconfigured: parameter '{parameter}': {message}")]
    NodeConfiguration {
        node_id: String,
        parameter: String,
        message: String,
    },

    /// A node failed with a fatal error; the whole execution is aborted.
    #[error("node '{node_id}' failed fatally: {message}")]
    NodeFatal {
        node_id: String,
        message: String,
    },

    /// A node's retryable error was exhausted.
    #[error("node '{node_id}' exceeded retry limit: {message}")]
    NodeRetryExhausted {
        node_id: String,
        message: String,
    },
}

impl EngineError {
    /// ID of the node the error is attributed to, if any.
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Self::UnknownNodeType { node_id, .. }
            | Self::NodeConfiguration { node_id, .. }
            | Self::NodeFatal { node_id, .. }
            | Self::NodeRetryExhausted { node_id, .. } => Some(node_id),
            Self::DuplicateNodeId(_)
            | Self::UnknownNodeReference { .. }
            | Self::InvalidSlot { .. }
            | Self::CycleDetected => None,
        }
    }
}
