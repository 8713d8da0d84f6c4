//! The `ExecutableNode` trait — the contract every node must fulfil.

use async_trait::async_trait;
use serde_json::Value;

use crate::{Item, NodeError, NodeInputs};

/// Per-invocation context passed to a node.
///
/// Defined here (in the nodes crate) so both the engine and individual node
/// implementations can import it without a circular dependency.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// ID of the parent workflow.
    pub workflow_id: uuid::Uuid,
    /// ID of the current execution run.
    pub execution_id: uuid::Uuid,
    /// ID of the node being executed.
    pub node_id: String,
    /// Snapshot of the node's parameters, already fully evaluated.
    /// Never changes for the duration of the call.
    pub parameters: Value,
}

impl ExecutionContext {
    /// Context for running a single node outside of a workflow.
    pub fn standalone(node_id: impl Into<String>, parameters: Value) -> Self {
        Self {
            workflow_id: uuid::Uuid::new_v4(),
            execution_id: uuid::Uuid::new_v4(),
            node_id: node_id.into(),
            parameters,
        }
    }
}

/// The core node trait.
#[async_trait]
pub trait ExecutableNode: Send + Sync {
    /// Execute the node over fully materialised input branches and return
    /// the items of its single output connection.
    async fn execute(
        &self,
        inputs: NodeInputs,
        ctx: &ExecutionContext,
    ) -> Result<Vec<Item>, NodeError>;
}
