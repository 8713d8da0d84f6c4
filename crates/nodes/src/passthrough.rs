//! `NoOpNode` — forwards its input items untouched.

use async_trait::async_trait;

use crate::{traits::ExecutionContext, ExecutableNode, Item, NodeError, NodeInputs};

/// Passthrough node: emits every input branch in order, items unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpNode;

#[async_trait]
impl ExecutableNode for NoOpNode {
    async fn execute(
        &self,
        inputs: NodeInputs,
        _ctx: &ExecutionContext,
    ) -> Result<Vec<Item>, NodeError> {
        Ok(inputs.into_iter().flatten().collect())
    }
}
