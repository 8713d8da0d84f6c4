//! Workflow execution engine.
//!
//! `WorkflowExecutor` is the central orchestrator:
//! 1. Validates the DAG and produces a topological ordering.
//! 2. Iterates through nodes in order, dispatching each via `ExecutableNode`.
//! 3. Routes every node's output items along its `main` edges to the input
//!    index each edge targets, so multi-input nodes receive one branch per
//!    input.
//! 4. Handles `NodeError::Retryable` (up to `max_retries`),
//!    `NodeError::Fatal` / `NodeError::Configuration` (abort immediately),
//!    and the per-node `continue_on_fail` policy.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::{error, info, instrument, warn};

use nodes::{
    node_types, ExecutableNode, ExecutionContext, Item, MergeNode, NoOpNode, NodeError,
    NodeInputs,
};

use crate::dag::validate_dag;
use crate::models::NodeDefinition;
use crate::{EngineError, Workflow};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for the executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum number of times a retryable node failure will be retried.
    pub max_retries: u32,
    /// Base delay for exponential back-off between retries.
    pub retry_base_delay: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_base_delay: Duration::from_millis(100),
        }
    }
}

/// Longest pause between two attempts of a node.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

impl ExecutorConfig {
    /// Delay before retry number `attempt` (1-based): the base delay doubled
    /// per previous attempt, capped at [`MAX_RETRY_DELAY`].
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.retry_base_delay
            .checked_mul(factor)
            .map_or(MAX_RETRY_DELAY, |delay| delay.min(MAX_RETRY_DELAY))
    }
}

// ---------------------------------------------------------------------------
// Node registry
// ---------------------------------------------------------------------------

/// Maps `node_type` strings to shared `ExecutableNode` implementations.
pub type NodeRegistry = HashMap<String, Arc<dyn ExecutableNode>>;

/// Registry with every built-in node type.
pub fn default_registry() -> NodeRegistry {
    let mut registry: NodeRegistry = HashMap::new();
    registry.insert(node_types::MERGE.into(), Arc::new(MergeNode));
    registry.insert(node_types::NO_OP.into(), Arc::new(NoOpNode));
    registry
}

// ---------------------------------------------------------------------------
// Output of a completed execution
// ---------------------------------------------------------------------------

/// The result of running a full workflow.
#[derive(Debug)]
pub struct ExecutionResult {
    /// ID assigned to this run.
    pub execution_id: uuid::Uuid,
    /// Items produced by every executed node, keyed by node ID.
    pub node_outputs: HashMap<String, Vec<Item>>,
    /// Items produced by the *last* node in the sorted order.
    pub output: Vec<Item>,
}

// ---------------------------------------------------------------------------
// WorkflowExecutor
// ---------------------------------------------------------------------------

/// Stateless orchestrator that runs a single workflow execution.
///
/// Construct one executor per process (or even per execution) and call
/// [`WorkflowExecutor::run`] with the workflow and the trigger items.
pub struct WorkflowExecutor {
    registry: NodeRegistry,
    config: ExecutorConfig,
}

impl WorkflowExecutor {
    /// Create a new executor.
    pub fn new(registry: NodeRegistry, config: ExecutorConfig) -> Self {
        Self { registry, config }
    }

    /// Run the workflow and return every node's output.
    ///
    /// Nodes without incoming `main` edges receive `initial_items` on
    /// input 0.
    ///
    /// # Errors
    /// Returns `EngineError` for validation failures, unknown node types,
    /// misconfigured nodes, fatal node errors or retry exhaustion.
    #[instrument(skip(self, initial_items), fields(workflow_id = %workflow.id))]
    pub async fn run(
        &self,
        workflow: &Workflow,
        initial_items: Vec<Item>,
    ) -> Result<ExecutionResult, EngineError> {
        // ------------------------------------------------------------------
        // Validate and topologically sort the DAG.
        // ------------------------------------------------------------------
        let sorted_ids = validate_dag(workflow)?;
        info!(
            "DAG validated — executing {} nodes in order: {:?}",
            sorted_ids.len(),
            sorted_ids
        );

        let execution_id = uuid::Uuid::new_v4();

        let node_map: HashMap<&str, &NodeDefinition> = workflow
            .nodes
            .iter()
            .map(|n| (n.id.as_str(), n))
            .collect();

        // ------------------------------------------------------------------
        // Execute nodes sequentially, routing items along main edges.
        // ------------------------------------------------------------------
        let mut node_outputs: HashMap<String, Vec<Item>> = HashMap::new();
        let mut last_output = Vec::new();

        for node_id in &sorted_ids {
            let node_def = node_map[node_id.as_str()];

            let node_impl = self.registry.get(&node_def.node_type).ok_or_else(|| {
                EngineError::UnknownNodeType {
                    node_id: node_id.clone(),
                    node_type: node_def.node_type.clone(),
                }
            })?;

            let inputs = gather_inputs(workflow, node_id, &node_outputs, &initial_items);

            // Each invocation gets its own snapshot of the parameters.
            let ctx = ExecutionContext {
                workflow_id: workflow.id,
                execution_id,
                node_id: node_id.clone(),
                parameters: node_def.config.clone(),
            };

            let output = match self
                .execute_with_retry(node_id, node_impl.as_ref(), inputs, &ctx)
                .await
            {
                Ok(output) => {
                    info!("node '{}' succeeded with {} items", node_id, output.len());
                    output
                }
                Err(engine_err) if node_def.continue_on_fail => {
                    warn!("node '{}' failed, continuing: {}", node_id, engine_err);
                    vec![Item::from_json(json!({ "error": engine_err.to_string() }))]
                }
                Err(engine_err) => {
                    error!("node '{}' failed: {}", node_id, engine_err);
                    return Err(engine_err);
                }
            };

            last_output = output.clone();
            node_outputs.insert(node_id.clone(), output);
        }

        info!("workflow '{}' execution {} succeeded", workflow.id, execution_id);

        Ok(ExecutionResult {
            execution_id,
            node_outputs,
            output: last_output,
        })
    }

    // -----------------------------------------------------------------------
    // Internal: execute a single node with retry logic.
    // -----------------------------------------------------------------------

    async fn execute_with_retry(
        &self,
        node_id: &str,
        node: &dyn ExecutableNode,
        inputs: NodeInputs,
        ctx: &ExecutionContext,
    ) -> Result<Vec<Item>, EngineError> {
        let mut attempts = 0u32;

        loop {
            match node.execute(inputs.clone(), ctx).await {
                Ok(output) => return Ok(output),

                Err(NodeError::Fatal(msg)) => {
                    return Err(EngineError::NodeFatal {
                        node_id: node_id.to_owned(),
                        message: msg,
                    });
                }

                Err(NodeError::Configuration { parameter, message }) => {
                    return Err(EngineError::NodeConfiguration {
                        node_id: node_id.to_owned(),
                        parameter,
                        message,
                    });
                }

                Err(NodeError::Retryable(msg)) => {
                    attempts += 1;
                    if attempts > self.config.max_retries {
                        return Err(EngineError::NodeRetryExhausted {
                            node_id: node_id.to_owned(),
                            message: msg,
                        });
                    }

                    let delay = self.config.backoff(attempts);

                    warn!(
                        "node '{}' retryable error (attempt {}/{}), retrying in {:?}: {}",
                        node_id, attempts, self.config.max_retries, delay, msg
                    );

                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Build a node's input branches from its upstream outputs.
///
/// Each `main` edge feeds the edge's input index; several edges into the
/// same input are concatenated in edge order. Root nodes get the trigger
/// items.
fn gather_inputs(
    workflow: &Workflow,
    node_id: &str,
    node_outputs: &HashMap<String, Vec<Item>>,
    initial_items: &[Item],
) -> NodeInputs {
    let incoming: Vec<_> = workflow
        .edges
        .iter()
        .filter(|e| e.to == node_id && e.carries_items())
        .collect();

    if incoming.is_empty() {
        return vec![initial_items.to_vec()];
    }

    // Input indexes are bounded by `validate_dag`.
    let slots = incoming
        .iter()
        .filter_map(|e| e.input.checked_add(1))
        .max()
        .unwrap_or(1);
    let mut inputs: NodeInputs = vec![Vec::new(); slots];
    for edge in incoming {
        let items = node_outputs.get(&edge.from);
        if let (Some(items), Some(slot)) = (items, inputs.get_mut(edge.input)) {
            slot.extend(items.iter().cloned());
        }
    }
    inputs
}
