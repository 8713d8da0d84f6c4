//! `MockNode` — a test double for `ExecutableNode`.
//!
//! Useful in unit and integration tests where a real node implementation is
//! either unavailable or irrelevant.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

use crate::{traits::ExecutionContext, ExecutableNode, Item, NodeError, NodeInputs};

/// Behaviour injected into `MockNode` at construction time.
pub enum MockBehaviour {
    /// Emit one item per value.
    ReturnValues(Vec<Value>),
    /// Fail with a `Retryable` error this many times, then emit the values.
    Flaky { failures: usize, values: Vec<Value> },
    /// Fail with a `Retryable` error.
    FailRetryable(String),
    /// Fail with a `Fatal` error.
    FailFatal(String),
}

/// A mock node that records every call it receives and returns a
/// programmer-specified result.
pub struct MockNode {
    /// Label used in test assertions; stamped into every emitted item.
    pub name: String,
    /// What the node will do when `execute` is called.
    pub behaviour: MockBehaviour,
    /// All inputs seen by this node (in call order).
    pub calls: Arc<Mutex<Vec<NodeInputs>>>,
}

impl MockNode {
    fn with_behaviour(name: impl Into<String>, behaviour: MockBehaviour) -> Self {
        Self {
            name: name.into(),
            behaviour,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock that always succeeds with one item per value.
    pub fn returning(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self::with_behaviour(name, MockBehaviour::ReturnValues(values))
    }

    /// Create a mock that fails `failures` times before succeeding.
    pub fn flaky(name: impl Into<String>, failures: usize, values: Vec<Value>) -> Self {
        Self::with_behaviour(name, MockBehaviour::Flaky { failures, values })
    }

    /// Create a mock that always fails with a `Fatal` error.
    pub fn failing_fatal(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::with_behaviour(name, MockBehaviour::FailFatal(msg.into()))
    }

    /// Create a mock that always fails with a `Retryable` error.
    pub fn failing_retryable(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::with_behaviour(name, MockBehaviour::FailRetryable(msg.into()))
    }

    /// Number of times this node has been executed.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Inputs received by the most recent call.
    pub fn last_inputs(&self) -> Option<NodeInputs> {
        self.calls.lock().unwrap().last().cloned()
    }

    fn emit(&self, values: &[Value]) -> Vec<Item> {
        values
            .iter()
            .map(|value| {
                // Tag the output with the node name so tests can trace the
                // data flowing through the pipeline.
                let mut item = Item::from_json(json!({ "node": self.name }));
                if let Some(obj) = value.as_object() {
                    for (k, v) in obj {
                        item.json.insert(k.clone(), v.clone());
                    }
                }
                item
            })
            .collect()
    }
}

#[async_trait]
impl ExecutableNode for MockNode {
    async fn execute(
        &self,
        inputs: NodeInputs,
        _ctx: &ExecutionContext,
    ) -> Result<Vec<Item>, NodeError> {
        let call_number = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(inputs);
            calls.len()
        };

        match &self.behaviour {
            MockBehaviour::ReturnValues(values) => Ok(self.emit(values)),
            MockBehaviour::Flaky { failures, values } => {
                if call_number <= *failures {
                    Err(NodeError::Retryable(format!(
                        "{} not ready (call {call_number})",
                        self.name
                    )))
                } else {
                    Ok(self.emit(values))
                }
            }
            MockBehaviour::FailRetryable(msg) => Err(NodeError::Retryable(msg.clone())),
            MockBehaviour::FailFatal(msg) => Err(NodeError::Fatal(msg.clone())),
        }
    }
}
