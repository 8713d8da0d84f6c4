//! Core domain models for the workflow engine.
//!
//! These types are the source of truth for what a workflow looks like
//! in memory, and the shape of workflow definition files.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Trigger
// ---------------------------------------------------------------------------

/// How a workflow is started. Recorded with the definition only: the
/// executor always starts from the items handed to
/// [`WorkflowExecutor::run`](crate::WorkflowExecutor::run).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    /// Started by an external HTTP caller.
    Webhook {
        /// Path the caller addresses the workflow by.
        path: String,
    },
    /// Triggered manually.
    #[default]
    Manual,
    /// Started on a schedule.
    Cron {
        /// Standard cron expression (5 fields).
        expression: String,
    },
}

// ---------------------------------------------------------------------------
// NodeDefinition
// ---------------------------------------------------------------------------

/// A single step in the workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDefinition {
    /// Unique identifier within this workflow (referenced by edges).
    pub id: String,
    /// Maps to a registered `ExecutableNode` implementation.
    pub node_type: String,
    /// Node parameters, handed to the node as a frozen snapshot on every run.
    #[serde(default)]
    pub config: serde_json::Value,
    /// On failure, emit a single `{ "error": … }` item instead of aborting.
    #[serde(default)]
    pub continue_on_fail: bool,
}

impl NodeDefinition {
    pub fn new(
        id: impl Into<String>,
        node_type: impl Into<String>,
        config: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            config,
            continue_on_fail: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Edge
// ---------------------------------------------------------------------------

/// Kind of connection an edge represents.
///
/// Only `main` connections carry items; the others attach sub-nodes
/// (models, memory, tools) and only constrain execution order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionType {
    #[default]
    Main,
    LanguageModel,
    Memory,
    Tool,
}

/// Directed edge from one node's output to another node's input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    /// Output index on `from`.
    #[serde(default)]
    pub output: usize,
    /// Input index on `to`; a merge node reads input 0 and input 1.
    #[serde(default)]
    pub input: usize,
    #[serde(default)]
    pub connection_type: ConnectionType,
}

impl Edge {
    /// `main` edge into input 0.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::to_input(from, to, 0)
    }

    /// `main` edge into the given input of `to`.
    pub fn to_input(from: impl Into<String>, to: impl Into<String>, input: usize) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            output: 0,
            input,
            connection_type: ConnectionType::Main,
        }
    }

    pub fn carries_items(&self) -> bool {
        self.connection_type == ConnectionType::Main
    }
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// A complete workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub trigger: Trigger,
    pub nodes: Vec<NodeDefinition>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Workflow {
    /// Convenience constructor for testing.
    pub fn new(
        name: impl Into<String>,
        trigger: Trigger,
        nodes: Vec<NodeDefinition>,
        edges: Vec<Edge>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            trigger,
            nodes,
            edges,
            created_at: Utc::now(),
        }
    }
}
