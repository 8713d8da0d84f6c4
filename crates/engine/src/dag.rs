//! DAG validation — run this before executing a workflow.
//!
//! Rules enforced:
//! 1. Node IDs must be unique within the workflow.
//! 2. Every edge must reference valid node IDs (both `from` and `to`).
//! 3. Every edge must address existing slots: nodes have a single output,
//!    `main` edges may target inputs `0..MAX_NODE_INPUTS`, and sub-node
//!    connections attach at input 0.
//! 4. The directed graph must be acyclic (topological sort must succeed).
//!
//! Returns a topologically-sorted list of node IDs on success. Independent
//! nodes keep their declaration order.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::models::{ConnectionType, Edge, Workflow};
use crate::EngineError;

/// Upper bound on the number of `main` inputs a node can be wired with.
pub const MAX_NODE_INPUTS: usize = 64;

/// Every node emits its items on output 0 only.
const NODE_OUTPUTS: usize = 1;

fn check_slots(edge: &Edge) -> Result<(), EngineError> {
    let invalid = |slot, index, limit| EngineError::InvalidSlot {
        from: edge.from.clone(),
        to: edge.to.clone(),
        slot,
        index,
        limit,
    };

    if edge.output >= NODE_OUTPUTS {
        return Err(invalid("output", edge.output, NODE_OUTPUTS));
    }
    let inputs = match edge.connection_type {
        ConnectionType::Main => MAX_NODE_INPUTS,
        ConnectionType::LanguageModel | ConnectionType::Memory | ConnectionType::Tool => 1,
    };
    if edge.input >= inputs {
        return Err(invalid("input", edge.input, inputs));
    }
    Ok(())
}

/// Validate the workflow's DAG and return nodes in topological execution order.
///
/// # Errors
/// - [`EngineError::DuplicateNodeId`] if two nodes share an ID.
/// - [`EngineError::UnknownNodeReference`] if an edge references a missing node.
/// - [`EngineError::InvalidSlot`] if an edge addresses a missing input or output.
/// - [`EngineError::CycleDetected`] if the graph is not acyclic.
pub fn validate_dag(workflow: &Workflow) -> Result<Vec<String>, EngineError> {
    // -----------------------------------------------------------------------
    // 1. Ensure node IDs are unique
    // -----------------------------------------------------------------------
    let mut seen_ids: HashSet<&str> = HashSet::new();
    for node in &workflow.nodes {
        if !seen_ids.insert(node.id.as_str()) {
            return Err(EngineError::DuplicateNodeId(node.id.clone()));
        }
    }

    let node_set: HashSet<&str> = workflow.nodes.iter().map(|n| n.id.as_str()).collect();

    // -----------------------------------------------------------------------
    // 2. Validate edge endpoints and slots
    // -----------------------------------------------------------------------
    for edge in &workflow.edges {
        if !node_set.contains(edge.from.as_str()) {
            return Err(EngineError::UnknownNodeReference {
                node_id: edge.from.clone(),
                side: "from",
            });
        }
        if !node_set.contains(edge.to.as_str()) {
            return Err(EngineError::UnknownNodeReference {
                node_id: edge.to.clone(),
                side: "to",
            });
        }
        check_slots(edge)?;
    }

    // -----------------------------------------------------------------------
    // 3. Topological sort (Kahn's algorithm)
    // -----------------------------------------------------------------------
    // Build adjacency list and in-degree map.
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut in_degree: HashMap<&str, usize> = HashMap::new();

    for node in &workflow.nodes {
        adjacency.entry(node.id.as_str()).or_default();
        in_degree.entry(node.id.as_str()).or_insert(0);
    }

    for edge in &workflow.edges {
        adjacency
            .entry(edge.from.as_str())
            .or_default()
            .push(edge.to.as_str());
        *in_degree.entry(edge.to.as_str()).or_insert(0) += 1;
    }

    // Seed the queue with nodes that have no incoming edges, in declaration
    // order so the resulting schedule is deterministic.
    let mut queue: VecDeque<&str> = workflow
        .nodes
        .iter()
        .map(|n| n.id.as_str())
        .filter(|id| in_degree[id] == 0)
        .collect();

    let mut sorted: Vec<String> = Vec::with_capacity(workflow.nodes.len());

    while let Some(node_id) = queue.pop_front() {
        sorted.push(node_id.to_owned());

        if let Some(neighbours) = adjacency.get(node_id) {
            for &neighbour in neighbours {
                let deg = in_degree.entry(neighbour).or_insert(0);
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(neighbour);
                }
            }
        }
    }

    // If we didn't visit every node the graph contains a cycle.
    if sorted.len() != workflow.nodes.len() {
        return Err(EngineError::CycleDetected);
    }

    Ok(sorted)
}
