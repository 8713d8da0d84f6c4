//! `engine` crate — workflow domain models, DAG validation, and the execution engine.

pub mod models;
pub mod error;
pub mod dag;
pub mod executor;

pub use models::{ConnectionType, Edge, NodeDefinition, Trigger, Workflow};
pub use error::EngineError;
pub use dag::{validate_dag, MAX_NODE_INPUTS};
pub use executor::{
    default_registry, ExecutionResult, ExecutorConfig, NodeRegistry, WorkflowExecutor,
    MAX_RETRY_DELAY,
};
