//! `nodes` crate — the item model, the `ExecutableNode` trait and built-in
//! node implementations.
//!
//! Every node must implement [`ExecutableNode`]. The engine crate dispatches
//! execution through this trait object, handing each node its materialised
//! input branches and collecting the items of its single output.

pub mod error;
pub mod item;
pub mod merge;
pub mod mock;
pub mod passthrough;
pub mod traits;

pub use error::NodeError;
pub use item::{BinaryData, InputBranch, Item, NodeInputs, PairedItem};
pub use merge::{MergeConfiguration, MergeNode};
pub use passthrough::NoOpNode;
pub use traits::{ExecutableNode, ExecutionContext};

/// Node type names understood by the built-in registry.
pub mod node_types {
    pub const MERGE: &str = "merge";
    pub const NO_OP: &str = "noOp";
}
