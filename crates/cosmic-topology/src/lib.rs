//! Cosmic Topology - the agent/task graph behind the network view.
//!
//! [`Graph`] is the node/link model built from live topology updates or from
//! a completed task chain. [`NetworkVisualizer`] owns the live graph and a
//! cache of saved task-chain topologies that can be put back on screen.

pub mod graph;
pub mod visualizer;

pub use graph::{Graph, GraphLink, GraphNode, LinkKind, NodeGroup};
pub use visualizer::{ChainSummary, NetworkVisualizer, SavedTopology};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TopologyError {
    #[error("task chain {chain_id} has no execution path")]
    MissingExecutionPath { chain_id: String },
}
