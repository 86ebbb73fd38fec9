//! Node runtime error types.

use dv_topology::{NodeId, TopologyError};
use thiserror::Error;

/// Errors raised by the simulation control surface
#[derive(Error, Debug)]
pub enum NodeError {
    /// No actor is registered under this id
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// The actor's inbox no longer accepts events
    #[error("inbox of node {0} is closed")]
    InboxClosed(NodeId),

    /// The actor's inbox stayed full for the whole delivery timeout
    #[error("inbox of node {0} is full, try again later")]
    InboxFull(NodeId),

    /// The requested link change is not valid for the topology
    #[error(transparent)]
    Topology(#[from] TopologyError),

    /// Runtime settings that cannot be used
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Operation attempted after shutdown
    #[error("simulation has been shut down")]
    ShutDown,
}
