//! Node actors, inbox registry, and simulation lifecycle for dvsim.
//!
//! Every simulated node runs as an independent tokio task that owns its
//! routing state outright. Nodes talk only through bounded inboxes; the
//! control side never writes a node's state directly, it delivers events
//! into the node's inbox like any peer would.
//!
//! ## Example
//!
//! ```rust,no_run
//! use dv_node::{NodeConfig, Simulation};
//! use dv_topology::Topology;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), dv_node::NodeError> {
//! let mut sim = Simulation::start(Topology::sample(), NodeConfig::default())?;
//!
//! sim.wait_for_convergence(Duration::from_secs(30), Duration::from_millis(100)).await;
//! for snapshot in sim.snapshots() {
//!     println!("node {}: {:?}", snapshot.id, snapshot.table.costs());
//! }
//!
//! sim.update_link(1, 3, 1).await?;
//! sim.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod actor;
pub mod error;
pub mod registry;
pub mod simulation;

pub use actor::{NodeActor, NodeConfig, NodeEvent, NodeSnapshot, NodeStats};
pub use error::NodeError;
pub use registry::{NodeHandle, PeerTable};
pub use simulation::{ConvergenceReport, CostMismatch, Simulation};
