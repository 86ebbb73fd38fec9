//! Cost vectors, advertisements, and Bellman-Ford relaxation for the simulator.
//!
//! Everything in this crate is synchronous and owned by a single node: the
//! actor runtime in `dv-node` feeds advertisements in and ships the resulting
//! vectors out, but the routing decisions themselves live here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod advertisement;
pub mod distance_vector;
pub mod vector;

pub use advertisement::*;
pub use distance_vector::*;
pub use vector::*;

pub use dv_topology::{Cost, NodeId, INFINITY};
