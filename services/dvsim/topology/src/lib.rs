//! Static link graph and reference shortest paths for the distance-vector simulator.
//!
//! This crate describes which simulated nodes exist and what each direct link
//! costs. Nodes only ever learn their own row of this graph (their
//! "shortcuts"); the full graph is kept by the control side so it can compute
//! the distances the protocol is expected to converge to.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod graph;

pub use graph::*;
