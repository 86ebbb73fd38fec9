//! Routing advertisements exchanged between nodes

use dv_topology::{Cost, NodeId};

/// Immutable snapshot of one node's cost vector, broadcast to its peers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    /// Node that produced the vector
    pub source: NodeId,
    /// Advertised cost to every destination, indexed by node id
    pub costs: Vec<Cost>,
}

impl Advertisement {
    /// Create a new advertisement
    pub fn new(source: NodeId, costs: Vec<Cost>) -> Self {
        Self { source, costs }
    }

    /// Number of destinations covered
    pub fn len(&self) -> usize {
        self.costs.len()
    }

    /// Whether the vector is empty
    pub fn is_empty(&self) -> bool {
        self.costs.is_empty()
    }
}
