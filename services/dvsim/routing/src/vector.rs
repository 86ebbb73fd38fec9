//! Per-node cost and next-hop table

use dv_topology::{Cost, NodeId, INFINITY};
use thiserror::Error;

/// Believed shortest-path cost and next hop for every destination.
///
/// The entry for the owner itself is pinned to cost `0` with next hop
/// `Some(owner)`; [`CostVector::set`] refuses to touch it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostVector {
    /// Node that owns this table
    owner: NodeId,
    /// Cost to each destination, [`INFINITY`] if unknown
    costs: Vec<Cost>,
    /// Next hop toward each destination, `None` if unreachable
    next_hops: Vec<Option<NodeId>>,
}

impl CostVector {
    /// Create a table where only the owner itself is reachable
    pub fn new(owner: NodeId, node_count: usize) -> Self {
        let mut costs = vec![INFINITY; node_count];
        let mut next_hops = vec![None; node_count];
        if owner < node_count {
            costs[owner] = 0;
            next_hops[owner] = Some(owner);
        }

        Self {
            owner,
            costs,
            next_hops,
        }
    }

    /// Owner node id
    pub fn owner(&self) -> NodeId {
        self.owner
    }

    /// Number of destinations
    pub fn len(&self) -> usize {
        self.costs.len()
    }

    /// Whether the table has no destinations
    pub fn is_empty(&self) -> bool {
        self.costs.is_empty()
    }

    /// Cost to `dst`
    pub fn cost(&self, dst: NodeId) -> Cost {
        self.costs.get(dst).copied().unwrap_or(INFINITY)
    }

    /// Next hop toward `dst`
    pub fn next_hop(&self, dst: NodeId) -> Option<NodeId> {
        self.next_hops.get(dst).copied().flatten()
    }

    /// Whether `dst` has a finite cost
    pub fn is_reachable(&self, dst: NodeId) -> bool {
        self.cost(dst) != INFINITY
    }

    /// All costs, indexed by destination
    pub fn costs(&self) -> &[Cost] {
        &self.costs
    }

    /// All next hops, indexed by destination
    pub fn next_hops(&self) -> &[Option<NodeId>] {
        &self.next_hops
    }

    /// Overwrite the entry for `dst`. Returns `false` if nothing changed or
    /// `dst` is the owner or out of range.
    pub fn set(&mut self, dst: NodeId, cost: Cost, next_hop: Option<NodeId>) -> bool {
        if dst == self.owner || dst >= self.costs.len() {
            return false;
        }
        if self.costs[dst] == cost && self.next_hops[dst] == next_hop {
            return false;
        }

        self.costs[dst] = cost;
        self.next_hops[dst] = next_hop;
        true
    }
}

/// Why a next-hop chain could not be followed to its destination
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TraceError {
    /// A node on the way has no route to the destination
    #[error("node {at} has no route to {dst}")]
    Unreachable {
        /// Node missing the route
        at: NodeId,
        /// Destination being traced
        dst: NodeId,
    },

    /// Next hops form a cycle
    #[error("routing loop toward {dst}: {path:?}")]
    Loop {
        /// Destination being traced
        dst: NodeId,
        /// Nodes visited before the loop closed
        path: Vec<NodeId>,
    },

    /// A next hop points outside the known tables
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
}

/// Follow next hops from `src` to `dst` across a full set of tables
/// (indexed by owner id). Returns the visited nodes, both ends included.
pub fn trace_route(
    tables: &[CostVector],
    src: NodeId,
    dst: NodeId,
) -> Result<Vec<NodeId>, TraceError> {
    let mut path = vec![src];
    let mut current = src;

    while current != dst {
        let table = tables.get(current).ok_or(TraceError::UnknownNode(current))?;
        let next = table
            .next_hop(dst)
            .ok_or(TraceError::Unreachable { at: current, dst })?;

        if path.contains(&next) {
            return Err(TraceError::Loop { dst, path });
        }
        path.push(next);
        current = next;
    }

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_vector() {
        let vector = CostVector::new(2, 4);
        assert_eq!(vector.owner(), 2);
        assert_eq!(vector.costs(), &[INFINITY, INFINITY, 0, INFINITY]);
        assert_eq!(vector.next_hops(), &[None, None, Some(2), None]);
        assert!(vector.is_reachable(2));
        assert!(!vector.is_reachable(0));
        assert_eq!(vector.cost(10), INFINITY);
        assert_eq!(vector.next_hop(10), None);
    }

    #[test]
    fn test_owner_entry_is_pinned() {
        let mut vector = CostVector::new(1, 3);
        assert!(!vector.set(1, 5, Some(0)));
        assert_eq!(vector.cost(1), 0);
        assert_eq!(vector.next_hop(1), Some(1));

        assert!(vector.set(0, 5, Some(0)));
        assert!(!vector.set(0, 5, Some(0)));
        assert!(!vector.set(7, 1, Some(0)));
    }

    #[test]
    fn test_trace_route() {
        let mut tables: Vec<CostVector> = (0..3).map(|id| CostVector::new(id, 3)).collect();
        // 0 -> 1 -> 2
        tables[0].set(2, 2, Some(1));
        tables[1].set(2, 1, Some(2));
        assert_eq!(trace_route(&tables, 0, 2), Ok(vec![0, 1, 2]));
        assert_eq!(trace_route(&tables, 2, 2), Ok(vec![2]));
        assert_eq!(
            trace_route(&tables, 2, 0),
            Err(TraceError::Unreachable { at: 2, dst: 0 })
        );

        // 1 -> 0 -> 1 ...
        tables[1].set(2, 1, Some(0));
        tables[0].set(2, 2, Some(1));
        assert_eq!(
            trace_route(&tables, 0, 2),
            Err(TraceError::Loop { dst: 2, path: vec![0, 1] })
        );
    }
}
