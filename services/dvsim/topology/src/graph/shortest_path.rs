//! Reference all-pairs shortest paths.
//!
//! The protocol never uses this; it is the yardstick that converged cost
//! vectors are compared against.

use super::{Cost, NodeId, Topology, INFINITY};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use tracing::debug;

/// Shortest-path distances between every pair of nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortestPaths {
    /// `distances[src][dst]`, [`INFINITY`] when unreachable
    distances: Vec<Vec<Cost>>,
}

impl ShortestPaths {
    /// Run Dijkstra from every node of the topology
    pub fn compute(topology: &Topology) -> Self {
        let distances = topology
            .node_ids()
            .map(|src| dijkstra(topology, src))
            .collect();

        debug!(
            "Computed reference distances for {} nodes",
            topology.node_count()
        );

        Self { distances }
    }

    /// Distance from `src` to `dst`
    pub fn distance(&self, src: NodeId, dst: NodeId) -> Cost {
        self.distances
            .get(src)
            .and_then(|row| row.get(dst))
            .copied()
            .unwrap_or(INFINITY)
    }

    /// All distances from `src`
    pub fn row(&self, src: NodeId) -> &[Cost] {
        self.distances.get(src).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether every node can reach every other node
    pub fn is_connected(&self) -> bool {
        self.distances
            .iter()
            .all(|row| row.iter().all(|&cost| cost != INFINITY))
    }
}

fn dijkstra(topology: &Topology, src: NodeId) -> Vec<Cost> {
    let mut distances = vec![INFINITY; topology.node_count()];
    let mut unvisited: BinaryHeap<Reverse<(Cost, NodeId)>> = BinaryHeap::new();

    distances[src] = 0;
    unvisited.push(Reverse((0, src)));

    while let Some(Reverse((current_dist, current_node))) = unvisited.pop() {
        // Skip if we've already found a better path
        if current_dist > distances[current_node] {
            continue;
        }

        for (neighbor, cost) in topology.neighbors(current_node) {
            let new_dist = current_dist.saturating_add(cost);
            if new_dist < distances[neighbor] {
                distances[neighbor] = new_dist;
                unvisited.push(Reverse((new_dist, neighbor)));
            }
        }
    }

    distances
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Link;

    #[test]
    fn test_sample_distances() {
        let paths = ShortestPaths::compute(&Topology::sample());
        assert_eq!(paths.row(0), &[0, 1, 2, 4]);
        assert_eq!(paths.row(1), &[1, 0, 1, 3]);
        assert_eq!(paths.row(2), &[2, 1, 0, 2]);
        assert_eq!(paths.row(3), &[4, 3, 2, 0]);
        assert!(paths.is_connected());
    }

    #[test]
    fn test_new_link_shortens_paths() {
        let mut topology = Topology::sample();
        topology.set_link(1, 3, 1).unwrap();

        let paths = ShortestPaths::compute(&topology);
        assert_eq!(paths.distance(0, 3), 2);
        assert_eq!(paths.distance(3, 0), 2);
    }

    #[test]
    fn test_disconnected_node() {
        let topology = Topology::from_links(3, vec![Link::new(0, 1, 5)]).unwrap();
        let paths = ShortestPaths::compute(&topology);
        assert_eq!(paths.distance(0, 1), 5);
        assert_eq!(paths.distance(0, 2), INFINITY);
        assert_eq!(paths.distance(2, 2), 0);
        assert_eq!(paths.distance(7, 0), INFINITY);
        assert!(!paths.is_connected());
    }
}
