//! Symmetric link graph and the built-in sample topology.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;
use thiserror::Error;

/// Node identifier. Ids are dense: a topology of `n` nodes uses `0..n`.
pub type NodeId = usize;

/// Route or link cost
pub type Cost = u32;

/// Sentinel cost for "no link" / "unreachable"
pub const INFINITY: Cost = Cost::MAX;

/// Topology validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    /// Topology declared with zero nodes
    #[error("topology has no nodes")]
    Empty,

    /// Node id outside `0..node_count`
    #[error("unknown node {node} (topology has {node_count} nodes)")]
    UnknownNode {
        /// Offending id
        node: NodeId,
        /// Number of nodes in the topology
        node_count: usize,
    },

    /// Link from a node to itself
    #[error("node {0} cannot link to itself")]
    SelfLink(NodeId),

    /// Link with cost 0 or the infinity sentinel
    #[error("link {a}<->{b} must have a positive, finite cost")]
    InvalidCost {
        /// First endpoint
        a: NodeId,
        /// Second endpoint
        b: NodeId,
    },

    /// Same link declared twice in a topology description
    #[error("link {a}<->{b} is declared more than once")]
    DuplicateLink {
        /// First endpoint
        a: NodeId,
        /// Second endpoint
        b: NodeId,
    },
}

/// A direct link between two nodes, as written in topology files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// First endpoint
    pub a: NodeId,
    /// Second endpoint
    pub b: NodeId,
    /// Cost of the link in both directions
    pub cost: Cost,
}

impl Link {
    /// Create a new link
    pub fn new(a: NodeId, b: NodeId, cost: Cost) -> Self {
        Self { a, b, cost }
    }
}

/// Fixed set of nodes with symmetric direct link costs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    /// Number of nodes; ids are `0..node_count`
    node_count: usize,
    /// Links keyed by `(low id, high id)`
    links: BTreeMap<(NodeId, NodeId), Cost>,
}

// Reference all-pairs shortest paths
mod shortest_path;
pub use shortest_path::ShortestPaths;

fn link_key(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl Topology {
    /// Create a topology with `node_count` nodes and no links
    pub fn new(node_count: usize) -> Result<Self, TopologyError> {
        if node_count == 0 {
            return Err(TopologyError::Empty);
        }

        Ok(Self {
            node_count,
            links: BTreeMap::new(),
        })
    }

    /// Build a topology from a list of links, rejecting duplicates
    pub fn from_links<I>(node_count: usize, links: I) -> Result<Self, TopologyError>
    where
        I: IntoIterator<Item = Link>,
    {
        let mut topology = Self::new(node_count)?;

        for link in links {
            topology.validate_link(link.a, link.b, link.cost)?;
            if topology.links.contains_key(&link_key(link.a, link.b)) {
                return Err(TopologyError::DuplicateLink {
                    a: link.a,
                    b: link.b,
                });
            }
            topology.links.insert(link_key(link.a, link.b), link.cost);
        }

        Ok(topology)
    }

    /// The 4-node sample network used when no topology file is given.
    ///
    /// Links: `0-1:1`, `0-2:3`, `0-3:7`, `1-2:1`, `2-3:2`. Nodes 1 and 3 are
    /// not directly linked.
    pub fn sample() -> Self {
        let links = [
            Link::new(0, 1, 1),
            Link::new(0, 2, 3),
            Link::new(0, 3, 7),
            Link::new(1, 2, 1),
            Link::new(2, 3, 2),
        ];

        let mut topology = Self {
            node_count: 4,
            links: BTreeMap::new(),
        };
        for link in links {
            topology.links.insert(link_key(link.a, link.b), link.cost);
        }
        topology
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// All node ids
    pub fn node_ids(&self) -> Range<NodeId> {
        0..self.node_count
    }

    /// Check that a node id exists
    pub fn check_node(&self, node: NodeId) -> Result<(), TopologyError> {
        if node < self.node_count {
            Ok(())
        } else {
            Err(TopologyError::UnknownNode {
                node,
                node_count: self.node_count,
            })
        }
    }

    /// Validate a link without applying it
    pub fn validate_link(&self, a: NodeId, b: NodeId, cost: Cost) -> Result<(), TopologyError> {
        self.check_node(a)?;
        self.check_node(b)?;
        if a == b {
            return Err(TopologyError::SelfLink(a));
        }
        if cost == 0 || cost == INFINITY {
            return Err(TopologyError::InvalidCost { a, b });
        }
        Ok(())
    }

    /// Direct link cost between two nodes, if linked
    pub fn link_cost(&self, a: NodeId, b: NodeId) -> Option<Cost> {
        self.links.get(&link_key(a, b)).copied()
    }

    /// Set (or create) the link between `a` and `b`. Returns the previous cost.
    pub fn set_link(
        &mut self,
        a: NodeId,
        b: NodeId,
        cost: Cost,
    ) -> Result<Option<Cost>, TopologyError> {
        self.validate_link(a, b, cost)?;
        Ok(self.links.insert(link_key(a, b), cost))
    }

    /// Direct neighbors of a node with their link costs
    pub fn neighbors(&self, node: NodeId) -> impl Iterator<Item = (NodeId, Cost)> + '_ {
        self.links.iter().filter_map(move |(&(a, b), &cost)| {
            if a == node {
                Some((b, cost))
            } else if b == node {
                Some((a, cost))
            } else {
                None
            }
        })
    }

    /// Static link-cost row of one node: `0` for itself, the link cost for
    /// neighbors and [`INFINITY`] otherwise.
    pub fn shortcuts(&self, node: NodeId) -> Vec<Cost> {
        let mut row = vec![INFINITY; self.node_count];
        if node < self.node_count {
            row[node] = 0;
        }
        for (neighbor, cost) in self.neighbors(node) {
            row[neighbor] = cost;
        }
        row
    }

    /// All links in id order
    pub fn links(&self) -> Vec<Link> {
        self.links
            .iter()
            .map(|(&(a, b), &cost)| Link::new(a, b, cost))
            .collect()
    }
}
