//! Distance-vector state of one node and the relaxation step

use crate::advertisement::Advertisement;
use crate::vector::CostVector;
use dv_topology::{Cost, NodeId, Topology, INFINITY};
use serde::Serialize;
use std::fmt;
use tracing::{debug, trace, warn};

/// Why a table entry changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeCause {
    /// The direct link is cheaper than the current route
    DirectLink,
    /// The sender offers a cheaper route
    Cheaper,
    /// The current next hop reported that its route got worse
    Worsened,
    /// The link cost was changed from outside the protocol
    LinkUpdate,
}

impl fmt::Display for ChangeCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeCause::DirectLink => write!(f, "direct link"),
            ChangeCause::Cheaper => write!(f, "cheaper route"),
            ChangeCause::Worsened => write!(f, "next hop got worse"),
            ChangeCause::LinkUpdate => write!(f, "link update"),
        }
    }
}

/// One changed table entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteChange {
    /// Destination whose entry changed
    pub destination: NodeId,
    /// Cost before the change
    pub old_cost: Cost,
    /// Cost after the change
    pub new_cost: Cost,
    /// Next hop after the change
    pub next_hop: Option<NodeId>,
    /// Rule that triggered the change
    pub cause: ChangeCause,
}

/// Result of applying one advertisement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelaxOutcome {
    /// Entries that changed, in destination order
    pub changes: Vec<RouteChange>,
}

impl RelaxOutcome {
    /// Whether any entry changed
    pub fn changed(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// Relaxation counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RelaxStats {
    /// Advertisements applied (including ones that changed nothing)
    pub advertisements_applied: u64,
    /// Advertisements ignored (self-sent or malformed)
    pub advertisements_ignored: u64,
    /// Total changed entries
    pub route_changes: u64,
    /// Changes caused by the direct-link check
    pub direct_link_corrections: u64,
    /// Changes that accepted a worse cost from the current next hop
    pub worse_routes_accepted: u64,
}

/// A node's routing state: its cost vector plus static link costs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistanceVector {
    /// Current best routes
    table: CostVector,
    /// Direct link cost to every node ([`INFINITY`] if not linked)
    shortcuts: Vec<Cost>,
    /// Counters
    stats: RelaxStats,
}

impl DistanceVector {
    /// Create the state for `owner` with the given direct link costs. All
    /// routes except the one to itself start unknown; the direct links are
    /// adopted on the first processed advertisement.
    pub fn new(owner: NodeId, mut shortcuts: Vec<Cost>) -> Self {
        if let Some(own) = shortcuts.get_mut(owner) {
            *own = 0;
        }

        Self {
            table: CostVector::new(owner, shortcuts.len()),
            shortcuts,
            stats: RelaxStats::default(),
        }
    }

    /// Create the state for `owner` from its row of the topology
    pub fn from_topology(topology: &Topology, owner: NodeId) -> Self {
        Self::new(owner, topology.shortcuts(owner))
    }

    /// Owner node id
    pub fn id(&self) -> NodeId {
        self.table.owner()
    }

    /// Current routing table
    pub fn table(&self) -> &CostVector {
        &self.table
    }

    /// Static link costs
    pub fn shortcuts(&self) -> &[Cost] {
        &self.shortcuts
    }

    /// Relaxation counters
    pub fn stats(&self) -> &RelaxStats {
        &self.stats
    }

    /// Snapshot of the current costs for broadcasting
    pub fn advertisement(&self) -> Advertisement {
        Advertisement::new(self.id(), self.table.costs().to_vec())
    }

    /// Change the direct link cost to `peer`, in both the static link table
    /// and the live route table. Passing [`INFINITY`] removes the link.
    pub fn set_link(&mut self, peer: NodeId, cost: Cost) -> Option<RouteChange> {
        if peer == self.id() || peer >= self.shortcuts.len() {
            warn!("Node {} ignoring link update toward {}", self.id(), peer);
            return None;
        }

        self.shortcuts[peer] = cost;
        let next_hop = (cost != INFINITY).then_some(peer);
        self.record(peer, cost, next_hop, ChangeCause::LinkUpdate)
    }

    /// Apply a peer's advertisement: the Bellman-Ford relaxation step.
    ///
    /// For each destination other than ourselves:
    ///
    /// 1. adopt the direct link if it beats the current route;
    /// 2. compute `cost(sender) + advertised(dst)` and take it if it is
    ///    cheaper, or if it is more expensive but our route already goes
    ///    through the sender (stale good news must not outlive the route it
    ///    depended on). A worsened route never ends up above the direct link.
    pub fn apply(&mut self, advertisement: &Advertisement) -> RelaxOutcome {
        let src = advertisement.source;
        let node_count = self.shortcuts.len();

        if src == self.id() || src >= node_count {
            trace!("Node {} ignoring advertisement from {}", self.id(), src);
            self.stats.advertisements_ignored += 1;
            return RelaxOutcome::default();
        }
        if advertisement.len() != node_count {
            warn!(
                "Node {} ignoring advertisement from {} covering {} destinations (expected {})",
                self.id(),
                src,
                advertisement.len(),
                node_count
            );
            self.stats.advertisements_ignored += 1;
            return RelaxOutcome::default();
        }

        self.stats.advertisements_applied += 1;
        let mut outcome = RelaxOutcome::default();

        for (dst, &advertised) in advertisement.costs.iter().enumerate() {
            if dst == self.id() {
                continue;
            }

            // Direct-link correction
            let shortcut = self.shortcuts[dst];
            if shortcut < self.table.cost(dst) {
                outcome
                    .changes
                    .extend(self.record(dst, shortcut, Some(dst), ChangeCause::DirectLink));
            }

            // Relaxation via sender
            let current = self.table.cost(dst);
            let candidate = self.table.cost(src).saturating_add(advertised);
            let via_sender = self.table.next_hop(dst) == Some(src);

            if candidate < current {
                outcome
                    .changes
                    .extend(self.record(dst, candidate, Some(src), ChangeCause::Cheaper));
            } else if candidate > current && via_sender {
                let change = if shortcut <= candidate {
                    let next_hop = (shortcut != INFINITY).then_some(dst);
                    self.record(dst, shortcut, next_hop, ChangeCause::DirectLink)
                } else {
                    let next_hop = (candidate != INFINITY).then_some(src);
                    self.record(dst, candidate, next_hop, ChangeCause::Worsened)
                };
                outcome.changes.extend(change);
            }
        }

        if outcome.changed() {
            debug!(
                "Node {} applied advertisement from {}: {} route changes",
                self.id(),
                src,
                outcome.changes.len()
            );
        }

        outcome
    }

    /// Write one entry and account for it
    fn record(
        &mut self,
        dst: NodeId,
        cost: Cost,
        next_hop: Option<NodeId>,
        cause: ChangeCause,
    ) -> Option<RouteChange> {
        let old_cost = self.table.cost(dst);
        if !self.table.set(dst, cost, next_hop) {
            return None;
        }

        self.stats.route_changes += 1;
        match cause {
            ChangeCause::DirectLink => self.stats.direct_link_corrections += 1,
            ChangeCause::Worsened => self.stats.worse_routes_accepted += 1,
            ChangeCause::Cheaper | ChangeCause::LinkUpdate => {}
        }

        trace!(
            "Node {} route to {}: {} -> {} via {:?} ({})",
            self.id(),
            dst,
            old_cost,
            cost,
            next_hop,
            cause
        );

        Some(RouteChange {
            destination: dst,
            old_cost,
            new_cost: cost,
            next_hop,
            cause,
        })
    }
}
