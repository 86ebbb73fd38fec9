//! Simulation lifecycle: spawn one actor per node, mutate links, observe
//! convergence, shut down.

use crate::actor::{NodeActor, NodeConfig, NodeEvent, NodeSnapshot};
use crate::error::NodeError;
use crate::registry::{NodeHandle, PeerTable};
use dv_routing::{trace_route, CostVector, DistanceVector, TraceError};
use dv_topology::{Cost, NodeId, ShortestPaths, Topology};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// One cost entry that differs from the reference shortest path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostMismatch {
    /// Node holding the entry
    pub node: NodeId,
    /// Destination of the entry
    pub destination: NodeId,
    /// Reference shortest-path cost
    pub expected: Cost,
    /// Cost currently believed by the node
    pub actual: Cost,
}

/// Comparison of the current tables against the reference distances
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvergenceReport {
    /// Entries with the wrong cost
    pub mismatches: Vec<CostMismatch>,
    /// Next-hop chains that do not reach their destination
    pub broken_routes: Vec<TraceError>,
}

impl ConvergenceReport {
    /// Whether every cost matches and every route can be followed
    pub fn is_converged(&self) -> bool {
        self.mismatches.is_empty() && self.broken_routes.is_empty()
    }
}

/// Running set of node actors plus the control-side topology copy
#[derive(Debug)]
pub struct Simulation {
    /// Link costs as last set from the control side
    topology: Topology,
    /// One handle per node
    nodes: BTreeMap<NodeId, NodeHandle>,
    /// Runtime settings
    config: NodeConfig,
    /// Set once shutdown has run
    stopped: bool,
}

impl Simulation {
    /// Spawn one actor per node of `topology` on the current tokio runtime
    pub fn start(topology: Topology, config: NodeConfig) -> Result<Self, NodeError> {
        if config.broadcast_interval.is_zero() {
            return Err(NodeError::Config("broadcast interval must be positive".to_string()));
        }
        if config.inbox_capacity == 0 {
            return Err(NodeError::Config("inbox capacity must be positive".to_string()));
        }

        let mut peers = PeerTable::new();
        let mut inboxes = Vec::with_capacity(topology.node_count());
        for node in topology.node_ids() {
            let (tx, rx) = mpsc::channel(config.inbox_capacity);
            peers.insert(node, tx);
            inboxes.push((node, rx));
        }
        let peers = Arc::new(peers);

        let mut nodes = BTreeMap::new();
        for (node, inbox_rx) in inboxes {
            let state = DistanceVector::from_topology(&topology, node);
            let (actor, snapshot) = NodeActor::new(state, peers.clone(), config.broadcast_interval);
            let (shutdown_tx, shutdown_rx) = oneshot::channel();
            let inbox = peers
                .get(node)
                .cloned()
                .ok_or(NodeError::UnknownNode(node))?;

            let task = tokio::spawn(actor.run(inbox_rx, shutdown_rx));

            nodes.insert(
                node,
                NodeHandle {
                    id: node,
                    inbox,
                    shutdown: Some(shutdown_tx),
                    snapshot,
                    task: Some(task),
                },
            );
        }

        info!(
            "Started {} node actors (broadcast every {:?}, inbox capacity {})",
            nodes.len(),
            config.broadcast_interval,
            config.inbox_capacity
        );

        Ok(Self {
            topology,
            nodes,
            config,
            stopped: false,
        })
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Control-side copy of the link costs
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Whether shutdown has run
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Latest published state of one node
    pub fn snapshot(&self, node: NodeId) -> Result<NodeSnapshot, NodeError> {
        self.nodes
            .get(&node)
            .map(NodeHandle::snapshot)
            .ok_or(NodeError::UnknownNode(node))
    }

    /// Latest published state of every node, in id order. Not synchronized
    /// with in-flight advertisements.
    pub fn snapshots(&self) -> Vec<NodeSnapshot> {
        self.nodes.values().map(NodeHandle::snapshot).collect()
    }

    /// Set the direct link cost between `a` and `b` on both endpoints.
    ///
    /// The change is delivered into each endpoint's inbox and applied in the
    /// actor's own turn; nothing is broadcast until the next event. Returns
    /// the previous link cost.
    ///
    /// Both inbox slots are reserved before anything is sent, so either both
    /// endpoints get the change or neither does. If an inbox stays full for
    /// `shutdown_grace`, nothing changes and [`NodeError::InboxFull`] is
    /// returned.
    pub async fn update_link(
        &mut self,
        a: NodeId,
        b: NodeId,
        cost: Cost,
    ) -> Result<Option<Cost>, NodeError> {
        if self.stopped {
            return Err(NodeError::ShutDown);
        }

        self.topology.validate_link(a, b, cost)?;
        let handle_a = self.nodes.get(&a).ok_or(NodeError::UnknownNode(a))?;
        let handle_b = self.nodes.get(&b).ok_or(NodeError::UnknownNode(b))?;

        let limit = self.config.shutdown_grace;
        let permit_a = handle_a.reserve(limit).await?;
        let permit_b = handle_b.reserve(limit).await?;
        permit_a.send(NodeEvent::SetLink { peer: b, cost });
        permit_b.send(NodeEvent::SetLink { peer: a, cost });
        let previous = self.topology.set_link(a, b, cost)?;

        info!("Link {}<->{} set to {} (was {:?})", a, b, cost, previous);
        Ok(previous)
    }

    /// Reference distances for the current topology
    pub fn reference_paths(&self) -> ShortestPaths {
        ShortestPaths::compute(&self.topology)
    }

    /// Compare the published tables against the reference distances and
    /// follow every next-hop chain.
    pub fn convergence_report(&self) -> ConvergenceReport {
        let reference = self.reference_paths();
        let tables: Vec<CostVector> = self
            .snapshots()
            .into_iter()
            .map(|snapshot| snapshot.table)
            .collect();

        let mut report = ConvergenceReport::default();
        for table in &tables {
            let node = table.owner();
            for destination in self.topology.node_ids() {
                let expected = reference.distance(node, destination);
                let actual = table.cost(destination);
                if expected != actual {
                    report.mismatches.push(CostMismatch {
                        node,
                        destination,
                        expected,
                        actual,
                    });
                } else if table.is_reachable(destination) {
                    if let Err(e) = trace_route(&tables, node, destination) {
                        report.broken_routes.push(e);
                    }
                }
            }
        }

        report
    }

    /// Poll the published tables until they match the reference distances.
    /// Returns `false` if `timeout` elapses first.
    pub async fn wait_for_convergence(&self, timeout: Duration, poll: Duration) -> bool {
        let deadline = Instant::now() + timeout;

        loop {
            if self.convergence_report().is_converged() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(poll).await;
        }
    }

    /// Signal every actor to stop and wait for them. An actor still blocked
    /// on a full peer inbox after the grace period is aborted. Returns the
    /// final snapshot of every actor that stopped on its own.
    pub async fn shutdown(&mut self) -> Vec<NodeSnapshot> {
        if self.stopped {
            return Vec::new();
        }
        self.stopped = true;

        for handle in self.nodes.values_mut() {
            handle.signal_shutdown();
        }

        let mut finals = Vec::with_capacity(self.nodes.len());
        for handle in self.nodes.values_mut() {
            let Some(task) = handle.task.take() else {
                continue;
            };
            let abort = task.abort_handle();

            match tokio::time::timeout(self.config.shutdown_grace, task).await {
                Ok(Ok(snapshot)) => finals.push(snapshot),
                Ok(Err(e)) => warn!("Node {} task failed: {}", handle.id(), e),
                Err(_) => {
                    warn!(
                        "Node {} did not stop within {:?}, aborting",
                        handle.id(),
                        self.config.shutdown_grace
                    );
                    abort.abort();
                }
            }
        }

        info!(
            "Simulation stopped ({} of {} actors exited cleanly)",
            finals.len(),
            self.nodes.len()
        );
        finals
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        for handle in self.nodes.values_mut() {
            if let Some(task) = handle.task.take() {
                debug!("Aborting node {} on drop", handle.id());
                task.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dv_topology::Link;

    const CONVERGENCE_TIMEOUT: Duration = Duration::from_secs(60);
    const POLL: Duration = Duration::from_millis(100);

    fn fast_config() -> NodeConfig {
        NodeConfig {
            broadcast_interval: Duration::from_millis(200),
            ..NodeConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sample_topology_converges() {
        let mut sim = Simulation::start(Topology::sample(), fast_config()).unwrap();
        assert!(sim.wait_for_convergence(CONVERGENCE_TIMEOUT, POLL).await);

        let node0 = sim.snapshot(0).unwrap();
        assert_eq!(node0.table.costs(), &[0, 1, 2, 4]);
        assert_eq!(node0.table.next_hop(0), Some(0));
        assert_eq!(node0.table.next_hop(1), Some(1));
        assert_eq!(node0.table.next_hop(2), Some(1));

        let tables: Vec<CostVector> = sim.snapshots().into_iter().map(|s| s.table).collect();
        // Node 3 is reached through the 2--3 link, not the direct cost-7 link
        let path = trace_route(&tables, 0, 3).unwrap();
        assert_eq!(path.first(), Some(&0));
        assert_eq!(path.last(), Some(&3));
        assert_eq!(path[path.len() - 2], 2);
        assert_ne!(node0.table.next_hop(3), Some(3));

        for snapshot in sim.snapshots() {
            assert_eq!(snapshot.table.cost(snapshot.id), 0);
            for (dst, &shortcut) in snapshot.shortcuts.iter().enumerate() {
                assert!(snapshot.table.cost(dst) <= shortcut);
            }
        }

        sim.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeats_keep_converged_tables() {
        let mut sim = Simulation::start(Topology::sample(), fast_config()).unwrap();
        assert!(sim.wait_for_convergence(CONVERGENCE_TIMEOUT, POLL).await);
        let before = sim.snapshots();

        tokio::time::sleep(Duration::from_secs(5)).await;
        let after = sim.snapshots();

        for (old, new) in before.iter().zip(&after) {
            assert_eq!(old.table, new.table);
            assert!(new.stats.heartbeats_sent > old.stats.heartbeats_sent);
        }

        sim.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_link_propagates() {
        let mut sim = Simulation::start(Topology::sample(), fast_config()).unwrap();
        assert!(sim.wait_for_convergence(CONVERGENCE_TIMEOUT, POLL).await);
        assert_eq!(sim.snapshot(0).unwrap().table.cost(3), 4);

        let previous = sim.update_link(1, 3, 1).await.unwrap();
        assert_eq!(previous, None);
        assert!(sim.wait_for_convergence(CONVERGENCE_TIMEOUT, POLL).await);

        let node0 = sim.snapshot(0).unwrap();
        assert_eq!(node0.table.cost(3), 2);
        assert_eq!(node0.table.next_hop(3), Some(1));
        assert_eq!(sim.snapshot(1).unwrap().shortcuts[3], 1);
        assert_eq!(sim.snapshot(3).unwrap().shortcuts[1], 1);

        sim.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_raised_link_costs_propagate() {
        let mut sim = Simulation::start(Topology::sample(), fast_config()).unwrap();
        assert!(sim.wait_for_convergence(CONVERGENCE_TIMEOUT, POLL).await);

        assert_eq!(sim.update_link(0, 1, 10).await.unwrap(), Some(1));
        assert_eq!(sim.update_link(2, 3, 9).await.unwrap(), Some(2));
        assert!(sim.wait_for_convergence(CONVERGENCE_TIMEOUT, POLL).await);

        // 0 now reaches 1 around through 2, and 3 over its own direct link
        let node0 = sim.snapshot(0).unwrap();
        assert_eq!(node0.table.costs(), &[0, 4, 3, 7]);
        assert_eq!(node0.table.next_hop(1), Some(2));
        assert_eq!(node0.table.next_hop(3), Some(3));
        let node3 = sim.snapshot(3).unwrap();
        assert_eq!(node3.table.cost(1), 10);
        assert_eq!(node3.table.next_hop(1), Some(2));

        sim.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_link_update_changes_nothing() {
        let mut sim = Simulation::start(Topology::sample(), fast_config()).unwrap();

        assert!(matches!(
            sim.update_link(0, 0, 3).await,
            Err(NodeError::Topology(_))
        ));
        assert!(matches!(
            sim.update_link(0, 8, 3).await,
            Err(NodeError::Topology(_))
        ));
        assert_eq!(sim.topology(), &Topology::sample());

        sim.shutdown().await;
        assert!(matches!(sim.update_link(0, 1, 3).await, Err(NodeError::ShutDown)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_larger_ring_converges() {
        let links = (0..8).map(|i| Link::new(i, (i + 1) % 8, 1 + (i as u32 % 3)));
        let topology = Topology::from_links(8, links).unwrap();

        let mut sim = Simulation::start(topology, fast_config()).unwrap();
        assert!(sim.wait_for_convergence(CONVERGENCE_TIMEOUT, POLL).await);
        assert!(sim.convergence_report().is_converged());

        let finals = sim.shutdown().await;
        assert_eq!(finals.len(), 8);
        assert!(sim.is_stopped());
        assert!(sim.shutdown().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_with_saturated_inboxes() {
        let links = (0..6).flat_map(|a| ((a + 1)..6).map(move |b| Link::new(a, b, 1)));
        let topology = Topology::from_links(6, links).unwrap();
        let config = NodeConfig {
            broadcast_interval: Duration::from_millis(1),
            inbox_capacity: 1,
            shutdown_grace: Duration::from_millis(500),
        };

        let mut sim = Simulation::start(topology, config).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        sim.shutdown().await;
        assert!(sim.is_stopped());
        assert_eq!(sim.snapshots().len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_link_update_gives_up_on_saturated_inboxes() {
        let links = (0..6).flat_map(|a| ((a + 1)..6).map(move |b| Link::new(a, b, 1)));
        let topology = Topology::from_links(6, links).unwrap();
        let config = NodeConfig {
            broadcast_interval: Duration::from_millis(1),
            inbox_capacity: 1,
            shutdown_grace: Duration::from_millis(500),
        };

        let mut sim = Simulation::start(topology, config).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let result = tokio::time::timeout(Duration::from_secs(30), sim.update_link(0, 1, 5))
            .await
            .expect("link update must not wait forever");
        assert!(matches!(result, Err(NodeError::InboxFull(_))));
        assert_eq!(sim.topology().link_cost(0, 1), Some(1));

        sim.shutdown().await;
        assert!(sim.is_stopped());
    }

    #[tokio::test]
    async fn test_rejects_unusable_config() {
        let config = NodeConfig {
            inbox_capacity: 0,
            ..NodeConfig::default()
        };
        assert!(matches!(
            Simulation::start(Topology::sample(), config),
            Err(NodeError::Config(_))
        ));

        let config = NodeConfig {
            broadcast_interval: Duration::ZERO,
            ..NodeConfig::default()
        };
        assert!(matches!(
            Simulation::start(Topology::sample(), config),
            Err(NodeError::Config(_))
        ));
    }
}
