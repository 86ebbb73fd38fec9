//! Node actor: the only writer of one node's routing state.
//!
//! Each actor runs as its own tokio task and waits on three event sources:
//! its shutdown signal, the periodic broadcast tick, and its inbox. Shutdown
//! is polled first so a pending signal wins over queued advertisements.

use crate::registry::PeerTable;
use dv_routing::{Advertisement, CostVector, DistanceVector, RelaxStats};
use dv_topology::{Cost, NodeId};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace};

/// Runtime settings shared by all node actors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Period of the unconditional vector broadcast
    pub broadcast_interval: Duration,
    /// Capacity of each node's inbox
    pub inbox_capacity: usize,
    /// How long shutdown waits for each actor before aborting it. Also bounds
    /// how long a link update waits for inbox space.
    pub shutdown_grace: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            broadcast_interval: Duration::from_secs(1),
            inbox_capacity: 100,
            shutdown_grace: Duration::from_secs(2),
        }
    }
}

/// Events delivered through a node's inbox
#[derive(Debug, Clone)]
pub enum NodeEvent {
    /// Cost vector of another node
    Advertisement(Arc<Advertisement>),
    /// Direct link to `peer` now costs `cost`
    SetLink {
        /// Other endpoint of the link
        peer: NodeId,
        /// New link cost
        cost: Cost,
    },
}

/// Actor-level counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NodeStats {
    /// Relaxation counters
    pub relax: RelaxStats,
    /// Periodic broadcasts sent
    pub heartbeats_sent: u64,
    /// Targeted re-broadcasts sent after a table change
    pub rebroadcasts_sent: u64,
    /// Link updates that changed the route to the peer
    pub link_updates: u64,
}

/// State published by an actor after every event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSnapshot {
    /// Node id
    pub id: NodeId,
    /// Current routes
    pub table: CostVector,
    /// Current direct link costs
    pub shortcuts: Vec<Cost>,
    /// Counters
    pub stats: NodeStats,
}

/// One node's actor
#[derive(Debug)]
pub struct NodeActor {
    state: DistanceVector,
    peers: Arc<PeerTable>,
    published: watch::Sender<NodeSnapshot>,
    broadcast_interval: Duration,
    heartbeats_sent: u64,
    rebroadcasts_sent: u64,
    link_updates: u64,
}

impl NodeActor {
    /// Create an actor and the receiver its snapshots are published on
    pub fn new(
        state: DistanceVector,
        peers: Arc<PeerTable>,
        broadcast_interval: Duration,
    ) -> (Self, watch::Receiver<NodeSnapshot>) {
        let initial = NodeSnapshot {
            id: state.id(),
            table: state.table().clone(),
            shortcuts: state.shortcuts().to_vec(),
            stats: NodeStats::default(),
        };
        let (published, snapshot_rx) = watch::channel(initial);

        let actor = Self {
            state,
            peers,
            published,
            broadcast_interval,
            heartbeats_sent: 0,
            rebroadcasts_sent: 0,
            link_updates: 0,
        };
        (actor, snapshot_rx)
    }

    /// Node id
    pub fn id(&self) -> NodeId {
        self.state.id()
    }

    /// Main loop. Returns the final snapshot once shutdown is signalled (or
    /// the shutdown sender is dropped, or the inbox closes).
    pub async fn run(
        mut self,
        mut inbox: mpsc::Receiver<NodeEvent>,
        mut shutdown: oneshot::Receiver<()>,
    ) -> NodeSnapshot {
        info!("Node {} started", self.id());

        let mut ticker = tokio::time::interval(self.broadcast_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                signal = &mut shutdown => {
                    if signal.is_err() {
                        debug!("Node {} shutdown handle dropped", self.id());
                    }
                    break;
                }

                _ = ticker.tick() => {
                    self.broadcast_vector().await;
                }

                event = inbox.recv() => {
                    match event {
                        Some(event) => self.handle_event(event).await,
                        None => {
                            debug!("Node {} inbox closed", self.id());
                            break;
                        }
                    }
                }
            }

            self.publish();
        }

        let snapshot = self.snapshot();
        info!(
            "Node {} stopped: {} advertisements applied, {} route changes, \
             {} heartbeats, {} re-broadcasts",
            self.id(),
            snapshot.stats.relax.advertisements_applied,
            snapshot.stats.relax.route_changes,
            snapshot.stats.heartbeats_sent,
            snapshot.stats.rebroadcasts_sent
        );
        snapshot
    }

    /// Heartbeat: send the current vector to every other node
    async fn broadcast_vector(&mut self) {
        let advertisement = Arc::new(self.state.advertisement());
        let delivered = self.peers.broadcast(advertisement, &[self.id()]).await;
        self.heartbeats_sent += 1;
        trace!("Node {} heartbeat reached {} peers", self.id(), delivered);
    }

    async fn handle_event(&mut self, event: NodeEvent) {
        match event {
            NodeEvent::Advertisement(advertisement) => self.apply_update(&advertisement).await,
            NodeEvent::SetLink { peer, cost } => {
                if let Some(change) = self.state.set_link(peer, cost) {
                    info!(
                        "Node {} link to {} set to {} (route cost {} -> {})",
                        self.id(),
                        peer,
                        cost,
                        change.old_cost,
                        change.new_cost
                    );
                    self.link_updates += 1;
                }
            }
        }
    }

    /// Relax against one advertisement; if anything changed, send one
    /// re-broadcast of the resulting vector to everyone except the sender.
    async fn apply_update(&mut self, advertisement: &Advertisement) {
        let outcome = self.state.apply(advertisement);
        if !outcome.changed() {
            return;
        }

        let update = Arc::new(self.state.advertisement());
        let delivered = self
            .peers
            .broadcast(update, &[self.id(), advertisement.source])
            .await;
        self.rebroadcasts_sent += 1;
        debug!(
            "Node {} re-broadcast after {} changes from {} to {} peers",
            self.id(),
            outcome.changes.len(),
            advertisement.source,
            delivered
        );
    }

    fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            id: self.id(),
            table: self.state.table().clone(),
            shortcuts: self.state.shortcuts().to_vec(),
            stats: NodeStats {
                relax: self.state.stats().clone(),
                heartbeats_sent: self.heartbeats_sent,
                rebroadcasts_sent: self.rebroadcasts_sent,
                link_updates: self.link_updates,
            },
        }
    }

    fn publish(&self) {
        self.published.send_replace(self.snapshot());
    }
}
