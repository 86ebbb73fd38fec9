//! Inbox capability table and per-node handles
//!
//! Actors address each other only through [`PeerTable`], an immutable map
//! from node id to inbox sender built once at startup. The control side keeps
//! one [`NodeHandle`] per node for link updates, snapshots, and shutdown.

use crate::actor::{NodeEvent, NodeSnapshot};
use crate::error::NodeError;
use dv_routing::Advertisement;
use dv_topology::NodeId;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::debug;

/// Id → inbox map shared by all actors
#[derive(Debug, Default)]
pub struct PeerTable {
    inboxes: BTreeMap<NodeId, mpsc::Sender<NodeEvent>>,
}

impl PeerTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node's inbox
    pub fn insert(&mut self, node: NodeId, inbox: mpsc::Sender<NodeEvent>) {
        self.inboxes.insert(node, inbox);
    }

    /// Inbox of one node
    pub fn get(&self, node: NodeId) -> Option<&mpsc::Sender<NodeEvent>> {
        self.inboxes.get(&node)
    }

    /// Send an advertisement to every registered node except those in
    /// `skip`. Waits while a destination inbox is full; closed inboxes are
    /// skipped. Returns the number of inboxes reached.
    pub async fn broadcast(&self, advertisement: Arc<Advertisement>, skip: &[NodeId]) -> usize {
        let mut delivered = 0;

        for (&node, inbox) in &self.inboxes {
            if skip.contains(&node) {
                continue;
            }

            match inbox.send(NodeEvent::Advertisement(advertisement.clone())).await {
                Ok(()) => delivered += 1,
                Err(_) => {
                    debug!(
                        "Inbox of node {} closed, dropping advertisement from {}",
                        node, advertisement.source
                    );
                }
            }
        }

        delivered
    }
}

/// Control-side handle to one running node actor
#[derive(Debug)]
pub struct NodeHandle {
    /// Node id
    pub(crate) id: NodeId,
    /// Inbox of the actor
    pub(crate) inbox: mpsc::Sender<NodeEvent>,
    /// Shutdown signal, taken when sent
    pub(crate) shutdown: Option<oneshot::Sender<()>>,
    /// Latest published state
    pub(crate) snapshot: watch::Receiver<NodeSnapshot>,
    /// Actor task, taken when joined
    pub(crate) task: Option<JoinHandle<NodeSnapshot>>,
}

impl NodeHandle {
    /// Node id
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Latest state published by the actor
    pub fn snapshot(&self) -> NodeSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Reserve one slot in the actor's inbox, waiting at most `limit`
    pub(crate) async fn reserve(
        &self,
        limit: Duration,
    ) -> Result<mpsc::Permit<'_, NodeEvent>, NodeError> {
        match tokio::time::timeout(limit, self.inbox.reserve()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(NodeError::InboxClosed(self.id)),
            Err(_) => Err(NodeError::InboxFull(self.id)),
        }
    }

    /// Signal shutdown. Returns `false` if it was already signalled.
    pub(crate) fn signal_shutdown(&mut self) -> bool {
        match self.shutdown.take() {
            Some(tx) => {
                // The actor may already be gone; that is fine
                let _ = tx.send(());
                true
            }
            None => false,
        }
    }
}
