//! Live topology distribution hub
//!
//! Delivers a first full snapshot followed by further full snapshots to
//! every concurrent subscriber. Fan-out is best-effort and non-blocking:
//! a saturated subscriber channel drops the update for that subscriber
//! only, so a slow consumer can never stall the membership event loop or
//! its peers. A lagging subscriber catches up on the next update or by
//! re-subscribing.

use observer_api::{TopologyUpdate, UpdateType};
use observer_mesh::{Mesh, MeshEvent};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::topology::TopologyBuilder;

/// Per-subscriber channel capacity. Updates beyond this are dropped for
/// that subscriber until it drains.
const SUBSCRIBER_BUFFER: usize = 10;

/// Fan-out hub for topology snapshot updates.
pub struct TopologyHub {
    builder: TopologyBuilder,
    subscribers: Mutex<HashMap<u64, mpsc::Sender<TopologyUpdate>>>,
    next_id: AtomicU64,
}

impl TopologyHub {
    /// Create the hub and subscribe it to membership changes. Joins and
    /// leaves trigger a rebuild and broadcast; member updates do not.
    pub fn new(builder: TopologyBuilder, mesh: &Mesh) -> Arc<Self> {
        let hub = Arc::new(Self {
            builder,
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        });

        let mut events = mesh.subscribe();
        let weak = Arc::downgrade(&hub);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(MeshEvent::Join(_)) | Ok(MeshEvent::Leave(_)) => {
                        let Some(hub) = weak.upgrade() else { break };
                        hub.broadcast().await;
                    }
                    Ok(MeshEvent::Update(_)) => {}
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        // Each update triggers a full rebuild anyway; the
                        // next one reflects everything we missed.
                        warn!("Membership event stream lagged by {} events", missed);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        hub
    }

    /// Register a new subscriber.
    ///
    /// The returned subscription already holds a freshly built FULL update,
    /// queued before registration so it is delivered ahead of any
    /// membership-triggered broadcast that races with the subscribe.
    pub async fn subscribe(self: &Arc<Self>) -> Subscription {
        let initial = self.full_update().await;

        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        // Freshly created channel, cannot be full.
        let _ = tx.try_send(initial);

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock_subscribers().insert(id, tx);
        debug!("Topology subscriber {} registered", id);

        Subscription {
            id,
            rx,
            hub: Arc::clone(self),
        }
    }

    /// Build a snapshot and push it to every registered subscriber.
    pub async fn broadcast(&self) {
        if self.lock_subscribers().is_empty() {
            return;
        }

        let update = self.full_update().await;

        let mut closed = Vec::new();
        {
            let subscribers = self.lock_subscribers();
            for (id, tx) in subscribers.iter() {
                match tx.try_send(update.clone()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        // Slow subscriber: drop this update for it. It will
                        // see the next one once it drains.
                        debug!("Subscriber {} saturated, dropping update", id);
                    }
                    Err(TrySendError::Closed(_)) => closed.push(*id),
                }
            }
        }

        if !closed.is_empty() {
            let mut subscribers = self.lock_subscribers();
            for id in closed {
                subscribers.remove(&id);
            }
        }
    }

    /// Number of currently registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers().len()
    }

    async fn full_update(&self) -> TopologyUpdate {
        TopologyUpdate {
            topology: self.builder.build().await,
            update_type: UpdateType::Full,
        }
    }

    fn remove(&self, id: u64) {
        if self.lock_subscribers().remove(&id).is_some() {
            debug!("Topology subscriber {} deregistered", id);
        }
    }

    fn lock_subscribers(&self) -> std::sync::MutexGuard<'_, HashMap<u64, mpsc::Sender<TopologyUpdate>>> {
        // Held only for map manipulation, never across a send or build.
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A registered subscriber. Dropping it deregisters the channel exactly
/// once; the producer simply stops finding it on the next broadcast.
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<TopologyUpdate>,
    hub: Arc<TopologyHub>,
}

impl Subscription {
    /// Wait for the next update. Returns `None` once deregistered.
    pub async fn next(&mut self) -> Option<TopologyUpdate> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.remove(self.id);
    }
}
