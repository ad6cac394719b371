//! Mesh membership handle
//!
//! The gossip transport delivers join/leave/update notifications and named
//! user events; this handle maintains the member table they describe,
//! republishes membership changes on an explicit broadcast channel, and
//! feeds topology announcements into the connectivity graph.

use observer_core::Graph;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info};

use crate::member::{Member, MemberStatus};

/// Name of the gossip user event carrying neighbor-list announcements.
pub const TOPOLOGY_EVENT: &str = "topology";

/// Capacity of the membership-change broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Error, Debug)]
pub enum MeshError {
    #[error("node name is required")]
    MissingNodeName,
}

/// Configuration for creating a new Mesh
#[derive(Clone, Debug)]
pub struct MeshConfig {
    /// Name of this node in the mesh
    pub node_name: String,
    /// Address the gossip transport binds to
    pub bind_addr: String,
    /// Port the gossip transport binds to
    pub bind_port: u16,
    /// Metadata tags for this node
    pub tags: HashMap<String, String>,
    /// Addresses of existing nodes to join
    pub join_addrs: Vec<String>,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            node_name: String::new(),
            bind_addr: "0.0.0.0".to_string(),
            bind_port: 0,
            tags: HashMap::new(),
            join_addrs: Vec::new(),
        }
    }
}

/// A membership change, published for every join, leave, or update the
/// gossip layer reports.
#[derive(Clone, Debug)]
pub enum MeshEvent {
    Join(Member),
    Leave(Member),
    Update(Member),
}

/// Live view of mesh membership.
///
/// Mutated by the gossip event loop through the `handle_*` intake methods;
/// read concurrently by topology builds. Interested components subscribe
/// to membership changes instead of registering ambient callbacks.
#[derive(Debug)]
pub struct Mesh {
    config: MeshConfig,
    members: RwLock<HashMap<String, Member>>,
    events: broadcast::Sender<MeshEvent>,
    graph: Arc<Graph>,
    left: Mutex<bool>,
}

impl Mesh {
    /// Create a new Mesh with the given configuration
    pub fn new(mut config: MeshConfig) -> Result<Self, MeshError> {
        if config.node_name.is_empty() {
            return Err(MeshError::MissingNodeName);
        }

        if config.bind_addr.is_empty() {
            config.bind_addr = "0.0.0.0".to_string();
        }

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            config,
            members: RwLock::new(HashMap::new()),
            events,
            graph: Arc::new(Graph::new()),
            left: Mutex::new(false),
        })
    }

    /// Register the local node in the member table. Called once after the
    /// gossip transport is up.
    pub async fn start(&self) {
        let local = Member {
            name: self.config.node_name.clone(),
            addr: self.config.bind_addr.clone(),
            port: self.config.bind_port,
            tags: self.config.tags.clone(),
            status: MemberStatus::Alive,
        };

        self.members
            .write()
            .await
            .insert(local.name.clone(), local);

        info!(
            "Mesh node {} up on {}:{}",
            self.config.node_name, self.config.bind_addr, self.config.bind_port
        );
    }

    /// Name of the local node
    pub fn node_name(&self) -> &str {
        &self.config.node_name
    }

    /// The connectivity graph fed by topology announcements
    pub fn graph(&self) -> Arc<Graph> {
        Arc::clone(&self.graph)
    }

    /// Subscribe to membership changes
    pub fn subscribe(&self) -> broadcast::Receiver<MeshEvent> {
        self.events.subscribe()
    }

    /// Snapshot of all currently known members
    pub async fn members(&self) -> Vec<Member> {
        self.members.read().await.values().cloned().collect()
    }

    /// Members carrying a specific tag value
    pub async fn members_by_tag(&self, key: &str, value: &str) -> Vec<Member> {
        self.members
            .read()
            .await
            .values()
            .filter(|m| m.has_tag(key, value))
            .cloned()
            .collect()
    }

    /// Members in a specific liveness status
    pub async fn members_by_status(&self, status: MemberStatus) -> Vec<Member> {
        self.members
            .read()
            .await
            .values()
            .filter(|m| m.status == status)
            .cloned()
            .collect()
    }

    /// Intake for a member-join notification from the gossip layer
    pub async fn handle_join(&self, member: Member) {
        debug!("Member joined: {} ({})", member.name, member.addr);
        self.members
            .write()
            .await
            .insert(member.name.clone(), member.clone());
        self.publish(MeshEvent::Join(member));
    }

    /// Intake for a member-leave or member-failed notification
    pub async fn handle_leave(&self, member: Member) {
        debug!(
            "Member left: {} ({}, {})",
            member.name, member.addr, member.status
        );
        self.members.write().await.remove(&member.name);
        self.publish(MeshEvent::Leave(member));
    }

    /// Intake for a member-update notification (tags or address changed)
    pub async fn handle_update(&self, member: Member) {
        debug!("Member updated: {} ({})", member.name, member.addr);
        self.members
            .write()
            .await
            .insert(member.name.clone(), member.clone());
        self.publish(MeshEvent::Update(member));
    }

    /// Intake for a named gossip user event. Topology announcements feed
    /// the connectivity graph; other event names are ignored.
    pub async fn handle_user_event(&self, name: &str, payload: &[u8]) {
        if name == TOPOLOGY_EVENT {
            self.graph.apply_event(payload).await;
        } else {
            debug!("Ignoring user event {:?}", name);
        }
    }

    /// Gracefully detach from the mesh: mark the local member as left and
    /// publish a single Leave event. Safe to call more than once.
    pub async fn leave(&self) {
        let mut left = self.left.lock().await;
        if *left {
            return;
        }
        *left = true;

        let local = {
            let mut members = self.members.write().await;
            match members.get_mut(&self.config.node_name) {
                Some(member) => {
                    member.status = MemberStatus::Left;
                    member.clone()
                }
                None => return,
            }
        };

        info!("Mesh node {} leaving", local.name);
        self.publish(MeshEvent::Leave(local));
    }

    fn publish(&self, event: MeshEvent) {
        // Nobody subscribed yet is fine; the send result only reports that.
        let _ = self.events.send(event);
    }
}
