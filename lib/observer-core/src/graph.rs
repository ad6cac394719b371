//! Mesh connectivity graph
//!
//! Adjacency is derived from neighbor-list announcements broadcast by mesh
//! nodes. The graph is made symmetric on update: if A announces B, the
//! reverse edge B -> A is back-filled even when B never announces A. This
//! tolerates one-sided announcement loss at the cost of admitting edges
//! that may not reflect true bidirectional reachability.

use serde::Deserialize;
use std::collections::{HashMap, HashSet, VecDeque};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Neighbor-list announcement received from mesh nodes via gossip user
/// events. Field names are kept short on the wire.
#[derive(Debug, Deserialize)]
pub struct NeighborAnnouncement {
    /// Announcing node name
    #[serde(rename = "n")]
    pub node: String,
    /// Direct neighbors of the announcing node
    #[serde(rename = "nb")]
    pub neighbors: Vec<String>,
}

/// The mesh connectivity graph.
///
/// Mutated only by the gossip event loop; read by any number of concurrent
/// path queries. Updates take the write lock, queries take the read lock.
#[derive(Debug)]
pub struct Graph {
    edges: RwLock<HashMap<String, Vec<String>>>,
}

impl Graph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self {
            edges: RwLock::new(HashMap::new()),
        }
    }

    /// Record that `node` can directly reach each name in `neighbors`,
    /// replacing its previous announcement, then back-fill the reverse
    /// edge for every neighbor that doesn't already list `node`.
    pub async fn update(&self, node: &str, neighbors: Vec<String>) {
        let mut edges = self.edges.write().await;

        edges.insert(node.to_string(), neighbors.clone());

        for neighbor in &neighbors {
            let reverse = edges.entry(neighbor.clone()).or_default();
            if !reverse.iter().any(|n| n == node) {
                reverse.push(node.to_string());
            }
        }

        debug!("Topology updated: {} -> {:?}", node, neighbors);
    }

    /// Apply a raw announcement payload received over gossip.
    ///
    /// Malformed payloads are logged and ignored; they are asynchronous
    /// background input and must never corrupt existing edges or surface
    /// as a request-level error.
    pub async fn apply_event(&self, payload: &[u8]) {
        let announcement: NeighborAnnouncement = match serde_json::from_slice(payload) {
            Ok(a) => a,
            Err(e) => {
                warn!("Failed to parse topology event: {}", e);
                return;
            }
        };

        self.update(&announcement.node, announcement.neighbors).await;
    }

    /// Find the shortest path from `from` to `to` by hop count using BFS.
    ///
    /// Returns `Some(vec![from])` when `from == to` and `None` when no
    /// path exists. Absence of a route is an expected condition, not an
    /// error. The tie-break among equal-length paths is unspecified.
    pub async fn find_path(&self, from: &str, to: &str) -> Option<Vec<String>> {
        let edges = self.edges.read().await;

        if from == to {
            return Some(vec![from.to_string()]);
        }

        let mut queue: VecDeque<Vec<String>> = VecDeque::new();
        queue.push_back(vec![from.to_string()]);

        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(from);

        while let Some(path) = queue.pop_front() {
            let node = path.last().map(String::as_str).unwrap_or(from);

            let Some(neighbors) = edges.get(node) else {
                continue;
            };

            for neighbor in neighbors {
                if neighbor == to {
                    let mut found = path;
                    found.push(neighbor.clone());
                    return Some(found);
                }

                if visited.insert(neighbor) {
                    let mut next = path.clone();
                    next.push(neighbor.clone());
                    queue.push_back(next);
                }
            }
        }

        None
    }

    /// Get a copy of a node's current neighbor list. Unknown nodes yield
    /// an empty list.
    pub async fn neighbors(&self, node: &str) -> Vec<String> {
        let edges = self.edges.read().await;
        edges.get(node).cloned().unwrap_or_default()
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}
