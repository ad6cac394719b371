//! Topology snapshot types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::resource::Resource;

/// Coarse liveness classification of a service, derived from its hosting
/// node's membership status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Unknown,
    Healthy,
    Unhealthy,
}

/// A logical, addressable unit of functionality hosted on a mesh node.
///
/// Resource metadata is intentionally absent: it is fetched on demand via
/// the resource router and never cached in the snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub name: String,
    #[serde(rename = "type")]
    pub service_type: String,
    pub address: String,
    pub node_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub upstreams: Vec<String>,
    pub status: ServiceStatus,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub tags: HashMap<String, String>,
}

/// An immutable snapshot of all currently known services.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topology {
    pub services: Vec<Service>,
    /// Wall-clock build time in milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// How a pushed topology update relates to previous ones. Every update is
/// a complete snapshot; incremental diffs are never computed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdateType {
    Full,
}

/// A single update pushed to a topology subscriber.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopologyUpdate {
    pub topology: Topology,
    pub update_type: UpdateType,
}

/// Structured multi-service announcement carried in a member's `services`
/// tag as a JSON array.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub service_type: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub upstreams: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTopologyResponse {
    pub topology: Topology,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetServiceResourcesRequest {
    pub service_name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetServiceResourcesResponse {
    pub resources: Vec<Resource>,
}
