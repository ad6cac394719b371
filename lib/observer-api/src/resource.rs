//! Resource metadata types
//!
//! Resources describe the data a service exposes. They are fetched lazily
//! from the service's own metadata endpoint, routed through the mesh, and
//! live only for the duration of the request that asked for them.

use serde::{Deserialize, Serialize};

/// A single field of a resource: a name, a type, and either an enumerated
/// value set or a numeric min/max range.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

/// Metadata for one resource exposed by a service.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub name: String,
    pub row_count: i32,
    pub plural_name: String,
    pub fields: Vec<Field>,
}

/// Request body for the single-hop metadata fetch forwarded to a peer.
///
/// `path` is the remaining route to the target (the observer's own name
/// already stripped); the receiving peer either answers locally or keeps
/// forwarding along it.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaResourcesRequest {
    pub service_name: String,
    pub path: Vec<String>,
    pub current_hop: u32,
}

/// Resources reported by one service in a peer's metadata response.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaServiceResources {
    pub service_name: String,
    pub resources: Vec<Resource>,
}

/// Nested metadata listing returned by a peer.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaResourcesResponse {
    pub services: Vec<MetaServiceResources>,
}
