//! Wire and data model types for the mesh observer
//!
//! This library provides:
//! - Topology snapshot types (services, statuses, updates)
//! - Resource metadata types exchanged with mesh peers
//! - Request/response payloads for the observer API

pub mod resource;
pub mod topology;

pub use resource::{Field, MetaResourcesRequest, MetaResourcesResponse, MetaServiceResources, Resource};
pub use topology::{
    GetServiceResourcesRequest, GetServiceResourcesResponse, GetTopologyResponse, Service,
    ServiceInfo, ServiceStatus, Topology, TopologyUpdate, UpdateType,
};
