//! Topology synthesis and routing layer
//!
//! This library provides:
//! - The topology builder turning membership records into logical services
//! - The live distribution hub fanning out snapshot updates to subscribers
//! - The resource router forwarding metadata fetches through the mesh

pub mod client;
pub mod hub;
pub mod router;
pub mod topology;

pub use client::{HttpMetaClient, MetaFetch};
pub use hub::{Subscription, TopologyHub};
pub use router::ResourceRouter;
pub use topology::TopologyBuilder;
