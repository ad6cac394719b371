//! Core topology functionality for the mesh observer
//!
//! This library provides:
//! - The mesh connectivity graph with shortest-path queries
//! - The neighbor-announcement event format carried over gossip
//! - The error taxonomy shared by the routing layer

pub mod error;
pub mod graph;

pub use error::{CoreError, Result};
pub use graph::{Graph, NeighborAnnouncement};
