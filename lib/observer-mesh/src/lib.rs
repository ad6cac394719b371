//! Membership surface of the gossip mesh
//!
//! The gossip transport itself is an external collaborator; this library
//! is the in-process view it drives. It provides:
//! - Member records with liveness status and free-form tags
//! - The Mesh handle: member table, event intake, membership-change
//!   broadcast, and the connectivity graph fed by gossip user events

pub mod member;
pub mod mesh;

pub use member::{Member, MemberStatus};
pub use mesh::{Mesh, MeshConfig, MeshError, MeshEvent, TOPOLOGY_EVENT};
