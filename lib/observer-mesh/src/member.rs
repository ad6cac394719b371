//! Mesh member records

use std::collections::HashMap;
use std::fmt;

/// Liveness status of a mesh member as reported by the gossip layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemberStatus {
    Alive,
    Leaving,
    Left,
    Failed,
    Unknown,
}

impl MemberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Alive => "alive",
            MemberStatus::Leaving => "leaving",
            MemberStatus::Left => "left",
            MemberStatus::Failed => "failed",
            MemberStatus::Unknown => "unknown",
        }
    }

    /// Parse the gossip layer's status vocabulary. Anything unrecognized
    /// maps to `Unknown`.
    pub fn parse(status: &str) -> Self {
        match status {
            "alive" => MemberStatus::Alive,
            "leaving" => MemberStatus::Leaving,
            "left" => MemberStatus::Left,
            "failed" => MemberStatus::Failed,
            _ => MemberStatus::Unknown,
        }
    }
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A participant in the gossip mesh.
#[derive(Clone, Debug)]
pub struct Member {
    /// Unique name of the member within the mesh
    pub name: String,
    /// Network address of the member
    pub addr: String,
    /// Gossip port of the member
    pub port: u16,
    /// Free-form metadata tags
    pub tags: HashMap<String, String>,
    /// Liveness status
    pub status: MemberStatus,
}

impl Member {
    /// Check whether the member carries a tag with the given value.
    pub fn has_tag(&self, key: &str, value: &str) -> bool {
        self.tags.get(key).map(String::as_str) == Some(value)
    }
}
