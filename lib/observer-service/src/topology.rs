//! Topology builder
//!
//! Converts the current membership snapshot into a fresh, immutable
//! topology of logical services. Building is a pure read of the mesh and
//! may be invoked at any rate.

use observer_api::{Service, ServiceInfo, ServiceStatus, Topology};
use observer_mesh::{Member, MemberStatus, Mesh};
use std::sync::Arc;
use tracing::warn;

/// Tag holding the structured multi-service announcement (JSON array).
const SERVICES_TAG: &str = "services";

/// Legacy single-service tag pair, kept for backward compatibility.
const SERVICE_NAME_TAG: &str = "service_name";
const SERVICE_TYPE_TAG: &str = "service_type";

/// Builds topology snapshots from mesh membership.
#[derive(Clone)]
pub struct TopologyBuilder {
    mesh: Arc<Mesh>,
}

impl TopologyBuilder {
    pub fn new(mesh: Arc<Mesh>) -> Self {
        Self { mesh }
    }

    /// Build a fresh topology from the current member list.
    ///
    /// Members announce services either through the structured `services`
    /// tag or the legacy `service_name`/`service_type` pair. A member with
    /// neither contributes nothing; it is a pure observer node.
    pub async fn build(&self) -> Topology {
        let members = self.mesh.members().await;
        let mut services = Vec::new();

        for member in &members {
            if let Some(payload) = member.tags.get(SERVICES_TAG) {
                let infos: Vec<ServiceInfo> = match serde_json::from_str(payload) {
                    Ok(infos) => infos,
                    Err(e) => {
                        // Skip this member's services entirely; no partial
                        // fallback to the legacy format.
                        warn!(
                            "Member {} has malformed services tag, skipping: {}",
                            member.name, e
                        );
                        continue;
                    }
                };

                for info in infos {
                    services.push(Service {
                        name: info.name,
                        service_type: info.service_type,
                        address: info.address,
                        node_name: member.name.clone(),
                        upstreams: info.upstreams,
                        status: map_status(member.status),
                        tags: member.tags.clone(),
                    });
                }
            } else if let Some(service) = legacy_service(member) {
                services.push(service);
            }
            // Neither format present: observer-only node, no services.
        }

        Topology {
            services,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Build a service from the legacy single-service tag pair, if present.
fn legacy_service(member: &Member) -> Option<Service> {
    let service_type = member.tags.get(SERVICE_TYPE_TAG)?;
    if service_type.is_empty() {
        return None;
    }

    Some(Service {
        name: member
            .tags
            .get(SERVICE_NAME_TAG)
            .cloned()
            .unwrap_or_default(),
        service_type: service_type.clone(),
        address: member.addr.clone(),
        node_name: member.name.clone(),
        upstreams: Vec::new(),
        status: map_status(member.status),
        tags: member.tags.clone(),
    })
}

/// Map a member's liveness status into the coarser service classification.
fn map_status(status: MemberStatus) -> ServiceStatus {
    match status {
        MemberStatus::Alive => ServiceStatus::Healthy,
        MemberStatus::Leaving | MemberStatus::Left | MemberStatus::Failed => {
            ServiceStatus::Unhealthy
        }
        MemberStatus::Unknown => ServiceStatus::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use observer_mesh::MeshConfig;

    fn mesh() -> Arc<Mesh> {
        Arc::new(
            Mesh::new(MeshConfig {
                node_name: "observer".to_string(),
                ..Default::default()
            })
            .unwrap(),
        )
    }

    fn member(name: &str, tags: &[(&str, &str)], status: MemberStatus) -> Member {
        Member {
            name: name.to_string(),
            addr: "10.0.0.1".to_string(),
            port: 7946,
            tags: tags
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            status,
        }
    }

    #[tokio::test]
    async fn test_structured_tag_produces_all_services() {
        let mesh = mesh();
        mesh.handle_join(member(
            "n1",
            &[(
                "services",
                r#"[{"name": "api", "type": "http", "address": "10.0.0.1:8080"},
                    {"name": "db", "type": "postgres", "address": "10.0.0.1:5432"}]"#,
            )],
            MemberStatus::Alive,
        ))
        .await;

        let topology = TopologyBuilder::new(mesh).build().await;
        assert_eq!(topology.services.len(), 2);
        assert!(topology.services.iter().all(|s| s.node_name == "n1"));
        assert!(topology
            .services
            .iter()
            .all(|s| s.status == ServiceStatus::Healthy));
    }

    #[tokio::test]
    async fn test_legacy_tag_pair_produces_one_service() {
        let mesh = mesh();
        mesh.handle_join(member(
            "n1",
            &[("service_name", "api"), ("service_type", "http")],
            MemberStatus::Alive,
        ))
        .await;

        let topology = TopologyBuilder::new(mesh).build().await;
        assert_eq!(topology.services.len(), 1);
        assert_eq!(topology.services[0].name, "api");
        assert_eq!(topology.services[0].service_type, "http");
        assert_eq!(topology.services[0].address, "10.0.0.1");
    }

    #[tokio::test]
    async fn test_malformed_structured_tag_skips_member_only() {
        let mesh = mesh();
        mesh.handle_join(member(
            "bad",
            &[
                ("services", "{not json"),
                // Legacy pair present but must not be used as fallback.
                ("service_name", "api"),
                ("service_type", "http"),
            ],
            MemberStatus::Alive,
        ))
        .await;
        mesh.handle_join(member(
            "good",
            &[("service_name", "db"), ("service_type", "postgres")],
            MemberStatus::Alive,
        ))
        .await;

        let topology = TopologyBuilder::new(mesh).build().await;
        assert_eq!(topology.services.len(), 1);
        assert_eq!(topology.services[0].node_name, "good");
    }

    #[tokio::test]
    async fn test_member_without_service_tags_contributes_nothing() {
        let mesh = mesh();
        mesh.handle_join(member("plain", &[("role", "relay")], MemberStatus::Alive))
            .await;

        let topology = TopologyBuilder::new(mesh).build().await;
        assert!(topology.services.is_empty());
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let cases = [
            (MemberStatus::Alive, ServiceStatus::Healthy),
            (MemberStatus::Leaving, ServiceStatus::Unhealthy),
            (MemberStatus::Left, ServiceStatus::Unhealthy),
            (MemberStatus::Failed, ServiceStatus::Unhealthy),
            (MemberStatus::Unknown, ServiceStatus::Unknown),
        ];

        for (member_status, expected) in cases {
            assert_eq!(map_status(member_status), expected);
        }
    }

    #[tokio::test]
    async fn test_rebuild_without_change_is_identical_modulo_timestamp() {
        let mesh = mesh();
        mesh.handle_join(member(
            "n1",
            &[("service_name", "api"), ("service_type", "http")],
            MemberStatus::Alive,
        ))
        .await;

        let builder = TopologyBuilder::new(mesh);
        let first = builder.build().await;
        let second = builder.build().await;

        assert_eq!(first.services.len(), second.services.len());
        for (a, b) in first.services.iter().zip(second.services.iter()) {
            assert_eq!(a.name, b.name);
            assert_eq!(a.service_type, b.service_type);
            assert_eq!(a.address, b.address);
            assert_eq!(a.status, b.status);
        }
    }

    #[tokio::test]
    async fn test_tags_inherited_from_member() {
        let mesh = mesh();
        mesh.handle_join(member(
            "n1",
            &[
                ("service_name", "api"),
                ("service_type", "http"),
                ("zone", "eu-1"),
            ],
            MemberStatus::Alive,
        ))
        .await;

        let topology = TopologyBuilder::new(mesh).build().await;
        assert_eq!(
            topology.services[0].tags.get("zone").map(String::as_str),
            Some("eu-1")
        );
    }
}
