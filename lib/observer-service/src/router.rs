//! Resource router
//!
//! Answers "fetch resource metadata for service S" by locating S in the
//! current topology, computing a path from this observer node to S's host,
//! and forwarding one request to the first hop on that path. The entry
//! peer either answers locally or keeps forwarding along the remaining
//! path; the observer itself performs exactly one network hop.

use observer_api::{MetaResourcesRequest, Resource, Service, Topology};
use observer_core::{CoreError, Graph, Result};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::client::MetaFetch;
use crate::topology::TopologyBuilder;

pub struct ResourceRouter {
    node_name: String,
    builder: TopologyBuilder,
    graph: Arc<Graph>,
    client: Arc<dyn MetaFetch>,
}

impl ResourceRouter {
    pub fn new(
        node_name: String,
        builder: TopologyBuilder,
        graph: Arc<Graph>,
        client: Arc<dyn MetaFetch>,
    ) -> Self {
        Self {
            node_name,
            builder,
            graph,
            client,
        }
    }

    /// Fetch resource metadata for the named service.
    ///
    /// The topology and path are computed once at the start of the request
    /// and used for its whole duration. If the chosen entry peer fails,
    /// the request fails; there is no failover to an alternate entry node.
    pub async fn fetch_service_resources(&self, service_name: &str) -> Result<Vec<Resource>> {
        let topology = self.builder.build().await;

        let target = find_service(&topology, service_name)
            .ok_or_else(|| CoreError::NotFound(format!("service {:?} not found", service_name)))?;

        let path = self
            .graph
            .find_path(&self.node_name, &target.node_name)
            .await
            .ok_or_else(|| {
                CoreError::Unavailable(format!("no route to node {:?}", target.node_name))
            })?;

        // A single-element path means the target resolved to this node;
        // routing to self through the mesh is never valid.
        if path.len() < 2 {
            warn!(
                "Degenerate path for service {:?}: {:?}",
                service_name, path
            );
            return Err(CoreError::Internal(format!("invalid path: {:?}", path)));
        }

        let entry_node = &path[1];
        let entry_addr = entry_service_address(&topology, entry_node).ok_or_else(|| {
            warn!(
                "No service address for entry node {:?} on path {:?}",
                entry_node, path
            );
            CoreError::Internal(format!("no service address for entry node {:?}", entry_node))
        })?;

        let request = MetaResourcesRequest {
            service_name: service_name.to_string(),
            // Strip our own name; the peer continues from the entry node.
            path: path[1..].to_vec(),
            current_hop: 0,
        };

        debug!(
            "Routing resource fetch for {:?} via {} ({})",
            service_name, entry_node, entry_addr
        );

        let listing = self.client.fetch_resources(&entry_addr, &request).await?;

        let mut resources = Vec::new();
        for service in listing.services {
            resources.extend(service.resources);
        }

        Ok(resources)
    }
}

fn find_service<'a>(topology: &'a Topology, name: &str) -> Option<&'a Service> {
    topology.services.iter().find(|s| s.name == name)
}

/// Advertised address of the first service hosted on `node`, if any.
fn entry_service_address(topology: &Topology, node: &str) -> Option<String> {
    topology
        .services
        .iter()
        .find(|s| s.node_name == node)
        .map(|s| s.address.clone())
        .filter(|addr| !addr.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use observer_api::{Field, MetaResourcesResponse, MetaServiceResources};
    use observer_mesh::{Member, MemberStatus, Mesh, MeshConfig};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Mock peer that records the forwarded request and returns a canned
    /// listing.
    struct FixedMeta {
        listing: MetaResourcesResponse,
        seen: Mutex<Option<(String, MetaResourcesRequest)>>,
    }

    impl FixedMeta {
        fn new(listing: MetaResourcesResponse) -> Self {
            Self {
                listing,
                seen: Mutex::new(None),
            }
        }

        fn empty() -> Self {
            Self::new(MetaResourcesResponse { services: vec![] })
        }
    }

    #[async_trait]
    impl MetaFetch for FixedMeta {
        async fn fetch_resources(
            &self,
            addr: &str,
            request: &MetaResourcesRequest,
        ) -> std::result::Result<MetaResourcesResponse, CoreError> {
            *self.seen.lock().unwrap() = Some((addr.to_string(), request.clone()));
            Ok(self.listing.clone())
        }
    }

    fn mesh() -> Arc<Mesh> {
        Arc::new(
            Mesh::new(MeshConfig {
                node_name: "observer".to_string(),
                ..Default::default()
            })
            .unwrap(),
        )
    }

    async fn join_service_node(mesh: &Mesh, node: &str, service: &str, addr: &str) {
        let mut tags = HashMap::new();
        tags.insert(
            "services".to_string(),
            format!(r#"[{{"name": "{service}", "type": "http", "address": "{addr}"}}]"#),
        );
        mesh.handle_join(Member {
            name: node.to_string(),
            addr: "10.0.0.1".to_string(),
            port: 7946,
            tags,
            status: MemberStatus::Alive,
        })
        .await;
    }

    async fn join_plain_node(mesh: &Mesh, node: &str) {
        mesh.handle_join(Member {
            name: node.to_string(),
            addr: "10.0.0.9".to_string(),
            port: 7946,
            tags: HashMap::new(),
            status: MemberStatus::Alive,
        })
        .await;
    }

    fn router(mesh: &Arc<Mesh>, client: Arc<dyn MetaFetch>) -> ResourceRouter {
        ResourceRouter::new(
            "observer".to_string(),
            TopologyBuilder::new(Arc::clone(mesh)),
            mesh.graph(),
            client,
        )
    }

    #[tokio::test]
    async fn test_unknown_service_is_not_found() {
        let mesh = mesh();
        let router = router(&mesh, Arc::new(FixedMeta::empty()));

        let err = router.fetch_service_resources("ghost").await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unreachable_node_is_unavailable() {
        let mesh = mesh();
        join_service_node(&mesh, "n1", "api", "10.0.0.1:8080").await;
        // No graph edges at all: n1 is unreachable from the observer.

        let router = router(&mesh, Arc::new(FixedMeta::empty()));
        let err = router.fetch_service_resources("api").await.unwrap_err();
        assert!(matches!(err, CoreError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_route_to_self_is_internal() {
        let mesh = mesh();
        // A service claiming to be hosted on the observer node itself.
        join_service_node(&mesh, "observer", "local", "10.0.0.1:8080").await;

        let router = router(&mesh, Arc::new(FixedMeta::empty()));
        let err = router.fetch_service_resources("local").await.unwrap_err();
        assert!(matches!(err, CoreError::Internal(_)));
    }

    #[tokio::test]
    async fn test_entry_node_without_address_is_internal() {
        let mesh = mesh();
        join_plain_node(&mesh, "relay").await;
        join_service_node(&mesh, "n2", "api", "10.0.0.2:8080").await;
        mesh.graph().update("observer", vec!["relay".to_string()]).await;
        mesh.graph().update("relay", vec!["n2".to_string()]).await;

        let router = router(&mesh, Arc::new(FixedMeta::empty()));
        let err = router.fetch_service_resources("api").await.unwrap_err();
        assert!(matches!(err, CoreError::Internal(_)));
    }

    #[tokio::test]
    async fn test_forwards_via_first_hop_with_stripped_path() {
        let mesh = mesh();
        join_service_node(&mesh, "n1", "edge", "10.0.0.1:8080").await;
        join_service_node(&mesh, "n2", "api", "10.0.0.2:8080").await;
        mesh.graph().update("observer", vec!["n1".to_string()]).await;
        mesh.graph().update("n1", vec!["n2".to_string()]).await;

        let listing = MetaResourcesResponse {
            services: vec![MetaServiceResources {
                service_name: "api".to_string(),
                resources: vec![Resource {
                    name: "order".to_string(),
                    row_count: 7,
                    plural_name: "orders".to_string(),
                    fields: vec![Field {
                        name: "id".to_string(),
                        field_type: "string".to_string(),
                        values: vec![],
                        min: None,
                        max: None,
                    }],
                }],
            }],
        };
        let client = Arc::new(FixedMeta::new(listing));
        let router = router(&mesh, client.clone());

        let resources = router.fetch_service_resources("api").await.unwrap();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].name, "order");
        assert_eq!(resources[0].row_count, 7);

        let (addr, request) = client.seen.lock().unwrap().clone().unwrap();
        assert_eq!(addr, "10.0.0.1:8080");
        assert_eq!(request.service_name, "api");
        assert_eq!(request.path, vec!["n1", "n2"]);
        assert_eq!(request.current_hop, 0);
    }

    #[tokio::test]
    async fn test_flattens_multi_service_listing() {
        let mesh = mesh();
        join_service_node(&mesh, "n1", "api", "10.0.0.1:8080").await;
        mesh.graph().update("observer", vec!["n1".to_string()]).await;

        let resource = |name: &str| Resource {
            name: name.to_string(),
            row_count: 1,
            plural_name: format!("{name}s"),
            fields: vec![],
        };
        let listing = MetaResourcesResponse {
            services: vec![
                MetaServiceResources {
                    service_name: "api".to_string(),
                    resources: vec![resource("user"), resource("order")],
                },
                MetaServiceResources {
                    service_name: "billing".to_string(),
                    resources: vec![resource("invoice")],
                },
            ],
        };
        let router = router(&mesh, Arc::new(FixedMeta::new(listing)));

        let resources = router.fetch_service_resources("api").await.unwrap();
        let names: Vec<_> = resources.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["user", "order", "invoice"]);
    }

    #[tokio::test]
    async fn test_peer_failure_propagates_without_failover() {
        struct FailingMeta;

        #[async_trait]
        impl MetaFetch for FailingMeta {
            async fn fetch_resources(
                &self,
                addr: &str,
                _request: &MetaResourcesRequest,
            ) -> std::result::Result<MetaResourcesResponse, CoreError> {
                Err(CoreError::Unavailable(format!("peer {} down", addr)))
            }
        }

        let mesh = mesh();
        join_service_node(&mesh, "n1", "edge", "10.0.0.1:8080").await;
        join_service_node(&mesh, "n2", "api", "10.0.0.2:8080").await;
        mesh.graph()
            .update("observer", vec!["n1".to_string(), "n2".to_string()])
            .await;

        let router = router(&mesh, Arc::new(FailingMeta));
        let err = router.fetch_service_resources("api").await.unwrap_err();
        assert!(matches!(err, CoreError::Unavailable(_)));
    }
}
