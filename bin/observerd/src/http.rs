//! Observer API server
//!
//! Serves the topology API over HTTP/1.1 with JSON payloads:
//! - `POST /observer.v1.ObserverService/GetTopology` — one snapshot
//! - `POST /observer.v1.ObserverService/WatchTopology` — NDJSON stream of
//!   snapshot updates, full first, until the client disconnects
//! - `POST /observer.v1.ObserverService/GetServiceResources` — routed
//!   metadata fetch

use futures::stream;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::{Bytes, Frame};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::tokio::TokioIo;
use observer_api::{GetServiceResourcesRequest, GetServiceResourcesResponse, GetTopologyResponse};
use observer_core::CoreError;
use observer_service::{ResourceRouter, Subscription, TopologyBuilder, TopologyHub};
use serde::Serialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

const GET_TOPOLOGY_PATH: &str = "/observer.v1.ObserverService/GetTopology";
const WATCH_TOPOLOGY_PATH: &str = "/observer.v1.ObserverService/WatchTopology";
const GET_SERVICE_RESOURCES_PATH: &str = "/observer.v1.ObserverService/GetServiceResources";

/// How long open sessions are given to finish once shutdown starts.
const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

type ApiBody = BoxBody<Bytes, Infallible>;

/// Shared state handed to every request handler.
pub struct ApiContext {
    pub builder: TopologyBuilder,
    pub hub: Arc<TopologyHub>,
    pub router: Arc<ResourceRouter>,
}

/// Accept connections until shutdown is signalled, then drain open
/// sessions within a bounded timeout. Streaming sessions keep being
/// served during the drain window.
pub async fn serve(
    addr: SocketAddr,
    context: Arc<ApiContext>,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Observer API listening on {}", addr);

    let mut sessions = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => {
                let (stream, peer_addr) = accepted?;
                let io = TokioIo::new(stream);
                let context = context.clone();

                sessions.spawn(async move {
                    let service = service_fn(move |req| handle(req, context.clone()));
                    if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                        debug!("Error serving connection from {}: {}", peer_addr, e);
                    }
                });
            }
        }
    }

    drop(listener);
    info!("Draining open API sessions");

    let drain = async {
        while sessions.join_next().await.is_some() {}
    };
    if tokio::time::timeout(SHUTDOWN_DRAIN_TIMEOUT, drain).await.is_err() {
        warn!(
            "Shutdown drain timeout after {:?}, aborting remaining sessions",
            SHUTDOWN_DRAIN_TIMEOUT
        );
        sessions.abort_all();
    }

    Ok(())
}

async fn handle(
    req: Request<hyper::body::Incoming>,
    context: Arc<ApiContext>,
) -> Result<Response<ApiBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    debug!("{} {}", method, path);

    if method == Method::GET && path == "/healthz" {
        Ok(text_response(StatusCode::OK, "OK\n"))
    } else if method == Method::OPTIONS {
        Ok(preflight_response())
    } else if method == Method::POST && path == GET_TOPOLOGY_PATH {
        Ok(get_topology(&context).await)
    } else if method == Method::POST && path == WATCH_TOPOLOGY_PATH {
        Ok(watch_topology(&context).await)
    } else if method == Method::POST && path == GET_SERVICE_RESOURCES_PATH {
        get_service_resources(req, &context).await
    } else {
        Ok(text_response(StatusCode::NOT_FOUND, "Not Found\n"))
    }
}

async fn get_topology(context: &ApiContext) -> Response<ApiBody> {
    let topology = context.builder.build().await;
    json_response(StatusCode::OK, &GetTopologyResponse { topology })
}

async fn watch_topology(context: &ApiContext) -> Response<ApiBody> {
    let subscription = context.hub.subscribe().await;

    // One NDJSON frame per update; the stream ends when the subscription
    // is deregistered, and dropping the body deregisters it.
    let updates = stream::unfold(subscription, |mut subscription: Subscription| async move {
        let update = subscription.next().await?;
        let mut line = serde_json::to_vec(&update).unwrap_or_default();
        line.push(b'\n');
        Some((
            Ok::<_, Infallible>(Frame::data(Bytes::from(line))),
            subscription,
        ))
    });

    with_cors(Response::builder())
        .status(StatusCode::OK)
        .header("Content-Type", "application/x-ndjson")
        .body(BodyExt::boxed(StreamBody::new(updates)))
        .unwrap_or_else(|_| text_response(StatusCode::INTERNAL_SERVER_ERROR, "stream error\n"))
}

async fn get_service_resources(
    req: Request<hyper::body::Incoming>,
    context: &ApiContext,
) -> Result<Response<ApiBody>, hyper::Error> {
    let body = req.into_body().collect().await?.to_bytes();

    let request: GetServiceResourcesRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            return Ok(text_response(
                StatusCode::BAD_REQUEST,
                &format!("invalid request body: {}\n", e),
            ));
        }
    };

    match context
        .router
        .fetch_service_resources(&request.service_name)
        .await
    {
        Ok(resources) => Ok(json_response(
            StatusCode::OK,
            &GetServiceResourcesResponse { resources },
        )),
        Err(e) => Ok(error_response(&e)),
    }
}

fn error_response(err: &CoreError) -> Response<ApiBody> {
    let status = match err {
        CoreError::NotFound(_) => StatusCode::NOT_FOUND,
        CoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        CoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    #[derive(Serialize)]
    struct ErrorBody {
        error: String,
    }

    json_response(
        status,
        &ErrorBody {
            error: err.to_string(),
        },
    )
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<ApiBody> {
    let body = match serde_json::to_vec(value) {
        Ok(body) => body,
        Err(e) => {
            warn!("Failed to encode response: {}", e);
            return text_response(StatusCode::INTERNAL_SERVER_ERROR, "encoding error\n");
        }
    };

    with_cors(Response::builder())
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body)).boxed())
        .unwrap_or_else(|_| text_response(StatusCode::INTERNAL_SERVER_ERROR, "encoding error\n"))
}

fn text_response(status: StatusCode, message: &str) -> Response<ApiBody> {
    with_cors(Response::builder())
        .status(status)
        .body(Full::new(Bytes::from(message.to_string())).boxed())
        .unwrap()
}

fn preflight_response() -> Response<ApiBody> {
    with_cors(Response::builder())
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Methods", "POST, GET, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type")
        .body(Full::new(Bytes::new()).boxed())
        .unwrap()
}

// The API is consumed by a browser UI; allow cross-origin calls.
fn with_cors(builder: hyper::http::response::Builder) -> hyper::http::response::Builder {
    builder.header("Access-Control-Allow-Origin", "*")
}
