//! HTTP server surface (spec.md §4.5 "HTTP endpoints (server side)",
//! §6 "HTTP server surface"), grounded on the axum `Router`/`State`
//! idiom used by the pack's only HTTP-serving example.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use discovery_core::{AgentInfo, ErrorKind};
use serde::Serialize;
use serde_json::json;
use tokio::net::TcpListener;

use crate::model::AgentFilter;
use crate::protocol::Protocol;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn parse_filter(params: &HashMap<String, String>) -> AgentFilter {
    let split = |key: &str| {
        params
            .get(key)
            .map(|value| value.split(',').filter(|s| !s.is_empty()).map(str::to_owned).collect())
            .unwrap_or_default()
    };
    AgentFilter {
        local: params.get("local").is_some_and(|v| v == "true"),
        remote: params.get("remote").is_some_and(|v| v == "true"),
        status: Vec::new(),
        capabilities: split("capabilities"),
        tags: split("tags"),
    }
}

async fn list_agents(State(protocol): State<Arc<Protocol>>, Query(params): Query<HashMap<String, String>>) -> Json<Vec<AgentInfo>> {
    let filter = parse_filter(&params);
    Json(protocol.discover(&filter))
}

async fn get_agent(State(protocol): State<Arc<Protocol>>, Path(id): Path<String>) -> impl IntoResponse {
    match protocol.get_agent(&id) {
        Some(agent) => (StatusCode::OK, Json(agent)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorBody { error: format!("agent not found: {id}") }),
        )
            .into_response(),
    }
}

async fn announce(State(protocol): State<Arc<Protocol>>, Json(info): Json<AgentInfo>) -> impl IntoResponse {
    match protocol.announce(info).await {
        Ok(()) => (StatusCode::OK, Json(json!({"status": "ok"}))).into_response(),
        Err(err) => {
            let status = match err.kind() {
                ErrorKind::Invalid => StatusCode::BAD_REQUEST,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::AlreadyExists => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, Json(ErrorBody { error: err.to_string() })).into_response()
        }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "healthy"}))
}

/// Builds the `/discovery/*` router bound to `protocol`'s state.
#[must_use]
pub fn router(protocol: Arc<Protocol>) -> Router {
    Router::new()
        .route("/discovery/agents", get(list_agents))
        .route("/discovery/agents/:id", get(get_agent))
        .route("/discovery/announce", post(announce))
        .route("/discovery/health", get(health))
        .with_state(protocol)
}

/// Serves `router` on `addr` until the `shutdown` future resolves,
/// observing the spec's 5-second graceful-drain budget via the
/// caller-supplied shutdown signal (spec.md §5).
///
/// # Errors
///
/// Returns an error if the socket cannot be bound or the server loop
/// fails.
pub async fn serve(
    addr: SocketAddr,
    protocol: Arc<Protocol>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let app = router(protocol);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use discovery_core::{AgentCard, CapabilityDescriptor, CapabilityType};
    use discovery_registry::{Registry, RegistryConfig};
    use tower::ServiceExt;

    fn test_protocol() -> Arc<Protocol> {
        Arc::new(Protocol::new(crate::model::ProtocolConfig::default(), Arc::new(Registry::new(RegistryConfig::default()))))
    }

    #[tokio::test]
    async fn health_endpoint_reports_healthy() {
        let app = router(test_protocol());
        let response = app
            .oneshot(Request::builder().uri("/discovery/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn get_agent_returns_404_for_unknown_id() {
        let app = router(test_protocol());
        let response = app
            .oneshot(Request::builder().uri("/discovery/agents/ghost").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn announce_with_blank_body_maps_invalid_to_400() {
        let app = router(test_protocol());
        let body = serde_json::to_vec(&json!({
            "card": {"name": "", "description": "", "url": "", "version": "1.0.0", "capabilities": []},
            "status": "online",
            "capabilities": [],
            "load": 0.0,
            "priority": 0,
            "endpoint": "",
            "is_local": true,
            "registered_at": chrono::Utc::now().to_rfc3339(),
            "last_heartbeat": chrono::Utc::now().to_rfc3339(),
            "metadata": {}
        }))
        .unwrap();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/discovery/announce")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn announce_then_get_agent_round_trips() {
        let protocol = test_protocol();
        let card = AgentCard::new(
            "coder",
            "",
            "",
            "1.0.0",
            vec![CapabilityDescriptor::new("code_review", "", CapabilityType::Task).unwrap()],
        )
        .unwrap();
        protocol.announce(AgentInfo::new(card, true, String::new(), 0)).await.unwrap();

        let app = router(protocol);
        let response = app
            .oneshot(Request::builder().uri("/discovery/agents/coder").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
