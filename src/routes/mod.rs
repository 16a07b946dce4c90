// HTTP, SSE and WebSocket routes

mod error;
mod http;
mod logs;
mod ws;

pub use error::ApiError;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::audit_repo::AuditRepo;
use crate::auth::{Authenticator, require_identity};
use crate::broadcaster::MetricsBroadcaster;
use crate::config::AppConfig;
use crate::docker_repo::DockerRepo;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) docker_repo: Arc<DockerRepo>,
    pub(crate) broadcaster: Arc<MetricsBroadcaster>,
    pub(crate) audit_repo: Arc<AuditRepo>,
    pub(crate) config: AppConfig,
}

pub fn app(
    docker_repo: Arc<DockerRepo>,
    broadcaster: Arc<MetricsBroadcaster>,
    audit_repo: Arc<AuditRepo>,
    authenticator: Arc<dyn Authenticator>,
    config: AppConfig,
) -> Router {
    let state = AppState {
        docker_repo,
        broadcaster,
        audit_repo,
        config,
    };
    Router::new()
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/containers", get(http::list_containers)) // GET /api/containers
        .route("/api/containers/{id}", get(http::inspect_container)) // GET /api/containers/{id}
        .route(
            "/api/containers/{id}/{action}",
            post(http::container_action),
        ) // POST /api/containers/{id}/{start|stop|restart}
        .route("/api/logs", get(logs::tail_logs)) // SSE /api/logs?container=&tail=
        .route("/ws/metrics", get(ws::ws_metrics)) // WS /ws/metrics
        .layer(middleware::from_fn_with_state(authenticator, require_identity))
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any))
        .with_state(state)
}
