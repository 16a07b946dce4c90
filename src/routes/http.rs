// Control endpoints: version, list, inspect, start/stop/restart

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};

use super::{ApiError, AppState};
use crate::auth::Identity;
use crate::models::{AuditRecord, ContainerAction, ContainerSummary};
use crate::version::{NAME, VERSION};

/// GET /version: service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /api/containers: every container, daemon order preserved.
pub(super) async fn list_containers(
    State(state): State<AppState>,
) -> Result<Json<Vec<ContainerSummary>>, ApiError> {
    Ok(Json(state.docker_repo.list_containers().await?))
}

/// GET /api/containers/{id}: the daemon's inspect document.
pub(super) async fn inspect_container(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let details = state.docker_repo.inspect_container(&id).await?;
    Ok(Json(details.raw))
}

/// POST /api/containers/{id}/{action}: one action call, then one audit record.
pub(super) async fn container_action(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path((id, action)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let action: ContainerAction = action.parse().map_err(ApiError::bad_request)?;
    let details = state.docker_repo.inspect_container(&id).await?;
    state.docker_repo.perform_action(&id, action).await?;
    tracing::info!(
        user_id = %identity.user_id,
        action = %action,
        container_id = %id,
        container = %details.name,
        "container action performed"
    );

    let record = AuditRecord::now(identity.user_id, action, id.clone(), details.name);
    if let Err(e) = state.audit_repo.record(&record).await {
        tracing::warn!(error = %e, operation = "audit_record", "audit write failed after successful action");
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "action": action,
        "containerId": id,
    })))
}
