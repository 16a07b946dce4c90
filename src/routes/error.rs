// JSON error responses for the control surface.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::docker_repo::DaemonError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<DaemonError> for ApiError {
    fn from(e: DaemonError) -> Self {
        let status = match &e {
            DaemonError::Transport(_) => StatusCode::SERVICE_UNAVAILABLE,
            DaemonError::Protocol(_)
            | DaemonError::Decode(_)
            | DaemonError::StreamCorruption(_)
            | DaemonError::OversizedFrame { .. } => {
                tracing::error!(error = %e, "daemon protocol failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            DaemonError::InvalidReference(_) => StatusCode::BAD_REQUEST,
            DaemonError::Api { .. } | DaemonError::Action { .. } => match e.daemon_status() {
                // "already started/stopped" comes back as 304; callers see a conflict.
                Some(304) => StatusCode::CONFLICT,
                Some(s) => StatusCode::from_u16(s)
                    .ok()
                    .filter(|s| s.is_client_error() || s.is_server_error())
                    .unwrap_or(StatusCode::BAD_GATEWAY),
                None => {
                    tracing::error!(error = %e, "container action failed below the daemon API");
                    match &e {
                        DaemonError::Action { cause, .. }
                            if matches!(**cause, DaemonError::Transport(_)) =>
                        {
                            StatusCode::SERVICE_UNAVAILABLE
                        }
                        _ => StatusCode::INTERNAL_SERVER_ERROR,
                    }
                }
            },
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}
