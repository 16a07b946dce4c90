// Bearer-token authentication for every route.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::AuthConfig;

/// Authenticated caller; inserted into request extensions by [`require_identity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
}

/// Validates a bearer credential issued by the identity provider.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, token: &str) -> Option<Identity>;
}

/// Fixed token → user table from config.
pub struct StaticTokenAuthenticator {
    tokens: HashMap<String, String>,
}

impl StaticTokenAuthenticator {
    pub fn new(tokens: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            tokens: tokens.into_iter().collect(),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config
                .tokens
                .iter()
                .map(|t| (t.token.clone(), t.user_id.clone())),
        )
    }
}

impl Authenticator for StaticTokenAuthenticator {
    fn authenticate(&self, token: &str) -> Option<Identity> {
        self.tokens.get(token).map(|user_id| Identity {
            user_id: user_id.clone(),
        })
    }
}

/// Credential from `Authorization: Bearer`, the `Bearer, <token>` WebSocket
/// subprotocol pair browsers send, or an `access_token` query parameter.
pub fn bearer_token<'a>(headers: &'a HeaderMap, query: Option<&'a str>) -> Option<&'a str> {
    let from_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .map(str::trim);
    let from_protocol = || {
        let value = headers
            .get(header::SEC_WEBSOCKET_PROTOCOL)
            .and_then(|v| v.to_str().ok())?;
        let mut parts = value.split(',').map(str::trim);
        parts.find(|p| p.eq_ignore_ascii_case("bearer"))?;
        parts.next()
    };
    let from_query = || {
        query?
            .split('&')
            .find_map(|pair| pair.strip_prefix("access_token="))
    };
    from_header
        .or_else(from_protocol)
        .or_else(from_query)
        .filter(|t| !t.is_empty())
}

/// Middleware: rejects with 401 before any handler (and so any daemon call) runs.
pub async fn require_identity(
    State(authenticator): State<Arc<dyn Authenticator>>,
    mut req: Request,
    next: Next,
) -> Response {
    let identity = bearer_token(req.headers(), req.uri().query())
        .and_then(|token| authenticator.authenticate(token));
    match identity {
        Some(identity) => {
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        None => {
            tracing::debug!(path = %req.uri().path(), "rejected unauthenticated request");
            (
                StatusCode::UNAUTHORIZED,
                axum::Json(serde_json::json!({ "error": "Unauthorized" })),
            )
                .into_response()
        }
    }
}
