// GET /api/logs: followed container log tail as server-sent events.

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use std::convert::Infallible;

use super::{ApiError, AppState};
use crate::models::LogTail;

#[derive(Debug, Deserialize)]
pub(super) struct LogsQuery {
    container: Option<String>,
    tail: Option<String>,
}

/// One `data:` event per log line. Dropping the response drops the daemon connection.
pub(super) async fn tail_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let container = query
        .container
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::bad_request("Container ID required"))?;
    let tail = match query.tail.as_deref() {
        Some(t) => t.parse::<LogTail>().map_err(ApiError::bad_request)?,
        None => LogTail::Lines(state.config.docker.default_log_tail),
    };
    let stream = state.docker_repo.tail_logs(&container, tail).await?;
    tracing::info!(container_id = %container, tail = %tail, "log tail opened");

    let events = stream.into_stream().map(move |item| {
        Ok(match item {
            Ok(line) => Event::default().data(line.text),
            Err(e) => {
                tracing::warn!(error = %e, container_id = %container, "log tail ended with error");
                Event::default().event("error").data(e.to_string())
            }
        })
    });
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
