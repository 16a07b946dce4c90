// WS /ws/metrics: one metrics loop per connection.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use bytes::Bytes;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::time::{Duration, timeout};

use super::AppState;
use crate::broadcaster::SnapshotSink;
use crate::models::MetricsSnapshot;

pub(super) const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

struct WsSink(SplitSink<WebSocket, Message>);

impl SnapshotSink for WsSink {
    async fn send_snapshot(&mut self, snapshot: &MetricsSnapshot) -> anyhow::Result<()> {
        let json = serde_json::to_string(snapshot)?;
        timeout(WS_SEND_TIMEOUT, self.0.send(Message::Text(json.into()))).await??;
        Ok(())
    }

    async fn keepalive(&mut self) -> anyhow::Result<()> {
        timeout(WS_SEND_TIMEOUT, self.0.send(Message::Ping(Bytes::new()))).await??;
        Ok(())
    }
}

pub(super) async fn ws_metrics(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let broadcaster = state.broadcaster.clone();
    // Browsers authenticate with the ["Bearer", token] subprotocol pair; echo "Bearer" back.
    ws.protocols(["Bearer"]).on_upgrade(move |socket| async move {
        tracing::info!("Client connected to metrics stream");
        let (sender, mut receiver) = socket.split();
        let closed = async move {
            while let Some(msg) = receiver.next().await {
                if matches!(msg, Ok(Message::Close(_)) | Err(_)) {
                    break;
                }
            }
        };
        broadcaster.run_connection(WsSink(sender), closed).await;
    })
}
