// Docker Engine API client over the daemon's Unix socket.
// Every call hits the daemon; nothing is cached here.

mod error;
pub mod logs;
pub mod stats;
pub mod transport;

pub use error::{DaemonError, Result};
pub use logs::{LogDemuxer, LogStream};
pub use transport::{Method, RawResponse, ResponseHead, SocketTransport};

use crate::models::{ContainerAction, ContainerDetails, ContainerSummary, LogTail};
use bollard::models::ContainerStatsResponse;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::UnixStream;
use tracing::instrument;

pub struct DockerRepo {
    transport: SocketTransport,
}

impl DockerRepo {
    pub fn new(socket_path: impl Into<PathBuf>, request_timeout: Duration) -> Self {
        Self {
            transport: SocketTransport::new(socket_path, request_timeout),
        }
    }

    pub fn transport(&self) -> &SocketTransport {
        &self.transport
    }

    /// All containers, running or not, in daemon order.
    #[instrument(skip(self), fields(repo = "docker", operation = "list_containers"))]
    pub async fn list_containers(&self) -> Result<Vec<ContainerSummary>> {
        self.get_json("/containers/json?all=true").await
    }

    /// Running containers only; what the metrics loop polls.
    #[instrument(skip(self), fields(repo = "docker", operation = "list_running_containers"))]
    pub async fn list_running_containers(&self) -> Result<Vec<ContainerSummary>> {
        self.get_json("/containers/json").await
    }

    #[instrument(skip(self), fields(repo = "docker", operation = "inspect_container"))]
    pub async fn inspect_container(&self, id: &str) -> Result<ContainerDetails> {
        let id = checked_reference(id)?;
        let raw: serde_json::Value = self.get_json(&format!("/containers/{}/json", id)).await?;
        Ok(ContainerDetails::from_inspect(raw))
    }

    /// One-shot start/stop/restart. Any daemon rejection (unknown id, already
    /// stopped, ...) comes back as `DaemonError::Action` with the daemon's message.
    #[instrument(skip(self), fields(repo = "docker", operation = "perform_action"))]
    pub async fn perform_action(&self, id: &str, action: ContainerAction) -> Result<()> {
        let id = checked_reference(id)?;
        let path = format!("/containers/{}/{}", id, action.as_str());
        self.transport
            .request(Method::Post, &path, None)
            .await
            .and_then(RawResponse::into_success)
            .map(|_| ())
            .map_err(|cause| DaemonError::Action {
                action,
                container_id: id.to_string(),
                cause: Box::new(cause),
            })
    }

    /// Single stats reading (`stream=false`); the payload holds current and previous counters.
    #[instrument(skip(self), fields(repo = "docker", operation = "stream_stats"))]
    pub async fn stream_stats(&self, id: &str) -> Result<ContainerStatsResponse> {
        let id = checked_reference(id)?;
        self.get_json(&format!("/containers/{}/stats?stream=false", id))
            .await
    }

    /// Opens a followed log tail. The returned stream owns the daemon connection.
    #[instrument(skip(self), fields(repo = "docker", operation = "tail_logs"))]
    pub async fn tail_logs(&self, id: &str, tail: LogTail) -> Result<LogStream<UnixStream>> {
        let id = checked_reference(id)?;
        let path = format!(
            "/containers/{}/logs?stdout=true&stderr=true&follow=true&tail={}",
            id, tail
        );
        let (mut stream, head, mut buf) = self.transport.open(Method::Get, &path).await?;
        if !head.is_success() {
            let mut body_decoder = transport::BodyDecoder::for_head(&head)?;
            let mut body = bytes::BytesMut::new();
            // Error bodies are small; best effort within the request timeout.
            let _ = tokio::time::timeout(Duration::from_secs(2), async {
                loop {
                    if body_decoder.decode(&mut buf, &mut body)? {
                        break;
                    }
                    if transport::read_more(&mut stream, &mut buf).await? == 0 {
                        break;
                    }
                }
                Ok::<_, DaemonError>(())
            })
            .await;
            return Err(transport::api_error(&head, &body));
        }
        LogStream::new(stream, &head, buf)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self
            .transport
            .request(Method::Get, path, None)
            .await?
            .into_success()?;
        resp.json().map_err(|e| {
            tracing::warn!(error = %e, path, "daemon returned undecodable JSON");
            e
        })
    }
}

/// Container ids and names only; anything else could escape the API path.
fn checked_reference(id: &str) -> Result<&str> {
    let valid = !id.is_empty()
        && id.len() <= 256
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if valid {
        Ok(id)
    } else {
        Err(DaemonError::InvalidReference(id.to_string()))
    }
}
