// Error taxonomy for calls made over the daemon socket.

use crate::models::ContainerAction;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DaemonError>;

#[derive(Debug, Error)]
pub enum DaemonError {
    /// Socket-level failure: refused, missing socket, reset, timeout.
    #[error("docker socket unavailable: {0}")]
    Transport(#[source] std::io::Error),

    /// Malformed status line, headers or body framing.
    #[error("malformed daemon response: {0}")]
    Protocol(String),

    /// Assembled body is not the JSON we expected.
    #[error("undecodable daemon response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// Daemon answered with a non-2xx status; `message` is its own wording.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// Daemon rejected a start/stop/restart.
    #[error("{action} {container_id}: {cause}")]
    Action {
        action: ContainerAction,
        container_id: String,
        #[source]
        cause: Box<DaemonError>,
    },

    /// Log frame header with a stream byte outside {0, 1, 2}.
    #[error("log stream corrupted: invalid stream byte {0:#04x} in frame header")]
    StreamCorruption(u8),

    /// Log frame header announcing a payload larger than the demuxer will buffer.
    #[error("log stream corrupted: frame announces {len} bytes, limit is {max}")]
    OversizedFrame { len: usize, max: usize },

    /// Container reference that cannot be placed in an API path.
    #[error("invalid container reference: {0:?}")]
    InvalidReference(String),
}

impl DaemonError {
    /// Status the daemon answered with, looking through `Action` wrappers.
    pub fn daemon_status(&self) -> Option<u16> {
        match self {
            DaemonError::Api { status, .. } => Some(*status),
            DaemonError::Action { cause, .. } => cause.daemon_status(),
            _ => None,
        }
    }
}
