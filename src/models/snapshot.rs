// Metrics snapshot envelope sent over /ws/metrics

use serde::{Deserialize, Serialize};

use super::{ContainerStatsSample, HostMetrics};

/// Discriminator for messages on the metrics stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotKind {
    Metrics,
}

/// Full host + container snapshot; every tick sends one, no diffing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    #[serde(rename = "type")]
    pub kind: SnapshotKind,
    /// RFC 3339 / ISO-8601 in UTC.
    pub timestamp: String,
    pub host: HostMetrics,
    pub containers: Vec<ContainerStatsSample>,
}

impl MetricsSnapshot {
    pub fn new(host: HostMetrics, containers: Vec<ContainerStatsSample>) -> Self {
        Self {
            kind: SnapshotKind::Metrics,
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            host,
            containers,
        }
    }
}
