// Docker container models

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Docker container lifecycle state; serializes to lowercase JSON (e.g. "running").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    #[serde(other)]
    Unknown,
}

impl ContainerState {
    /// Parse from Docker API state string (e.g. "running", "exited").
    pub fn from_docker(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "created" => ContainerState::Created,
            "running" => ContainerState::Running,
            "paused" => ContainerState::Paused,
            "restarting" => ContainerState::Restarting,
            "removing" => ContainerState::Removing,
            "exited" => ContainerState::Exited,
            "dead" => ContainerState::Dead,
            _ => ContainerState::Unknown,
        }
    }
}

/// One published port as reported by `GET /containers/json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    #[serde(rename = "IP", default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(rename = "PrivatePort")]
    pub private_port: u16,
    #[serde(rename = "PublicPort", default, skip_serializing_if = "Option::is_none")]
    pub public_port: Option<u16>,
    #[serde(rename = "Type")]
    pub protocol: String,
}

/// Container list entry. Field names follow the Engine API so clients see the daemon's shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerSummary {
    pub id: String,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub image: String,
    pub state: ContainerState,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub ports: Vec<PortMapping>,
}

impl ContainerSummary {
    /// First name without the leading slash; falls back to the id.
    pub fn display_name(&self) -> String {
        self.names
            .first()
            .map(|n| n.trim_start_matches('/').to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| self.id.clone())
    }
}

/// Typed view of `GET /containers/{id}/json`; `raw` keeps the full daemon document.
#[derive(Debug, Clone)]
pub struct ContainerDetails {
    pub id: String,
    pub name: String,
    pub image: String,
    pub state: ContainerState,
    pub created: String,
    pub raw: serde_json::Value,
}

impl ContainerDetails {
    pub fn from_inspect(raw: serde_json::Value) -> Self {
        let text = |v: Option<&serde_json::Value>| {
            v.and_then(|v| v.as_str()).unwrap_or_default().to_string()
        };
        let id = text(raw.get("Id"));
        let name = text(raw.get("Name")).trim_start_matches('/').to_string();
        let image = text(raw.pointer("/Config/Image"));
        let state = ContainerState::from_docker(&text(raw.pointer("/State/Status")));
        let created = text(raw.get("Created"));
        Self {
            id,
            name,
            image,
            state,
            created,
            raw,
        }
    }
}

/// Control actions accepted by `POST /containers/{id}/{action}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerAction {
    Start,
    Stop,
    Restart,
}

impl ContainerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerAction::Start => "start",
            ContainerAction::Stop => "stop",
            ContainerAction::Restart => "restart",
        }
    }
}

impl fmt::Display for ContainerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContainerAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(ContainerAction::Start),
            "stop" => Ok(ContainerAction::Stop),
            "restart" => Ok(ContainerAction::Restart),
            other => Err(format!("unsupported container action: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub used: u64,
    pub limit: u64,
    pub percent: f64,
}

/// Bytes summed across every interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkIo {
    pub rx: u64,
    pub tx: u64,
}

/// Bytes summed across every device entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockIo {
    pub read: u64,
    pub write: u64,
}

/// Point-in-time stats for one container, recomputed every tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStatsSample {
    pub id: String,
    pub name: String,
    #[serde(rename = "cpu")]
    pub cpu_percent: f64,
    pub memory: MemoryUsage,
    pub network: NetworkIo,
    #[serde(rename = "blockIO")]
    pub block_io: BlockIo,
}
