// Audit log record for container actions

use serde::{Deserialize, Serialize};

use super::ContainerAction;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub user_id: String,
    pub action: ContainerAction,
    pub container_id: String,
    pub container_name: String,
    /// RFC 3339 in UTC.
    pub timestamp: String,
}

impl AuditRecord {
    pub fn now(
        user_id: impl Into<String>,
        action: ContainerAction,
        container_id: impl Into<String>,
        container_name: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            action,
            container_id: container_id.into(),
            container_name: container_name.into(),
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        }
    }
}
