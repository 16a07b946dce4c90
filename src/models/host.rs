// Host CPU, memory and uptime models

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HostCpu {
    /// Busy share since the previous reading, 0-100.
    pub usage: f64,
}

/// Bytes. `used` is total minus free; `usage` is the percentage not available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HostMemory {
    pub total: u64,
    pub free: u64,
    pub available: u64,
    pub used: u64,
    pub usage: f64,
}

/// Host-wide metrics read fresh from kernel counters every tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HostMetrics {
    pub cpu: HostCpu,
    pub memory: HostMemory,
    /// Seconds since boot.
    pub uptime: f64,
}
