// Domain and wire models

mod audit;
mod container;
mod host;
mod logs;
mod snapshot;

pub use audit::AuditRecord;
pub use container::{
    BlockIo, ContainerAction, ContainerDetails, ContainerState, ContainerStatsSample,
    ContainerSummary, MemoryUsage, NetworkIo, PortMapping,
};
pub use host::{HostCpu, HostMemory, HostMetrics};
pub use logs::{LogLine, LogStreamKind, LogTail};
pub use snapshot::{MetricsSnapshot, SnapshotKind};
