// Host metrics: kernel counters under a proc root, or sysinfo on hosts without one.

mod proc;

pub use proc::CpuTimes;

use crate::config::HostSource;
use crate::models::{HostCpu, HostMemory, HostMetrics};
use std::path::PathBuf;
use std::sync::Arc;
use sysinfo::System;
use tracing::instrument;

pub struct HostRepo {
    source: HostSource,
    proc_root: PathBuf,
}

impl HostRepo {
    pub fn new(source: HostSource, proc_root: impl Into<PathBuf>) -> Self {
        Self {
            source,
            proc_root: proc_root.into(),
        }
    }

    /// Independent sampler for one streaming connection. The baseline CPU reading is
    /// taken here, so the first tick already reports usage since the connection opened.
    pub async fn sampler(&self) -> HostSampler {
        let inner = match self.source {
            HostSource::Proc => {
                let prev = match proc::read_cpu_times(&self.proc_root).await {
                    Ok(t) => Some(t),
                    Err(e) => {
                        tracing::warn!(error = %e, operation = "cpu_baseline", "host cpu baseline unavailable");
                        None
                    }
                };
                Sampler::Proc {
                    root: self.proc_root.clone(),
                    prev,
                }
            }
            HostSource::Sysinfo => {
                let mut sys = System::new();
                sys.refresh_cpu_all();
                Sampler::Sysinfo(Arc::new(std::sync::Mutex::new(sys)))
            }
        };
        HostSampler { inner }
    }
}

enum Sampler {
    Proc {
        root: PathBuf,
        prev: Option<CpuTimes>,
    },
    Sysinfo(Arc<std::sync::Mutex<System>>),
}

pub struct HostSampler {
    inner: Sampler,
}

impl HostSampler {
    #[instrument(skip(self), fields(repo = "host", operation = "sample"))]
    pub async fn sample(&mut self) -> anyhow::Result<HostMetrics> {
        match &mut self.inner {
            Sampler::Proc { root, prev } => {
                let (metrics, cpu) = proc::read_host(root, *prev).await?;
                *prev = Some(cpu);
                Ok(metrics)
            }
            Sampler::Sysinfo(sys) => {
                let sys = sys.clone();
                tokio::task::spawn_blocking(move || {
                    let mut sys = sys
                        .lock()
                        .map_err(|e| anyhow::anyhow!("sysinfo lock poisoned: {}", e))?;
                    sys.refresh_cpu_all();
                    sys.refresh_memory();

                    let total = sys.total_memory();
                    let free = sys.free_memory();
                    let available = sys.available_memory();
                    let used = total.saturating_sub(free);
                    let usage = if total > 0 {
                        (total.saturating_sub(available) as f64 / total as f64) * 100.0
                    } else {
                        0.0
                    };
                    Ok(HostMetrics {
                        cpu: HostCpu {
                            usage: (sys.global_cpu_usage() as f64).clamp(0.0, 100.0),
                        },
                        memory: HostMemory {
                            total,
                            free,
                            available,
                            used,
                            usage,
                        },
                        uptime: System::uptime() as f64,
                    })
                })
                .await
                .map_err(|e| anyhow::anyhow!("sysinfo task join: {}", e))?
            }
        }
    }
}
