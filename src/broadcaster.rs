// Per-connection metrics loop.
// Each streaming connection owns its timer and host sampler; loops share only the
// read-only repos. A tick reads host counters, lists running containers, fans out
// stats requests (bounded) and sends one full snapshot.

use crate::docker_repo::{DockerRepo, stats};
use crate::host_repo::{HostRepo, HostSampler};
use crate::models::{ContainerStatsSample, ContainerSummary, HostMetrics, MetricsSnapshot};
use futures_util::{StreamExt, stream};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant, MissedTickBehavior, interval_at};

pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Where snapshots go. A send error closes the connection.
pub trait SnapshotSink: Send {
    fn send_snapshot(
        &mut self,
        snapshot: &MetricsSnapshot,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Transport-level keepalive (e.g. WebSocket ping); no-op by default.
    fn keepalive(&mut self) -> impl Future<Output = anyhow::Result<()>> + Send {
        async { Ok(()) }
    }
}

impl SnapshotSink for mpsc::Sender<MetricsSnapshot> {
    async fn send_snapshot(&mut self, snapshot: &MetricsSnapshot) -> anyhow::Result<()> {
        self.send(snapshot.clone())
            .await
            .map_err(|_| anyhow::anyhow!("snapshot receiver dropped"))
    }
}

pub struct BroadcasterConfig {
    pub interval_ms: u64,
    pub max_concurrent_stats: usize,
}

pub struct MetricsBroadcaster {
    docker_repo: Arc<DockerRepo>,
    host_repo: Arc<HostRepo>,
    config: BroadcasterConfig,
    open_connections: Arc<AtomicUsize>,
}

/// Decrements the open-connection count on drop, whatever path ends the loop.
struct ConnectionGuard(Arc<AtomicUsize>);

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

impl MetricsBroadcaster {
    pub fn new(
        docker_repo: Arc<DockerRepo>,
        host_repo: Arc<HostRepo>,
        config: BroadcasterConfig,
    ) -> Self {
        Self {
            docker_repo,
            host_repo,
            config,
            open_connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn open_connections(&self) -> usize {
        self.open_connections.load(Ordering::Relaxed)
    }

    /// Runs one connection until `closed` resolves or a send fails. Ticks are
    /// strictly sequential, so snapshot N is always sent before N+1. The first
    /// tick fires one interval after open, so its host CPU is a real delta.
    pub async fn run_connection<S, C>(&self, mut sink: S, closed: C)
    where
        S: SnapshotSink,
        C: Future<Output = ()> + Send,
    {
        self.open_connections.fetch_add(1, Ordering::Relaxed);
        let _guard = ConnectionGuard(self.open_connections.clone());
        tracing::debug!("metrics connection connecting");
        let mut sampler = self.host_repo.sampler().await;

        let period = Duration::from_millis(self.config.interval_ms);
        let mut tick = interval_at(Instant::now() + period, period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut keepalive = interval_at(Instant::now() + KEEPALIVE_INTERVAL, KEEPALIVE_INTERVAL);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(closed);

        tracing::debug!(interval_ms = self.config.interval_ms, "metrics connection open");
        let mut ticks: u64 = 0;
        loop {
            tokio::select! {
                _ = &mut closed => {
                    tracing::debug!("metrics client closed the connection");
                    break;
                }
                _ = tick.tick() => {
                    let snapshot = self.collect_snapshot(&mut sampler).await;
                    if let Err(e) = sink.send_snapshot(&snapshot).await {
                        tracing::debug!(error = %e, operation = "send_snapshot", "metrics send failed");
                        break;
                    }
                    ticks += 1;
                }
                _ = keepalive.tick() => {
                    if let Err(e) = sink.keepalive().await {
                        tracing::debug!(error = %e, operation = "keepalive", "metrics keepalive failed");
                        break;
                    }
                }
            }
        }
        tracing::info!(ticks, "metrics connection closed");
    }

    /// One tick. Host or list failures degrade the snapshot instead of failing it;
    /// a container whose stats request fails is left out.
    pub async fn collect_snapshot(&self, sampler: &mut HostSampler) -> MetricsSnapshot {
        let host = match sampler.sample().await {
            Ok(h) => h,
            Err(e) => {
                tracing::warn!(error = %e, operation = "sample_host", "host metrics failed");
                HostMetrics::default()
            }
        };

        let containers = match self.docker_repo.list_running_containers().await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, operation = "list_running_containers", "container list failed");
                Vec::new()
            }
        };

        let samples = self.collect_container_stats(containers).await;
        MetricsSnapshot::new(host, samples)
    }

    // Stats futures own their captures; the connection future must stay Send.
    async fn collect_container_stats(
        &self,
        containers: Vec<ContainerSummary>,
    ) -> Vec<ContainerStatsSample> {
        let docker = self.docker_repo.clone();
        stream::iter(containers)
            .map(move |c| {
                let docker = docker.clone();
                async move {
                    let name = c.display_name();
                    match docker.stream_stats(&c.id).await {
                        Ok(raw) => Some(stats::compute_sample(&raw, &c.id, &name)),
                        Err(e) => {
                            tracing::warn!(
                                error = %e,
                                container_id = %c.id,
                                container = %name,
                                operation = "stream_stats",
                                "container stats failed; omitted from snapshot"
                            );
                            None
                        }
                    }
                }
            })
            .buffered(self.config.max_concurrent_stats.max(1))
            .filter_map(|s| async move { s })
            .collect()
            .await
    }
}
