use anyhow::Result;
use dockgate::*;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;

    let docker_repo = Arc::new(docker_repo::DockerRepo::new(
        &app_config.docker.socket_path,
        Duration::from_millis(app_config.docker.request_timeout_ms),
    ));
    let host_repo = Arc::new(host_repo::HostRepo::new(
        app_config.metrics.host_source,
        &app_config.metrics.proc_root,
    ));
    let audit_repo = Arc::new(match &app_config.audit.path {
        Some(path) => audit_repo::AuditRepo::connect(path).await?,
        None => {
            tracing::warn!("audit.path not set; audit records are kept in memory only");
            audit_repo::AuditRepo::in_memory()
        }
    });
    let authenticator: Arc<dyn auth::Authenticator> = Arc::new(
        auth::StaticTokenAuthenticator::from_config(&app_config.auth),
    );
    let broadcaster = Arc::new(broadcaster::MetricsBroadcaster::new(
        docker_repo.clone(),
        host_repo,
        broadcaster::BroadcasterConfig {
            interval_ms: app_config.metrics.interval_ms,
            max_concurrent_stats: app_config.metrics.max_concurrent_stats,
        },
    ));

    let app = routes::app(
        docker_repo,
        broadcaster,
        audit_repo,
        authenticator,
        app_config.clone(),
    );
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        socket = %app_config.docker.socket_path,
        "Listening on http://{}",
        addr
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    tracing::info!("Received shutdown signal");
}
