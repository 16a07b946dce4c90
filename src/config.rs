use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub docker: DockerConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DockerConfig {
    #[serde(default = "default_socket_path")]
    pub socket_path: String,
    /// Upper bound for one request/response exchange (and for the head of a log tail).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Lines requested from the daemon when a log tail does not say.
    #[serde(default = "default_log_tail")]
    pub default_log_tail: u32,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            request_timeout_ms: default_request_timeout_ms(),
            default_log_tail: default_log_tail(),
        }
    }
}

fn default_socket_path() -> String {
    "/var/run/docker.sock".into()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_log_tail() -> u32 {
    100
}

/// Where host CPU/memory/uptime come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostSource {
    /// Kernel counter files under `metrics.proc_root`.
    #[default]
    Proc,
    Sysinfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Per-tick cap on concurrent stats requests.
    #[serde(default = "default_max_concurrent_stats")]
    pub max_concurrent_stats: usize,
    #[serde(default)]
    pub host_source: HostSource,
    /// e.g. "/host/proc" when the host's proc is mounted into a container.
    #[serde(default = "default_proc_root")]
    pub proc_root: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_concurrent_stats: default_max_concurrent_stats(),
            host_source: HostSource::default(),
            proc_root: default_proc_root(),
        }
    }
}

fn default_interval_ms() -> u64 {
    2_000
}

fn default_max_concurrent_stats() -> usize {
    8
}

fn default_proc_root() -> String {
    "/proc".into()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditConfig {
    /// SQLite file for the audit log; in-memory when unset.
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub tokens: Vec<TokenConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub token: String,
    pub user_id: String,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            !self.docker.socket_path.is_empty(),
            "docker.socket_path must be non-empty"
        );
        anyhow::ensure!(
            self.docker.request_timeout_ms > 0,
            "docker.request_timeout_ms must be > 0, got {}",
            self.docker.request_timeout_ms
        );
        anyhow::ensure!(
            self.metrics.interval_ms > 0,
            "metrics.interval_ms must be > 0, got {}",
            self.metrics.interval_ms
        );
        anyhow::ensure!(
            self.metrics.max_concurrent_stats > 0,
            "metrics.max_concurrent_stats must be > 0, got {}",
            self.metrics.max_concurrent_stats
        );
        anyhow::ensure!(
            self.metrics.host_source != HostSource::Proc || !self.metrics.proc_root.is_empty(),
            "metrics.proc_root must be non-empty when metrics.host_source = \"proc\""
        );
        if let Some(path) = &self.audit.path {
            anyhow::ensure!(!path.is_empty(), "audit.path must be non-empty when set");
        }
        anyhow::ensure!(
            !self.auth.tokens.is_empty(),
            "auth.tokens must list at least one token"
        );
        for (i, t) in self.auth.tokens.iter().enumerate() {
            anyhow::ensure!(
                !t.token.trim().is_empty(),
                "auth.tokens[{}].token must be non-empty",
                i
            );
            anyhow::ensure!(
                !t.user_id.is_empty(),
                "auth.tokens[{}].user_id must be non-empty",
                i
            );
        }
        Ok(())
    }
}
