// Config loading and validation tests

use dockgate::config::{AppConfig, HostSource};

const VALID_CONFIG: &str = r#"
[server]
port = 8081
host = "0.0.0.0"

[docker]
socket_path = "/var/run/docker.sock"
request_timeout_ms = 5000
default_log_tail = 50

[metrics]
interval_ms = 2000
max_concurrent_stats = 4
host_source = "proc"
proc_root = "/host/proc"

[audit]
path = "data/audit.db"

[[auth.tokens]]
token = "s3cret"
user_id = "alice"
"#;

const MINIMAL_CONFIG: &str = r#"
[server]
port = 8081
host = "127.0.0.1"

[[auth.tokens]]
token = "s3cret"
user_id = "alice"
"#;

#[test]
fn test_config_loads_from_str() {
    let config = AppConfig::load_from_str(VALID_CONFIG).expect("load_from_str");
    assert_eq!(config.server.port, 8081);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.docker.request_timeout_ms, 5000);
    assert_eq!(config.docker.default_log_tail, 50);
    assert_eq!(config.metrics.max_concurrent_stats, 4);
    assert_eq!(config.metrics.host_source, HostSource::Proc);
    assert_eq!(config.metrics.proc_root, "/host/proc");
    assert_eq!(config.audit.path.as_deref(), Some("data/audit.db"));
    assert_eq!(config.auth.tokens.len(), 1);
    assert_eq!(config.auth.tokens[0].user_id, "alice");
}

#[test]
fn test_config_defaults_when_sections_omitted() {
    let config = AppConfig::load_from_str(MINIMAL_CONFIG).expect("valid");
    assert_eq!(config.docker.socket_path, "/var/run/docker.sock");
    assert_eq!(config.docker.request_timeout_ms, 10_000);
    assert_eq!(config.docker.default_log_tail, 100);
    assert_eq!(config.metrics.interval_ms, 2000);
    assert_eq!(config.metrics.max_concurrent_stats, 8);
    assert_eq!(config.metrics.host_source, HostSource::Proc);
    assert_eq!(config.metrics.proc_root, "/proc");
    assert!(config.audit.path.is_none());
}

#[test]
fn test_config_accepts_sysinfo_host_source() {
    let cfg = VALID_CONFIG.replace("host_source = \"proc\"", "host_source = \"sysinfo\"");
    let config = AppConfig::load_from_str(&cfg).expect("valid");
    assert_eq!(config.metrics.host_source, HostSource::Sysinfo);
}

#[test]
fn test_config_validation_rejects_invalid_port() {
    let bad = VALID_CONFIG.replace("port = 8081", "port = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("server.port"));
}

#[test]
fn test_config_validation_rejects_empty_socket_path() {
    let bad = VALID_CONFIG.replace(
        "socket_path = \"/var/run/docker.sock\"",
        "socket_path = \"\"",
    );
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("docker.socket_path"));
}

#[test]
fn test_config_validation_rejects_request_timeout_zero() {
    let bad = VALID_CONFIG.replace("request_timeout_ms = 5000", "request_timeout_ms = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("request_timeout_ms"));
}

#[test]
fn test_config_validation_rejects_interval_zero() {
    let bad = VALID_CONFIG.replace("interval_ms = 2000", "interval_ms = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("metrics.interval_ms"));
}

#[test]
fn test_config_validation_rejects_max_concurrent_stats_zero() {
    let bad = VALID_CONFIG.replace("max_concurrent_stats = 4", "max_concurrent_stats = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("max_concurrent_stats"));
}

#[test]
fn test_config_validation_rejects_empty_proc_root() {
    let bad = VALID_CONFIG.replace("proc_root = \"/host/proc\"", "proc_root = \"\"");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("metrics.proc_root"));
}

#[test]
fn test_config_validation_rejects_empty_audit_path() {
    let bad = VALID_CONFIG.replace("path = \"data/audit.db\"", "path = \"\"");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("audit.path"));
}

#[test]
fn test_config_validation_rejects_missing_tokens() {
    let bad = "[server]\nport = 8081\nhost = \"0.0.0.0\"\n\n[auth]\ntokens = []\n";
    let err = AppConfig::load_from_str(bad).unwrap_err();
    assert!(err.to_string().contains("auth.tokens"));
}

#[test]
fn test_config_validation_rejects_blank_token() {
    let bad = VALID_CONFIG.replace("token = \"s3cret\"", "token = \"  \"");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("auth.tokens[0].token"));
}

#[test]
fn test_config_validation_rejects_unknown_host_source() {
    let bad = VALID_CONFIG.replace("host_source = \"proc\"", "host_source = \"wmi\"");
    assert!(AppConfig::load_from_str(&bad).is_err());
}

#[test]
fn test_config_validation_rejects_invalid_toml() {
    let err = AppConfig::load_from_str("not valid toml [[[").unwrap_err();
    assert!(!err.to_string().is_empty());
}

#[test]
fn test_config_load_from_file_via_env() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, VALID_CONFIG).unwrap();
    unsafe { std::env::set_var("CONFIG_FILE", path.to_str().unwrap()) };
    let result = AppConfig::load();
    unsafe { std::env::remove_var("CONFIG_FILE") };
    let config = result.expect("load from CONFIG_FILE");
    assert_eq!(config.server.port, 8081);
    assert_eq!(config.audit.path.as_deref(), Some("data/audit.db"));
}
