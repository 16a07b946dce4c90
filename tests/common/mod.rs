// Shared test helpers: a scripted daemon on a temporary Unix socket.
#![allow(dead_code)]

use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub head: String,
}

type Handler = dyn Fn(&RecordedRequest) -> Vec<u8> + Send + Sync;

/// Accepts connections, records each request head and answers with the
/// handler's raw bytes, written a few bytes at a time, then closes.
pub struct FakeDaemon {
    _dir: tempfile::TempDir,
    socket_path: PathBuf,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    task: tokio::task::JoinHandle<()>,
}

impl FakeDaemon {
    pub fn start<F>(handler: F) -> Self
    where
        F: Fn(&RecordedRequest) -> Vec<u8> + Send + Sync + 'static,
    {
        Self::start_with_write_size(handler, 5)
    }

    pub fn start_with_write_size<F>(handler: F, write_size: usize) -> Self
    where
        F: Fn(&RecordedRequest) -> Vec<u8> + Send + Sync + 'static,
    {
        let dir = tempfile::TempDir::new().unwrap();
        let socket_path = dir.path().join("docker.sock");
        let listener = UnixListener::bind(&socket_path).unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler: Arc<Handler> = Arc::new(handler);
        let recorded = requests.clone();
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let handler = handler.clone();
                let recorded = recorded.clone();
                tokio::spawn(serve(stream, handler, recorded, write_size.max(1)));
            }
        });
        Self {
            _dir: dir,
            socket_path,
            requests,
            task,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, method: &str, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }
}

impl Drop for FakeDaemon {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(
    mut stream: UnixStream,
    handler: Arc<Handler>,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
    write_size: usize,
) {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 1024];
    let end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        match stream.read(&mut tmp).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&tmp[..n]),
        }
    };
    let head = String::from_utf8_lossy(&buf[..end]).to_string();
    let mut request_line = head.lines().next().unwrap_or_default().split_whitespace();
    let req = RecordedRequest {
        method: request_line.next().unwrap_or_default().to_string(),
        path: request_line.next().unwrap_or_default().to_string(),
        head: head.clone(),
    };
    recorded.lock().unwrap().push(req.clone());

    let response = handler(&req);
    for piece in response.chunks(write_size) {
        if stream.write_all(piece).await.is_err() {
            return;
        }
        let _ = stream.flush().await;
        tokio::task::yield_now().await;
    }
    let _ = stream.shutdown().await;
}

pub fn json_response(status: u16, body: &Value) -> Vec<u8> {
    let body = serde_json::to_vec(body).unwrap();
    let mut out = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n",
        status,
        reason(status),
        body.len()
    )
    .into_bytes();
    out.extend_from_slice(&body);
    out
}

pub fn empty_response(status: u16) -> Vec<u8> {
    format!("HTTP/1.1 {} {}\r\nContent-Length: 0\r\n\r\n", status, reason(status)).into_bytes()
}

/// Chunked response whose chunk boundaries fall every `chunk_size` bytes.
pub fn chunked_response(status: u16, content_type: &str, body: &[u8], chunk_size: usize) -> Vec<u8> {
    let mut out = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nTransfer-Encoding: chunked\r\n\r\n",
        status,
        reason(status),
        content_type
    )
    .into_bytes();
    for chunk in body.chunks(chunk_size.max(1)) {
        out.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
        out.extend_from_slice(chunk);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"0\r\n\r\n");
    out
}

/// One multiplexed log frame: stream byte, three zero bytes, big-endian length, payload.
pub fn log_frame(stream: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![stream, 0, 0, 0];
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        304 => "Not Modified",
        404 => "Not Found",
        409 => "Conflict",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

pub fn container_json(id: &str, name: &str, state: &str) -> Value {
    json!({
        "Id": id,
        "Names": [format!("/{}", name)],
        "Image": format!("{}:latest", name),
        "State": state,
        "Status": if state == "running" { "Up 5 minutes" } else { "Exited (0) 1 hour ago" },
        "Created": 1_700_000_000,
        "Ports": [],
    })
}

pub fn inspect_json(id: &str, name: &str, state: &str) -> Value {
    json!({
        "Id": id,
        "Name": format!("/{}", name),
        "Created": "2024-01-01T00:00:00Z",
        "State": { "Status": state, "Running": state == "running" },
        "Config": { "Image": format!("{}:latest", name) },
    })
}

/// Stats payload giving cpu 40%, memory used 800 of 4000 (20%), network 11/22, block io 100/50.
pub fn stats_json() -> Value {
    json!({
        "cpu_stats": {
            "cpu_usage": { "total_usage": 400 },
            "system_cpu_usage": 2000,
            "online_cpus": 2
        },
        "precpu_stats": {
            "cpu_usage": { "total_usage": 200 },
            "system_cpu_usage": 1000,
            "online_cpus": 2
        },
        "memory_stats": { "usage": 1000, "limit": 4000, "stats": { "cache": 200 } },
        "networks": {
            "eth0": { "rx_bytes": 10, "tx_bytes": 20 },
            "eth1": { "rx_bytes": 1, "tx_bytes": 2 }
        },
        "blkio_stats": {
            "io_service_bytes_recursive": [
                { "major": 8, "minor": 0, "op": "Read", "value": 100 },
                { "major": 8, "minor": 0, "op": "Write", "value": 50 }
            ]
        }
    })
}

/// Daemon with four containers: a1 "web" (running), b2 "db" (exited), c3 "cache"
/// (running, stats fail), d4 "queue" (running). a1 has two log lines.
pub fn docker_fixture(req: &RecordedRequest) -> Vec<u8> {
    let path = req.path.as_str();
    match req.method.as_str() {
        "GET" if path == "/containers/json?all=true" => json_response(
            200,
            &json!([
                container_json("a1", "web", "running"),
                container_json("b2", "db", "exited"),
                container_json("c3", "cache", "running"),
                container_json("d4", "queue", "running"),
            ]),
        ),
        "GET" if path == "/containers/json" => json_response(
            200,
            &json!([
                container_json("a1", "web", "running"),
                container_json("c3", "cache", "running"),
                container_json("d4", "queue", "running"),
            ]),
        ),
        "GET" if path == "/containers/a1/json" => {
            json_response(200, &inspect_json("a1", "web", "running"))
        }
        "GET" if path == "/containers/b2/json" => {
            json_response(200, &inspect_json("b2", "db", "exited"))
        }
        "GET" if path.starts_with("/containers/c3/stats") => {
            json_response(500, &json!({ "message": "cgroup stats unavailable" }))
        }
        "GET" if path.starts_with("/containers/a1/stats")
            || path.starts_with("/containers/d4/stats") =>
        {
            json_response(200, &stats_json())
        }
        "GET" if path.starts_with("/containers/a1/logs") => {
            let mut body = log_frame(1, b"hello from web\n");
            body.extend(log_frame(2, b"warning: low disk\r\n"));
            chunked_response(200, "application/vnd.docker.raw-stream", &body, 7)
        }
        "POST" if path.starts_with("/containers/a1/") => empty_response(204),
        "POST" if path == "/containers/b2/stop" => empty_response(304),
        "POST" if path == "/containers/b2/start" || path == "/containers/b2/restart" => {
            empty_response(204)
        }
        _ => json_response(
            404,
            &json!({ "message": format!("No such container: {}", container_segment(path)) }),
        ),
    }
}

fn container_segment(path: &str) -> &str {
    path.trim_start_matches("/containers/")
        .split(['/', '?'])
        .next()
        .unwrap_or_default()
}

/// Writes `stat`, `meminfo` and `uptime` under `dir` so it can serve as a proc root.
pub fn fake_proc(dir: &Path) {
    std::fs::write(dir.join("stat"), "cpu  300 0 100 600 0 0 0 0\n").unwrap();
    std::fs::write(
        dir.join("meminfo"),
        "MemTotal: 4000 kB\nMemFree: 1000 kB\nMemAvailable: 3000 kB\n",
    )
    .unwrap();
    std::fs::write(dir.join("uptime"), "1234.5 999.0\n").unwrap();
}

/// Replaces the aggregate `cpu` line of a proc root written by [`fake_proc`].
pub fn set_proc_cpu(dir: &Path, cpu_line: &str) {
    std::fs::write(dir.join("stat"), format!("{}\n", cpu_line)).unwrap();
}
