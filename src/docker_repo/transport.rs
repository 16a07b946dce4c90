// HTTP/1.1 over the daemon's Unix socket.
// One connection per call; the response is read until its framing says the body is complete.

use super::error::{DaemonError, Result};
use bytes::{Buf, Bytes, BytesMut};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::instrument;

pub(crate) const READ_CHUNK: usize = 16 * 1024;
const MAX_HEAD_BYTES: usize = 64 * 1024;
const MAX_CHUNK_LINE_BYTES: usize = 4 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// Status line and headers of a daemon response.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
}

impl ResponseHead {
    /// Case-insensitive header lookup; first match wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Fully assembled response: head plus de-chunked body.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub head: ResponseHead,
    pub body: Bytes,
}

impl RawResponse {
    pub fn status(&self) -> u16 {
        self.head.status
    }

    /// Turns a non-2xx response into `DaemonError::Api` carrying the daemon's message.
    pub fn into_success(self) -> Result<Self> {
        if self.head.is_success() {
            Ok(self)
        } else {
            Err(api_error(&self.head, &self.body))
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

pub(crate) fn api_error(head: &ResponseHead, body: &[u8]) -> DaemonError {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }

    let message = serde_json::from_slice::<ErrorBody>(body)
        .map(|b| b.message)
        .ok()
        .or_else(|| {
            let text = String::from_utf8_lossy(body).trim().to_string();
            (!text.is_empty()).then_some(text)
        })
        .or_else(|| (!head.reason.is_empty()).then(|| head.reason.clone()))
        .unwrap_or_else(|| format!("daemon returned status {}", head.status));
    DaemonError::Api {
        status: head.status,
        message,
    }
}

#[derive(Debug, Clone)]
pub struct SocketTransport {
    socket_path: PathBuf,
    timeout: Duration,
}

impl SocketTransport {
    pub fn new(socket_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Sends one request and returns the complete response. Non-2xx statuses are returned as-is.
    #[instrument(skip(self, body), fields(repo = "docker"))]
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<RawResponse> {
        let payload = body.map(serde_json::to_vec).transpose()?;
        tokio::time::timeout(self.timeout, self.exchange(method, path, payload.as_deref()))
            .await
            .map_err(|_| self.timed_out(method, path))?
    }

    async fn exchange(
        &self,
        method: Method,
        path: &str,
        payload: Option<&[u8]>,
    ) -> Result<RawResponse> {
        let mut stream = self.connect().await?;
        write_request(&mut stream, method, path, payload).await?;
        read_response(&mut stream).await
    }

    /// Connects, sends a bodiless request and reads only the response head.
    /// The caller owns the stream and any body bytes already read.
    pub(crate) async fn open(
        &self,
        method: Method,
        path: &str,
    ) -> Result<(UnixStream, ResponseHead, BytesMut)> {
        let handshake = async {
            let mut stream = self.connect().await?;
            write_request(&mut stream, method, path, None).await?;
            let mut buf = BytesMut::with_capacity(READ_CHUNK);
            let head = read_head(&mut stream, &mut buf).await?;
            Ok::<_, DaemonError>((stream, head, buf))
        };
        tokio::time::timeout(self.timeout, handshake)
            .await
            .map_err(|_| self.timed_out(method, path))?
    }

    async fn connect(&self) -> Result<UnixStream> {
        UnixStream::connect(&self.socket_path)
            .await
            .map_err(DaemonError::Transport)
    }

    fn timed_out(&self, method: Method, path: &str) -> DaemonError {
        DaemonError::Transport(io::Error::new(
            io::ErrorKind::TimedOut,
            format!(
                "{} {} did not complete within {:?}",
                method.as_str(),
                path,
                self.timeout
            ),
        ))
    }
}

pub(crate) fn encode_request(method: Method, path: &str, body: Option<&[u8]>) -> Vec<u8> {
    let mut head = String::with_capacity(128);
    let _ = write!(
        head,
        "{} {} HTTP/1.1\r\nHost: localhost\r\nAccept: application/json\r\nConnection: close\r\n",
        method.as_str(),
        path
    );
    match body {
        Some(b) => {
            let _ = write!(
                head,
                "Content-Type: application/json\r\nContent-Length: {}\r\n",
                b.len()
            );
        }
        None if method == Method::Post => head.push_str("Content-Length: 0\r\n"),
        None => {}
    }
    head.push_str("\r\n");
    let mut out = head.into_bytes();
    if let Some(b) = body {
        out.extend_from_slice(b);
    }
    out
}

async fn write_request<W: AsyncWrite + Unpin>(
    writer: &mut W,
    method: Method,
    path: &str,
    body: Option<&[u8]>,
) -> Result<()> {
    let bytes = encode_request(method, path, body);
    writer
        .write_all(&bytes)
        .await
        .map_err(DaemonError::Transport)?;
    writer.flush().await.map_err(DaemonError::Transport)
}

pub(crate) async fn read_more<R: AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut BytesMut,
) -> Result<usize> {
    buf.reserve(READ_CHUNK);
    reader.read_buf(buf).await.map_err(DaemonError::Transport)
}

/// Reads a complete response: head, then body per chunked / Content-Length / until-close framing.
pub async fn read_response<R: AsyncRead + Unpin>(reader: &mut R) -> Result<RawResponse> {
    let mut buf = BytesMut::with_capacity(READ_CHUNK);
    let head = read_head(reader, &mut buf).await?;
    let mut decoder = BodyDecoder::for_head(&head)?;
    let mut body = BytesMut::new();
    loop {
        if decoder.decode(&mut buf, &mut body)? {
            break;
        }
        if read_more(reader, &mut buf).await? == 0 {
            if decoder.complete_at_eof() {
                break;
            }
            return Err(DaemonError::Protocol(format!(
                "connection closed after {} body bytes, before the response was complete",
                body.len()
            )));
        }
    }
    Ok(RawResponse {
        head,
        body: body.freeze(),
    })
}

/// Reads until the blank line ending the head. Bytes past it stay in `buf`.
pub(crate) async fn read_head<R: AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut BytesMut,
) -> Result<ResponseHead> {
    loop {
        if let Some(end) = find_head_end(buf) {
            let head = buf.split_to(end);
            return parse_head(&head);
        }
        if buf.len() > MAX_HEAD_BYTES {
            return Err(DaemonError::Protocol(format!(
                "response head exceeds {} bytes",
                MAX_HEAD_BYTES
            )));
        }
        if read_more(reader, buf).await? == 0 {
            return Err(DaemonError::Protocol(if buf.is_empty() {
                "connection closed before a response was sent".into()
            } else {
                "connection closed inside the response head".into()
            }));
        }
    }
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4)
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

pub(crate) fn parse_head(bytes: &[u8]) -> Result<ResponseHead> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| DaemonError::Protocol("response head is not valid UTF-8".into()))?;
    let mut lines = text.split("\r\n");
    let status_line = lines.next().unwrap_or_default();
    let bad_status = || DaemonError::Protocol(format!("bad status line: {:?}", status_line));

    let mut parts = status_line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/1.") {
        return Err(bad_status());
    }
    let status = parts
        .next()
        .filter(|s| s.len() == 3)
        .and_then(|s| s.parse::<u16>().ok())
        .filter(|s| (100..600).contains(s))
        .ok_or_else(bad_status)?;
    let reason = parts.next().unwrap_or_default().trim().to_string();

    let mut headers = Vec::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| DaemonError::Protocol(format!("bad header line: {:?}", line)))?;
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(DaemonError::Protocol(format!("bad header name: {:?}", name)));
        }
        headers.push((name.to_string(), value.trim().to_string()));
    }

    Ok(ResponseHead {
        status,
        reason,
        headers,
    })
}

/// Body framing chosen from the response head.
#[derive(Debug)]
pub(crate) enum BodyDecoder {
    Chunked(ChunkedDecoder),
    Length(usize),
    UntilClose,
}

impl BodyDecoder {
    pub(crate) fn for_head(head: &ResponseHead) -> Result<Self> {
        if head.status < 200 || head.status == 204 || head.status == 304 {
            return Ok(BodyDecoder::Length(0));
        }
        if let Some(te) = head.header("transfer-encoding") {
            let chunked = te
                .rsplit(',')
                .next()
                .is_some_and(|last| last.trim().eq_ignore_ascii_case("chunked"));
            return Ok(if chunked {
                BodyDecoder::Chunked(ChunkedDecoder::default())
            } else {
                BodyDecoder::UntilClose
            });
        }
        if let Some(len) = head.header("content-length") {
            let len = len
                .parse::<usize>()
                .map_err(|_| DaemonError::Protocol(format!("bad content-length: {:?}", len)))?;
            return Ok(BodyDecoder::Length(len));
        }
        Ok(BodyDecoder::UntilClose)
    }

    /// Moves body bytes from `input` to `out`. Returns true once the body is complete.
    pub(crate) fn decode(&mut self, input: &mut BytesMut, out: &mut BytesMut) -> Result<bool> {
        match self {
            BodyDecoder::Chunked(chunked) => chunked.decode(input, out),
            BodyDecoder::Length(remaining) => {
                let n = (*remaining).min(input.len());
                out.extend_from_slice(&input.split_to(n));
                *remaining -= n;
                Ok(*remaining == 0)
            }
            BodyDecoder::UntilClose => {
                out.extend_from_slice(&input.split());
                Ok(false)
            }
        }
    }

    /// Whether EOF is the expected end of this body.
    pub(crate) fn complete_at_eof(&self) -> bool {
        matches!(self, BodyDecoder::UntilClose)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkState {
    Size,
    Data(usize),
    DataEnd,
    Trailer,
    Done,
}

/// Incremental `Transfer-Encoding: chunked` decoder. Keeps its place across reads,
/// so a size line, payload or CRLF may be split anywhere.
#[derive(Debug)]
pub(crate) struct ChunkedDecoder {
    state: ChunkState,
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self {
            state: ChunkState::Size,
        }
    }
}

impl ChunkedDecoder {
    pub(crate) fn decode(&mut self, input: &mut BytesMut, out: &mut BytesMut) -> Result<bool> {
        loop {
            match self.state {
                ChunkState::Size => {
                    let Some(pos) = find_crlf(input) else {
                        return Self::need_line(input);
                    };
                    let line = input.split_to(pos + 2);
                    let size = parse_chunk_size(&line[..pos])?;
                    self.state = if size == 0 {
                        ChunkState::Trailer
                    } else {
                        ChunkState::Data(size)
                    };
                }
                ChunkState::Data(remaining) => {
                    if input.is_empty() {
                        return Ok(false);
                    }
                    let n = remaining.min(input.len());
                    out.extend_from_slice(&input.split_to(n));
                    self.state = if remaining == n {
                        ChunkState::DataEnd
                    } else {
                        ChunkState::Data(remaining - n)
                    };
                }
                ChunkState::DataEnd => {
                    if input.len() < 2 {
                        return Ok(false);
                    }
                    if &input[..2] != b"\r\n" {
                        return Err(DaemonError::Protocol(
                            "chunk payload not followed by CRLF".into(),
                        ));
                    }
                    input.advance(2);
                    self.state = ChunkState::Size;
                }
                ChunkState::Trailer => {
                    let Some(pos) = find_crlf(input) else {
                        return Self::need_line(input);
                    };
                    input.advance(pos + 2);
                    if pos == 0 {
                        self.state = ChunkState::Done;
                    }
                }
                ChunkState::Done => return Ok(true),
            }
        }
    }

    fn need_line(input: &BytesMut) -> Result<bool> {
        if input.len() > MAX_CHUNK_LINE_BYTES {
            return Err(DaemonError::Protocol("chunk size line too long".into()));
        }
        Ok(false)
    }
}

fn parse_chunk_size(line: &[u8]) -> Result<usize> {
    let bad = || DaemonError::Protocol(format!("bad chunk size line: {:?}", String::from_utf8_lossy(line)));
    let text = std::str::from_utf8(line).map_err(|_| bad())?;
    let size = text.split(';').next().unwrap_or_default().trim();
    if size.is_empty() {
        return Err(bad());
    }
    usize::from_str_radix(size, 16).map_err(|_| bad())
}
