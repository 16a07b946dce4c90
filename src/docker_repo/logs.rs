// Log stream demultiplexing.
//
// Frame layout: [stream, 0, 0, 0, len_be_u32...] followed by `len` payload bytes.
// Frames do not line up with socket reads, so bytes are buffered until a frame is whole.

use super::error::{DaemonError, Result};
use super::transport::{BodyDecoder, ResponseHead, read_more};
use crate::models::{LogLine, LogStreamKind};
use bytes::{Buf, Bytes, BytesMut};
use futures_util::Stream;
use std::collections::VecDeque;
use tokio::io::AsyncRead;

pub const FRAME_HEADER_LEN: usize = 8;
/// Largest payload one frame may carry; the daemon splits long lines well below this.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Splits a byte stream into log frames, keeping partial frames across pushes.
#[derive(Debug, Default)]
pub struct LogDemuxer {
    buf: BytesMut,
}

impl LogDemuxer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes buffered but not yet part of a complete frame.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Next complete frame, or `Ok(None)` when more bytes are needed.
    /// A stream byte outside {0, 1, 2} is reported as soon as it arrives.
    pub fn next_frame(&mut self) -> Result<Option<(LogStreamKind, Bytes)>> {
        let Some(&stream_byte) = self.buf.first() else {
            return Ok(None);
        };
        let kind = LogStreamKind::from_header_byte(stream_byte)
            .ok_or(DaemonError::StreamCorruption(stream_byte))?;
        if self.buf.len() < FRAME_HEADER_LEN {
            return Ok(None);
        }
        let len = u32::from_be_bytes([self.buf[4], self.buf[5], self.buf[6], self.buf[7]]) as usize;
        if len > MAX_FRAME_LEN {
            return Err(DaemonError::OversizedFrame {
                len,
                max: MAX_FRAME_LEN,
            });
        }
        if self.buf.len() < FRAME_HEADER_LEN + len {
            return Ok(None);
        }
        self.buf.advance(FRAME_HEADER_LEN);
        Ok(Some((kind, self.buf.split_to(len).freeze())))
    }

    /// Pushes `bytes` and drains every line of every frame now complete.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<LogLine>> {
        self.push(bytes);
        let mut lines = Vec::new();
        while let Some((kind, payload)) = self.next_frame()? {
            lines.extend(frame_lines(kind, &payload));
        }
        Ok(lines)
    }
}

/// Newline-delimited lines of one frame payload; blank lines are dropped.
pub fn frame_lines(kind: LogStreamKind, payload: &[u8]) -> impl Iterator<Item = LogLine> + '_ {
    payload
        .split(|b| *b == b'\n')
        .map(|raw| String::from_utf8_lossy(raw).trim_end().to_string())
        .filter(|text| !text.trim().is_empty())
        .map(move |text| LogLine { stream: kind, text })
}

/// A followed log response. Yields lines in arrival order until the daemon
/// closes the connection, a frame is corrupt, or the stream is dropped
/// (dropping closes the socket).
pub struct LogStream<R> {
    reader: R,
    raw: BytesMut,
    body: BodyDecoder,
    demux: LogDemuxer,
    pending: VecDeque<LogLine>,
    body_done: bool,
    finished: bool,
}

impl<R: AsyncRead + Unpin> LogStream<R> {
    /// `leftover` holds bytes read past the response head.
    pub fn new(reader: R, head: &ResponseHead, leftover: BytesMut) -> Result<Self> {
        Ok(Self {
            reader,
            raw: leftover,
            body: BodyDecoder::for_head(head)?,
            demux: LogDemuxer::new(),
            pending: VecDeque::new(),
            body_done: false,
            finished: false,
        })
    }

    /// Next line; `None` once the stream has ended. After an error nothing more is yielded.
    pub async fn next_line(&mut self) -> Option<Result<LogLine>> {
        loop {
            if let Some(line) = self.pending.pop_front() {
                return Some(Ok(line));
            }
            if self.finished {
                return None;
            }
            if let Err(e) = self.drain_body() {
                return self.fail(e);
            }
            match self.demux.next_frame() {
                Ok(Some((kind, payload))) => {
                    self.pending.extend(frame_lines(kind, &payload));
                    continue;
                }
                Ok(None) => {}
                Err(e) => return self.fail(e),
            }
            if self.body_done {
                if self.demux.pending() > 0 {
                    tracing::debug!(
                        bytes = self.demux.pending(),
                        "log stream ended inside a frame"
                    );
                }
                self.finished = true;
                continue;
            }
            match read_more(&mut self.reader, &mut self.raw).await {
                Ok(0) => self.body_done = true,
                Ok(_) => {}
                Err(e) => return self.fail(e),
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<LogLine>> {
        futures_util::stream::unfold(self, |mut s| async move {
            s.next_line().await.map(|item| (item, s))
        })
    }

    /// Moves de-chunked body bytes into the frame buffer.
    fn drain_body(&mut self) -> Result<()> {
        if self.raw.is_empty() || self.body_done {
            return Ok(());
        }
        let mut out = BytesMut::with_capacity(self.raw.len());
        if self.body.decode(&mut self.raw, &mut out)? {
            self.body_done = true;
        }
        self.demux.push(&out);
        Ok(())
    }

    fn fail(&mut self, e: DaemonError) -> Option<Result<LogLine>> {
        self.finished = true;
        self.pending.clear();
        Some(Err(e))
    }
}
