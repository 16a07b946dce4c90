// Demultiplexed container log lines

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stream id carried in byte 0 of a log frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStreamKind {
    Stdin,
    Stdout,
    Stderr,
}

impl LogStreamKind {
    pub fn from_header_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(LogStreamKind::Stdin),
            1 => Some(LogStreamKind::Stdout),
            2 => Some(LogStreamKind::Stderr),
            _ => None,
        }
    }
}

/// One line of container output, forwarded as soon as it is parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub stream: LogStreamKind,
    pub text: String,
}

/// How much history a log tail starts with: the last N lines or everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTail {
    All,
    Lines(u32),
}

impl fmt::Display for LogTail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogTail::All => f.write_str("all"),
            LogTail::Lines(n) => write!(f, "{}", n),
        }
    }
}

impl FromStr for LogTail {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(LogTail::All),
            n => n
                .parse()
                .map(LogTail::Lines)
                .map_err(|_| format!("tail must be a line count or \"all\", got {:?}", s)),
        }
    }
}
