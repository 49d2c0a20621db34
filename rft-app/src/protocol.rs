//! The tiny control protocol layered over a `rft_core::Connection`: an
//! ASCII mode/filename/size preamble, then a JSON status after each line.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Chunk size for both the control-line framing and the bulk copy loops.
pub const BUFFER_SIZE: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Upload,
    Download,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Upload => "upload",
            Mode::Download => "download",
        }
    }

    pub fn parse(s: &str) -> Option<Mode> {
        match s.trim() {
            "upload" => Some(Mode::Upload),
            "download" => Some(Mode::Download),
            _ => None,
        }
    }
}

/// The JSON status message's `msg` field is dynamically typed in the
/// original protocol — a human-readable string in most replies, a byte
/// count in the download-authorization reply. Modeled as a tagged variant
/// per the design notes rather than a loosely-typed JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Msg {
    Text(String),
    Size(u64),
}

/// `{"code": int, "msg": value}`, with `msg` omitted entirely for bare
/// error codes (`{"code": 400}`, no `msg` key) — mirrors the original
/// file-not-found response shape exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub code: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub msg: Option<Msg>,
}

impl Status {
    pub fn ok(msg: Msg) -> Status {
        Status {
            code: 200,
            msg: Some(msg),
        }
    }

    pub fn ok_text(msg: impl Into<String>) -> Status {
        Status::ok(Msg::Text(msg.into()))
    }

    pub fn error(code: u32) -> Status {
        Status { code, msg: None }
    }
}

/// Surfaced when the peer answers a control message with anything other
/// than 200 — e.g. a download request for a file the server doesn't have.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationProtocolError {
    pub code: u32,
    pub msg: Option<Msg>,
}

impl fmt::Display for ApplicationProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.msg {
            Some(Msg::Text(text)) => write!(f, "server returned {}: {}", self.code, text),
            Some(Msg::Size(n)) => write!(f, "server returned {} ({})", self.code, n),
            None => write!(f, "server returned {}", self.code),
        }
    }
}

impl std::error::Error for ApplicationProtocolError {}
