use std::fmt;
use std::io;

use crate::protocol::ApplicationProtocolError;

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    Protocol(ApplicationProtocolError),
    /// A control-line reply didn't parse as the expected JSON `Status`.
    UnexpectedResponse(String),
    /// The peer's side of the connection closed mid-handshake.
    ConnectionClosed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "io error: {err}"),
            Error::Protocol(err) => write!(f, "{err}"),
            Error::UnexpectedResponse(text) => write!(f, "unexpected response: {text}"),
            Error::ConnectionClosed => write!(f, "connection closed before handshake completed"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Protocol(err) => Some(err),
            Error::UnexpectedResponse(_) | Error::ConnectionClosed => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
