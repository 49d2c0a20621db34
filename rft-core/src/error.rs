use std::fmt;
use std::io;

/// Errors surfaced across the public `Transport` boundary.
///
/// Per the propagation policy: the transport recovers every kind of loss
/// and disorder it is designed for internally (malformed packets, unexpected
/// transitions, duplicates, reordering). Only datagram-layer unreachability
/// and exhausted retry budgets make it out to the caller.
#[derive(Debug)]
pub enum Error {
    /// `connect` failed at the datagram layer (peer unreachable, no route).
    ConnectFailed(io::Error),
    /// The retransmission thread's retry budget ran out, or the connection
    /// was otherwise abandoned without completing its handshake/close.
    ConnectionStalled,
    /// A lower-level I/O failure (bind, socket option, etc.) not covered by
    /// the two kinds above.
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ConnectFailed(err) => write!(f, "connect failed: {err}"),
            Error::ConnectionStalled => write!(f, "connection stalled"),
            Error::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::ConnectFailed(err) | Error::Io(err) => Some(err),
            Error::ConnectionStalled => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
