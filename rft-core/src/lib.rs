//! Reliable byte-stream transport over UDP, plus a TCP pass-through that
//! exposes the same capability set. See `SPEC_FULL.md` for the protocol
//! this crate implements.
//!
//! The public surface is deliberately not a trait object: `Proto` is
//! chosen once per process (from the CLI), and `Connection`/`ServerSocket`
//! are small enums over the two concrete implementations rather than
//! `Box<dyn Transport>`. Neither implementation needs runtime
//! polymorphism, so there isn't one.

pub mod config;
pub mod error;
pub mod packet;
pub mod tcp;
pub mod udp;

pub use config::EndpointConfig;
pub use error::{Error, Result};

use std::net::SocketAddr;

use slog::Logger;

/// Which reliability strategy a connection runs. `StopAndWait` and
/// `GoBackN` both ride the same `udp::Endpoint` state machine and differ
/// only in `EndpointConfig::window_size`; `Tcp` bypasses it entirely and
/// leans on the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Proto {
    Tcp,
    StopAndWait,
    GoBackN,
}

impl Proto {
    pub fn config(&self, window_size: usize) -> EndpointConfig {
        match self {
            Proto::Tcp => EndpointConfig::default(),
            Proto::StopAndWait => EndpointConfig::stop_and_wait(),
            Proto::GoBackN => EndpointConfig::go_back_n(window_size),
        }
    }
}

/// An established connection, client or server side, UDP-reliable or TCP.
pub enum Connection {
    Udp(udp::Endpoint),
    Tcp(tcp::TcpConnection),
}

impl Connection {
    pub fn send(&self, data: &[u8]) -> usize {
        match self {
            Connection::Udp(ep) => ep.send(data),
            Connection::Tcp(c) => c.send(data),
        }
    }

    pub fn recv(&self, n: usize) -> Vec<u8> {
        match self {
            Connection::Udp(ep) => ep.recv(n),
            Connection::Tcp(c) => c.recv(n),
        }
    }

    pub fn close(&self) {
        match self {
            Connection::Udp(ep) => ep.close(),
            Connection::Tcp(c) => c.close(),
        }
    }
}

/// Client-side entry point: connects to `remote` using `proto`, blocking
/// until the connection is usable.
pub fn connect(
    local: SocketAddr,
    remote: SocketAddr,
    proto: Proto,
    window_size: usize,
    log: Logger,
) -> Result<Connection> {
    match proto {
        Proto::Tcp => Ok(Connection::Tcp(tcp::connect(remote)?)),
        other => {
            let endpoint = udp::Endpoint::connect(local, remote, other.config(window_size), log)?;
            Ok(Connection::Udp(endpoint))
        }
    }
}

/// A bound server socket, not yet listening.
pub enum ServerSocket {
    Udp(udp::Listener),
    Tcp(tcp::TcpServer),
}

impl ServerSocket {
    pub fn bind(
        address: SocketAddr,
        proto: Proto,
        window_size: usize,
        log: Logger,
    ) -> Result<ServerSocket> {
        match proto {
            Proto::Tcp => Ok(ServerSocket::Tcp(tcp::TcpServer::bind(address)?)),
            other => Ok(ServerSocket::Udp(udp::Listener::bind(
                address,
                other.config(window_size),
                log,
            )?)),
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        match self {
            ServerSocket::Udp(l) => Ok(l.local_addr()),
            ServerSocket::Tcp(t) => t.local_addr(),
        }
    }

    pub fn listen(&self) -> Result<()> {
        match self {
            ServerSocket::Udp(l) => l.listen(),
            ServerSocket::Tcp(t) => t.listen(),
        }
    }

    pub fn accept(&self) -> Result<(Connection, SocketAddr)> {
        match self {
            ServerSocket::Udp(l) => {
                let (endpoint, peer) = l.accept();
                Ok((Connection::Udp(endpoint), peer))
            }
            ServerSocket::Tcp(t) => {
                let (conn, peer) = t.accept()?;
                Ok((Connection::Tcp(conn), peer))
            }
        }
    }
}
