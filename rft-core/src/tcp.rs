//! The kernel-reliability-path transport: a thin wrapper over
//! `std::net::TcpStream`/`TcpListener` exposing the same capability set as
//! the UDP endpoint, selected once per process via `--proto tcp` rather
//! than at runtime per connection.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Mutex;

use crate::error::Result;

pub struct TcpConnection {
    stream: Mutex<TcpStream>,
}

impl TcpConnection {
    fn new(stream: TcpStream) -> TcpConnection {
        TcpConnection {
            stream: Mutex::new(stream),
        }
    }

    pub fn send(&self, data: &[u8]) -> usize {
        let mut stream = self.stream.lock().unwrap();
        match stream.write_all(data) {
            Ok(()) => data.len(),
            Err(_) => 0,
        }
    }

    pub fn recv(&self, n: usize) -> Vec<u8> {
        let mut stream = self.stream.lock().unwrap();
        let mut buf = vec![0u8; n];
        match stream.read(&mut buf) {
            Ok(read) => {
                buf.truncate(read);
                buf
            }
            Err(_) => Vec::new(),
        }
    }

    pub fn close(&self) {
        let stream = self.stream.lock().unwrap();
        let _ = stream.shutdown(std::net::Shutdown::Both);
    }
}

pub struct TcpServer {
    listener: TcpListener,
}

impl TcpServer {
    pub fn bind(address: SocketAddr) -> Result<TcpServer> {
        Ok(TcpServer {
            listener: TcpListener::bind(address)?,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// No-op: TCP's accept queue is already managed by the kernel, so
    /// there is nothing analogous to the UDP listener's dispatch thread
    /// to start. Kept so callers can treat both protocols uniformly.
    pub fn listen(&self) -> Result<()> {
        Ok(())
    }

    pub fn accept(&self) -> Result<(TcpConnection, SocketAddr)> {
        let (stream, peer) = self.listener.accept()?;
        Ok((TcpConnection::new(stream), peer))
    }
}

pub fn connect(address: SocketAddr) -> Result<TcpConnection> {
    Ok(TcpConnection::new(TcpStream::connect(address)?))
}
