//! Server-side listening socket: accepts new peers by forking a
//! peer-specific connected socket off the shared bound socket, the same
//! trick the original implementation used to let the kernel demultiplex
//! by 4-tuple.

use std::collections::VecDeque;
use std::net::{SocketAddr, UdpSocket};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use slog::{debug, o, trace, Logger};

use crate::config::EndpointConfig;
use crate::error::Result;
use crate::packet::{Packet, MAX_PACKET_SIZE};
use crate::udp::endpoint::Endpoint;

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(200);

struct AcceptQueue {
    pending: Mutex<VecDeque<(Endpoint, SocketAddr)>>,
    ready: Condvar,
}

/// A bound UDP socket accepting new reliable connections. `listen` must be
/// called once before `accept` will ever return anything.
pub struct Listener {
    socket: UdpSocket,
    local_addr: SocketAddr,
    cfg: EndpointConfig,
    log: Logger,
    queue: Arc<AcceptQueue>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl Listener {
    pub fn bind(address: SocketAddr, cfg: EndpointConfig, log: Logger) -> Result<Listener> {
        let socket = UdpSocket::bind(address)?;
        let local_addr = socket.local_addr()?;
        socket.set_read_timeout(Some(ACCEPT_POLL_INTERVAL))?;
        Ok(Listener {
            socket,
            local_addr,
            cfg,
            log: log.new(o!("role" => "listener", "local" => local_addr.to_string())),
            queue: Arc::new(AcceptQueue {
                pending: Mutex::new(VecDeque::new()),
                ready: Condvar::new(),
            }),
            dispatcher: Mutex::new(None),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Spawns the dispatch thread that watches the bound socket for SYN
    /// datagrams from unfamiliar peers and forks a per-peer endpoint for
    /// each one. Idempotent: calling it twice after the first is a no-op.
    pub fn listen(&self) -> Result<()> {
        let mut guard = self.dispatcher.lock().unwrap();
        if guard.is_some() {
            return Ok(());
        }

        let socket = self.socket.try_clone()?;
        let local_addr = self.local_addr;
        let cfg = self.cfg;
        let log = self.log.clone();
        let queue = Arc::clone(&self.queue);

        *guard = Some(thread::spawn(move || {
            Self::dispatch_loop(socket, local_addr, cfg, log, queue)
        }));
        Ok(())
    }

    fn dispatch_loop(
        socket: UdpSocket,
        local_addr: SocketAddr,
        cfg: EndpointConfig,
        log: Logger,
        queue: Arc<AcceptQueue>,
    ) {
        let mut buf = [0u8; MAX_PACKET_SIZE];
        loop {
            let (n, peer) = match socket.recv_from(&mut buf) {
                Ok(pair) => pair,
                Err(err)
                    if err.kind() == std::io::ErrorKind::WouldBlock
                        || err.kind() == std::io::ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(err) => {
                    debug!(log, "listener socket closed"; "error" => %err);
                    return;
                }
            };

            let pkt = match Packet::decode(&buf[..n]) {
                Ok(pkt) => pkt,
                Err(_) => continue,
            };

            if !pkt.is_syn() {
                trace!(log, "dropping non-SYN on listener socket"; "peer" => %peer);
                continue;
            }

            let forked = match Self::fork_socket(local_addr, peer) {
                Ok(s) => s,
                Err(err) => {
                    debug!(log, "failed to fork peer socket"; "peer" => %peer, "error" => %err);
                    continue;
                }
            };

            let endpoint = Endpoint::from_forked_socket(
                forked,
                cfg,
                log.new(o!("peer" => peer.to_string())),
            );

            let mut pending = queue.pending.lock().unwrap();
            pending.push_back((endpoint, peer));
            queue.ready.notify_one();
        }
    }

    /// Creates a fresh socket bound to the same local address (with
    /// `SO_REUSEADDR` so the bind doesn't collide with the listener's own
    /// socket) and connects it to `peer`, so the kernel demultiplexes
    /// future datagrams from that 4-tuple straight to it.
    fn fork_socket(local_addr: SocketAddr, peer: SocketAddr) -> std::io::Result<UdpSocket> {
        use socket2::{Domain, Socket, Type};

        let domain = if local_addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };
        let sock = Socket::new(domain, Type::DGRAM, None)?;
        sock.set_reuse_address(true)?;
        sock.bind(&local_addr.into())?;
        sock.connect(&peer.into())?;
        let std_socket: UdpSocket = sock.into();
        Ok(std_socket)
    }

    /// Blocking. Removes the next forked endpoint from the accept queue,
    /// starts its receiver and retransmission threads (the first of which
    /// immediately transmits SYN+ACK), and returns it alongside the peer's
    /// address. Does not wait for the handshake to finish — the returned
    /// endpoint is in SYN-RECEIVED and becomes ESTABLISHED shortly after.
    pub fn accept(&self) -> (Endpoint, SocketAddr) {
        let mut pending = self.queue.pending.lock().unwrap();
        let (mut endpoint, peer) = loop {
            if let Some(item) = pending.pop_front() {
                break item;
            }
            pending = self.queue.ready.wait(pending).unwrap();
        };
        drop(pending);
        endpoint.start();
        (endpoint, peer)
    }
}
