//! The reliable endpoint: per-connection state machine running on top of a
//! single connected `UdpSocket`. See spec §4.2 for the full state table this
//! module implements.

use std::collections::VecDeque;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use slog::{debug, o, trace, Logger};

use crate::config::EndpointConfig;
use crate::error::{Error, Result};
use crate::packet::{Packet, MAX_PAYLOAD_SIZE};

/// Poll granularity for the receiver thread's blocking recv: short enough
/// that a torn-down endpoint's socket read timeout notices `closed` quickly,
/// long enough not to spin.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    SynSent,
    SynReceived,
    Established,
    Closing,
    Closed,
}

struct TransmitState {
    status: Status,
    send_seq: u32,
    /// Ascending `seq_n` order = transmission order; capacity `window_size`.
    in_flight: Vec<Packet>,
    send_overflow: VecDeque<Packet>,
    stop_transmission: bool,
    fin_retry_budget: u32,
    fin_acked: bool,
}

struct RecvState {
    recv_seq: u32,
    recv_buffer: VecDeque<u8>,
}

struct Shared {
    socket: UdpSocket,
    role: Role,
    cfg: EndpointConfig,
    log: Logger,

    transmit: Mutex<TransmitState>,
    established_cv: Condvar,
    can_close_cv: Condvar,
    fin_acked_cv: Condvar,

    recv: Mutex<RecvState>,
    recv_ready_cv: Condvar,

    /// Set once the endpoint has torn down; unblocks recv() with an empty
    /// read per spec's failure semantics ("reads after close return empty").
    closed: AtomicBool,
}

/// A single reliable-transport connection. Constructed either by
/// [`Endpoint::connect`] (client) or by the [`crate::udp::listener::Listener`]
/// on receipt of a SYN (server), then driven by its own receiver and
/// retransmission threads for its whole lifetime.
pub struct Endpoint {
    shared: Arc<Shared>,
    receiver: Option<JoinHandle<()>>,
    retransmitter: Option<JoinHandle<()>>,
}

impl Endpoint {
    /// Client-only. Blocks until the three-way handshake completes or the
    /// datagram layer reports the peer unreachable.
    pub fn connect(
        local: SocketAddr,
        remote: SocketAddr,
        cfg: EndpointConfig,
        log: Logger,
    ) -> Result<Endpoint> {
        let socket = UdpSocket::bind(local)?;
        socket
            .connect(remote)
            .map_err(Error::ConnectFailed)?;
        socket.set_read_timeout(Some(POLL_INTERVAL))?;

        let log = log.new(o!("role" => "client", "peer" => remote.to_string()));
        let mut endpoint = Self::new_internal(socket, Role::Client, Status::SynSent, cfg, log);

        {
            let mut tx = endpoint.shared.transmit.lock().unwrap();
            let syn = Packet::syn();
            tx.in_flight.push(syn.clone());
            endpoint.shared.transmit_locked(&syn);
        }

        let (r, t) = endpoint.start_threads();
        endpoint.receiver = Some(r);
        endpoint.retransmitter = Some(t);

        let mut tx = endpoint.shared.transmit.lock().unwrap();
        while tx.status != Status::Established {
            tx = endpoint.shared.established_cv.wait(tx).unwrap();
        }
        drop(tx);

        Ok(endpoint)
    }

    /// Used by the listener thread to fork a freshly accepted connection.
    /// The endpoint starts in `SynReceived`; its receiver thread's first
    /// action (once started by `accept`) is to transmit SYN+ACK.
    pub(crate) fn from_forked_socket(
        socket: UdpSocket,
        cfg: EndpointConfig,
        log: Logger,
    ) -> Endpoint {
        socket
            .set_read_timeout(Some(POLL_INTERVAL))
            .expect("setting read timeout on a freshly forked socket cannot fail");
        Self::new_internal(socket, Role::Server, Status::SynReceived, cfg, log)
    }

    fn new_internal(
        socket: UdpSocket,
        role: Role,
        status: Status,
        cfg: EndpointConfig,
        log: Logger,
    ) -> Endpoint {
        let shared = Arc::new(Shared {
            socket,
            role,
            cfg,
            log,
            transmit: Mutex::new(TransmitState {
                status,
                send_seq: 0,
                in_flight: Vec::with_capacity(cfg.window_size),
                send_overflow: VecDeque::new(),
                stop_transmission: false,
                fin_retry_budget: cfg.fin_retry_budget,
                fin_acked: false,
            }),
            established_cv: Condvar::new(),
            can_close_cv: Condvar::new(),
            fin_acked_cv: Condvar::new(),
            recv: Mutex::new(RecvState {
                recv_seq: 0,
                recv_buffer: VecDeque::new(),
            }),
            recv_ready_cv: Condvar::new(),
            closed: AtomicBool::new(false),
        });

        Endpoint {
            shared,
            receiver: None,
            retransmitter: None,
        }
    }

    /// Spawns the receiver and retransmission threads. Called once, either
    /// right after the client sends its SYN, or by `accept` for a
    /// server-side connection.
    pub(crate) fn start_threads(&self) -> (JoinHandle<()>, JoinHandle<()>) {
        let recv_shared = Arc::clone(&self.shared);
        let receiver = thread::spawn(move || recv_shared.receiver_loop());

        let rtx_shared = Arc::clone(&self.shared);
        let retransmitter = thread::spawn(move || rtx_shared.retransmission_loop());

        (receiver, retransmitter)
    }

    /// Variant of `start_threads` that stores the join handles, used by
    /// `accept` which owns the `Endpoint` directly.
    pub(crate) fn start(&mut self) {
        if self.shared.role == Role::Server {
            // First action in SYN-RECEIVED: transmit SYN+ACK.
            let _tx = self.shared.transmit.lock().unwrap();
            self.shared.transmit_locked(&Packet::syn_ack());
        }
        let (r, t) = self.start_threads();
        self.receiver = Some(r);
        self.retransmitter = Some(t);
    }

    /// Splits `data` into chunks of at most `MAX_PAYLOAD_SIZE` bytes and
    /// either transmits or queues each one. Never blocks, never drops
    /// bytes; flow control is implicit via the bounded window + queue.
    pub fn send(&self, data: &[u8]) -> usize {
        if data.is_empty() {
            return 0;
        }
        let mut tx = self.shared.transmit.lock().unwrap();
        for chunk in data.chunks(MAX_PAYLOAD_SIZE) {
            let seq_n = tx.send_seq + 1;
            tx.send_seq = seq_n;
            let recv_seq = self.shared.recv.lock().unwrap().recv_seq;
            let pkt = Packet::data(seq_n, recv_seq, chunk.to_vec());

            if tx.in_flight.len() < self.shared.cfg.window_size {
                tx.in_flight.push(pkt.clone());
                self.shared.transmit_locked(&pkt);
            } else {
                tx.send_overflow.push_back(pkt);
            }
        }
        data.len()
    }

    /// Blocks until at least one byte is available, then removes and
    /// returns at most `n` bytes. Returns empty once the endpoint has
    /// closed and the buffer has drained.
    pub fn recv(&self, n: usize) -> Vec<u8> {
        let mut rx = self.shared.recv.lock().unwrap();
        loop {
            if !rx.recv_buffer.is_empty() {
                break;
            }
            if self.shared.closed.load(Ordering::SeqCst) {
                return Vec::new();
            }
            rx = self
                .shared
                .recv_ready_cv
                .wait_timeout(rx, POLL_INTERVAL)
                .unwrap()
                .0;
        }
        let take = n.min(rx.recv_buffer.len());
        rx.recv_buffer.drain(..take).collect()
    }

    /// Waits for all in-flight and queued data to be acknowledged, then
    /// emits FIN. Blocks for clients until FIN+ACK arrives; returns
    /// immediately for servers once FIN is queued (the retransmission
    /// thread owns server-side teardown, per spec: the server never
    /// initiates its own FIN and relies on the retry budget to exit).
    pub fn close(&self) {
        {
            let mut tx = self.shared.transmit.lock().unwrap();
            while !(tx.in_flight.is_empty() && tx.send_overflow.is_empty()) {
                tx = self.shared.can_close_cv.wait(tx).unwrap();
            }
            let fin = Packet::fin();
            tx.in_flight.push(fin.clone());
            tx.status = Status::Closing;
            self.shared.transmit_locked(&fin);
        }

        if self.shared.role == Role::Client {
            let mut tx = self.shared.transmit.lock().unwrap();
            while !tx.fin_acked {
                tx = self.shared.fin_acked_cv.wait(tx).unwrap();
            }
        }
    }

    pub fn peer_role(&self) -> Role {
        self.shared.role
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        if let Some(handle) = self.receiver.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.retransmitter.take() {
            let _ = handle.join();
        }
    }
}

impl Shared {
    /// Transmits `pkt` on the wire. Must be called while holding
    /// `transmit_lock` so ordering on the wire matches ordering in the
    /// window — the caller passes a `MutexGuard` implicitly by virtue of
    /// this only ever being invoked from sites that already hold it.
    fn transmit_locked(&self, pkt: &Packet) {
        trace!(self.log, "transmit"; "seq_n" => pkt.seq_n, "ack_n" => pkt.ack_n, "flags" => pkt.flags);
        if let Err(err) = self.socket.send(&pkt.encode()) {
            debug!(self.log, "transmit failed"; "error" => %err);
        }
    }

    fn receiver_loop(self: Arc<Self>) {
        let mut buf = [0u8; crate::packet::MAX_PACKET_SIZE];
        loop {
            if self.closed.load(Ordering::SeqCst) {
                return;
            }
            let n = match self.socket.recv(&mut buf) {
                Ok(n) => n,
                Err(err)
                    if err.kind() == std::io::ErrorKind::WouldBlock
                        || err.kind() == std::io::ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(_) => return,
            };

            let pkt = match Packet::decode(&buf[..n]) {
                Ok(pkt) => pkt,
                Err(_) => {
                    trace!(self.log, "dropping malformed packet");
                    continue;
                }
            };

            self.handle_packet(pkt);

            if self.teardown_ready() {
                return;
            }
        }
    }

    fn teardown_ready(&self) -> bool {
        let tx = self.transmit.lock().unwrap();
        tx.status == Status::Closed
    }

    fn handle_packet(&self, pkt: Packet) {
        let mut tx = self.transmit.lock().unwrap();
        match tx.status {
            Status::SynSent => self.handle_syn_sent(&mut tx, pkt),
            Status::SynReceived => self.handle_syn_received(&mut tx, pkt),
            Status::Established => self.handle_established(&mut tx, pkt),
            Status::Closing => self.handle_closing(&mut tx, pkt),
            Status::Closed => {}
        }
    }

    fn handle_syn_sent(&self, tx: &mut TransmitState, pkt: Packet) {
        if pkt.is_syn_ack() && pkt.ack_n == 0 {
            tx.in_flight.retain(|p| !p.is_syn());
            tx.status = Status::Established;
            self.transmit_locked(&Packet::ack(0, 0));
            self.established_cv.notify_all();
        } else {
            debug!(self.log, "unexpected transition in SYN-SENT"; "flags" => pkt.flags);
        }
    }

    fn handle_syn_received(&self, tx: &mut TransmitState, pkt: Packet) {
        if pkt.is_syn() {
            // Duplicate SYN: the original SYN+ACK or its ACK was lost.
            self.transmit_locked(&Packet::syn_ack());
        } else if pkt.is_ack() && pkt.ack_n == 0 {
            tx.status = Status::Established;
            self.established_cv.notify_all();
        } else if pkt.is_data() && pkt.seq_n == 1 {
            // Lost-ACK recovery: the handshake-completing ACK never
            // arrived, but the first DATA packet proves the client moved
            // on — treat that as equivalent progress.
            tx.status = Status::Established;
            self.established_cv.notify_all();
            self.handle_established(tx, pkt);
        } else {
            debug!(self.log, "unexpected transition in SYN-RECEIVED"; "flags" => pkt.flags);
        }
    }

    fn handle_established(&self, tx: &mut TransmitState, pkt: Packet) {
        if pkt.is_ack() {
            let ack_n = pkt.ack_n;
            tx.in_flight.retain(|p| p.seq_n > ack_n);

            while tx.in_flight.len() < self.cfg.window_size {
                let Some(mut next) = tx.send_overflow.pop_front() else {
                    break;
                };
                next.ack_n = self.recv.lock().unwrap().recv_seq;
                next.tick();
                tx.in_flight.push(next.clone());
                self.transmit_locked(&next);
            }

            if tx.in_flight.is_empty() && tx.send_overflow.is_empty() {
                self.can_close_cv.notify_all();
            }
        } else if pkt.is_data() {
            let send_seq = tx.send_seq;
            let mut rx = self.recv.lock().unwrap();
            let s = pkt.seq_n;

            if s == rx.recv_seq + 1 {
                rx.recv_seq = s;
                rx.recv_buffer.extend(pkt.payload.iter().copied());
                drop(rx);
                self.recv_ready_cv.notify_all();
                self.transmit_locked(&Packet::ack(send_seq, s));
            } else {
                // Either a duplicate (s <= recv_seq) or out-of-order
                // (s > recv_seq + 1) arrival. Go-Back-N discards both and
                // re-acks the last in-order byte so the sender's window
                // slides back to the gap.
                let acked = rx.recv_seq;
                drop(rx);
                self.transmit_locked(&Packet::ack(send_seq, acked));
            }
        } else if pkt.is_fin() && self.role == Role::Server {
            self.transmit_locked(&Packet::fin_ack());
            tx.stop_transmission = true;
        } else {
            debug!(self.log, "unexpected transition in ESTABLISHED"; "flags" => pkt.flags);
        }
    }

    fn handle_closing(&self, tx: &mut TransmitState, pkt: Packet) {
        if pkt.is_fin_ack() && self.role == Role::Client {
            tx.in_flight.retain(|p| !p.is_fin());
            tx.fin_acked = true;
            tx.stop_transmission = true;
            self.fin_acked_cv.notify_all();
        } else {
            debug!(self.log, "unexpected transition in CLOSING"; "flags" => pkt.flags);
        }
    }

    fn retransmission_loop(self: Arc<Self>) {
        loop {
            thread::sleep(self.cfg.rto);
            let mut tx = self.transmit.lock().unwrap();

            if tx.stop_transmission {
                match self.role {
                    Role::Client => {
                        tx.status = Status::Closed;
                        drop(tx);
                        self.closed.store(true, Ordering::SeqCst);
                        return;
                    }
                    Role::Server => {
                        if tx.fin_retry_budget == 0 {
                            tx.status = Status::Closed;
                            drop(tx);
                            self.closed.store(true, Ordering::SeqCst);
                            return;
                        }
                        tx.fin_retry_budget -= 1;
                    }
                }
                continue;
            }

            if tx.in_flight.iter().any(|p| p.expired(self.cfg.rto)) {
                debug!(self.log, "retransmitting window"; "count" => tx.in_flight.len());
                for pkt in tx.in_flight.iter_mut() {
                    pkt.tick();
                }
                let snapshot = tx.in_flight.clone();
                for pkt in &snapshot {
                    self.transmit_locked(pkt);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slog::Discard;

    fn test_log() -> Logger {
        Logger::root(Discard, o!())
    }

    fn pair(cfg: EndpointConfig) -> (Endpoint, Endpoint) {
        let server_socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        let server_addr = server_socket.local_addr().unwrap();
        drop(server_socket);

        let server_bound = UdpSocket::bind(server_addr).unwrap();
        let client = Endpoint::connect_async(server_addr, cfg, test_log());

        let mut buf = [0u8; 1500];
        let (n, client_addr) = server_bound.recv_from(&mut buf).unwrap();
        assert!(Packet::decode(&buf[..n]).unwrap().is_syn());

        server_bound.connect(client_addr).unwrap();
        let mut server = Endpoint::from_forked_socket(server_bound, cfg, test_log());
        server.start();

        let client = client.join().unwrap();
        (client, server)
    }

    impl Endpoint {
        fn connect_async(
            remote: SocketAddr,
            cfg: EndpointConfig,
            log: Logger,
        ) -> thread::JoinHandle<Endpoint> {
            thread::spawn(move || {
                Endpoint::connect("127.0.0.1:0".parse().unwrap(), remote, cfg, log).unwrap()
            })
        }
    }

    #[test]
    fn handshake_and_bulk_transfer_go_back_n() {
        let (client, server) = pair(EndpointConfig::go_back_n(4));

        let payload = vec![7u8; MAX_PAYLOAD_SIZE * 3 + 17];
        client.send(&payload);

        let mut received = Vec::new();
        while received.len() < payload.len() {
            received.extend(server.recv(4096));
        }
        assert_eq!(received, payload);

        client.close();
    }

    #[test]
    fn stop_and_wait_single_packet() {
        let (client, server) = pair(EndpointConfig::stop_and_wait());
        client.send(b"hello");
        let mut received = Vec::new();
        while received.len() < 5 {
            received.extend(server.recv(5));
        }
        assert_eq!(received, b"hello");
        client.close();
    }

    #[test]
    fn empty_send_produces_no_traffic() {
        let (client, server) = pair(EndpointConfig::go_back_n(4));
        assert_eq!(client.send(&[]), 0);
        {
            let tx = client.shared.transmit.lock().unwrap();
            assert!(tx.in_flight.is_empty());
        }
        client.close();
        drop(server);
    }
}
