//! Wire format for the reliable-transport datagrams.
//!
//! A packet is a fixed 12-byte header — `seq_n`, `ack_n`, `flags`, each a
//! little-endian `u32` — followed by 0 or more payload bytes.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io;
use std::time::Instant;

pub const HEADER_SIZE: usize = 12;
pub const MAX_PACKET_SIZE: usize = 1500;
pub const MAX_PAYLOAD_SIZE: usize = MAX_PACKET_SIZE - HEADER_SIZE;

const FLAG_SYN: u32 = 0b1000;
const FLAG_ACK: u32 = 0b0100;
const FLAG_FIN: u32 = 0b0010;
const FLAG_PSH: u32 = 0b0001;

const FLAGS_SYN: u32 = FLAG_SYN;
const FLAGS_ACK: u32 = FLAG_ACK;
const FLAGS_SYN_ACK: u32 = FLAG_SYN | FLAG_ACK;
const FLAGS_FIN: u32 = FLAG_FIN;
const FLAGS_FIN_ACK: u32 = FLAG_FIN | FLAG_ACK;
const FLAGS_DATA: u32 = FLAG_ACK | FLAG_PSH;

/// A single reliable-transport datagram. `sent_at` is never put on the
/// wire — it is local bookkeeping used by the retransmission thread to
/// decide whether a packet has aged past the RTO.
#[derive(Debug, Clone)]
pub struct Packet {
    pub seq_n: u32,
    pub ack_n: u32,
    pub flags: u32,
    pub payload: Vec<u8>,
    pub sent_at: Instant,
}

impl PartialEq for Packet {
    fn eq(&self, other: &Self) -> bool {
        self.seq_n == other.seq_n
            && self.ack_n == other.ack_n
            && self.flags == other.flags
            && self.payload == other.payload
    }
}
impl Eq for Packet {}

impl PartialOrd for Packet {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Packet {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.seq_n.cmp(&other.seq_n)
    }
}

impl Packet {
    fn new(seq_n: u32, ack_n: u32, flags: u32, payload: Vec<u8>) -> Packet {
        Packet {
            seq_n,
            ack_n,
            flags,
            payload,
            sent_at: Instant::now(),
        }
    }

    pub fn syn() -> Packet {
        Packet::new(0, 0, FLAGS_SYN, Vec::new())
    }

    pub fn syn_ack() -> Packet {
        Packet::new(0, 0, FLAGS_SYN_ACK, Vec::new())
    }

    pub fn ack(seq_n: u32, ack_n: u32) -> Packet {
        Packet::new(seq_n, ack_n, FLAGS_ACK, Vec::new())
    }

    pub fn data(seq_n: u32, ack_n: u32, payload: Vec<u8>) -> Packet {
        Packet::new(seq_n, ack_n, FLAGS_DATA, payload)
    }

    pub fn fin() -> Packet {
        Packet::new(0, 0, FLAGS_FIN, Vec::new())
    }

    pub fn fin_ack() -> Packet {
        Packet::new(0, 0, FLAGS_FIN_ACK, Vec::new())
    }

    pub fn is_syn(&self) -> bool {
        self.flags == FLAGS_SYN
    }

    pub fn is_ack(&self) -> bool {
        self.flags == FLAGS_ACK
    }

    pub fn is_syn_ack(&self) -> bool {
        self.flags == FLAGS_SYN_ACK
    }

    pub fn is_fin(&self) -> bool {
        self.flags == FLAGS_FIN
    }

    pub fn is_fin_ack(&self) -> bool {
        self.flags == FLAGS_FIN_ACK
    }

    /// DATA requires both the exact ACK|PSH flag combination and a
    /// non-empty payload — a control packet carrying the DATA flags with
    /// no bytes is not a DATA packet (spec Open Question (b): malformed).
    pub fn is_data(&self) -> bool {
        self.flags == FLAGS_DATA && !self.payload.is_empty()
    }

    /// Marks the packet as sent `now`, refreshing its retransmission age.
    pub fn tick(&mut self) {
        self.sent_at = Instant::now();
    }

    pub fn expired(&self, rto: std::time::Duration) -> bool {
        self.sent_at.elapsed() > rto
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        buf.write_u32::<LittleEndian>(self.seq_n).unwrap();
        buf.write_u32::<LittleEndian>(self.ack_n).unwrap();
        buf.write_u32::<LittleEndian>(self.flags).unwrap();
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Decodes a packet from a wire buffer. Buffers shorter than
    /// `HEADER_SIZE` are malformed and rejected rather than panicking —
    /// the caller (the receiver thread) drops and logs them.
    pub fn decode(mut buf: &[u8]) -> io::Result<Packet> {
        if buf.len() < HEADER_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "packet shorter than header",
            ));
        }
        let seq_n = buf.read_u32::<LittleEndian>()?;
        let ack_n = buf.read_u32::<LittleEndian>()?;
        let flags = buf.read_u32::<LittleEndian>()?;
        Ok(Packet::new(seq_n, ack_n, flags, buf.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let pkt = Packet::data(7, 3, vec![1, 2, 3, 4]);
        let decoded = Packet::decode(&pkt.encode()).unwrap();
        assert_eq!(pkt, decoded);
    }

    #[test]
    fn decode_rejects_short_buffer() {
        assert!(Packet::decode(&[0u8; 4]).is_err());
    }

    #[test]
    fn flag_constructors_classify_correctly() {
        assert!(Packet::syn().is_syn());
        assert!(Packet::syn_ack().is_syn_ack());
        assert!(Packet::ack(1, 1).is_ack());
        assert!(Packet::data(1, 0, vec![1]).is_data());
        assert!(Packet::fin().is_fin());
        assert!(Packet::fin_ack().is_fin_ack());
    }

    #[test]
    fn data_flags_with_empty_payload_is_not_data() {
        let mut pkt = Packet::data(1, 0, vec![1]);
        pkt.payload.clear();
        assert!(!pkt.is_data());
    }

    #[test]
    fn ordering_by_seq_n() {
        let p = Packet::data(1, 0, vec![0]);
        let q = Packet::data(2, 0, vec![0]);
        assert_eq!(std::cmp::min(p, q).seq_n, 1);
    }

    #[test]
    fn max_payload_fits_in_one_packet() {
        let payload = vec![0xAB; MAX_PAYLOAD_SIZE];
        let pkt = Packet::data(1, 0, payload.clone());
        let wire = pkt.encode();
        assert_eq!(wire.len(), MAX_PACKET_SIZE);
        let decoded = Packet::decode(&wire).unwrap();
        assert_eq!(decoded.payload, payload);
    }
}
