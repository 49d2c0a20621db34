//! Newline-delimited control messages and raw byte reads, both served out
//! of one leftover buffer so a line read never swallows bytes that belong
//! to the bulk phase that follows it.

use std::collections::VecDeque;

use rft_core::Connection;

use crate::protocol::BUFFER_SIZE;

pub fn write_line(conn: &Connection, text: &str) {
    let mut line = text.as_bytes().to_vec();
    line.push(b'\n');
    conn.send(&line);
}

pub struct FramedReader<'a> {
    conn: &'a Connection,
    buf: VecDeque<u8>,
}

impl<'a> FramedReader<'a> {
    pub fn new(conn: &'a Connection) -> FramedReader<'a> {
        FramedReader {
            conn,
            buf: VecDeque::new(),
        }
    }

    /// Pulls more bytes from the connection until at least `want` are
    /// buffered or the connection reports closed (an empty `recv`).
    fn fill_at_least(&mut self, want: usize) {
        while self.buf.len() < want {
            let chunk = self.conn.recv(BUFFER_SIZE);
            if chunk.is_empty() {
                return;
            }
            self.buf.extend(chunk);
        }
    }

    /// Reads one `\n`-terminated line, stripping the newline. Returns
    /// `None` once the connection closes without completing a line.
    pub fn read_line(&mut self) -> Option<String> {
        loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = self.buf.drain(..=pos).collect();
                return Some(String::from_utf8_lossy(&line[..line.len() - 1]).into_owned());
            }
            let before = self.buf.len();
            self.fill_at_least(before + 1);
            if self.buf.len() == before {
                return None;
            }
        }
    }

    /// Reads exactly `n` bytes, or fewer if the connection closes first.
    pub fn read_exact(&mut self, n: usize) -> Vec<u8> {
        self.fill_at_least(n);
        let take = n.min(self.buf.len());
        self.buf.drain(..take).collect()
    }
}
