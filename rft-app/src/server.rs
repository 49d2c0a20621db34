//! Server-side request handling: one call per accepted connection, meant
//! to run on its own worker thread so a slow client never blocks new
//! accepts.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use rft_core::Connection;
use slog::{info, warn, Logger};

use crate::framing::{write_line, FramedReader};
use crate::protocol::{Mode, Msg, Status, BUFFER_SIZE};

fn write_status(conn: &Connection, status: &Status) {
    write_line(conn, &serde_json::to_string(status).expect("Status always serializes"));
}

/// Drives one client's mode/filename/(size) handshake through to
/// completion and then the matching bulk phase. Never panics on
/// malformed client input or missing files — it replies with an error
/// status and returns.
pub fn handle_connection(conn: &Connection, storage_dir: &Path, log: &Logger) {
    let mut reader = FramedReader::new(conn);

    let Some(mode_line) = reader.read_line() else {
        return;
    };
    let Some(mode) = Mode::parse(&mode_line) else {
        warn!(log, "unrecognised mode"; "mode" => mode_line);
        write_status(conn, &Status::error(400));
        return;
    };
    write_status(conn, &Status::ok_text("ready"));

    let Some(name) = reader.read_line() else {
        return;
    };

    match mode {
        Mode::Upload => handle_upload(conn, &mut reader, storage_dir, &name, log),
        Mode::Download => handle_download(conn, &mut reader, storage_dir, &name, log),
    }
}

fn handle_upload(
    conn: &Connection,
    reader: &mut FramedReader,
    storage_dir: &Path,
    name: &str,
    log: &Logger,
) {
    write_status(conn, &Status::ok_text("ready"));

    let Some(size_line) = reader.read_line() else {
        return;
    };
    let Ok(size) = size_line.trim().parse::<u64>() else {
        warn!(log, "malformed size"; "value" => size_line);
        write_status(conn, &Status::error(400));
        return;
    };
    write_status(conn, &Status::ok_text("ready"));

    let dest = storage_dir.join(name);
    let mut file = match File::create(&dest) {
        Ok(file) => file,
        Err(err) => {
            warn!(log, "failed to create destination file"; "path" => %dest.display(), "error" => %err);
            return;
        }
    };

    let mut received = 0u64;
    while received < size {
        let want = ((size - received).min(BUFFER_SIZE as u64)) as usize;
        let chunk = reader.read_exact(want);
        if chunk.is_empty() {
            break;
        }
        if file.write_all(&chunk).is_err() {
            break;
        }
        received += chunk.len() as u64;
    }

    info!(log, "received upload"; "name" => name, "bytes" => received);
}

fn handle_download(conn: &Connection, reader: &mut FramedReader, storage_dir: &Path, name: &str, log: &Logger) {
    let path = storage_dir.join(name);
    let size = match std::fs::metadata(&path) {
        Ok(metadata) => metadata.len(),
        Err(_) => {
            write_status(conn, &Status::error(400));
            return;
        }
    };
    write_status(conn, &Status::ok(Msg::Size(size)));

    if reader.read_line().as_deref() != Some("OK") {
        return;
    }

    let mut file = match File::open(&path) {
        Ok(file) => file,
        Err(err) => {
            warn!(log, "failed to open file for download"; "path" => %path.display(), "error" => %err);
            return;
        }
    };

    let mut buf = vec![0u8; BUFFER_SIZE];
    let mut sent = 0u64;
    loop {
        let n = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(_) => break,
        };
        conn.send(&buf[..n]);
        sent += n as u64;
    }

    info!(log, "sent download"; "name" => name, "bytes" => sent);
}
