//! Client-side driving logic for the upload/download overlay, generic
//! over whichever `rft_core::Connection` the caller already established.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use rft_core::Connection;
use slog::{info, Logger};

use crate::error::{Error, Result};
use crate::framing::{write_line, FramedReader};
use crate::protocol::{Mode, Msg, Status, BUFFER_SIZE};

fn expect_ok(reader: &mut FramedReader) -> Result<Status> {
    let line = reader.read_line().ok_or(Error::ConnectionClosed)?;
    let status: Status =
        serde_json::from_str(&line).map_err(|err| Error::UnexpectedResponse(err.to_string()))?;
    if status.code == 200 {
        Ok(status)
    } else {
        Err(Error::Protocol(crate::protocol::ApplicationProtocolError {
            code: status.code,
            msg: status.msg,
        }))
    }
}

/// Streams `path` to the peer under `name`. `on_progress(sent, total)` is
/// called after every chunk written.
pub fn upload(
    conn: &Connection,
    path: &Path,
    name: &str,
    log: &Logger,
    mut on_progress: impl FnMut(u64, u64),
) -> Result<()> {
    let mut file = File::open(path)?;
    let size = file.metadata()?.len();
    let mut reader = FramedReader::new(conn);

    write_line(conn, Mode::Upload.as_str());
    expect_ok(&mut reader)?;

    write_line(conn, name);
    expect_ok(&mut reader)?;

    write_line(conn, &size.to_string());
    expect_ok(&mut reader)?;

    let mut sent = 0u64;
    let mut buf = vec![0u8; BUFFER_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        conn.send(&buf[..n]);
        sent += n as u64;
        on_progress(sent, size);
    }

    info!(log, "upload complete"; "name" => name, "bytes" => sent);
    Ok(())
}

/// Requests `name` from the peer and writes it into `dst_dir`.
/// `on_progress(received, total)` is called after every chunk read.
pub fn download(
    conn: &Connection,
    dst_dir: &Path,
    name: &str,
    log: &Logger,
    mut on_progress: impl FnMut(u64, u64),
) -> Result<()> {
    let mut reader = FramedReader::new(conn);

    write_line(conn, Mode::Download.as_str());
    expect_ok(&mut reader)?;

    write_line(conn, name);
    let authorization = expect_ok(&mut reader)?;
    let size = match authorization.msg {
        Some(Msg::Size(n)) => n,
        _ => {
            return Err(Error::UnexpectedResponse(
                "download authorization carried no size".into(),
            ))
        }
    };

    write_line(conn, "OK");

    let mut file = File::create(dst_dir.join(name))?;
    let mut received = 0u64;
    while received < size {
        let want = ((size - received).min(BUFFER_SIZE as u64)) as usize;
        let chunk = reader.read_exact(want);
        if chunk.is_empty() {
            break;
        }
        file.write_all(&chunk)?;
        received += chunk.len() as u64;
        on_progress(received, size);
    }

    info!(log, "download complete"; "name" => name, "bytes" => received);
    Ok(())
}
