//! The upload/download application overlay: a short ASCII/JSON handshake
//! followed by a raw byte-stream bulk phase, running atop any
//! `rft_core::Connection`.

pub mod client;
pub mod error;
pub mod framing;
pub mod protocol;
pub mod server;

pub use error::{Error, Result};
pub use protocol::{ApplicationProtocolError, Mode, Msg, Status, BUFFER_SIZE};

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use std::net::{SocketAddr, UdpSocket};
    use std::thread;

    use rft_core::udp::{Endpoint, Listener};
    use rft_core::{Connection, EndpointConfig};
    use slog::{o, Discard, Logger};

    fn test_log() -> Logger {
        Logger::root(Discard, o!())
    }

    fn connected_pair() -> (Connection, Connection) {
        let listener = Listener::bind(
            "127.0.0.1:0".parse().unwrap(),
            EndpointConfig::go_back_n(4),
            test_log(),
        )
        .unwrap();
        let server_addr = listener.local_addr();
        listener.listen().unwrap();

        let client_handle = thread::spawn(move || {
            Endpoint::connect(
                "127.0.0.1:0".parse().unwrap(),
                server_addr,
                EndpointConfig::go_back_n(4),
                test_log(),
            )
            .unwrap()
        });

        let (server_endpoint, _peer) = listener.accept();
        let client_endpoint = client_handle.join().unwrap();

        (
            Connection::Udp(client_endpoint),
            Connection::Udp(server_endpoint),
        )
    }

    #[test]
    fn upload_round_trips_through_storage_dir() {
        let (client_conn, server_conn) = connected_pair();

        let src_dir = tempfile::tempdir().unwrap();
        let storage_dir = tempfile::tempdir().unwrap();
        let src_path = src_dir.path().join("greeting.txt");
        std::fs::File::create(&src_path)
            .unwrap()
            .write_all(b"hello, reliable world")
            .unwrap();

        let storage_dir_for_server = storage_dir.path().to_path_buf();
        let server_handle = thread::spawn(move || {
            server::handle_connection(&server_conn, &storage_dir_for_server, &test_log());
        });

        client::upload(&client_conn, &src_path, "greeting.txt", &test_log(), |_, _| {}).unwrap();
        client_conn.close();
        server_handle.join().unwrap();

        let written = std::fs::read(storage_dir.path().join("greeting.txt")).unwrap();
        assert_eq!(written, b"hello, reliable world");
    }

    #[test]
    fn download_of_missing_file_reports_protocol_error() {
        let (client_conn, server_conn) = connected_pair();
        let storage_dir = tempfile::tempdir().unwrap();
        let dst_dir = tempfile::tempdir().unwrap();

        let storage_dir_for_server = storage_dir.path().to_path_buf();
        let server_handle = thread::spawn(move || {
            server::handle_connection(&server_conn, &storage_dir_for_server, &test_log());
        });

        let err = client::download(&client_conn, dst_dir.path(), "missing.bin", &test_log(), |_, _| {})
            .unwrap_err();
        match err {
            Error::Protocol(ApplicationProtocolError { code: 400, .. }) => {}
            other => panic!("expected a 400 protocol error, got {other:?}"),
        }

        client_conn.close();
        server_handle.join().unwrap();
    }
}
