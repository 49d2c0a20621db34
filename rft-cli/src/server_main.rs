use std::net::ToSocketAddrs;
use std::thread;

use rft_core::{Proto, ServerSocket};
use slog::{error, info, o};

use crate::args::parse_server_args;
use crate::logging;

/// Shared entry point for `rft-server` and `tcp-server`; the latter pins
/// `force_proto` to `Proto::Tcp` so `--proto` never shows up on its
/// command line.
pub fn run(force_proto: Option<Proto>) -> ! {
    let args = parse_server_args(force_proto);
    let log = logging::init(args.verbosity);

    let addr = resolve_or_exit(&log, &args.host, args.port);

    if let Err(err) = std::fs::create_dir_all(&args.storage) {
        error!(log, "failed to create storage directory";
            "path" => %args.storage.display(), "error" => %err);
        std::process::exit(1);
    }

    let server = ServerSocket::bind(addr, args.proto, args.window_size, log.clone())
        .unwrap_or_else(|err| {
            error!(log, "failed to bind"; "addr" => %addr, "error" => %err);
            std::process::exit(1);
        });

    if let Err(err) = server.listen() {
        error!(log, "failed to start listening"; "error" => %err);
        std::process::exit(1);
    }

    info!(log, "listening";
        "addr" => %addr, "proto" => ?args.proto, "storage" => %args.storage.display());

    loop {
        let (conn, peer) = match server.accept() {
            Ok(pair) => pair,
            Err(err) => {
                error!(log, "accept failed"; "error" => %err);
                continue;
            }
        };

        let storage = args.storage.clone();
        let worker_log = log.new(o!("peer" => peer.to_string()));
        thread::spawn(move || {
            rft_app::server::handle_connection(&conn, &storage, &worker_log);
        });
    }
}

fn resolve_or_exit(log: &slog::Logger, host: &str, port: u16) -> std::net::SocketAddr {
    (host, port)
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .unwrap_or_else(|| {
            error!(log, "failed to resolve host"; "host" => host, "port" => port);
            std::process::exit(1);
        })
}
