use std::net::{SocketAddr, ToSocketAddrs};

use rft_core::Proto;
use slog::{error, info};

use crate::args::{parse_client_args, Operation};
use crate::logging;

/// Shared entry point for `rft-client` and `tcp-client`.
pub fn run(force_proto: Option<Proto>) -> ! {
    let args = parse_client_args(force_proto);
    let log = logging::init(args.verbosity);

    let remote = resolve_or_exit(&log, &args.host, args.port);
    let local: SocketAddr = match remote {
        SocketAddr::V4(_) => "0.0.0.0:0".parse().unwrap(),
        SocketAddr::V6(_) => "[::]:0".parse().unwrap(),
    };

    let conn = rft_core::connect(local, remote, args.proto, args.window_size, log.clone())
        .unwrap_or_else(|err| {
            error!(log, "failed to connect"; "remote" => %remote, "error" => %err);
            std::process::exit(1);
        });

    let result = match args.operation {
        Operation::Upload { src, name } => {
            rft_app::client::upload(&conn, &src, &name, &log, |sent, total| {
                info!(log, "progress"; "sent" => sent, "total" => total);
            })
        }
        Operation::Download { dst, name } => {
            if let Err(err) = std::fs::create_dir_all(&dst) {
                error!(log, "failed to create destination directory";
                    "path" => %dst.display(), "error" => %err);
                std::process::exit(1);
            }
            rft_app::client::download(&conn, &dst, &name, &log, |received, total| {
                info!(log, "progress"; "received" => received, "total" => total);
            })
        }
    };

    conn.close();

    match result {
        Ok(()) => {
            info!(log, "done");
            std::process::exit(0);
        }
        Err(err) => {
            error!(log, "transfer failed"; "error" => %err);
            std::process::exit(1);
        }
    }
}

fn resolve_or_exit(log: &slog::Logger, host: &str, port: u16) -> SocketAddr {
    (host, port)
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .unwrap_or_else(|| {
            error!(log, "failed to resolve host"; "host" => host, "port" => port);
            std::process::exit(1);
        })
}
