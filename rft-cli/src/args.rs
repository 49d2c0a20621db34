//! `clap`-based argument parsing for the four binaries, matching the flag
//! set spec.md §6 lays out. `tcp-server`/`tcp-client` reuse these
//! builders with `force_proto` set so `--proto` never needs to appear on
//! their command lines.

use std::path::PathBuf;

use clap::{App, Arg};
use rft_core::Proto;

use crate::logging::Verbosity;

pub struct ServerArgs {
    pub port: u16,
    pub host: String,
    pub storage: PathBuf,
    pub proto: Proto,
    pub window_size: usize,
    pub verbosity: Verbosity,
}

pub enum Operation {
    Upload { src: PathBuf, name: String },
    Download { dst: PathBuf, name: String },
}

pub struct ClientArgs {
    pub port: u16,
    pub host: String,
    pub proto: Proto,
    pub window_size: usize,
    pub verbosity: Verbosity,
    pub operation: Operation,
}

fn parse_proto(raw: &str) -> Proto {
    match raw {
        "tcp" => Proto::Tcp,
        "ws" => Proto::StopAndWait,
        "gbn" => Proto::GoBackN,
        other => {
            eprintln!("invalid --proto {other:?}: expected one of tcp, ws, gbn");
            std::process::exit(1);
        }
    }
}

/// `-H/--host`'s default per spec.md §6: the machine's own advertised
/// hostname, not the loopback-resolving literal `"localhost"`. Falls back
/// to `"localhost"` only if the lookup itself fails.
fn default_host() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string())
}

fn verbosity_from(verbose: bool, quiet: bool) -> Verbosity {
    match (verbose, quiet) {
        (true, true) => {
            eprintln!("-v and -q are mutually exclusive");
            std::process::exit(1);
        }
        (true, false) => Verbosity::Verbose,
        (false, true) => Verbosity::Quiet,
        (false, false) => Verbosity::Normal,
    }
}

fn common_app<'a, 'b>(name: &str, about: &'b str, proto_locked: bool) -> App<'a, 'b> {
    let mut app = App::new(name)
        .version("1.0")
        .author("Bush Hammer Industries")
        .about(about)
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .takes_value(true)
                .required(true)
                .help("port to bind or connect to"),
        )
        .arg(
            Arg::with_name("host")
                .short("H")
                .long("host")
                .takes_value(true)
                .help("host to bind or connect to (default: local hostname)"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("raise log verbosity to debug"),
        )
        .arg(
            Arg::with_name("quiet")
                .short("q")
                .long("quiet")
                .help("lower log verbosity to warnings only"),
        );

    if !proto_locked {
        app = app.arg(
            Arg::with_name("proto")
                .short("P")
                .long("proto")
                .takes_value(true)
                .possible_values(&["tcp", "ws", "gbn"])
                .default_value("gbn")
                .help("reliability strategy: tcp, stop-and-wait (ws), or go-back-n (gbn)"),
        );
    }

    app
}

pub fn parse_server_args(force_proto: Option<Proto>) -> ServerArgs {
    let app = common_app(
        "rft-server",
        "Runs the reliable-transport file server.",
        force_proto.is_some(),
    )
    .arg(
        Arg::with_name("storage")
            .short("s")
            .long("storage")
            .takes_value(true)
            .required(true)
            .help("directory to serve uploads/downloads out of"),
    );

    let matches = app.get_matches();

    let port: u16 = matches
        .value_of("port")
        .unwrap()
        .parse()
        .unwrap_or_else(|_| {
            eprintln!("--port must be a valid port number");
            std::process::exit(1);
        });

    let proto = force_proto.unwrap_or_else(|| parse_proto(matches.value_of("proto").unwrap()));

    ServerArgs {
        port,
        host: matches
            .value_of("host")
            .map(str::to_string)
            .unwrap_or_else(default_host),
        storage: PathBuf::from(matches.value_of("storage").unwrap()),
        proto,
        window_size: rft_core::EndpointConfig::DEFAULT_GBN_WINDOW,
        verbosity: verbosity_from(matches.is_present("verbose"), matches.is_present("quiet")),
    }
}

pub fn parse_client_args(force_proto: Option<Proto>) -> ClientArgs {
    let app = common_app(
        "rft-client",
        "Uploads or downloads a file over the reliable transport.",
        force_proto.is_some(),
    )
    .arg(
        Arg::with_name("mode")
            .possible_values(&["upload", "download"])
            .required(true)
            .help("upload a local file, or download a remote one"),
    )
    .arg(
        Arg::with_name("src")
            .short("s")
            .long("src")
            .takes_value(true)
            .help("local file to upload (upload mode only)"),
    )
    .arg(
        Arg::with_name("dst")
            .short("d")
            .long("dst")
            .takes_value(true)
            .help("local directory to write the download into (download mode only)"),
    )
    .arg(
        Arg::with_name("name")
            .short("n")
            .long("name")
            .takes_value(true)
            .required(true)
            .help("remote filename"),
    );

    let matches = app.get_matches();

    let port: u16 = matches
        .value_of("port")
        .unwrap()
        .parse()
        .unwrap_or_else(|_| {
            eprintln!("--port must be a valid port number");
            std::process::exit(1);
        });

    let proto = force_proto.unwrap_or_else(|| parse_proto(matches.value_of("proto").unwrap()));
    let name = matches.value_of("name").unwrap().to_string();

    let operation = match matches.value_of("mode").unwrap() {
        "upload" => {
            let Some(src) = matches.value_of("src") else {
                eprintln!("upload mode requires --src");
                std::process::exit(1);
            };
            Operation::Upload {
                src: PathBuf::from(src),
                name,
            }
        }
        "download" => {
            let Some(dst) = matches.value_of("dst") else {
                eprintln!("download mode requires --dst");
                std::process::exit(1);
            };
            Operation::Download {
                dst: PathBuf::from(dst),
                name,
            }
        }
        _ => unreachable!("clap restricts mode to upload/download"),
    };

    ClientArgs {
        port,
        host: matches
            .value_of("host")
            .map(str::to_string)
            .unwrap_or_else(default_host),
        proto,
        window_size: rft_core::EndpointConfig::DEFAULT_GBN_WINDOW,
        verbosity: verbosity_from(matches.is_present("verbose"), matches.is_present("quiet")),
        operation,
    }
}
