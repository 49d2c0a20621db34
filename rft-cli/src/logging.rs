//! Process-wide logger construction, grounded in the teacher's
//! `flux::logging` wrapper around `slog` + `sloggers`: a small TOML
//! config string picked by verbosity rather than a config file on disk.

use sloggers::{Config, LoggerConfig};

/// `-v` raises the level one notch past the default, `-q` drops it one
/// notch; both flags are mutually exclusive at the CLI layer.
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

pub fn init(verbosity: Verbosity) -> slog::Logger {
    let level = match verbosity {
        Verbosity::Quiet => "warning",
        Verbosity::Normal => "info",
        Verbosity::Verbose => "debug",
    };

    let toml = format!(
        r#"
type = "terminal"
level = "{level}"
destination = "stderr"
"#,
    );

    let config: LoggerConfig = serdeconv::from_toml_str(&toml).expect("logging config is well-formed");
    config.build_logger().expect("terminal logger always builds")
}
