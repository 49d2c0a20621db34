//! Shared CLI plumbing for the four `rft-cli` binaries: argument parsing
//! and process-wide logging setup. Kept as a library target so none of it
//! is duplicated between `rft-server`/`rft-client` and their `tcp-*`
//! counterparts.

pub mod args;
pub mod client_main;
pub mod logging;
pub mod server_main;
