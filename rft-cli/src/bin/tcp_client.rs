//! Thin wrapper around `rft-client`'s logic with `--proto` pinned to
//! `tcp`.

fn main() {
    rft_cli::client_main::run(Some(rft_core::Proto::Tcp));
}
