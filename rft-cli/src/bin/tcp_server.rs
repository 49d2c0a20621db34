//! Thin wrapper around `rft-server`'s logic with `--proto` pinned to
//! `tcp`: the kernel-reliable byte-stream stack instead of the
//! datagram-reliable one.

fn main() {
    rft_cli::server_main::run(Some(rft_core::Proto::Tcp));
}
