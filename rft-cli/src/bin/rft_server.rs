fn main() {
    rft_cli::server_main::run(None);
}
