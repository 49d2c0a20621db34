fn main() {
    rft_cli::client_main::run(None);
}
