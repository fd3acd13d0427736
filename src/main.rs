// src/main.rs - cadence entry point

use clap::Parser;

use cadence::cli::{self, Cli};
use cadence::infra::logger;

fn main() {
    // Initialize logging (respects RUST_LOG)
    logger::init_logging("warn");

    if let Err(e) = cli::run(Cli::parse()) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
