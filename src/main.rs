// src/main.rs - DataPilot entry point

use clap::Parser;

use datapilot::cli::Cli;
use datapilot::infra::logger;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG still overrides either level
    logger::init_logging(if cli.verbose { "info" } else { "warn" });

    if let Err(e) = datapilot::cli::run::run_agent(&cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
