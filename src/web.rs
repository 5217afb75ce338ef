#![cfg(not(tarpaulin_include))]

use clap::Parser;
use lasa::{Config, app};

/// Main entry point for the web application
///
/// Reads the configuration from flags and `LASA_*` environment variables,
/// sets up logging (`RUST_LOG`, `info` by default) and serves the form.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();

    // Start the web application
    app::run(config).await
}
