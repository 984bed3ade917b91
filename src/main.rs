// src/main.rs

//! The main entry point for the mudbridge gateway.

use anyhow::Result;
use mudbridge::config::Config;
use mudbridge::server;
use std::env;
use tracing::{error, info};
use tracing_subscriber::{filter::EnvFilter, prelude::*};

#[tokio::main]
async fn main() -> Result<()> {
    run_app().await
}

async fn run_app() -> Result<()> {
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    let args: Vec<String> = env::args().collect();

    if args.contains(&"--version".to_string()) {
        println!("mudbridge version {VERSION}");
        return Ok(());
    }

    // Without --config every setting takes its default.
    let mut config = match flag_value(&args, "--config") {
        Some(path) => match Config::from_file(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Failed to load configuration from \"{path}\": {e:#}");
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };

    // Flags win over the environment, which wins over the file.
    let address = flag_value(&args, "--address").or_else(|| env::var("MUDBRIDGE_ADDRESS").ok());
    let backend = flag_value(&args, "--backend").or_else(|| env::var("MUDBRIDGE_BACKEND").ok());
    config.apply_overrides(address, backend);

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {e:#}");
        std::process::exit(1);
    }

    let log_level = env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());
    tracing_subscriber::registry()
        .with(EnvFilter::new(log_level))
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_ansi(true),
        )
        .init();

    info!(
        "Starting mudbridge {} (backend {}).",
        VERSION, config.backend.address
    );

    if let Err(e) = server::run(config).await {
        error!("Server runtime error: {:#}", e);
        return Err(e);
    }

    Ok(())
}

/// Returns the value following `flag`, exiting if the flag is given without one.
fn flag_value(args: &[String], flag: &str) -> Option<String> {
    let index = args.iter().position(|arg| arg == flag)?;
    match args.get(index + 1) {
        Some(value) if !value.starts_with("--") => Some(value.clone()),
        _ => {
            eprintln!("{flag} flag requires a value");
            std::process::exit(1);
        }
    }
}
