//! Fraudscope - command-line front-end for the fraud-detection and
//! image-classification dashboard backend.

mod cli;
mod commands;

use std::io;
use std::path::Path;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fraudscope_core::{AppContext, Config};

use cli::Cli;

/// Log file name prefix inside the configured log directory
const LOG_FILE_PREFIX: &str = "fraudscope.log";

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr, and additionally to a daily rolling file when a log
/// directory is configured. The returned guard must live until exit so
/// buffered file output is flushed.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .init();

    guard
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(url) = cli.api_url {
        config.base_url = url;
    }
    if let Some(storage) = cli.storage {
        config.storage = storage;
    }
    let _guard = init_tracing(config.log_dir.as_deref());

    info!(base_url = %config.base_url, storage = %config.storage, "Fraudscope starting");
    let ctx = AppContext::init(&config)?;
    let gc = ctx.spawn_cache_gc();

    let result = commands::run(&ctx, &config, cli.command).await;

    gc.abort();
    result
}
