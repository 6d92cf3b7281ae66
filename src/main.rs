//! `pixtag` maintenance tool.
//!
//! Opens the caches under the configured cache root and runs a single
//! maintenance command against them.

mod cli;
mod commands;

use clap::Parser;
use pixtag_cache::{CacheContext, RootDirectory, StoreOptions};
use pixtag_config::{Config, Sources, first_present};
use std::fmt::Debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::cli::Cli;

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level());

    let config = Config::load(&Sources::discover(cli.config.clone())).map_err(report)?;
    let root = match first_present([cli.cache_dir.clone(), config.cache_dir.clone()]) {
        Some(root) => root,
        None => config.cache_dir().map_err(report)?,
    };
    let options = StoreOptions { busy_timeout: config.busy_timeout(), max_connections: config.store.max_connections };
    tracing::debug!(root = %root.display(), "Opening caches");
    let context = CacheContext::open(&RootDirectory::new(root), &options).await.map_err(report)?;

    let result = commands::run(&cli.command, &context, &mut std::io::stdout()).await;
    context.close().await;
    result.map_err(report)
}

/// Log to stderr so command output on stdout stays machine readable.
/// `RUST_LOG` takes precedence over the verbosity flags.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Render an error tree for the terminal.
fn report(err: impl Debug) -> miette::Report {
    miette::miette!("{err:?}")
}
