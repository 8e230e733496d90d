//! AAVM CLI entry point
//!
//! Manages machines: named, persisted Docker containers built from runtime
//! images.

use aavm::cli::{dispatch, Cli, Context};
use aavm::platform::DockerPlatform;
use aavm::storage::AavmPaths;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        EnvFilter::new("warn,aavm=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,aavm=info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<bool> {
    let paths = match &cli.home {
        Some(home) => AavmPaths::with_root(home),
        None => AavmPaths::new()?,
    };
    tracing::debug!("Using home directory '{}'", paths.root().display());

    let platform = DockerPlatform::connect(cli.host.as_deref())?;
    let ctx = Context::new(paths, Box::new(platform), cli.index_url);
    dispatch(&ctx, cli.command)
}
