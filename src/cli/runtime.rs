//! `aavm runtime` command implementation

use crate::cli::Context;
use crate::image::{sanitize_image_name, ImageName};
use crate::runtime::index::IndexClient;
use crate::runtime::{check_downloaded, platform_runtimes, Runtime};
use crate::AavmError;
use clap::{Args, Subcommand};
use serde_json::json;
use std::collections::BTreeMap;

/// Arguments for the `runtime` command
#[derive(Args)]
pub struct RuntimeArgs {
    #[command(subcommand)]
    pub command: RuntimeCommands,
}

/// Runtime subcommands
#[derive(Subcommand)]
pub enum RuntimeCommands {
    /// Download the runtimes index
    Fetch(RuntimeFetchArgs),
    /// Show information about a runtime
    Inspect(RuntimeImageArgs),
    /// Pull a runtime image onto the platform
    Pull(RuntimeImageArgs),
    /// Remove a runtime image from the platform
    Rm(RuntimeRmArgs),
    /// List runtimes
    Ls(RuntimeLsArgs),
}

/// Arguments for runtime fetch
#[derive(Args)]
pub struct RuntimeFetchArgs {
    /// Fetch runtimes for every architecture, not just the platform's
    #[arg(short, long)]
    pub all: bool,
}

/// Arguments for runtime inspect and runtime pull
#[derive(Args)]
pub struct RuntimeImageArgs {
    /// Runtime image name
    pub image: String,
}

/// Arguments for runtime rm
#[derive(Args)]
pub struct RuntimeRmArgs {
    /// Runtime image name
    pub image: String,

    /// Also forget the runtime's descriptor
    #[arg(long)]
    pub purge: bool,
}

/// Arguments for runtime ls
#[derive(Args)]
pub struct RuntimeLsArgs {
    /// Only display image names
    #[arg(short, long)]
    pub quiet: bool,
}

/// Execute the `runtime` command
pub fn execute(ctx: &Context, args: RuntimeArgs) -> anyhow::Result<bool> {
    match args.command {
        RuntimeCommands::Fetch(args) => fetch(ctx, args),
        RuntimeCommands::Inspect(args) => inspect(ctx, args),
        RuntimeCommands::Pull(args) => pull(ctx, args),
        RuntimeCommands::Rm(args) => remove(ctx, args),
        RuntimeCommands::Ls(args) => list(ctx, args),
    }
}

fn fetch(ctx: &Context, args: RuntimeFetchArgs) -> anyhow::Result<bool> {
    ctx.paths.ensure_directories()?;
    let client = IndexClient::new(ctx.index_url.clone())?;
    let mut runtimes = client.fetch()?;

    if !args.all {
        let arch = ctx.platform.architecture()?;
        tracing::debug!("Keeping runtimes for architecture '{}'", arch);
        runtimes.retain(|r| r.image.arch.as_deref() == Some(arch.as_str()));
    }

    let mut store = ctx.runtimes();
    for runtime in &runtimes {
        store.save(runtime)?;
    }
    tracing::info!("{} runtimes fetched", runtimes.len());
    Ok(true)
}

fn inspect(ctx: &Context, args: RuntimeImageArgs) -> anyhow::Result<bool> {
    let mut store = ctx.runtimes();
    let mut runtime = match store.resolve(&args.image) {
        Ok(runtime) => runtime,
        Err(e @ AavmError::RuntimeNotFound(_)) => {
            tracing::error!("{}", e);
            return Ok(false);
        }
        Err(e) => return Err(e.into()),
    };
    check_downloaded(ctx.platform.as_ref(), std::slice::from_mut(&mut runtime))?;

    let output = json!({
        "Image": runtime.id(),
        "Version": runtime.version,
        "Description": runtime.description,
        "Maintainer": runtime.maintainer,
        "Official": runtime.official,
        "Downloaded": runtime.downloaded.as_str(),
        "Metadata": runtime.metadata,
        "Configuration": runtime.configuration,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(true)
}

fn pull(ctx: &Context, args: RuntimeImageArgs) -> anyhow::Result<bool> {
    let mut store = ctx.runtimes();
    let image = match store.resolve(&args.image) {
        Ok(runtime) => runtime.id(),
        Err(AavmError::RuntimeNotFound(image)) => image,
        Err(e) => return Err(e.into()),
    };

    tracing::info!("Pulling image '{}'...", image);
    ctx.platform.pull_image(&image)?;

    if !store.exists(&image)? {
        let found = ctx.platform.get_image(&image)?;
        match found.as_ref().and_then(Runtime::from_image) {
            Some(mut runtime) => {
                runtime.image = ImageName::parse(&image)?;
                ctx.paths.ensure_directories()?;
                store.save(&runtime)?;
            }
            None => tracing::warn!(
                "Image '{}' does not describe itself as a runtime, no descriptor saved",
                image
            ),
        }
    }
    tracing::info!("Runtime '{}' pulled", image);
    Ok(true)
}

fn remove(ctx: &Context, args: RuntimeRmArgs) -> anyhow::Result<bool> {
    let image = sanitize_image_name(&args.image)?;

    match ctx.platform.remove_image(&image) {
        Ok(()) => tracing::info!("Image '{}' removed", image),
        Err(e @ AavmError::ImageNotFound(_)) => {
            if !args.purge {
                tracing::error!("{}", e);
                return Ok(false);
            }
            tracing::warn!("{}", e);
        }
        Err(e) => return Err(e.into()),
    }

    if args.purge {
        let mut store = ctx.runtimes();
        match store.remove(&image) {
            Ok(()) => tracing::info!("Runtime '{}' forgotten", image),
            Err(e @ AavmError::RuntimeNotFound(_)) => tracing::warn!("{}", e),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(true)
}

fn list(ctx: &Context, args: RuntimeLsArgs) -> anyhow::Result<bool> {
    let mut store = ctx.runtimes();
    let mut runtimes: BTreeMap<String, Runtime> = store
        .list()?
        .into_iter()
        .map(|r| (r.id(), r))
        .collect();
    for runtime in platform_runtimes(ctx.platform.as_ref())? {
        runtimes.entry(runtime.id()).or_insert(runtime);
    }

    if args.quiet {
        for id in runtimes.keys() {
            println!("{}", id);
        }
        return Ok(true);
    }

    let mut runtimes: Vec<Runtime> = runtimes.into_values().collect();
    check_downloaded(ctx.platform.as_ref(), &mut runtimes)?;

    println!(
        "{:<45} {:<10} {:<30} {:<25} {:<10} {:<10}",
        "IMAGE", "VERSION", "DESCRIPTION", "MAINTAINER", "OFFICIAL", "DOWNLOADED"
    );
    for runtime in runtimes {
        println!(
            "{:<45} {:<10} {:<30} {:<25} {:<10} {:<10}",
            runtime.image.to_string(),
            runtime.version,
            runtime.description,
            runtime.maintainer,
            if runtime.official { "Yes" } else { "No" },
            runtime.downloaded.as_str()
        );
    }
    Ok(true)
}
