//! `aavm start` and `aavm restart` command implementations

use crate::cli::Context;
use crate::machine::{Machine, Reconciler, StartOutcome};
use clap::Args;
use std::io;

/// Arguments for the `start` command
#[derive(Args)]
pub struct StartArgs {
    /// Name of the machine to start
    pub name: String,

    /// Follow the machine's output once started
    #[arg(short, long)]
    pub attach: bool,

    /// Link an existing container to the machine instead of creating one
    #[arg(long)]
    pub container: Option<String>,
}

/// Arguments for the `restart` command
#[derive(Args)]
pub struct RestartArgs {
    /// Name of the machine to restart
    pub name: String,

    /// Follow the machine's output once restarted
    #[arg(short, long)]
    pub attach: bool,
}

/// Execute the `start` command
pub fn execute(ctx: &Context, args: StartArgs) -> anyhow::Result<bool> {
    let Some(mut machine) = ctx.find_machine(&args.name)? else {
        return Ok(false);
    };
    let store = ctx.machines();
    let reconciler = Reconciler::new(ctx.platform.as_ref(), &store);

    match reconciler.start(&mut machine, args.container.as_deref())? {
        StartOutcome::Started => tracing::info!("Machine '{}' started", machine.name),
        StartOutcome::AlreadyRunning => {
            tracing::info!("Machine '{}' is already running", machine.name)
        }
    }

    if args.attach {
        attach(ctx, &machine)?;
    }
    Ok(true)
}

/// Execute the `restart` command
pub fn execute_restart(ctx: &Context, args: RestartArgs) -> anyhow::Result<bool> {
    let Some(mut machine) = ctx.find_machine(&args.name)? else {
        return Ok(false);
    };
    let store = ctx.machines();
    let reconciler = Reconciler::new(ctx.platform.as_ref(), &store);

    if reconciler.stop(&mut machine)? {
        tracing::info!("Machine '{}' stopped", machine.name);
    }
    reconciler.start(&mut machine, None)?;
    tracing::info!("Machine '{}' restarted", machine.name);

    if args.attach {
        attach(ctx, &machine)?;
    }
    Ok(true)
}

fn attach(ctx: &Context, machine: &Machine) -> anyhow::Result<()> {
    if let Some(container) = machine.cached_container() {
        tracing::debug!("Attaching to container '{}'", container.short_id());
        let mut stdout = io::stdout().lock();
        ctx.platform.attach_container(&container.id, &mut stdout)?;
    }
    Ok(())
}
