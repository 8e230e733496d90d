//! `aavm reset` command implementation

use crate::cli::Context;
use crate::machine::Reconciler;
use clap::Args;

/// Arguments for the `reset` command
#[derive(Args)]
pub struct ResetArgs {
    /// Name of the machine to reset
    pub name: String,

    /// Also wipe the machine's root directory
    #[arg(long)]
    pub root: bool,
}

/// Execute the `reset` command
pub fn execute(ctx: &Context, args: ResetArgs) -> anyhow::Result<bool> {
    let Some(mut machine) = ctx.find_machine(&args.name)? else {
        return Ok(false);
    };
    let store = ctx.machines();
    let reconciler = Reconciler::new(ctx.platform.as_ref(), &store);

    reconciler.reset(&mut machine, args.root)?;
    tracing::info!("Machine '{}' reset", machine.name);
    Ok(true)
}
