//! `aavm stop` command implementation

use crate::cli::Context;
use crate::machine::Reconciler;
use clap::Args;

/// Arguments for the `stop` command
#[derive(Args)]
pub struct StopArgs {
    /// Name of the machine to stop
    pub name: String,
}

/// Execute the `stop` command
pub fn execute(ctx: &Context, args: StopArgs) -> anyhow::Result<bool> {
    let Some(mut machine) = ctx.find_machine(&args.name)? else {
        return Ok(false);
    };
    let store = ctx.machines();
    let reconciler = Reconciler::new(ctx.platform.as_ref(), &store);

    if reconciler.stop(&mut machine)? {
        tracing::info!("Machine '{}' stopped", machine.name);
    } else {
        tracing::info!("Machine '{}' is not running", machine.name);
    }
    Ok(true)
}
