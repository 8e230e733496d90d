//! `aavm remove` command implementation

use crate::cli::Context;
use crate::machine::Reconciler;
use crate::AavmError;
use clap::Args;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Confirm;

/// Arguments for the `remove` command
#[derive(Args)]
pub struct RemoveArgs {
    /// Name of the machine to remove
    pub name: String,

    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

/// Execute the `remove` command
pub fn execute(ctx: &Context, args: RemoveArgs) -> anyhow::Result<bool> {
    let Some(mut machine) = ctx.find_machine(&args.name)? else {
        return Ok(false);
    };
    let store = ctx.machines();
    let reconciler = Reconciler::new(ctx.platform.as_ref(), &store);

    if reconciler.running(&mut machine)? {
        tracing::error!("{}", AavmError::MachineRunning(machine.name.clone()));
        return Ok(false);
    }

    if !args.yes {
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!(
                "Machine '{}' and everything in '{}' will be deleted. Continue?",
                machine.name,
                machine.path.display()
            ))
            .default(false)
            .interact()?;
        if !confirmed {
            tracing::info!("Aborted");
            return Ok(false);
        }
    }

    reconciler.reset(&mut machine, false)?;
    store.remove(&machine)?;
    tracing::info!("Machine '{}' removed", machine.name);
    Ok(true)
}
