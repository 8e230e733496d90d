//! `aavm create` command implementation

use crate::cli::Context;
use crate::machine::validate_name;
use crate::AavmError;
use clap::Args;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Select};

/// Arguments for the `create` command
#[derive(Args)]
pub struct CreateArgs {
    /// Name of the new machine
    #[arg(long)]
    pub name: Option<String>,

    /// Description of the new machine
    #[arg(long)]
    pub description: Option<String>,

    /// Runtime image the machine is built from
    #[arg(long)]
    pub runtime: Option<String>,
}

/// Execute the `create` command
pub fn execute(ctx: &Context, args: CreateArgs) -> anyhow::Result<bool> {
    ctx.paths.ensure_directories()?;
    let store = ctx.machines();
    let mut runtimes = ctx.runtimes();
    let theme = ColorfulTheme::default();

    let name = match args.name {
        Some(name) => name,
        None => Input::<String>::with_theme(&theme)
            .with_prompt("Machine name")
            .validate_with(|input: &String| validate_name(input).map_err(|e| e.to_string()))
            .interact_text()?,
    };
    validate_name(&name)?;
    if store.exists(&name) {
        tracing::error!("{}", AavmError::MachineExists(name));
        return Ok(false);
    }

    let description = match args.description {
        Some(description) => description,
        None => Input::<String>::with_theme(&theme)
            .with_prompt("Description")
            .allow_empty(true)
            .interact_text()?,
    };

    let image = match args.runtime {
        Some(image) => image,
        None => {
            let available = runtimes.list()?;
            if available.is_empty() {
                tracing::error!(
                    "No runtimes available. Fetch them using 'aavm runtime fetch' first."
                );
                return Ok(false);
            }
            let items: Vec<String> = available
                .iter()
                .map(|r| format!("{} ({})", r.image, r.description))
                .collect();
            let selection = Select::with_theme(&theme)
                .with_prompt("Runtime")
                .items(&items)
                .default(0)
                .interact()?;
            available[selection].id()
        }
    };

    let runtime = match runtimes.resolve(&image) {
        Ok(runtime) => runtime,
        Err(e @ AavmError::RuntimeNotFound(_)) => {
            tracing::error!("{}", e);
            return Ok(false);
        }
        Err(e) => return Err(e.into()),
    };

    let machine = store.create(&name, &description, runtime)?;
    tracing::info!(
        "Machine '{}' created using runtime '{}'",
        machine.name,
        machine.runtime.image
    );
    Ok(true)
}
