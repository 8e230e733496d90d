//! `aavm inspect` command implementation

use crate::cli::Context;
use crate::machine::{Machine, Reconciler};
use clap::Args;
use serde_json::{json, Value};

/// Arguments for the `inspect` command
#[derive(Args)]
pub struct InspectArgs {
    /// Name of the machine to inspect
    pub name: String,
}

/// Execute the `inspect` command
pub fn execute(ctx: &Context, args: InspectArgs) -> anyhow::Result<bool> {
    let Some(mut machine) = ctx.find_machine(&args.name)? else {
        return Ok(false);
    };
    let store = ctx.machines();
    let reconciler = Reconciler::new(ctx.platform.as_ref(), &store);
    let status = reconciler.status(&mut machine)?;

    let output = serde_json::to_string_pretty(&describe(&machine, &status)?)?;
    println!("{}", output);
    Ok(true)
}

fn describe(machine: &Machine, status: &str) -> crate::Result<Value> {
    let container = machine.cached_container().map(|c| {
        json!({
            "Id": c.id,
            "Name": c.name,
            "Image": c.image,
            "Status": c.status,
            "Created": c.created.map(|t| t.to_rfc3339()),
        })
    });
    let effective = machine.container_spec(None)?;

    Ok(json!({
        "Name": machine.name,
        "Description": machine.description,
        "Path": machine.path.display().to_string(),
        "Status": status,
        "Runtime": {
            "Image": machine.runtime.id(),
            "Version": machine.runtime.version,
            "Description": machine.runtime.description,
            "Maintainer": machine.runtime.maintainer,
        },
        "Settings": machine.settings,
        "Links": machine.links,
        "Container": container,
        "Configuration": machine.configuration,
        "EffectiveConfiguration": effective.configuration,
    }))
}
