//! `aavm list` command implementation

use crate::cli::Context;
use crate::machine::Reconciler;
use crate::AavmError;
use clap::Args;

/// Arguments for the `list` command
#[derive(Args)]
pub struct ListArgs {
    /// Only display machine names
    #[arg(short, long)]
    pub quiet: bool,
}

/// Execute the `list` command
pub fn execute(ctx: &Context, args: ListArgs) -> anyhow::Result<bool> {
    let mut runtimes = ctx.runtimes();
    let store = ctx.machines();
    let machines = store.load_all(&mut runtimes)?;

    if args.quiet {
        for name in machines.keys() {
            println!("{}", name);
        }
        return Ok(true);
    }

    let reconciler = Reconciler::new(ctx.platform.as_ref(), &store);

    println!(
        "{:<20} {:<30} {:<40} {:<10} {:<15} {:<20}",
        "NAME", "DESCRIPTION", "RUNTIME", "STATUS", "CONTAINER", "CREATED"
    );

    let mut healthy = true;
    for (name, mut machine) in machines {
        let status = match reconciler.status(&mut machine) {
            Ok(status) => status,
            Err(e @ AavmError::InconsistentContainers { .. }) => {
                tracing::error!("{}", e);
                healthy = false;
                "error".to_string()
            }
            Err(e) => return Err(e.into()),
        };
        let (container, created) = match machine.cached_container() {
            Some(container) => (
                container.short_id().to_string(),
                container
                    .created
                    .map(format_time_ago)
                    .unwrap_or_else(|| "-".to_string()),
            ),
            None => ("-".to_string(), "-".to_string()),
        };

        println!(
            "{:<20} {:<30} {:<40} {:<10} {:<15} {:<20}",
            name,
            truncate(&machine.description, 30),
            machine.runtime.image.to_string(),
            status,
            container,
            created
        );
    }

    Ok(healthy)
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        let head: String = text.chars().take(width - 3).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// Format a timestamp as a human-readable "time ago" string
pub(crate) fn format_time_ago(time: chrono::DateTime<chrono::Utc>) -> String {
    let now = chrono::Utc::now();
    let duration = now.signed_duration_since(time);

    if duration.num_days() > 365 {
        format!("{} years ago", duration.num_days() / 365)
    } else if duration.num_days() > 30 {
        format!("{} months ago", duration.num_days() / 30)
    } else if duration.num_days() > 7 {
        format!("{} weeks ago", duration.num_days() / 7)
    } else if duration.num_days() > 0 {
        format!("{} days ago", duration.num_days())
    } else if duration.num_hours() > 0 {
        format!("{} hours ago", duration.num_hours())
    } else if duration.num_minutes() > 0 {
        format!("{} minutes ago", duration.num_minutes())
    } else {
        "Less than a minute ago".to_string()
    }
}
