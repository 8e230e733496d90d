//! CLI command definitions and handlers

pub mod create;
pub mod inspect;
pub mod list;
pub mod remove;
pub mod reset;
pub mod runtime;
pub mod start;
pub mod stop;

use crate::machine::Machine;
use crate::platform::ContainerPlatform;
use crate::storage::{AavmPaths, MachineStore, RuntimeStore};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// AAVM - Almost A Virtual Machine
#[derive(Parser)]
#[command(name = "aavm")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run in debug mode
    #[arg(long, global = true)]
    pub debug: bool,

    /// Docker endpoint to use (defaults to the local daemon)
    #[arg(short = 'H', long, global = true)]
    pub host: Option<String>,

    /// Directory holding machines and runtimes
    #[arg(long, global = true, env = "AAVM_HOME")]
    pub home: Option<PathBuf>,

    /// URL of the runtimes index
    #[arg(
        long,
        global = true,
        env = "AAVM_RUNTIMES_INDEX_URL",
        default_value = crate::RUNTIMES_INDEX_URL
    )]
    pub index_url: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Create a new machine
    Create(create::CreateArgs),

    /// List machines
    #[command(visible_alias = "ls")]
    List(list::ListArgs),

    /// Show information about a machine
    Inspect(inspect::InspectArgs),

    /// Start a machine
    Start(start::StartArgs),

    /// Stop a machine
    Stop(stop::StopArgs),

    /// Restart a machine
    Restart(start::RestartArgs),

    /// Remove a machine's container, discarding its changes
    Reset(reset::ResetArgs),

    /// Remove a machine
    #[command(visible_alias = "rm")]
    Remove(remove::RemoveArgs),

    /// Manage runtimes
    Runtime(runtime::RuntimeArgs),
}

/// Everything a command needs to run
pub struct Context {
    pub paths: AavmPaths,
    pub platform: Box<dyn ContainerPlatform>,
    pub index_url: String,
}

impl Context {
    pub fn new(paths: AavmPaths, platform: Box<dyn ContainerPlatform>, index_url: impl Into<String>) -> Self {
        Self {
            paths,
            platform,
            index_url: index_url.into(),
        }
    }

    pub fn machines(&self) -> MachineStore {
        MachineStore::new(&self.paths)
    }

    pub fn runtimes(&self) -> RuntimeStore {
        RuntimeStore::new(&self.paths)
    }

    /// Look up a machine by name among the loadable ones.
    ///
    /// Logs an error and returns `None` when it does not exist.
    pub fn find_machine(&self, name: &str) -> anyhow::Result<Option<Machine>> {
        let mut runtimes = self.runtimes();
        let mut machines = self.machines().load_all(&mut runtimes)?;
        match machines.remove(name) {
            Some(machine) => Ok(Some(machine)),
            None => {
                tracing::error!("{}", crate::AavmError::MachineNotFound(name.to_string()));
                Ok(None)
            }
        }
    }
}

/// Run a command. Returns `false` when the command failed in a way that was
/// already reported.
pub fn dispatch(ctx: &Context, command: Commands) -> anyhow::Result<bool> {
    match command {
        Commands::Create(args) => create::execute(ctx, args),
        Commands::List(args) => list::execute(ctx, args),
        Commands::Inspect(args) => inspect::execute(ctx, args),
        Commands::Start(args) => start::execute(ctx, args),
        Commands::Stop(args) => stop::execute(ctx, args),
        Commands::Restart(args) => start::execute_restart(ctx, args),
        Commands::Reset(args) => reset::execute(ctx, args),
        Commands::Remove(args) => remove::execute(ctx, args),
        Commands::Runtime(args) => runtime::execute(ctx, args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_aliases_and_globals() {
        let cli = Cli::try_parse_from(["aavm", "ls", "--debug"]).unwrap();
        assert!(cli.debug);
        assert!(matches!(cli.command, Commands::List(_)));

        let cli = Cli::try_parse_from(["aavm", "-H", "tcp://10.0.0.2:2375", "rm", "demo", "--yes"]).unwrap();
        assert_eq!(cli.host.as_deref(), Some("tcp://10.0.0.2:2375"));
        assert!(matches!(cli.command, Commands::Remove(args) if args.yes && args.name == "demo"));
    }

    #[test]
    fn test_start_flags() {
        let cli = Cli::try_parse_from(["aavm", "start", "demo", "--attach", "--container", "legacy"]).unwrap();
        match cli.command {
            Commands::Start(args) => {
                assert_eq!(args.name, "demo");
                assert!(args.attach);
                assert_eq!(args.container.as_deref(), Some("legacy"));
            }
            _ => panic!("expected start"),
        }
    }
}
