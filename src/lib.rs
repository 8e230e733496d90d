//! AAVM - Almost A Virtual Machine
//!
//! This crate manages named, persisted "machines": Docker containers built
//! from a declared runtime image that keep their identity across stops and
//! restarts, the way a virtual machine would.

pub mod cli;
pub mod configuration;
pub mod image;
pub mod machine;
pub mod platform;
pub mod runtime;
pub mod storage;

use thiserror::Error;

/// Main error type for AAVM operations
#[derive(Error, Debug)]
pub enum AavmError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Docker error: {0}")]
    Docker(#[from] bollard::errors::Error),

    #[error("Prompt error: {0}")]
    Prompt(#[from] dialoguer::Error),

    #[error("The machine '{0}' does not exist.")]
    MachineNotFound(String),

    #[error("Another machine with the name '{0}' already exists. Choose another name.")]
    MachineExists(String),

    #[error("The machine '{0}' is running. Stop it first.")]
    MachineRunning(String),

    #[error(
        "Machine '{machine}' is already associated with the platform '{linked}'. \
         You can't run it on '{current}'."
    )]
    PlatformMismatch {
        machine: String,
        linked: String,
        current: String,
    },

    #[error(
        "Runtime with image '{0}' not found. Fetch it using 'aavm runtime fetch' \
         or pull it using 'aavm runtime pull <runtime>' first."
    )]
    RuntimeNotFound(String),

    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    #[error("Image not found: {0}")]
    ImageNotFound(String),

    #[error("Invalid image name: {0}")]
    InvalidImageName(String),

    #[error("Given architecture '{arch}' is not supported. Valid choices are: {choices}")]
    UnsupportedArch { arch: String, choices: String },

    #[error("Configuration type mismatch for key '{key}': cannot merge a {base} with a {other}")]
    TypeMismatch {
        key: String,
        base: &'static str,
        other: &'static str,
    },

    #[error("{0}")]
    Validation(String),

    #[error(
        "Multiple containers are associated with the machine '{machine}': {}. \
         Remove all but one of them manually (e.g., 'docker rm <id>') and retry.",
        .containers.join(", ")
    )]
    InconsistentContainers {
        machine: String,
        containers: Vec<String>,
    },

    #[error("Runtime index error: {0}")]
    Index(String),
}

pub type Result<T> = std::result::Result<T, AavmError>;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "aavm";

/// Prefix of every label AAVM puts on containers and images
pub const CONTAINER_LABEL_DOMAIN: &str = "aavm";

/// Version of the remote runtimes index this build understands
pub const RUNTIMES_INDEX_VERSION: &str = "1.0";

/// Default location of the remote runtimes index
pub const RUNTIMES_INDEX_URL: &str =
    "https://raw.githubusercontent.com/afdaniele/aavm/main/runtime/index/1.0.json";

/// Schema version written into new machine descriptors
pub const MACHINE_SCHEMA_DEFAULT_VERSION: &str = "1.0";

/// Version written into new machine descriptors
pub const MACHINE_DEFAULT_VERSION: &str = "1.0";

/// Schema version written into runtime descriptors
pub const RUNTIME_SCHEMA_DEFAULT_VERSION: &str = "1.0";

/// Build a namespaced label key, optionally with a `=value` suffix.
///
/// `aavm_label("machine.name", Some("demo"))` yields `aavm.machine.name=demo`.
pub fn aavm_label(key: &str, value: Option<&str>) -> String {
    let label = format!("{}.{}", CONTAINER_LABEL_DOMAIN, key.trim_start_matches('.'));
    match value {
        Some(value) => format!("{}={}", label, value),
        None => label,
    }
}
