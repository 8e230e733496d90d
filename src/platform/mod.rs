//! Container platform abstraction
//!
//! Everything AAVM needs from a container engine goes through
//! [`ContainerPlatform`]. The production implementation talks to a Docker
//! daemon, tests substitute an in-memory stub.

pub mod docker;

pub use docker::DockerPlatform;

use crate::configuration::Configuration;
use crate::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::io::Write;

/// Seconds to wait for a container to stop before it gets killed
pub const STOP_TIMEOUT: i64 = 10;

/// Snapshot of a container as reported by the platform
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerRef {
    pub id: String,
    pub name: String,
    pub image: String,
    /// Live status, e.g. "created", "running", "exited"
    pub status: String,
    pub created: Option<DateTime<Utc>>,
    pub labels: HashMap<String, String>,
}

impl ContainerRef {
    pub fn is_running(&self) -> bool {
        self.status == "running"
    }

    /// Short form of the container ID
    pub fn short_id(&self) -> &str {
        &self.id[..12.min(self.id.len())]
    }
}

/// Snapshot of an image as reported by the platform
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImageRef {
    pub id: String,
    pub tags: Vec<String>,
    pub labels: HashMap<String, String>,
}

/// Everything needed to create a container
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerSpec {
    /// Container name
    pub name: String,
    /// Docker platform (`os/arch[/variant]`) the container must run on
    pub platform: Option<String>,
    /// Docker Engine create body, including `Image` and `Labels`
    pub configuration: Configuration,
}

/// Narrow interface over a container engine
pub trait ContainerPlatform {
    /// Name of the endpoint, used to pin machines to the platform they run on
    fn name(&self) -> &str;

    /// Canonical CPU architecture of the platform
    fn architecture(&self) -> Result<String>;

    /// All containers, in any state, carrying the label `key=value`
    fn list_containers(&self, label: &str) -> Result<Vec<ContainerRef>>;

    /// Look up a container by ID or name, `None` if it does not exist
    fn get_container(&self, id_or_name: &str) -> Result<Option<ContainerRef>>;

    fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerRef>;

    fn start_container(&self, id: &str) -> Result<()>;

    fn stop_container(&self, id: &str, timeout: i64) -> Result<()>;

    fn remove_container(&self, id: &str) -> Result<()>;

    /// Stream the container's output into `out` until it exits
    fn attach_container(&self, id: &str, out: &mut dyn Write) -> Result<()>;

    fn pull_image(&self, image: &str) -> Result<()>;

    fn remove_image(&self, image: &str) -> Result<()>;

    /// Look up an image by reference, `None` if it is not present
    fn get_image(&self, image: &str) -> Result<Option<ImageRef>>;

    /// All images carrying the label `key=value`
    fn list_images(&self, label: &str) -> Result<Vec<ImageRef>>;
}
