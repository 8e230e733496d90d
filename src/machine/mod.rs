//! AAVM machines: named, persisted container definitions

pub mod reconcile;

pub use reconcile::{Reconciler, StartOutcome};

use crate::configuration::{merge, Configuration};
use crate::image::arch_to_platform;
use crate::platform::{ContainerRef, ContainerSpec};
use crate::runtime::Runtime;
use crate::storage::schema::MachineDescriptor;
use crate::{aavm_label, AavmError, Result, MACHINE_DEFAULT_VERSION, MACHINE_SCHEMA_DEFAULT_VERSION};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// Machine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MachineSettings {
    /// Keep the container (and its filesystem changes) when the machine stops
    #[serde(default = "default_persistent")]
    pub persistent: bool,
}

fn default_persistent() -> bool {
    true
}

impl Default for MachineSettings {
    fn default() -> Self {
        Self {
            persistent: default_persistent(),
        }
    }
}

/// What a machine is attached to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MachineLinks {
    /// Name of the platform endpoint the machine runs on
    #[serde(default)]
    pub platform: Option<String>,
    /// ID of the container backing the machine
    #[serde(default)]
    pub container: Option<String>,
}

/// A machine
#[derive(Debug, Clone)]
pub struct Machine {
    pub schema: String,
    pub version: String,
    pub name: String,
    pub path: PathBuf,
    pub runtime: Runtime,
    pub description: String,
    pub configuration: Configuration,
    pub settings: MachineSettings,
    pub links: MachineLinks,
    container: Option<ContainerRef>,
}

/// Check that a machine name is usable as a directory and container name
pub fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(AavmError::Validation(format!(
            "Invalid machine name '{}': it must be an alphanumeric string [a-zA-Z0-9-_].",
            name
        )))
    }
}

impl Machine {
    /// A brand new machine, not yet persisted
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        runtime: Runtime,
        path: PathBuf,
    ) -> Self {
        Self {
            schema: MACHINE_SCHEMA_DEFAULT_VERSION.to_string(),
            version: MACHINE_DEFAULT_VERSION.to_string(),
            name: name.into(),
            path,
            runtime,
            description: description.into(),
            configuration: Configuration::new(),
            settings: MachineSettings::default(),
            links: MachineLinks::default(),
            container: None,
        }
    }

    pub fn from_descriptor(
        name: impl Into<String>,
        path: PathBuf,
        descriptor: MachineDescriptor,
        runtime: Runtime,
        configuration: Configuration,
    ) -> Self {
        Self {
            schema: descriptor.schema,
            version: descriptor.version,
            name: name.into(),
            path,
            runtime,
            description: descriptor.description,
            configuration,
            settings: descriptor.settings,
            links: descriptor.links,
            container: None,
        }
    }

    pub fn descriptor(&self) -> MachineDescriptor {
        MachineDescriptor {
            schema: self.schema.clone(),
            version: self.version.clone(),
            runtime: self.runtime.id(),
            description: self.description.clone(),
            settings: self.settings.clone(),
            links: self.links.clone(),
        }
    }

    /// Directory holding the machine's root filesystem
    pub fn root(&self) -> PathBuf {
        self.path.join("root")
    }

    /// Deterministic name of the container backing this machine
    pub fn container_name(&self) -> String {
        format!("{}-machine-{}", crate::APP_NAME, self.name)
    }

    /// Label key identifying containers that belong to a machine
    pub fn label_key() -> String {
        aavm_label("machine.name", None)
    }

    /// Label filter (`key=value`) selecting this machine's containers
    pub fn label_filter(&self) -> String {
        aavm_label("machine.name", Some(&self.name))
    }

    /// Container reference cached by the last reconciliation
    pub fn cached_container(&self) -> Option<&ContainerRef> {
        self.container.as_ref()
    }

    pub(crate) fn cache_container(&mut self, container: Option<ContainerRef>) {
        self.container = container;
    }

    /// Compute the effective container configuration.
    ///
    /// The runtime's configuration is the base layer, the machine's own
    /// configuration is layered on top, then the image, the container name
    /// and the identifying label are injected over whatever the documents
    /// say.
    pub fn container_spec(&self, name: Option<&str>) -> Result<ContainerSpec> {
        let mut configuration = merge([&self.runtime.configuration, &self.configuration])?;

        configuration.insert("Image".to_string(), Value::String(self.runtime.id()));
        let labels = configuration
            .entry("Labels")
            .or_insert_with(|| Value::Object(Configuration::new()));
        if !labels.is_object() {
            *labels = Value::Object(Configuration::new());
        }
        if let Value::Object(labels) = labels {
            labels.insert(Self::label_key(), Value::String(self.name.clone()));
        }

        let platform = match self.runtime.image.arch.as_deref() {
            Some(arch) => Some(arch_to_platform(arch)?.to_string()),
            None => None,
        };

        Ok(ContainerSpec {
            name: name
                .map(str::to_string)
                .unwrap_or_else(|| self.container_name()),
            platform,
            configuration,
        })
    }
}
