//! Reconciliation between a machine's persisted container link and the
//! containers that actually exist on the platform.
//!
//! The platform is the source of truth. A machine owns at most one container,
//! found through the `aavm.machine.name` label; the persisted link is only a
//! hint and is rewritten whenever it disagrees with what the platform reports.

use crate::machine::Machine;
use crate::platform::{ContainerPlatform, ContainerRef, STOP_TIMEOUT};
use crate::storage::MachineStore;
use crate::{AavmError, Result};
use std::fs;
use std::thread;
use std::time::Duration;

/// Status reported for machines without a container
pub const STATUS_DOWN: &str = "down";

const STOP_POLL_ATTEMPTS: u32 = 15;
const STOP_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Result of a start request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

/// Drives a machine's container through its lifecycle
pub struct Reconciler<'a> {
    platform: &'a dyn ContainerPlatform,
    store: &'a MachineStore,
}

impl<'a> Reconciler<'a> {
    pub fn new(platform: &'a dyn ContainerPlatform, store: &'a MachineStore) -> Self {
        Self { platform, store }
    }

    /// Find the container backing a machine, healing the persisted link
    pub fn find_container(&self, machine: &mut Machine) -> Result<Option<ContainerRef>> {
        if let Some(container) = machine.cached_container() {
            return Ok(Some(container.clone()));
        }

        let mut containers = self.platform.list_containers(&machine.label_filter())?;
        if containers.len() > 1 {
            return Err(AavmError::InconsistentContainers {
                machine: machine.name.clone(),
                containers: containers.into_iter().map(|c| c.id).collect(),
            });
        }

        if let Some(container) = containers.pop() {
            if machine.links.container.as_deref() != Some(container.id.as_str()) {
                tracing::debug!(
                    "Relinking machine '{}' to container '{}'",
                    machine.name,
                    container.short_id()
                );
                machine.links.container = Some(container.id.clone());
                self.store.save(machine)?;
            }
            machine.cache_container(Some(container.clone()));
            return Ok(Some(container));
        }

        let Some(linked) = machine.links.container.clone() else {
            return Ok(None);
        };
        match self.platform.get_container(&linked)? {
            Some(container) => {
                machine.cache_container(Some(container.clone()));
                Ok(Some(container))
            }
            None => {
                tracing::debug!(
                    "Container '{}' linked to machine '{}' no longer exists",
                    linked,
                    machine.name
                );
                machine.links.container = None;
                self.store.save(machine)?;
                Ok(None)
            }
        }
    }

    /// Live status of the machine's container, or `down`
    pub fn status(&self, machine: &mut Machine) -> Result<String> {
        Ok(match self.find_container(machine)? {
            Some(container) => container.status,
            None => STATUS_DOWN.to_string(),
        })
    }

    pub fn running(&self, machine: &mut Machine) -> Result<bool> {
        Ok(self.status(machine)? == "running")
    }

    /// Create the machine's container and persist the link to it
    pub fn make_container(&self, machine: &mut Machine, name: Option<&str>) -> Result<ContainerRef> {
        let spec = machine.container_spec(name)?;
        tracing::debug!(
            "Creating container '{}' from '{}'",
            spec.name,
            machine.runtime.id()
        );
        let container = self.platform.create_container(&spec)?;
        machine.links.container = Some(container.id.clone());
        machine.cache_container(Some(container.clone()));
        self.store.save(machine)?;
        Ok(container)
    }

    /// Start a machine, creating its container when needed.
    ///
    /// `adopt` names an existing container to link to the machine instead of
    /// creating a new one.
    pub fn start(&self, machine: &mut Machine, adopt: Option<&str>) -> Result<StartOutcome> {
        let current = self.platform.name().to_string();
        match machine.links.platform.as_deref() {
            Some(linked) if linked != current => {
                return Err(AavmError::PlatformMismatch {
                    machine: machine.name.clone(),
                    linked: linked.to_string(),
                    current,
                });
            }
            Some(_) => {}
            None => {
                machine.links.platform = Some(current.clone());
                self.store.save(machine)?;
            }
        }

        let mut container = self.find_container(machine)?;

        if let Some(name) = adopt {
            let adopted = self
                .platform
                .get_container(name)?
                .ok_or_else(|| AavmError::ContainerNotFound(name.to_string()))?;
            if let Some(existing) = &container {
                if existing.id != adopted.id {
                    return Err(AavmError::Validation(format!(
                        "Machine '{}' is already associated with the container '{}'. \
                         Reset the machine before linking it to another container.",
                        machine.name,
                        existing.short_id()
                    )));
                }
            }
            machine.links.container = Some(adopted.id.clone());
            machine.cache_container(Some(adopted.clone()));
            self.store.save(machine)?;
            container = Some(adopted);
        }

        let container = match container {
            Some(container) => container,
            None => {
                let image = machine.runtime.id();
                if self.platform.get_image(&image)?.is_none() {
                    return Err(AavmError::Validation(format!(
                        "The runtime image '{}' is not available on the platform '{}'. \
                         Pull it first using 'aavm runtime pull {}'.",
                        image, current, image
                    )));
                }
                self.make_container(machine, None)?
            }
        };

        if container.is_running() {
            return Ok(StartOutcome::AlreadyRunning);
        }

        self.platform.start_container(&container.id)?;
        let started = self
            .platform
            .get_container(&container.id)?
            .ok_or_else(|| AavmError::ContainerNotFound(container.id.clone()))?;
        machine.cache_container(Some(started));
        Ok(StartOutcome::Started)
    }

    /// Stop a machine. Returns `false` when it was not running.
    pub fn stop(&self, machine: &mut Machine) -> Result<bool> {
        let container = match self.find_container(machine)? {
            Some(container) if container.is_running() => container,
            _ => return Ok(false),
        };

        self.platform.stop_container(&container.id, STOP_TIMEOUT)?;

        let mut stopped = false;
        for attempt in 0..STOP_POLL_ATTEMPTS {
            if attempt > 0 {
                thread::sleep(STOP_POLL_INTERVAL);
            }
            let current = self.platform.get_container(&container.id)?;
            let done = match &current {
                Some(c) => matches!(c.status.as_str(), "exited" | "stopped" | "created"),
                None => true,
            };
            machine.cache_container(current);
            if done {
                stopped = true;
                break;
            }
        }
        if !stopped {
            tracing::warn!(
                "Container '{}' did not stop within {} seconds",
                container.short_id(),
                STOP_POLL_ATTEMPTS
            );
        }

        if !machine.settings.persistent {
            tracing::debug!("Machine '{}' is not persistent, resetting it", machine.name);
            self.reset(machine, false)?;
        }
        Ok(true)
    }

    /// Remove the machine's container and forget the link to it.
    ///
    /// With `root`, the machine's root directory is wiped as well.
    pub fn reset(&self, machine: &mut Machine, root: bool) -> Result<()> {
        if let Some(container) = self.find_container(machine)? {
            if container.is_running() {
                return Err(AavmError::MachineRunning(machine.name.clone()));
            }
            match self.platform.remove_container(&container.id) {
                Ok(()) | Err(AavmError::ContainerNotFound(_)) => {}
                Err(e) => return Err(e),
            }
            tracing::debug!("Container '{}' removed", container.short_id());
        }

        machine.links.container = None;
        machine.links.platform = None;
        machine.cache_container(None);
        self.store.save(machine)?;

        if root {
            let dir = machine.root();
            if dir.exists() {
                fs::remove_dir_all(&dir)?;
            }
            fs::create_dir_all(&dir)?;
            tracing::debug!("Root directory of machine '{}' wiped", machine.name);
        }
        Ok(())
    }
}
