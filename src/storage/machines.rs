//! Machine descriptor storage

use crate::machine::{validate_name, Machine};
use crate::runtime::Runtime;
use crate::storage::paths::AavmPaths;
use crate::storage::runtimes::RuntimeStore;
use crate::storage::schema::{read_configuration, read_machine_descriptor, write_json};
use crate::{AavmError, Result};
use std::collections::BTreeMap;
use std::fs;

/// Manages machine definitions under `<root>/machines`
#[derive(Debug, Clone)]
pub struct MachineStore {
    paths: AavmPaths,
}

impl MachineStore {
    pub fn new(paths: &AavmPaths) -> Self {
        Self {
            paths: paths.clone(),
        }
    }

    /// Check if a machine exists
    pub fn exists(&self, name: &str) -> bool {
        self.paths.machine_descriptor(name).is_file()
    }

    /// Create and persist a new machine
    pub fn create(&self, name: &str, description: &str, runtime: Runtime) -> Result<Machine> {
        validate_name(name)?;
        if self.paths.machine_dir(name).exists() {
            return Err(AavmError::MachineExists(name.to_string()));
        }

        let machine = Machine::new(name, description, runtime, self.paths.machine_dir(name));
        fs::create_dir_all(machine.root())?;
        self.save(&machine)?;
        tracing::debug!("Machine '{}' created at '{}'", name, machine.path.display());
        Ok(machine)
    }

    /// Load a single machine by name
    pub fn load(&self, name: &str, runtimes: &mut RuntimeStore) -> Result<Machine> {
        if validate_name(name).is_err() || !self.paths.machine_dir(name).is_dir() {
            return Err(AavmError::MachineNotFound(name.to_string()));
        }
        let descriptor = read_machine_descriptor(&self.paths.machine_descriptor(name))?;
        let configuration = read_configuration(&self.paths.machine_configuration(name))?;
        let runtime = runtimes.resolve(&descriptor.runtime)?;
        Ok(Machine::from_descriptor(
            name,
            self.paths.machine_dir(name),
            descriptor,
            runtime,
            configuration,
        ))
    }

    /// Load every machine, sorted by name. Machines that fail to load are
    /// skipped with a warning.
    pub fn load_all(&self, runtimes: &mut RuntimeStore) -> Result<BTreeMap<String, Machine>> {
        let mut machines = BTreeMap::new();
        let dir = self.paths.machines_dir();
        if !dir.is_dir() {
            return Ok(machines);
        }

        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            match self.load(&name, runtimes) {
                Ok(machine) => {
                    machines.insert(name, machine);
                }
                Err(e) => {
                    tracing::warn!("Skipping machine '{}': {}", name, e);
                }
            }
        }
        Ok(machines)
    }

    /// Write a machine's descriptor and configuration
    pub fn save(&self, machine: &Machine) -> Result<()> {
        fs::create_dir_all(&machine.path)?;
        write_json(&self.paths.machine_descriptor(&machine.name), &machine.descriptor())?;
        write_json(
            &self.paths.machine_configuration(&machine.name),
            &machine.configuration,
        )?;
        Ok(())
    }

    /// Delete a machine and everything in its directory
    pub fn remove(&self, machine: &Machine) -> Result<()> {
        fs::remove_dir_all(&machine.path)?;
        tracing::debug!("Machine directory '{}' removed", machine.path.display());
        Ok(())
    }
}
