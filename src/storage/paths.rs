//! Path management for the ~/.aavm/ directory structure

use crate::{AavmError, Result};
use std::path::{Path, PathBuf};

/// Manages paths for aavm's filesystem storage
#[derive(Debug, Clone)]
pub struct AavmPaths {
    root: PathBuf,
}

impl AavmPaths {
    /// Create a new AavmPaths instance using the default root (~/.aavm/)
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| {
            AavmError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine user home directory. Please ensure HOME environment variable is set.",
            ))
        })?;

        Ok(Self {
            root: home.join(".aavm"),
        })
    }

    /// Create a new AavmPaths instance with a custom root
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Get the root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Ensure all required directories exist
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(self.machines_dir())?;
        std::fs::create_dir_all(self.runtimes_dir())?;
        Ok(())
    }

    /// Directory containing machine definitions
    pub fn machines_dir(&self) -> PathBuf {
        self.root.join("machines")
    }

    /// Directory for a specific machine
    pub fn machine_dir(&self, name: &str) -> PathBuf {
        self.machines_dir().join(name)
    }

    /// Machine descriptor file
    pub fn machine_descriptor(&self, name: &str) -> PathBuf {
        self.machine_dir(name).join(MACHINE_DESCRIPTOR)
    }

    /// Machine container configuration overrides
    pub fn machine_configuration(&self, name: &str) -> PathBuf {
        self.machine_dir(name).join(CONFIGURATION_FILE)
    }

    /// Machine root filesystem directory
    pub fn machine_root(&self, name: &str) -> PathBuf {
        self.machine_dir(name).join("root")
    }

    /// Directory containing runtime descriptors
    pub fn runtimes_dir(&self) -> PathBuf {
        self.root.join("runtimes")
    }

    /// Directory for a specific runtime, keyed by its fully qualified image name
    pub fn runtime_dir(&self, image: &str) -> PathBuf {
        self.runtimes_dir().join(image)
    }

    /// Runtime descriptor file
    pub fn runtime_descriptor(&self, image: &str) -> PathBuf {
        self.runtime_dir(image).join(RUNTIME_DESCRIPTOR)
    }

    /// Runtime base container configuration
    pub fn runtime_configuration(&self, image: &str) -> PathBuf {
        self.runtime_dir(image).join(CONFIGURATION_FILE)
    }
}

pub const MACHINE_DESCRIPTOR: &str = "machine.json";
pub const RUNTIME_DESCRIPTOR: &str = "runtime.json";
pub const CONFIGURATION_FILE: &str = "configuration.json";

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths_structure() {
        let tmp = TempDir::new().unwrap();
        let paths = AavmPaths::with_root(tmp.path());

        assert_eq!(paths.root(), tmp.path());
        assert_eq!(paths.machines_dir(), tmp.path().join("machines"));
        assert_eq!(paths.runtimes_dir(), tmp.path().join("runtimes"));
    }

    #[test]
    fn test_machine_paths() {
        let tmp = TempDir::new().unwrap();
        let paths = AavmPaths::with_root(tmp.path());

        assert_eq!(
            paths.machine_descriptor("demo"),
            tmp.path().join("machines/demo/machine.json")
        );
        assert_eq!(
            paths.machine_configuration("demo"),
            tmp.path().join("machines/demo/configuration.json")
        );
        assert_eq!(paths.machine_root("demo"), tmp.path().join("machines/demo/root"));
    }

    #[test]
    fn test_runtime_paths_are_nested() {
        let tmp = TempDir::new().unwrap();
        let paths = AavmPaths::with_root(tmp.path());

        assert_eq!(
            paths.runtime_descriptor("docker.io/library/base:latest-amd64"),
            tmp.path()
                .join("runtimes/docker.io/library/base:latest-amd64/runtime.json")
        );
    }

    #[test]
    fn test_ensure_directories() {
        let tmp = TempDir::new().unwrap();
        let paths = AavmPaths::with_root(tmp.path());

        paths.ensure_directories().unwrap();

        assert!(paths.machines_dir().exists());
        assert!(paths.runtimes_dir().exists());
    }
}
