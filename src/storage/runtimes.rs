//! Runtime descriptor storage

use crate::image::{assert_canonical_arch, sanitize_image_name};
use crate::runtime::Runtime;
use crate::storage::paths::{AavmPaths, CONFIGURATION_FILE, RUNTIME_DESCRIPTOR};
use crate::storage::schema::{read_configuration, read_runtime_descriptor, write_json};
use crate::{AavmError, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// In-memory cache of the runtimes resolved during one invocation, keyed by
/// fully qualified image name
#[derive(Debug, Default)]
pub struct RuntimeRegistry {
    runtimes: HashMap<String, Runtime>,
}

impl RuntimeRegistry {
    pub fn get(&self, id: &str) -> Option<&Runtime> {
        self.runtimes.get(id)
    }

    pub fn insert(&mut self, runtime: Runtime) {
        self.runtimes.insert(runtime.id(), runtime);
    }

    pub fn clear(&mut self) {
        self.runtimes.clear();
    }

    pub fn len(&self) -> usize {
        self.runtimes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runtimes.is_empty()
    }
}

/// Manages runtime descriptors under `<root>/runtimes`
pub struct RuntimeStore {
    paths: AavmPaths,
    registry: RuntimeRegistry,
}

impl RuntimeStore {
    pub fn new(paths: &AavmPaths) -> Self {
        Self {
            paths: paths.clone(),
            registry: RuntimeRegistry::default(),
        }
    }

    pub fn registry(&self) -> &RuntimeRegistry {
        &self.registry
    }

    /// Forget every cached runtime
    pub fn clear(&mut self) {
        self.registry.clear();
    }

    /// Whether a runtime is stored on disk
    pub fn exists(&self, image: &str) -> Result<bool> {
        let id = sanitize_image_name(image)?;
        Ok(self.paths.runtime_descriptor(&id).is_file())
    }

    /// Find a runtime by image name, first in the cache then on disk
    pub fn resolve(&mut self, image: &str) -> Result<Runtime> {
        let id = sanitize_image_name(image)?;
        if let Some(runtime) = self.registry.get(&id) {
            return Ok(runtime.clone());
        }

        let dir = self.paths.runtime_dir(&id);
        if !dir.is_dir() {
            return Err(AavmError::RuntimeNotFound(id));
        }
        let runtime = Self::load_dir(&dir)?;
        tracing::debug!("Loaded runtime '{}' from disk", runtime.id());
        self.registry.insert(runtime.clone());
        Ok(runtime)
    }

    /// Load a runtime from its directory
    pub fn load_dir(dir: &Path) -> Result<Runtime> {
        let descriptor = read_runtime_descriptor(&dir.join(RUNTIME_DESCRIPTOR))?;
        descriptor.image.validate()?;
        if let Some(arch) = &descriptor.image.arch {
            assert_canonical_arch(arch)?;
        }
        let configuration = read_configuration(&dir.join(CONFIGURATION_FILE))?;
        Ok(Runtime::from_descriptor(descriptor, configuration))
    }

    /// Persist a runtime and register it
    pub fn save(&mut self, runtime: &Runtime) -> Result<()> {
        runtime.image.validate()?;
        let id = runtime.id();
        fs::create_dir_all(self.paths.runtime_dir(&id))?;
        write_json(&self.paths.runtime_descriptor(&id), &runtime.descriptor())?;
        write_json(&self.paths.runtime_configuration(&id), &runtime.configuration)?;
        tracing::debug!("Runtime '{}' saved", id);
        self.registry.insert(runtime.clone());
        Ok(())
    }

    /// Delete a runtime from disk
    pub fn remove(&mut self, image: &str) -> Result<()> {
        let id = sanitize_image_name(image)?;
        let dir = self.paths.runtime_dir(&id);
        if !dir.is_dir() {
            return Err(AavmError::RuntimeNotFound(id));
        }
        fs::remove_dir_all(&dir)?;
        self.registry.runtimes.remove(&id);
        Ok(())
    }

    /// All runtimes stored on disk.
    ///
    /// Runtime directories sit at a fixed depth (`registry/user/repo:tag`).
    /// Entries that fail to load are skipped with a warning.
    pub fn list(&mut self) -> Result<Vec<Runtime>> {
        let root = self.paths.runtimes_dir();
        let mut runtimes = Vec::new();
        if !root.is_dir() {
            return Ok(runtimes);
        }

        let mut level = vec![root];
        for _ in 0..3 {
            let mut next = Vec::new();
            for dir in level {
                for entry in fs::read_dir(&dir)? {
                    let path = entry?.path();
                    if path.is_dir() {
                        next.push(path);
                    }
                }
            }
            level = next;
        }
        level.sort();

        for dir in level {
            match Self::load_dir(&dir) {
                Ok(runtime) => {
                    self.registry.insert(runtime.clone());
                    runtimes.push(runtime);
                }
                Err(e) => {
                    tracing::warn!("Skipping runtime at '{}': {}", dir.display(), e);
                }
            }
        }
        Ok(runtimes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageName;
    use serde_json::json;
    use tempfile::TempDir;

    fn runtime(name: &str) -> Runtime {
        Runtime {
            schema: "1.0".to_string(),
            version: "1.0".to_string(),
            description: "Base".to_string(),
            image: ImageName::parse(name).unwrap(),
            maintainer: "Andrea".to_string(),
            configuration: json!({"Tty": true}).as_object().cloned().unwrap(),
            metadata: Default::default(),
            downloaded: Default::default(),
            official: true,
        }
    }

    #[test]
    fn test_save_and_resolve() {
        let tmp = TempDir::new().unwrap();
        let paths = AavmPaths::with_root(tmp.path());
        let mut store = RuntimeStore::new(&paths);

        store.save(&runtime("library/base:latest-amd64")).unwrap();
        assert!(paths
            .runtime_descriptor("docker.io/library/base:latest-amd64")
            .is_file());

        let mut fresh = RuntimeStore::new(&paths);
        assert!(fresh.registry().is_empty());
        let resolved = fresh.resolve("base:latest-amd64").unwrap();
        assert_eq!(resolved.id(), "docker.io/library/base:latest-amd64");
        assert_eq!(resolved.configuration["Tty"], json!(true));
        assert_eq!(fresh.registry().len(), 1);
    }

    #[test]
    fn test_resolve_missing() {
        let tmp = TempDir::new().unwrap();
        let mut store = RuntimeStore::new(&AavmPaths::with_root(tmp.path()));
        assert!(matches!(
            store.resolve("library/nope"),
            Err(AavmError::RuntimeNotFound(_))
        ));
    }

    #[test]
    fn test_list_skips_broken_entries() {
        let tmp = TempDir::new().unwrap();
        let paths = AavmPaths::with_root(tmp.path());
        let mut store = RuntimeStore::new(&paths);
        store.save(&runtime("library/base:latest-amd64")).unwrap();
        store.save(&runtime("afdaniele/desktop:v1-arm64v8")).unwrap();

        let broken = paths.runtime_dir("docker.io/library/broken:latest");
        fs::create_dir_all(&broken).unwrap();
        fs::write(broken.join(RUNTIME_DESCRIPTOR), "{ not json").unwrap();

        store.clear();
        let runtimes = store.list().unwrap();
        assert_eq!(runtimes.len(), 2);
        assert_eq!(store.registry().len(), 2);
    }

    #[test]
    fn test_remove() {
        let tmp = TempDir::new().unwrap();
        let paths = AavmPaths::with_root(tmp.path());
        let mut store = RuntimeStore::new(&paths);
        store.save(&runtime("library/base:latest-amd64")).unwrap();
        assert!(store.exists("base:latest-amd64").unwrap());

        store.remove("base:latest-amd64").unwrap();
        assert!(!store.exists("base:latest-amd64").unwrap());
        assert!(store.registry().is_empty());
    }

    #[test]
    fn test_names_cannot_escape_the_runtimes_dir() {
        let tmp = TempDir::new().unwrap();
        let paths = AavmPaths::with_root(tmp.path().join("home"));
        let mut store = RuntimeStore::new(&paths);

        // `runtimes/../../x` would land here
        let outside = tmp.path().join("x:latest");
        fs::create_dir_all(&outside).unwrap();
        fs::create_dir_all(paths.runtimes_dir()).unwrap();

        for name in ["../../x", "../x/y", "./../x"] {
            assert!(matches!(
                store.remove(name),
                Err(AavmError::InvalidImageName(_))
            ));
            assert!(store.resolve(name).is_err());
            assert!(store.exists(name).is_err());
        }
        assert!(outside.is_dir());

        let mut escaping = runtime("library/base:latest-amd64");
        escaping.image.user = "..".to_string();
        assert!(matches!(
            store.save(&escaping),
            Err(AavmError::InvalidImageName(_))
        ));
        assert!(!paths.runtimes_dir().join("base:latest-amd64").exists());
    }
}
