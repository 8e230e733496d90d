//! Shared fixtures for integration tests: an in-memory container platform
//! and a catalog rooted in a temporary directory.

#![allow(dead_code)]

use aavm::image::ImageName;
use aavm::platform::{ContainerPlatform, ContainerRef, ContainerSpec, ImageRef};
use aavm::runtime::Runtime;
use aavm::storage::{AavmPaths, MachineStore, RuntimeStore};
use aavm::{AavmError, Result};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const BASE_IMAGE: &str = "library/base:latest-amd64";

/// Container platform keeping every container and image in memory
pub struct StubPlatform {
    pub name: String,
    pub containers: RefCell<Vec<ContainerRef>>,
    pub images: RefCell<Vec<ImageRef>>,
    pub created: RefCell<Vec<ContainerSpec>>,
    next_id: Cell<u32>,
}

impl StubPlatform {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            containers: RefCell::new(Vec::new()),
            images: RefCell::new(Vec::new()),
            created: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
        }
    }

    /// A platform that already has `image` pulled
    pub fn with_image(name: &str, image: &str) -> Self {
        let platform = Self::new(name);
        platform.add_image(image, HashMap::new());
        platform
    }

    pub fn add_image(&self, image: &str, labels: HashMap<String, String>) {
        let id = format!("sha256:{:064}", self.images.borrow().len());
        self.images.borrow_mut().push(ImageRef {
            id,
            tags: vec![image.to_string()],
            labels,
        });
    }

    /// Insert a container behind the back of the code under test
    pub fn add_container(&self, name: &str, status: &str, labels: &[(&str, &str)]) -> String {
        let id = self.allocate_id();
        self.containers.borrow_mut().push(ContainerRef {
            id: id.clone(),
            name: name.to_string(),
            image: String::new(),
            status: status.to_string(),
            created: None,
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });
        id
    }

    pub fn status_of(&self, id: &str) -> Option<String> {
        self.containers
            .borrow()
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.status.clone())
    }

    fn allocate_id(&self) -> String {
        let n = self.next_id.get();
        self.next_id.set(n + 1);
        format!("{:064x}", n)
    }

    fn set_status(&self, id: &str, status: &str) -> Result<()> {
        let mut containers = self.containers.borrow_mut();
        let container = containers
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| AavmError::ContainerNotFound(id.to_string()))?;
        container.status = status.to_string();
        Ok(())
    }
}

impl ContainerPlatform for StubPlatform {
    fn name(&self) -> &str {
        &self.name
    }

    fn architecture(&self) -> Result<String> {
        Ok("amd64".to_string())
    }

    fn list_containers(&self, label: &str) -> Result<Vec<ContainerRef>> {
        let (key, value) = label.split_once('=').unwrap_or((label, ""));
        Ok(self
            .containers
            .borrow()
            .iter()
            .filter(|c| c.labels.get(key).map(String::as_str) == Some(value))
            .cloned()
            .collect())
    }

    fn get_container(&self, id_or_name: &str) -> Result<Option<ContainerRef>> {
        Ok(self
            .containers
            .borrow()
            .iter()
            .find(|c| c.id == id_or_name || c.name == id_or_name)
            .cloned())
    }

    fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerRef> {
        let labels = match spec.configuration.get("Labels") {
            Some(Value::Object(labels)) => labels
                .iter()
                .map(|(k, v)| (k.clone(), v.as_str().unwrap_or_default().to_string()))
                .collect(),
            _ => HashMap::new(),
        };
        let container = ContainerRef {
            id: self.allocate_id(),
            name: spec.name.clone(),
            image: spec.configuration["Image"].as_str().unwrap_or_default().to_string(),
            status: "created".to_string(),
            created: Some(chrono::Utc::now()),
            labels,
        };
        self.containers.borrow_mut().push(container.clone());
        self.created.borrow_mut().push(spec.clone());
        Ok(container)
    }

    fn start_container(&self, id: &str) -> Result<()> {
        self.set_status(id, "running")
    }

    fn stop_container(&self, id: &str, _timeout: i64) -> Result<()> {
        self.set_status(id, "exited")
    }

    fn remove_container(&self, id: &str) -> Result<()> {
        if self.status_of(id).as_deref() == Some("running") {
            return Err(AavmError::Validation(format!("container {} is running", id)));
        }
        let mut containers = self.containers.borrow_mut();
        let before = containers.len();
        containers.retain(|c| c.id != id);
        if containers.len() == before {
            return Err(AavmError::ContainerNotFound(id.to_string()));
        }
        Ok(())
    }

    fn attach_container(&self, _id: &str, out: &mut dyn Write) -> Result<()> {
        out.write_all(b"hello from the machine\n")?;
        Ok(())
    }

    fn pull_image(&self, image: &str) -> Result<()> {
        if self.get_image(image)?.is_none() {
            self.add_image(image, HashMap::new());
        }
        Ok(())
    }

    fn remove_image(&self, image: &str) -> Result<()> {
        let mut images = self.images.borrow_mut();
        let before = images.len();
        images.retain(|i| !i.tags.iter().any(|t| t == image));
        if images.len() == before {
            return Err(AavmError::ImageNotFound(image.to_string()));
        }
        Ok(())
    }

    fn get_image(&self, image: &str) -> Result<Option<ImageRef>> {
        Ok(self
            .images
            .borrow()
            .iter()
            .find(|i| i.tags.iter().any(|t| t == image))
            .cloned())
    }

    fn list_images(&self, label: &str) -> Result<Vec<ImageRef>> {
        let (key, value) = label.split_once('=').unwrap_or((label, ""));
        Ok(self
            .images
            .borrow()
            .iter()
            .filter(|i| i.labels.get(key).map(String::as_str) == Some(value))
            .cloned()
            .collect())
    }
}

pub fn base_runtime() -> Runtime {
    Runtime {
        schema: "1.0".to_string(),
        version: "1.0".to_string(),
        description: "Base runtime".to_string(),
        image: ImageName::parse(BASE_IMAGE).unwrap(),
        maintainer: "Andrea F. Daniele".to_string(),
        configuration: serde_json::json!({"Tty": true, "Env": ["AAVM=1"]})
            .as_object()
            .cloned()
            .unwrap(),
        metadata: Default::default(),
        downloaded: Default::default(),
        official: true,
    }
}

/// A catalog in a temporary directory with the base runtime saved
pub struct Catalog {
    pub tmp: TempDir,
    pub paths: AavmPaths,
    pub machines: MachineStore,
    pub runtimes: RuntimeStore,
}

impl Catalog {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let paths = AavmPaths::with_root(tmp.path());
        paths.ensure_directories().unwrap();
        let mut runtimes = RuntimeStore::new(&paths);
        runtimes.save(&base_runtime()).unwrap();
        Self {
            machines: MachineStore::new(&paths),
            runtimes,
            paths,
            tmp,
        }
    }
}

/// Log sink shared with a `tracing` subscriber
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock().unwrap())
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with warnings and errors captured, one line per event
pub fn capture_warnings<T>(f: impl FnOnce() -> T) -> (T, Vec<String>) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, buffer.lines())
}
