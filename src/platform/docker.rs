//! Docker Engine implementation of the container platform
//!
//! bollard is async; AAVM is not. The client owns a current-thread tokio
//! runtime and blocks on every engine call, so each call runs to completion
//! before the next one starts.

use crate::image::canonical_arch;
use crate::platform::{ContainerPlatform, ContainerRef, ContainerSpec, ImageRef};
use crate::{AavmError, Result};
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::image::{CreateImageOptions, ListImagesOptions, RemoveImageOptions};
use bollard::models::{ContainerInspectResponse, ContainerSummary, ImageInspect, ImageSummary};
use bollard::{Docker, API_DEFAULT_VERSION};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::io::Write;
use tokio::runtime::Runtime;

const CONNECT_TIMEOUT: u64 = 120;

/// Container platform backed by a Docker daemon
pub struct DockerPlatform {
    name: String,
    docker: Docker,
    runtime: Runtime,
}

impl DockerPlatform {
    /// Connect to the daemon at `host`, or to the local daemon when `None`
    pub fn connect(host: Option<&str>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let (name, docker) = {
            let _guard = runtime.enter();
            match host {
                None => ("local".to_string(), Docker::connect_with_local_defaults()?),
                Some(host) if host.starts_with("unix://") => (
                    host.to_string(),
                    Docker::connect_with_unix(host, CONNECT_TIMEOUT, API_DEFAULT_VERSION)?,
                ),
                Some(host) => (
                    host.to_string(),
                    Docker::connect_with_http(host, CONNECT_TIMEOUT, API_DEFAULT_VERSION)?,
                ),
            }
        };
        tracing::debug!("Using Docker endpoint '{}'", name);

        Ok(Self {
            name,
            docker,
            runtime,
        })
    }
}

fn is_status(error: &BollardError, code: u16) -> bool {
    matches!(error, BollardError::DockerResponseServerError { status_code, .. } if *status_code == code)
}

fn label_filter(label: &str) -> HashMap<String, Vec<String>> {
    HashMap::from([("label".to_string(), vec![label.to_string()])])
}

fn container_from_summary(summary: ContainerSummary) -> ContainerRef {
    let name = summary
        .names
        .and_then(|names| names.into_iter().next())
        .map(|name| name.trim_start_matches('/').to_string())
        .unwrap_or_default();
    ContainerRef {
        id: summary.id.unwrap_or_default(),
        name,
        image: summary.image.unwrap_or_default(),
        status: summary.state.unwrap_or_default(),
        created: summary
            .created
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
        labels: summary.labels.unwrap_or_default(),
    }
}

fn container_from_inspect(response: ContainerInspectResponse) -> ContainerRef {
    let config = response.config.unwrap_or_default();
    ContainerRef {
        id: response.id.unwrap_or_default(),
        name: response
            .name
            .map(|name| name.trim_start_matches('/').to_string())
            .unwrap_or_default(),
        image: config.image.unwrap_or_default(),
        status: response
            .state
            .and_then(|state| state.status)
            .map(|status| status.to_string())
            .unwrap_or_default(),
        created: response
            .created
            .and_then(|created| DateTime::parse_from_rfc3339(&created).ok())
            .map(|created| created.with_timezone(&Utc)),
        labels: config.labels.unwrap_or_default(),
    }
}

fn image_from_summary(summary: ImageSummary) -> ImageRef {
    ImageRef {
        id: summary.id,
        tags: summary.repo_tags,
        labels: summary.labels,
    }
}

fn image_from_inspect(inspect: ImageInspect) -> ImageRef {
    ImageRef {
        id: inspect.id.unwrap_or_default(),
        tags: inspect.repo_tags.unwrap_or_default(),
        labels: inspect
            .config
            .and_then(|config| config.labels)
            .unwrap_or_default(),
    }
}

impl ContainerPlatform for DockerPlatform {
    fn name(&self) -> &str {
        &self.name
    }

    fn architecture(&self) -> Result<String> {
        let version = self.runtime.block_on(self.docker.version())?;
        let arch = version.arch.unwrap_or_default();
        Ok(canonical_arch(&arch)?.to_string())
    }

    fn list_containers(&self, label: &str) -> Result<Vec<ContainerRef>> {
        let options = ListContainersOptions::<String> {
            all: true,
            filters: label_filter(label),
            ..Default::default()
        };
        let summaries = self
            .runtime
            .block_on(self.docker.list_containers(Some(options)))?;
        Ok(summaries.into_iter().map(container_from_summary).collect())
    }

    fn get_container(&self, id_or_name: &str) -> Result<Option<ContainerRef>> {
        match self.runtime.block_on(
            self.docker
                .inspect_container(id_or_name, None::<InspectContainerOptions>),
        ) {
            Ok(response) => Ok(Some(container_from_inspect(response))),
            Err(e) if is_status(&e, 404) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerRef> {
        let config: Config<String> =
            serde_json::from_value(Value::Object(spec.configuration.clone())).map_err(|e| {
                AavmError::Validation(format!(
                    "Invalid container configuration for '{}': {}",
                    spec.name, e
                ))
            })?;
        let options = CreateContainerOptions {
            name: spec.name.clone(),
            platform: spec.platform.clone(),
        };
        let response = self
            .runtime
            .block_on(self.docker.create_container(Some(options), config))?;
        for warning in &response.warnings {
            tracing::warn!("{}", warning);
        }
        self.get_container(&response.id)?
            .ok_or(AavmError::ContainerNotFound(response.id))
    }

    fn start_container(&self, id: &str) -> Result<()> {
        match self.runtime.block_on(
            self.docker
                .start_container(id, None::<StartContainerOptions<String>>),
        ) {
            Ok(()) => Ok(()),
            Err(e) if is_status(&e, 304) => {
                tracing::debug!("Container '{}' was already started", id);
                Ok(())
            }
            Err(e) if is_status(&e, 404) => Err(AavmError::ContainerNotFound(id.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    fn stop_container(&self, id: &str, timeout: i64) -> Result<()> {
        let options = StopContainerOptions { t: timeout };
        match self
            .runtime
            .block_on(self.docker.stop_container(id, Some(options)))
        {
            Ok(()) => Ok(()),
            Err(e) if is_status(&e, 304) => {
                tracing::debug!("Container '{}' was already stopped", id);
                Ok(())
            }
            Err(e) if is_status(&e, 404) => Err(AavmError::ContainerNotFound(id.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    fn remove_container(&self, id: &str) -> Result<()> {
        let options = RemoveContainerOptions {
            force: false,
            ..Default::default()
        };
        match self
            .runtime
            .block_on(self.docker.remove_container(id, Some(options)))
        {
            Ok(()) => Ok(()),
            Err(e) if is_status(&e, 404) => Err(AavmError::ContainerNotFound(id.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    fn attach_container(&self, id: &str, out: &mut dyn Write) -> Result<()> {
        let options = LogsOptions::<String> {
            follow: true,
            stdout: true,
            stderr: true,
            tail: "all".to_string(),
            ..Default::default()
        };
        self.runtime.block_on(async {
            let mut stream = self.docker.logs(id, Some(options));
            while let Some(chunk) = stream.next().await {
                out.write_all(&chunk?.into_bytes())?;
                out.flush()?;
            }
            Ok::<(), AavmError>(())
        })
    }

    fn pull_image(&self, image: &str) -> Result<()> {
        let options = CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        };
        self.runtime.block_on(async {
            let mut stream = self.docker.create_image(Some(options), None, None);
            let mut layers = HashSet::new();
            let mut pulled = HashSet::new();
            while let Some(info) = stream.next().await {
                let info = info?;
                let (Some(layer), Some(status)) = (info.id, info.status) else {
                    continue;
                };
                layers.insert(layer.clone());
                if status == "Already exists" || status == "Pull complete" {
                    pulled.insert(layer);
                    tracing::info!("Pulled {}/{} layers", pulled.len(), layers.len());
                }
            }
            Ok::<(), AavmError>(())
        })
    }

    fn remove_image(&self, image: &str) -> Result<()> {
        match self.runtime.block_on(self.docker.remove_image(
            image,
            None::<RemoveImageOptions>,
            None,
        )) {
            Ok(_) => Ok(()),
            Err(e) if is_status(&e, 404) => Err(AavmError::ImageNotFound(image.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    fn get_image(&self, image: &str) -> Result<Option<ImageRef>> {
        match self.runtime.block_on(self.docker.inspect_image(image)) {
            Ok(inspect) => Ok(Some(image_from_inspect(inspect))),
            Err(e) if is_status(&e, 404) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list_images(&self, label: &str) -> Result<Vec<ImageRef>> {
        let options = ListImagesOptions::<String> {
            all: false,
            filters: label_filter(label),
            ..Default::default()
        };
        let summaries = self
            .runtime
            .block_on(self.docker.list_images(Some(options)))?;
        Ok(summaries.into_iter().map(image_from_summary).collect())
    }
}
