//! Structured Docker image names
//!
//! The naming convention is:
//!
//! ```text
//! [REGISTRY[:PORT]/][USER/]REPOSITORY[:TAG][-ARCH]
//! ```

use crate::image::arch::CANONICAL_ARCHS;
use crate::{AavmError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_REGISTRY_HOSTNAME: &str = "docker.io";
pub const DEFAULT_USER: &str = "library";
pub const DEFAULT_TAG: &str = "latest";

/// Image registry endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default = "default_hostname")]
    pub hostname: String,
    /// Explicit port, `None` when the registry's own default applies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

fn default_hostname() -> String {
    DEFAULT_REGISTRY_HOSTNAME.to_string()
}

fn default_user() -> String {
    DEFAULT_USER.to_string()
}

fn default_tag() -> String {
    DEFAULT_TAG.to_string()
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            port: None,
        }
    }
}

/// Check one path-like component of an image name. `.` and `..` are refused
/// since compiled names double as directory names on disk.
fn check_component(component: &str, extra: &[char], what: &str, name: &str) -> Result<()> {
    let valid = !component.is_empty()
        && component != "."
        && component != ".."
        && component
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || extra.contains(&c));
    if valid {
        Ok(())
    } else {
        Err(AavmError::InvalidImageName(format!(
            "Invalid {} '{}' in image name '{}'",
            what, component, name
        )))
    }
}

impl Registry {
    /// Parse `hostname[:port]`
    pub fn parse(registry: &str) -> Result<Self> {
        let (hostname, port) = match registry.split_once(':') {
            Some((hostname, port)) => {
                let port = port.parse::<u16>().map_err(|_| {
                    AavmError::InvalidImageName(format!(
                        "Invalid port '{}' in registry '{}'",
                        port, registry
                    ))
                })?;
                (hostname, Some(port))
            }
            None => (registry, None),
        };
        Ok(Self {
            hostname: hostname.to_string(),
            port,
        })
    }

    pub fn is_default(&self) -> bool {
        self.hostname == DEFAULT_REGISTRY_HOSTNAME && self.port.is_none()
    }

    pub fn compile(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{}", self.hostname, port),
            None => self.hostname.clone(),
        }
    }
}

impl fmt::Display for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.compile())
    }
}

/// Docker image name broken down into its components
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageName {
    #[serde(default)]
    pub registry: Registry,
    #[serde(default = "default_user")]
    pub user: String,
    pub repository: String,
    #[serde(default = "default_tag")]
    pub tag: String,
    #[serde(default)]
    pub arch: Option<String>,
}

impl ImageName {
    /// Image name with every component but the repository at its default
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            registry: Registry::default(),
            user: default_user(),
            repository: repository.into(),
            tag: default_tag(),
            arch: None,
        }
    }

    /// Parse an image name string
    pub fn parse(name: &str) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AavmError::InvalidImageName("Empty image name".to_string()));
        }

        let parts: Vec<&str> = name.split('/').collect();
        if parts.iter().any(|part| part.is_empty()) {
            return Err(AavmError::InvalidImageName(format!(
                "Image name '{}' contains an empty component",
                name
            )));
        }

        let (registry, user, repository_tag) = match parts.as_slice() {
            [repository_tag] => (None, None, *repository_tag),
            [user, repository_tag] => (None, Some(*user), *repository_tag),
            [registry, user, repository_tag] => (Some(*registry), Some(*user), *repository_tag),
            _ => {
                return Err(AavmError::InvalidImageName(format!(
                    "Image name '{}' must have at most 3 components, {} were given",
                    name,
                    parts.len()
                )))
            }
        };

        let (repository, mut tag) = match repository_tag.split_once(':') {
            Some((repository, tag)) => (repository, tag),
            None => (repository_tag, DEFAULT_TAG),
        };
        if repository.is_empty() || tag.is_empty() || tag.contains(':') {
            return Err(AavmError::InvalidImageName(format!(
                "Invalid repository/tag '{}' in image name '{}'",
                repository_tag, name
            )));
        }

        let mut arch = None;
        for candidate in CANONICAL_ARCHS {
            if let Some(stripped) = tag.strip_suffix(candidate) {
                if let Some(stripped) = stripped.strip_suffix('-') {
                    tag = stripped;
                    arch = Some(candidate.to_string());
                    break;
                }
            }
        }
        if tag.is_empty() {
            return Err(AavmError::InvalidImageName(format!(
                "Image name '{}' has an architecture but no tag",
                name
            )));
        }

        let image = Self {
            registry: registry.map(Registry::parse).transpose()?.unwrap_or_default(),
            user: user.map(str::to_string).unwrap_or_else(default_user),
            repository: repository.to_string(),
            tag: tag.to_string(),
            arch,
        };
        image.validate()?;
        Ok(image)
    }

    /// Check every component against the characters allowed in a Docker
    /// reference
    pub fn validate(&self) -> Result<()> {
        let name = self.compile(true);
        check_component(&self.registry.hostname, &['.', '-'], "registry hostname", &name)?;
        check_component(&self.user, &['.', '_', '-'], "user", &name)?;
        check_component(&self.repository, &['.', '_', '-'], "repository", &name)?;
        check_component(&self.tag, &['.', '_', '-'], "tag", &name)?;
        if let Some(arch) = &self.arch {
            check_component(arch, &[], "architecture", &name)?;
        }
        Ok(())
    }

    /// Compile the name back into a single string.
    ///
    /// Default components are omitted unless `allow_defaults` is set, in which
    /// case every component is emitted. The latter is a stable identity,
    /// suitable for naming directories on disk.
    pub fn compile(&self, allow_defaults: bool) -> String {
        let mut name = String::new();
        if allow_defaults || !self.registry.is_default() {
            name.push_str(&self.registry.compile());
            name.push('/');
        }
        if allow_defaults || self.user != DEFAULT_USER {
            name.push_str(&self.user);
            name.push('/');
        }
        name.push_str(&self.repository);
        if allow_defaults || self.tag != DEFAULT_TAG || self.arch.is_some() {
            name.push(':');
            name.push_str(&self.tag);
        }
        if let Some(ref arch) = self.arch {
            name.push('-');
            name.push_str(arch);
        }
        name
    }
}

impl fmt::Display for ImageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.compile(false))
    }
}

/// Normalize a user supplied image name into its fully qualified form
pub fn sanitize_image_name(name: &str) -> Result<String> {
    Ok(ImageName::parse(name)?.compile(true))
}
