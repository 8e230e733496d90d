//! AAVM runtimes: versioned base images machines are built from

pub mod index;

use crate::configuration::Configuration;
use crate::image::{canonical_arch, ImageName};
use crate::platform::{ContainerPlatform, ImageRef};
use crate::storage::schema::RuntimeDescriptor;
use crate::{aavm_label, Result, RUNTIME_SCHEMA_DEFAULT_VERSION};
use serde_json::Value;

/// Whether a runtime image is present on the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Downloaded {
    #[default]
    Unknown,
    Yes,
    No,
}

impl Downloaded {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Yes => "Yes",
            Self::No => "No",
        }
    }
}

/// A runtime descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct Runtime {
    pub schema: String,
    pub version: String,
    pub description: String,
    pub image: ImageName,
    pub maintainer: String,
    pub configuration: Configuration,
    pub metadata: Configuration,
    pub downloaded: Downloaded,
    pub official: bool,
}

impl Runtime {
    /// Runtime identity: the fully qualified image name
    pub fn id(&self) -> String {
        self.image.compile(true)
    }

    pub fn from_descriptor(descriptor: RuntimeDescriptor, configuration: Configuration) -> Self {
        Self {
            schema: descriptor.schema,
            version: descriptor.version,
            description: descriptor.description,
            image: descriptor.image,
            maintainer: descriptor.maintainer,
            configuration,
            metadata: descriptor.metadata,
            downloaded: Downloaded::Unknown,
            official: descriptor.official,
        }
    }

    pub fn descriptor(&self) -> RuntimeDescriptor {
        RuntimeDescriptor {
            schema: self.schema.clone(),
            version: self.version.clone(),
            description: self.description.clone(),
            image: self.image.clone(),
            maintainer: self.maintainer.clone(),
            metadata: self.metadata.clone(),
            official: self.official,
        }
    }

    /// Build a runtime out of the labels of an image found on the platform.
    ///
    /// Returns `None` when none of the image's tags is a valid image name, or
    /// when the architecture label is unsupported or contradicts the tag.
    pub fn from_image(image: &ImageRef) -> Option<Self> {
        let mut name = image
            .tags
            .iter()
            .find_map(|tag| ImageName::parse(tag).ok())?;
        let label = |key: &str| {
            image
                .labels
                .get(&aavm_label(key, None))
                .cloned()
                .unwrap_or_default()
        };

        let arch = label("environment.arch");
        if !arch.is_empty() {
            let arch = match canonical_arch(&arch) {
                Ok(arch) => arch,
                Err(e) => {
                    tracing::warn!("Ignoring image '{}': {}", name, e);
                    return None;
                }
            };
            match name.arch.as_deref() {
                None => name.arch = Some(arch.to_string()),
                Some(tagged) if tagged == arch => {}
                Some(tagged) => {
                    tracing::warn!(
                        "Ignoring image '{}': its tag says '{}' but its label says '{}'",
                        name,
                        tagged,
                        arch
                    );
                    return None;
                }
            }
        }

        let metadata = match serde_json::from_str::<Value>(&label("environment.metadata")) {
            Ok(Value::Object(metadata)) => metadata,
            _ => Configuration::new(),
        };
        let version = match label("environment.version") {
            version if version.is_empty() => name.tag.clone(),
            version => version,
        };
        Some(Self {
            schema: RUNTIME_SCHEMA_DEFAULT_VERSION.to_string(),
            version,
            description: label("environment.description"),
            image: name,
            maintainer: label("environment.maintainer"),
            configuration: Configuration::new(),
            metadata,
            downloaded: Downloaded::Yes,
            official: false,
        })
    }
}

/// Runtimes whose images are present on the platform
pub fn platform_runtimes(platform: &dyn ContainerPlatform) -> Result<Vec<Runtime>> {
    let images = platform.list_images(&aavm_label("runtime", Some("1")))?;
    Ok(images.iter().filter_map(Runtime::from_image).collect())
}

/// Record whether each runtime's image is present on the platform. Runtimes
/// already known to be present are left alone.
pub fn check_downloaded(platform: &dyn ContainerPlatform, runtimes: &mut [Runtime]) -> Result<()> {
    for runtime in runtimes.iter_mut().filter(|r| r.downloaded != Downloaded::Yes) {
        runtime.downloaded = match platform.get_image(&runtime.id())? {
            Some(_) => Downloaded::Yes,
            None => Downloaded::No,
        };
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_from_image_labels() {
        let image = ImageRef {
            id: "sha256:abc".to_string(),
            tags: vec!["afdaniele/desktop:v1-amd64".to_string()],
            labels: HashMap::from([
                ("aavm.runtime".to_string(), "1".to_string()),
                ("aavm.environment.description".to_string(), "Desktop".to_string()),
                ("aavm.environment.maintainer".to_string(), "Andrea".to_string()),
                ("aavm.environment.arch".to_string(), "x86_64".to_string()),
                ("aavm.environment.metadata".to_string(), r#"{"gui": true}"#.to_string()),
            ]),
        };
        let runtime = Runtime::from_image(&image).unwrap();
        assert_eq!(runtime.id(), "docker.io/afdaniele/desktop:v1-amd64");
        assert_eq!(runtime.description, "Desktop");
        assert_eq!(runtime.maintainer, "Andrea");
        assert_eq!(runtime.metadata["gui"], Value::Bool(true));
        assert_eq!(runtime.downloaded, Downloaded::Yes);
        assert!(!runtime.official);
    }

    fn labelled(tag: &str, arch: &str) -> ImageRef {
        ImageRef {
            id: "sha256:abc".to_string(),
            tags: vec![tag.to_string()],
            labels: HashMap::from([
                ("aavm.runtime".to_string(), "1".to_string()),
                ("aavm.environment.arch".to_string(), arch.to_string()),
            ]),
        }
    }

    #[test]
    fn test_from_image_arch_label() {
        let runtime = Runtime::from_image(&labelled("afdaniele/desktop:v1", "aarch64")).unwrap();
        assert_eq!(runtime.image.arch.as_deref(), Some("arm64v8"));
        assert_eq!(runtime.id(), "docker.io/afdaniele/desktop:v1-arm64v8");

        let runtime = Runtime::from_image(&labelled("afdaniele/desktop:v1", "")).unwrap();
        assert!(runtime.image.arch.is_none());
    }

    #[test]
    fn test_from_image_arch_conflict() {
        assert!(Runtime::from_image(&labelled("afdaniele/desktop:v1-amd64", "arm64")).is_none());
        assert!(Runtime::from_image(&labelled("afdaniele/desktop:v1", "sparc")).is_none());
    }

    #[test]
    fn test_from_untagged_image() {
        let image = ImageRef {
            id: "sha256:abc".to_string(),
            ..Default::default()
        };
        assert!(Runtime::from_image(&image).is_none());
    }
}
