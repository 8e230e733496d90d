//! Remote index of official runtimes

use crate::configuration::Configuration;
use crate::image::{canonical_arch, ImageName, Registry};
use crate::runtime::{Downloaded, Runtime};
use crate::{AavmError, Result, RUNTIMES_INDEX_VERSION, RUNTIME_SCHEMA_DEFAULT_VERSION};
use serde::Deserialize;
use serde_json::Value;

/// Index entry, index version `1.0`. One entry describes a runtime built
/// for one or more architectures.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct IndexEntryV1 {
    name: String,
    tag: String,
    organization: String,
    description: String,
    maintainer: String,
    arch: Vec<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    registry: Option<String>,
    #[serde(default)]
    configuration: Configuration,
    #[serde(default)]
    metadata: Configuration,
}

impl IndexEntryV1 {
    fn into_runtimes(self) -> Result<Vec<Runtime>> {
        let registry = match self.registry.as_deref() {
            Some(registry) => Registry::parse(registry)?,
            None => Registry::default(),
        };
        let mut runtimes = Vec::with_capacity(self.arch.len());
        for arch in &self.arch {
            let image = ImageName {
                registry: registry.clone(),
                user: self.organization.clone(),
                repository: self.name.clone(),
                tag: self.tag.clone(),
                arch: Some(canonical_arch(arch)?.to_string()),
            };
            image.validate()?;
            runtimes.push(Runtime {
                schema: RUNTIME_SCHEMA_DEFAULT_VERSION.to_string(),
                version: self.version.clone().unwrap_or_else(|| self.tag.clone()),
                description: self.description.clone(),
                image,
                maintainer: self.maintainer.clone(),
                configuration: self.configuration.clone(),
                metadata: self.metadata.clone(),
                downloaded: Downloaded::Unknown,
                official: true,
            });
        }
        Ok(runtimes)
    }
}

/// Validate an index document and expand it into one runtime per architecture
pub fn parse_index(document: Value) -> Result<Vec<Runtime>> {
    let entries: Vec<IndexEntryV1> = serde_json::from_value(document).map_err(|e| {
        AavmError::Index(format!(
            "The runtimes index does not match the index schema '{}': {}",
            RUNTIMES_INDEX_VERSION, e
        ))
    })?;
    let mut runtimes = Vec::new();
    for entry in entries {
        runtimes.extend(entry.into_runtimes()?);
    }
    Ok(runtimes)
}

/// Client for the remote runtimes index
pub struct IndexClient {
    client: reqwest::blocking::Client,
    url: String,
}

impl IndexClient {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(format!("{}/{}", crate::APP_NAME, crate::VERSION))
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Download and validate the index
    pub fn fetch(&self) -> Result<Vec<Runtime>> {
        tracing::debug!("GET: {}", self.url);
        let document: Value = self
            .client
            .get(&self.url)
            .send()?
            .error_for_status()?
            .json()?;
        let runtimes = parse_index(document)?;
        tracing::debug!("{} runtimes found on the index", runtimes.len());
        Ok(runtimes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_index_expands_archs() {
        let document = json!([
            {
                "name": "base",
                "tag": "latest",
                "organization": "library",
                "description": "Base runtime",
                "maintainer": "Andrea F. Daniele",
                "arch": ["x86_64", "arm64"],
                "configuration": {"Tty": true}
            }
        ]);
        let runtimes = parse_index(document).unwrap();
        assert_eq!(runtimes.len(), 2);
        assert_eq!(runtimes[0].id(), "docker.io/library/base:latest-amd64");
        assert_eq!(runtimes[1].id(), "docker.io/library/base:latest-arm64v8");
        assert!(runtimes.iter().all(|r| r.official));
        assert_eq!(runtimes[0].configuration["Tty"], Value::Bool(true));
        assert_eq!(runtimes[0].version, "latest");
    }

    #[test]
    fn test_parse_index_with_registry() {
        let document = json!([
            {
                "name": "desktop",
                "tag": "v1",
                "organization": "afdaniele",
                "description": "Desktop",
                "maintainer": "Andrea",
                "arch": ["amd64"],
                "registry": "registry.local:6000"
            }
        ]);
        let runtimes = parse_index(document).unwrap();
        assert_eq!(runtimes[0].image.compile(false), "registry.local:6000/afdaniele/desktop:v1-amd64");
    }

    #[test]
    fn test_parse_index_rejects_malformed() {
        assert!(matches!(
            parse_index(json!({"not": "a list"})),
            Err(AavmError::Index(_))
        ));
        assert!(matches!(
            parse_index(json!([{"name": "base"}])),
            Err(AavmError::Index(_))
        ));
    }

    #[test]
    fn test_parse_index_rejects_unknown_arch() {
        let document = json!([
            {
                "name": "base",
                "tag": "latest",
                "organization": "library",
                "description": "Base runtime",
                "maintainer": "Andrea",
                "arch": ["sparc"]
            }
        ]);
        assert!(matches!(
            parse_index(document),
            Err(AavmError::UnsupportedArch { .. })
        ));
    }
}
