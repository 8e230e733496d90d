//! Versioned descriptor schemas
//!
//! Every descriptor on disk declares the schema it was written with in a
//! top-level `schema` field. That version picks the structure the document is
//! validated against; validation itself is a strict deserialization of the
//! matching descriptor type.

use crate::configuration::Configuration;
use crate::image::ImageName;
use crate::machine::{MachineLinks, MachineSettings};
use crate::{AavmError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Machine descriptor, schema `1.0`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MachineDescriptorV1 {
    pub schema: String,
    pub version: String,
    pub runtime: String,
    pub description: String,
    #[serde(default)]
    pub settings: MachineSettings,
    #[serde(default)]
    pub links: MachineLinks,
}

/// Runtime descriptor, schema `1.0`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeDescriptorV1 {
    pub schema: String,
    pub version: String,
    pub description: String,
    pub image: ImageName,
    pub maintainer: String,
    #[serde(default)]
    pub metadata: Configuration,
    #[serde(default)]
    pub official: bool,
}

/// The machine descriptor layout written by this version
pub type MachineDescriptor = MachineDescriptorV1;

/// The runtime descriptor layout written by this version
pub type RuntimeDescriptor = RuntimeDescriptorV1;

/// Read a JSON document from `path`, with user friendly errors
pub fn read_json(path: &Path) -> Result<Value> {
    if !path.is_file() {
        return Err(AavmError::Validation(format!(
            "Path '{}' does not exist or is not a file.",
            path.display()
        )));
    }
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| {
        AavmError::Validation(format!(
            "File '{}' is not a valid JSON file. Error reads: {}",
            path.display(),
            e
        ))
    })
}

/// Write `data` to `path` as pretty printed JSON
pub fn write_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data)?;
    fs::write(path, json)?;
    Ok(())
}

/// Read a container configuration document
pub fn read_configuration(path: &Path) -> Result<Configuration> {
    match read_json(path)? {
        Value::Object(configuration) => Ok(configuration),
        _ => Err(AavmError::Validation(format!(
            "File '{}' must contain a JSON-serialized dictionary.",
            path.display()
        ))),
    }
}

/// Extract the declared schema version of a descriptor document
fn declared_schema(document: &Value, path: &Path) -> Result<String> {
    let Value::Object(fields) = document else {
        return Err(AavmError::Validation(format!(
            "File '{}' must contain a JSON-serialized dictionary.",
            path.display()
        )));
    };
    match fields.get("schema") {
        Some(Value::String(schema)) => Ok(schema.clone()),
        Some(_) => Err(AavmError::Validation(format!(
            "File '{}' declares a non-string 'schema' field.",
            path.display()
        ))),
        None => Err(AavmError::Validation(format!(
            "File '{}' must declare a field 'schema' at its root.",
            path.display()
        ))),
    }
}

fn validate<T: DeserializeOwned>(document: Value, kind: &str, schema: &str, path: &Path) -> Result<T> {
    serde_json::from_value(document).map_err(|e| {
        AavmError::Validation(format!(
            "File '{}' does not match the {} schema '{}': {}",
            path.display(),
            kind,
            schema,
            e
        ))
    })
}

fn unsupported(kind: &str, schema: &str, path: &Path) -> AavmError {
    AavmError::Validation(format!(
        "File '{}' declares an unsupported {} schema '{}'.",
        path.display(),
        kind,
        schema
    ))
}

/// Load and validate a machine descriptor
pub fn read_machine_descriptor(path: &Path) -> Result<MachineDescriptor> {
    let document = read_json(path)?;
    let schema = declared_schema(&document, path)?;
    match schema.as_str() {
        "1.0" => validate::<MachineDescriptorV1>(document, "machine", &schema, path),
        _ => Err(unsupported("machine", &schema, path)),
    }
}

/// Load and validate a runtime descriptor
pub fn read_runtime_descriptor(path: &Path) -> Result<RuntimeDescriptor> {
    let document = read_json(path)?;
    let schema = declared_schema(&document, path)?;
    match schema.as_str() {
        "1.0" => validate::<RuntimeDescriptorV1>(document, "runtime", &schema, path),
        _ => Err(unsupported("runtime", &schema, path)),
    }
}
