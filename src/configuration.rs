//! Container configuration documents and their layered merge
//!
//! A configuration is a JSON object shaped like the body of the Docker Engine
//! "create container" call (`Env`, `Cmd`, `HostConfig`, `Labels`, ...).
//! Runtimes provide a base document and machines layer their own overrides on
//! top of it.

use crate::{AavmError, Result};
use serde_json::{Map, Value};

/// A container configuration document
pub type Configuration = Map<String, Value>;

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Array(_) => "list",
        Value::Object(_) => "map",
        _ => "scalar",
    }
}

fn join_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

fn merge_into(base: &mut Configuration, other: &Configuration, prefix: &str) -> Result<()> {
    for (key, value) in other {
        let Some(existing) = base.get_mut(key) else {
            base.insert(key.clone(), value.clone());
            continue;
        };
        let (base_kind, other_kind) = (kind(existing), kind(value));
        match (existing, value) {
            (Value::Array(existing), Value::Array(values)) => {
                existing.extend(values.iter().cloned());
            }
            (Value::Object(existing), Value::Object(values)) => {
                merge_into(existing, values, &join_key(prefix, key))?;
            }
            (existing, value) if base_kind == "scalar" && other_kind == "scalar" => {
                *existing = value.clone();
            }
            _ => {
                return Err(AavmError::TypeMismatch {
                    key: join_key(prefix, key),
                    base: base_kind,
                    other: other_kind,
                });
            }
        }
    }
    Ok(())
}

/// Deep-merge configurations, later documents layered over earlier ones.
///
/// Lists are concatenated, maps are merged recursively and scalars are
/// overridden. A key holding values of different kinds (e.g. a list and a
/// scalar) is an error naming the key.
pub fn merge<'a, I>(documents: I) -> Result<Configuration>
where
    I: IntoIterator<Item = &'a Configuration>,
{
    let mut merged = Configuration::new();
    for document in documents {
        merge_into(&mut merged, document, "")?;
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Configuration {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_list_concatenation() {
        let merged = merge([&doc(json!({"a": [1, 2]})), &doc(json!({"a": [3]}))]).unwrap();
        assert_eq!(Value::Object(merged), json!({"a": [1, 2, 3]}));
    }

    #[test]
    fn test_type_mismatch() {
        let err = merge([&doc(json!({"a": 1})), &doc(json!({"a": [1]}))]).unwrap_err();
        match err {
            AavmError::TypeMismatch { key, .. } => assert_eq!(key, "a"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_nested_type_mismatch_names_path() {
        let base = doc(json!({"HostConfig": {"Binds": ["/a:/a"]}}));
        let other = doc(json!({"HostConfig": {"Binds": {"x": 1}}}));
        let err = merge([&base, &other]).unwrap_err();
        assert!(err.to_string().contains("HostConfig.Binds"));
    }

    #[test]
    fn test_disjoint_keys_order_independent() {
        let a = doc(json!({"Env": ["A=1"], "Tty": true}));
        let b = doc(json!({"Hostname": "demo", "HostConfig": {"Privileged": true}}));
        let ab = merge([&a, &b]).unwrap();
        let ba = merge([&b, &a]).unwrap();
        assert_eq!(ab, ba);
        assert_eq!(ab.len(), 4);
    }

    #[test]
    fn test_nested_merge() {
        let base = doc(json!({
            "Env": ["DISPLAY=:0"],
            "HostConfig": {"Binds": ["/tmp:/tmp"], "Privileged": false},
            "Tty": true
        }));
        let machine = doc(json!({
            "Env": ["USER=me"],
            "HostConfig": {"Binds": ["/home:/home"], "Privileged": true, "NetworkMode": "host"}
        }));
        let merged = merge([&base, &machine]).unwrap();
        assert_eq!(
            Value::Object(merged),
            json!({
                "Env": ["DISPLAY=:0", "USER=me"],
                "HostConfig": {
                    "Binds": ["/tmp:/tmp", "/home:/home"],
                    "Privileged": true,
                    "NetworkMode": "host"
                },
                "Tty": true
            })
        );
    }

    #[test]
    fn test_scalar_override_across_types() {
        let merged = merge([&doc(json!({"a": 1})), &doc(json!({"a": "one"}))]).unwrap();
        assert_eq!(merged["a"], json!("one"));
    }

    #[test]
    fn test_three_documents() {
        let merged = merge([
            &doc(json!({"a": [1]})),
            &doc(json!({"a": [2]})),
            &doc(json!({"a": [3], "b": 1})),
        ])
        .unwrap();
        assert_eq!(Value::Object(merged), json!({"a": [1, 2, 3], "b": 1}));
    }

    #[test]
    fn test_empty_input() {
        assert!(merge(std::iter::empty()).unwrap().is_empty());
    }
}
