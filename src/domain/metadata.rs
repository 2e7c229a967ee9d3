//! Cookbook metadata parsing
//!
//! `metadata.json` is authoritative when present (Berkshelf packages always
//! carry it). `metadata.rb` is read with a line-based scan of the simple
//! `key 'value'` statements; anything computed in Ruby is not evaluated.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{json, Map, Value};

use crate::domain::DomainError;

pub const METADATA_JSON: &str = "metadata.json";
pub const METADATA_RB: &str = "metadata.rb";

const STRING_FIELDS: [&str; 5] = [
    "name",
    "version",
    "maintainer",
    "maintainer_email",
    "license",
];

#[derive(Debug, Clone, PartialEq)]
pub struct CookbookMetadata {
    pub name: String,
    pub version: String,
    /// Full metadata document as sent to the Chef Server
    pub raw: Value,
}

fn statement() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^\s*(\w+)\s*\(?\s*['"]([^'"]*)['"](?:\s*,\s*['"]([^'"]*)['"])?"#)
            .expect("static regex")
    })
}

impl CookbookMetadata {
    pub fn from_json(content: &str) -> Result<Self, DomainError> {
        let raw: Value = serde_json::from_str(content).map_err(|e| DomainError::InvalidMetadata {
            message: format!("{METADATA_JSON}: {e}"),
        })?;
        let field = |key: &str| -> Result<String, DomainError> {
            raw.get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| DomainError::InvalidMetadata {
                    message: format!("{METADATA_JSON}: missing '{key}'"),
                })
        };
        Ok(Self {
            name: field("name")?,
            version: field("version")?,
            raw,
        })
    }

    pub fn from_ruby(content: &str) -> Result<Self, DomainError> {
        let mut doc = Map::new();
        let mut dependencies = Map::new();

        for line in content.lines() {
            let Some(caps) = statement().captures(line) else {
                continue;
            };
            let key = &caps[1];
            let value = caps[2].to_string();
            if key == "depends" {
                let constraint = caps.get(3).map_or(">= 0.0.0", |m| m.as_str());
                dependencies.insert(value, Value::String(constraint.to_string()));
            } else if STRING_FIELDS.contains(&key) {
                doc.insert(key.to_string(), Value::String(value));
            }
        }

        let missing = |key: &str| DomainError::InvalidMetadata {
            message: format!("{METADATA_RB}: missing '{key}'"),
        };
        let name = doc
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| missing("name"))?
            .to_string();
        // Chef defaults an undeclared version to 0.0.0
        let version = doc
            .get("version")
            .and_then(Value::as_str)
            .unwrap_or("0.0.0")
            .to_string();

        let mut raw = json!({
            "name": name,
            "version": version,
            "description": "",
            "long_description": "",
            "maintainer": "",
            "maintainer_email": "",
            "license": "",
            "platforms": {},
            "recipes": {},
            "attributes": {},
        });
        if let Some(obj) = raw.as_object_mut() {
            obj.extend(doc);
            obj.insert("version".into(), Value::String(version.clone()));
            obj.insert("dependencies".into(), Value::Object(dependencies));
        }

        Ok(Self { name, version, raw })
    }
}
