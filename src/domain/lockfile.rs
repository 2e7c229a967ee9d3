//! `Berksfile.lock` parsing and application to environments
//!
//! Two formats are understood:
//! - Berkshelf 3 text format: locks are read from the `GRAPH` section,
//!   one `name (version)` entry per top-level line.
//! - Legacy JSON format: `dependencies.<name>.locked_version`.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use semver::Version;
use serde::Deserialize;

use crate::domain::{DomainError, Environment};

/// File name of the lockfile inside a cookbook.
pub const LOCKFILE_NAME: &str = "Berksfile.lock";

const GRAPH_SECTION: &str = "GRAPH";

/// Exact cookbook versions pinned by a lockfile.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Lockfile {
    pub locks: BTreeMap<String, Version>,
}

#[derive(Deserialize)]
struct LegacyLockfile {
    #[serde(default)]
    dependencies: BTreeMap<String, LegacyDependency>,
}

#[derive(Deserialize)]
struct LegacyDependency {
    locked_version: Option<String>,
}

fn graph_entry() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^  ([^\s(]+) \(([^)]+)\)\s*$").expect("static regex"))
}

impl Lockfile {
    pub fn parse(content: &str) -> Result<Self, DomainError> {
        if content.trim_start().starts_with('{') {
            Self::parse_legacy(content)
        } else {
            Self::parse_graph(content)
        }
    }

    fn parse_graph(content: &str) -> Result<Self, DomainError> {
        let mut locks = BTreeMap::new();
        let mut in_graph = false;
        let mut seen_graph = false;

        for line in content.lines() {
            // Section headers start in column 0
            if !line.is_empty() && !line.starts_with(' ') {
                in_graph = line.trim() == GRAPH_SECTION;
                seen_graph |= in_graph;
                continue;
            }
            if !in_graph {
                continue;
            }
            if let Some(caps) = graph_entry().captures(line) {
                let version = Version::parse(&caps[2]).map_err(|e| {
                    DomainError::InvalidLockfile(format!("{}: {e}", line.trim()))
                })?;
                locks.insert(caps[1].to_string(), version);
            }
        }

        if !seen_graph {
            return Err(DomainError::InvalidLockfile(format!(
                "no {GRAPH_SECTION} section"
            )));
        }
        Ok(Self { locks })
    }

    fn parse_legacy(content: &str) -> Result<Self, DomainError> {
        let legacy: LegacyLockfile = serde_json::from_str(content)
            .map_err(|e| DomainError::InvalidLockfile(e.to_string()))?;

        let mut locks = BTreeMap::new();
        for (name, dep) in legacy.dependencies {
            if let Some(raw) = dep.locked_version {
                let version = Version::parse(&raw)
                    .map_err(|e| DomainError::InvalidLockfile(format!("{name} ({raw}): {e}")))?;
                locks.insert(name, version);
            }
        }
        Ok(Self { locks })
    }

    /// Replace the environment's cookbook constraints with exact locks.
    pub fn apply_to(&self, environment: &mut Environment) {
        environment.cookbook_versions = self
            .locks
            .iter()
            .map(|(name, version)| (name.clone(), format!("= {version}")))
            .collect();
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BERKS3: &str = "\
DEPENDENCIES
  myapp
    path: .
    metadata: true

GRAPH
  apt (2.3.10)
  build-essential (1.4.4)
  myapp (1.2.3)
    apt (>= 0.0.0)
    build-essential (~> 1.4)
";

    #[test]
    fn given_berks3_lockfile_when_parse_then_reads_graph_only() {
        let lock = Lockfile::parse(BERKS3).unwrap();
        assert_eq!(lock.locks.len(), 3);
        assert_eq!(lock.locks["apt"], Version::new(2, 3, 10));
        assert_eq!(lock.locks["myapp"], Version::new(1, 2, 3));
    }

    #[test]
    fn given_legacy_json_lockfile_when_parse_then_reads_locked_versions() {
        let content = r#"{
          "dependencies": {
            "myapp": {"path": ".", "locked_version": "0.4.0"},
            "nginx": {"locked_version": "2.7.4"},
            "unlocked": {}
          }
        }"#;
        let lock = Lockfile::parse(content).unwrap();
        assert_eq!(lock.locks.len(), 2);
        assert_eq!(lock.locks["nginx"], Version::new(2, 7, 4));
    }

    #[test]
    fn given_text_without_graph_when_parse_then_errors() {
        let err = Lockfile::parse("DEPENDENCIES\n  myapp\n").unwrap_err();
        assert!(matches!(err, DomainError::InvalidLockfile(_)));
    }

    #[test]
    fn given_lockfile_when_apply_then_replaces_constraints() {
        let lock = Lockfile::parse(BERKS3).unwrap();
        let mut env = Environment::new("production");
        env.cookbook_versions
            .insert("stale".into(), "= 0.1.0".into());
        env.extra
            .insert("json_class".into(), "Chef::Environment".into());

        lock.apply_to(&mut env);

        assert_eq!(env.cookbook_versions.len(), 3);
        assert_eq!(env.cookbook_versions["myapp"], "= 1.2.3");
        assert!(!env.cookbook_versions.contains_key("stale"));
        assert_eq!(env.extra["json_class"], "Chef::Environment");
    }
}
