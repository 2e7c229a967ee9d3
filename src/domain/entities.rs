//! Domain entities: core data structures

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A managed machine discovered through a node search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Chef node name
    pub name: String,
    /// Hostname used to reach the node over SSH
    pub public_hostname: String,
}

impl Node {
    /// Build a node from its name and `automatic` attributes.
    ///
    /// Prefers the cloud public hostname, then fqdn, then hostname,
    /// falling back to the node name.
    pub fn from_attributes(name: impl Into<String>, automatic: &Value) -> Self {
        let name = name.into();
        let lookup = |path: &[&str]| -> Option<String> {
            let mut current = automatic;
            for key in path {
                current = current.get(key)?;
            }
            current
                .as_str()
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let public_hostname = lookup(&["cloud", "public_hostname"])
            .or_else(|| lookup(&["fqdn"]))
            .or_else(|| lookup(&["hostname"]))
            .unwrap_or_else(|| name.clone());

        Self {
            name,
            public_hostname,
        }
    }
}

/// Named grouping of nodes with pinned cookbook constraints.
///
/// Fields not modelled here are kept in `extra` so that saving the
/// environment back leaves them untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Cookbook name -> version constraint (e.g. `= 1.2.3`)
    #[serde(default)]
    pub cookbook_versions: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Environment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            cookbook_versions: BTreeMap::new(),
            extra: serde_json::Map::new(),
        }
    }
}

/// Result of running one command on one node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodeOutcome {
    pub host: String,
    pub stdout: String,
    pub stderr: String,
    /// Remote exit status, `None` if the process never finished
    pub exit_code: Option<i32>,
    /// Transport-level failure (connection refused, timeout, ...)
    pub error: Option<String>,
}

impl NodeOutcome {
    /// Outcome for a node the command could not be run on.
    pub fn failed(host: impl Into<String>, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            host: host.into(),
            stderr: error.clone(),
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some() || self.exit_code != Some(0)
    }
}

/// Aggregate result of a fan-out over all nodes of an environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanOutSummary {
    pub succeeded: usize,
    pub failed: usize,
    /// Directory holding the per-node stdout/stderr logs
    pub log_dir: PathBuf,
}

impl FanOutSummary {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            crate::exitcode::OK
        } else {
            crate::exitcode::FAILURE
        }
    }
}

/// A cookbook version as known to the Chef Server.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCookbook {
    pub name: String,
    pub version: String,
    /// Files at the cookbook root: file name -> download URL
    pub root_files: BTreeMap<String, String>,
}

impl RemoteCookbook {
    pub fn root_file_url(&self, name: &str) -> Option<&str> {
        self.root_files.get(name).map(String::as_str)
    }
}
