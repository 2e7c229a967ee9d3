//! Cookbook version validation and constraint parsing

use std::fmt;

use semver::Version;

use crate::domain::DomainError;

/// Sentinel accepted in place of a version: the greatest version on the server.
pub const LATEST: &str = "latest";

/// A validated version argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSpec {
    Latest,
    Exact(Version),
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSpec::Latest => f.write_str(LATEST),
            VersionSpec::Exact(v) => write!(f, "{v}"),
        }
    }
}

/// Check that `input` is `latest` or a strict SemVer version.
///
/// Runs before any remote lookup, so malformed input never reaches the server.
pub fn validate_version(input: &str) -> Result<VersionSpec, DomainError> {
    if input == LATEST {
        return Ok(VersionSpec::Latest);
    }
    Version::parse(input)
        .map(VersionSpec::Exact)
        .map_err(|_| DomainError::InvalidVersion(input.to_string()))
}

/// Extract the version pinned by an environment constraint.
///
/// Accepts `= 1.2.3`, `~> 1.2`, `1.2.3`. Missing minor/patch components
/// are zero-filled the way Chef constraints are read.
pub fn locked_version(constraint: &str) -> Option<Version> {
    let raw = constraint.split_whitespace().last()?;
    let mut parts: Vec<&str> = raw.split('.').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }
    while parts.len() < 3 {
        parts.push("0");
    }
    Version::parse(&parts.join(".")).ok()
}

/// Pick the greatest parseable version; unparseable entries are ignored.
pub fn greatest<'a>(versions: impl IntoIterator<Item = &'a str>) -> Option<Version> {
    versions
        .into_iter()
        .filter_map(|v| Version::parse(v).ok())
        .max()
}
