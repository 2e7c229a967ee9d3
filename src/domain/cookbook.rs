//! Cookbook contents and the Chef Server upload manifest

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use serde_json::{json, Map, Value};

use crate::domain::CookbookMetadata;

/// Chef cookbook segments, in manifest order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Segment {
    Attributes,
    Definitions,
    Files,
    Libraries,
    Providers,
    Recipes,
    Resources,
    Templates,
    RootFiles,
}

impl Segment {
    pub const ALL: [Segment; 9] = [
        Segment::Attributes,
        Segment::Definitions,
        Segment::Files,
        Segment::Libraries,
        Segment::Providers,
        Segment::Recipes,
        Segment::Resources,
        Segment::Templates,
        Segment::RootFiles,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Segment::Attributes => "attributes",
            Segment::Definitions => "definitions",
            Segment::Files => "files",
            Segment::Libraries => "libraries",
            Segment::Providers => "providers",
            Segment::Recipes => "recipes",
            Segment::Resources => "resources",
            Segment::Templates => "templates",
            Segment::RootFiles => "root_files",
        }
    }

    fn from_dir(dir: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|s| *s != Segment::RootFiles && s.as_str() == dir)
    }

    /// Classify a cookbook-relative path (`/` separated).
    ///
    /// Returns the segment and specificity, or `None` for files outside any segment.
    pub fn classify(relative: &str) -> Option<(Segment, String)> {
        let parts: Vec<&str> = relative.split('/').collect();
        match parts.as_slice() {
            [_] => Some((Segment::RootFiles, "default".to_string())),
            [dir, rest @ ..] => {
                let segment = Self::from_dir(dir)?;
                let specificity = match segment {
                    Segment::Files | Segment::Templates if rest.len() >= 2 => rest[0].to_string(),
                    Segment::Files | Segment::Templates => "root_default".to_string(),
                    _ => "default".to_string(),
                };
                Some((segment, specificity))
            }
            [] => None,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One file of a cookbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookbookFile {
    /// Path relative to the cookbook root, `/` separated
    pub path: String,
    /// Absolute path on disk
    pub full_path: PathBuf,
    /// MD5 hex digest, the Chef Server's file identity
    pub checksum: String,
    pub segment: Segment,
    pub specificity: String,
}

impl CookbookFile {
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// A cookbook loaded from disk, ready for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct Cookbook {
    pub metadata: CookbookMetadata,
    pub path: PathBuf,
    pub files: Vec<CookbookFile>,
}

impl Cookbook {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn version(&self) -> &str {
        &self.metadata.version
    }

    /// Distinct checksums of all files.
    pub fn checksums(&self) -> BTreeSet<&str> {
        self.files.iter().map(|f| f.checksum.as_str()).collect()
    }

    /// Cookbook version document for `PUT /cookbooks/:name/:version`.
    pub fn manifest(&self) -> Value {
        let mut doc = json!({
            "name": format!("{}-{}", self.name(), self.version()),
            "cookbook_name": self.name(),
            "version": self.version(),
            "json_class": "Chef::CookbookVersion",
            "chef_type": "cookbook_version",
            "frozen?": true,
            "metadata": self.metadata.raw,
        });

        let mut segments: Map<String, Value> = Segment::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), Value::Array(Vec::new())))
            .collect();
        for file in &self.files {
            if let Some(Value::Array(entries)) = segments.get_mut(file.segment.as_str()) {
                entries.push(json!({
                    "name": file.name(),
                    "path": file.path,
                    "checksum": file.checksum,
                    "specificity": file.specificity,
                }));
            }
        }
        if let Some(obj) = doc.as_object_mut() {
            obj.extend(segments);
        }
        doc
    }
}
