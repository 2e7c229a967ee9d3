//! Loading cookbooks from disk

use std::path::Path;

use md5::{Digest, Md5};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::domain::{Cookbook, CookbookFile, CookbookMetadata, Segment, METADATA_JSON, METADATA_RB};

/// A directory is a cookbook if it carries metadata.
pub fn is_cookbook(path: &Path) -> bool {
    path.is_dir() && (path.join(METADATA_JSON).is_file() || path.join(METADATA_RB).is_file())
}

/// Read cookbook metadata, preferring `metadata.json` over `metadata.rb`.
pub fn read_metadata(dir: &Path) -> ApplicationResult<CookbookMetadata> {
    let json = dir.join(METADATA_JSON);
    if json.is_file() {
        let content = std::fs::read_to_string(&json).with_path_context("read metadata", &json)?;
        return Ok(CookbookMetadata::from_json(&content)?);
    }

    let rb = dir.join(METADATA_RB);
    let content = std::fs::read_to_string(&rb).with_path_context("read metadata", &rb)?;
    Ok(CookbookMetadata::from_ruby(&content)?)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.') || name.ends_with('~'))
}

/// Load a cookbook: metadata plus every file that belongs to a Chef segment.
pub fn load_cookbook(dir: &Path) -> ApplicationResult<Cookbook> {
    let metadata = read_metadata(dir)?;
    let mut files = Vec::new();

    for entry in WalkDir::new(dir)
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        let entry = entry.map_err(|e| ApplicationError::OperationFailed {
            context: format!("walk cookbook: {}", dir.display()),
            source: Box::new(e),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| ApplicationError::OperationFailed {
                context: format!("relative path: {}", entry.path().display()),
                source: Box::new(e),
            })?
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let Some((segment, specificity)) = Segment::classify(&relative) else {
            debug!("load_cookbook: skipping {}", relative);
            continue;
        };

        let content = std::fs::read(entry.path()).with_path_context("read", entry.path())?;
        files.push(CookbookFile {
            path: relative,
            full_path: entry.path().to_path_buf(),
            checksum: hex::encode(Md5::digest(&content)),
            segment,
            specificity,
        });
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    debug!(
        "load_cookbook: {} ({}) with {} files",
        metadata.name,
        metadata.version,
        files.len()
    );
    Ok(Cookbook {
        metadata,
        path: dir.to_path_buf(),
        files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn given_cookbook_dir_when_load_then_collects_segment_files() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();
        write(dir, "metadata.json", r#"{"name": "myapp", "version": "1.0.0"}"#);
        write(dir, "recipes/default.rb", "package 'nginx'");
        write(dir, "templates/default/nginx.conf.erb", "server {}");
        write(dir, "spec/default_spec.rb", "ignored");
        write(dir, ".git/HEAD", "ignored");

        let cookbook = load_cookbook(dir).unwrap();

        let paths: Vec<&str> = cookbook.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["metadata.json", "recipes/default.rb", "templates/default/nginx.conf.erb"]
        );
        let recipe = &cookbook.files[1];
        assert_eq!(recipe.checksum.len(), 32);
        assert_eq!(recipe.segment, Segment::Recipes);
    }

    #[test]
    fn given_only_metadata_rb_when_is_cookbook_then_true() {
        let temp = TempDir::new().unwrap();
        assert!(!is_cookbook(temp.path()));
        write(temp.path(), "metadata.rb", "name 'x'\nversion '0.1.0'");
        assert!(is_cookbook(temp.path()));
        assert_eq!(read_metadata(temp.path()).unwrap().name, "x");
    }
}
