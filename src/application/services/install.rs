//! Cookbook package installation
//!
//! A package is the gzipped tarball produced by `berks package`: a
//! `cookbooks/` directory holding one vendored cookbook per subdirectory.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flate2::read::GzDecoder;
use tar::Archive;
use tempfile::{NamedTempFile, TempDir};
use tracing::{debug, instrument};
use url::Url;

use crate::application::cookbook::{is_cookbook, load_cookbook};
use crate::application::services::Progress;
use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::infrastructure::traits::{ChefServer, Downloader};
use crate::infrastructure::ApiError;

const COOKBOOKS_DIR: &str = "cookbooks";

/// Returns true for `http`/`https` URLs.
pub fn is_url(source: &str) -> bool {
    Url::parse(source).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
}

/// Service for uploading Berkshelf packages to the Chef Server.
pub struct InstallService {
    chef: Arc<dyn ChefServer>,
    downloader: Arc<dyn Downloader>,
}

impl InstallService {
    pub fn new(chef: Arc<dyn ChefServer>, downloader: Arc<dyn Downloader>) -> Self {
        Self { chef, downloader }
    }

    /// Upload every cookbook in the package, frozen.
    ///
    /// Cookbooks already frozen on the server count as uploaded.
    /// Returns the number of cookbooks uploaded.
    #[instrument(skip(self, progress))]
    pub fn install(
        &self,
        source: &str,
        force: bool,
        progress: &mut dyn FnMut(Progress),
    ) -> ApplicationResult<usize> {
        // The temp file must outlive extraction
        let (package, _download) = if is_url(source) {
            let file = NamedTempFile::new().map_err(|e| ApplicationError::OperationFailed {
                context: "create temp file for package".into(),
                source: Box::new(e),
            })?;
            self.downloader
                .download(source, file.path())
                .map_err(ApplicationError::PackageDownload)?;
            (file.path().to_path_buf(), Some(file))
        } else {
            (PathBuf::from(source), None)
        };

        if !package.exists() {
            return Err(ApplicationError::PackageNotFound(package));
        }

        let workdir = TempDir::new().map_err(|e| ApplicationError::OperationFailed {
            context: "create temp dir for package".into(),
            source: Box::new(e),
        })?;
        extract(&package, workdir.path())?;

        let cookbooks_dir = workdir.path().join(COOKBOOKS_DIR);
        if !cookbooks_dir.is_dir() {
            return Err(ApplicationError::MissingCookbooksDir);
        }

        let mut candidates: Vec<PathBuf> = std::fs::read_dir(&cookbooks_dir)
            .with_path_context("list cookbooks", &cookbooks_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_cookbook(path))
            .collect();
        candidates.sort();

        let mut uploaded = 0;
        for path in candidates {
            let cookbook = load_cookbook(&path)?;
            progress(Progress::UploadingCookbook {
                name: cookbook.name(),
                version: cookbook.version(),
            });
            match self.chef.upload_cookbook(&cookbook, force) {
                Ok(()) => {}
                Err(ApiError::Conflict(msg)) => {
                    debug!("install: {} already frozen: {}", cookbook.name(), msg);
                }
                Err(e) => return Err(e.into()),
            }
            uploaded += 1;
        }

        Ok(uploaded)
    }
}

/// Unpack a gzipped tarball into `dest`.
fn extract(package: &Path, dest: &Path) -> ApplicationResult<()> {
    let file = File::open(package).with_path_context("open package", package)?;
    let mut archive = Archive::new(GzDecoder::new(file));
    archive
        .unpack(dest)
        .map_err(|e| ApplicationError::PackageExtract(e.to_string()))
}
