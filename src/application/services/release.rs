//! GitHub release of a packaged cookbook
//!
//! Tags are `v<cookbook version>`. Packaging is delegated to `berks package`,
//! which vendors the cookbook together with its locked dependencies.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use regex::Regex;
use tracing::{debug, instrument};

use crate::application::cookbook::read_metadata;
use crate::application::services::Progress;
use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::infrastructure::traits::{CommandRunner, Release, ReleaseHost};
use crate::infrastructure::ApiError;

/// Asset name the package is published under.
pub const ASSET_NAME: &str = "cookbooks.tar.gz";
pub const ASSET_CONTENT_TYPE: &str = "application/x-tar";

/// What a release run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseReport {
    pub repository: String,
    pub tag: String,
    pub package: PathBuf,
}

fn remote_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(git@github\.com:|https://github\.com/)(.+)\.git").expect("static regex")
    })
}

/// Extract `owner/repo` from the push URL in `git remote show origin` output.
pub fn parse_repository(remote_show: &str) -> Option<String> {
    remote_show
        .lines()
        .filter(|line| line.contains("Push"))
        .find_map(|line| remote_pattern().captures(line))
        .map(|caps| caps[2].to_string())
}

/// Service publishing cookbook packages as release assets.
pub struct ReleaseService {
    host: Arc<dyn ReleaseHost>,
    cmd: Arc<dyn CommandRunner>,
}

impl ReleaseService {
    pub fn new(host: Arc<dyn ReleaseHost>, cmd: Arc<dyn CommandRunner>) -> Self {
        Self { host, cmd }
    }

    /// Determine the GitHub repository of the current git checkout.
    pub fn repository(&self) -> ApplicationResult<String> {
        let output = self
            .cmd
            .run("git", &["remote", "show", "origin"])
            .map_err(|e| ApplicationError::OperationFailed {
                context: "git remote show origin".into(),
                source: Box::new(e),
            })?;
        parse_repository(&String::from_utf8_lossy(&output.stdout))
            .ok_or(ApplicationError::UnknownRepository)
    }

    /// Create (or reuse) the release for `tag`.
    pub fn find_or_create_release(&self, repository: &str, tag: &str) -> ApplicationResult<Release> {
        match self.host.create_release(repository, tag) {
            Ok(release) => Ok(release),
            Err(ApiError::Conflict(_)) => {
                debug!("find_or_create_release: {} exists, looking it up", tag);
                self.host
                    .releases(repository)?
                    .into_iter()
                    .find(|r| r.tag_name == tag)
                    .ok_or_else(|| ApplicationError::ReleaseNotFound(tag.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Run `berks package` into `<berksfile dir>/pkg/cookbooks-<ts>.tar.gz`.
    pub fn package(&self, berksfile: &Path) -> ApplicationResult<PathBuf> {
        let berksfile = std::path::absolute(berksfile).with_path_context("resolve", berksfile)?;
        let pkg_dir = berksfile
            .parent()
            .map_or_else(|| PathBuf::from("pkg"), |dir| dir.join("pkg"));
        std::fs::create_dir_all(&pkg_dir).with_path_context("create pkg dir", &pkg_dir)?;

        let out_file = pkg_dir.join(format!("cookbooks-{}.tar.gz", chrono::Utc::now().timestamp()));
        let out_arg = out_file.to_string_lossy();
        let berksfile_arg = berksfile.to_string_lossy();
        let output = self
            .cmd
            .run("berks", &["package", &out_arg, "--berksfile", &berksfile_arg])
            .map_err(|e| ApplicationError::OperationFailed {
                context: "berks package".into(),
                source: Box::new(e),
            })?;
        if !output.status.success() {
            return Err(ApplicationError::OperationFailed {
                context: "berks package".into(),
                source: String::from_utf8_lossy(&output.stderr).trim().to_string().into(),
            });
        }
        Ok(out_file)
    }

    /// Publish the cookbook in `cookbook_dir` as a release asset.
    #[instrument(skip(self, progress))]
    pub fn release(
        &self,
        cookbook_dir: &Path,
        berksfile: &Path,
        progress: &mut dyn FnMut(Progress),
    ) -> ApplicationResult<ReleaseReport> {
        let metadata = read_metadata(cookbook_dir)?;
        let tag = format!("v{}", metadata.version);
        let repository = self.repository()?;

        let release = self.find_or_create_release(&repository, &tag)?;
        let package = self.package(berksfile)?;

        let file_name = package
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        progress(Progress::UploadingAsset { file: &file_name });
        self.host
            .upload_asset(&release, &package, ASSET_NAME, ASSET_CONTENT_TYPE)?;

        Ok(ReleaseReport {
            repository,
            tag,
            package,
        })
    }
}
