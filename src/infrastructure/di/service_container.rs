//! Service container for dependency injection
//!
//! Wires up all services with their dependencies. Remote clients are built
//! on demand, so commands that never talk to the Chef Server (or GitHub)
//! do not need its configuration.

use std::sync::Arc;

use crate::application::results::ResultLog;
use crate::application::services::{DeployService, FanOutService, InstallService, ReleaseService};
use crate::config::Settings;
use crate::infrastructure::chef::ChefClient;
use crate::infrastructure::github::GithubClient;
use crate::infrastructure::http::HttpDownloader;
use crate::infrastructure::ssh::{SshCredentials, SshRunner};
use crate::infrastructure::traits::{ChefServer, CommandRunner, RealCommandRunner};
use crate::infrastructure::InfraResult;

/// Container holding settings and the shared command runner.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Command runner abstraction
    pub cmd: Arc<dyn CommandRunner>,
}

impl ServiceContainer {
    /// Create a new service container with real implementations.
    pub fn new(settings: Settings) -> Self {
        Self::with_deps(settings, Arc::new(RealCommandRunner))
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(settings: Settings, cmd: Arc<dyn CommandRunner>) -> Self {
        let settings = Arc::new(settings);

        Self { settings, cmd }
    }

    /// Signed Chef Server client from the configured identity.
    pub fn chef(&self) -> InfraResult<Arc<dyn ChefServer>> {
        Ok(Arc::new(ChefClient::from_settings(&self.settings)?))
    }

    pub fn deploy_service(&self, credentials: SshCredentials) -> InfraResult<DeployService> {
        let runner = SshRunner::new(self.cmd.clone(), credentials, self.settings.ssh.clone());
        let fanout = FanOutService::new(Arc::new(runner), self.settings.fanout.max_concurrency)?;
        Ok(DeployService::new(
            self.chef()?,
            fanout,
            ResultLog::new(&self.settings.output_dir),
        ))
    }

    pub fn install_service(&self) -> InfraResult<InstallService> {
        let downloader = HttpDownloader::new(self.settings.ssl.verify)?;
        Ok(InstallService::new(self.chef()?, Arc::new(downloader)))
    }

    pub fn release_service(&self, token: &str) -> InfraResult<ReleaseService> {
        let github = GithubClient::new(&self.settings.github.api_url, token, self.settings.ssl.verify)?;
        Ok(ReleaseService::new(Arc::new(github), self.cmd.clone()))
    }
}
