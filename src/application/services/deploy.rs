//! Environment-wide operations: execute, run_chef, upgrade
//!
//! Every operation looks the environment up first and stops with
//! `EnvironmentNotFound` before touching any node. Per-node failures are
//! counted in the returned summary, never raised.

use std::sync::Arc;

use tempfile::NamedTempFile;
use tracing::{debug, instrument};

use crate::application::results::ResultLog;
use crate::application::services::{FanOutService, Progress};
use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::domain::{
    locked_version, Environment, FanOutSummary, Lockfile, Node, RemoteCookbook, VersionSpec,
    LOCKFILE_NAME,
};
use crate::infrastructure::traits::ChefServer;

/// Command used to converge a node.
pub const CHEF_CLIENT: &str = "chef-client";

/// Outcome of a fan-out operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FanOutResult {
    /// The environment has no nodes; nothing was run
    NoNodes,
    Completed(FanOutSummary),
}

impl FanOutResult {
    pub fn exit_code(&self) -> i32 {
        match self {
            FanOutResult::NoNodes => crate::exitcode::OK,
            FanOutResult::Completed(summary) => summary.exit_code(),
        }
    }
}

/// Outcome of an upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeResult {
    /// Environment already locked to this version; nothing changed
    AlreadyAt(String),
    Upgraded {
        version: String,
        chef_run: FanOutResult,
    },
}

impl UpgradeResult {
    pub fn exit_code(&self) -> i32 {
        match self {
            UpgradeResult::AlreadyAt(_) => crate::exitcode::OK,
            UpgradeResult::Upgraded { chef_run, .. } => chef_run.exit_code(),
        }
    }
}

/// Service for environment-wide node operations.
pub struct DeployService {
    chef: Arc<dyn ChefServer>,
    fanout: FanOutService,
    log: ResultLog,
}

impl DeployService {
    pub fn new(chef: Arc<dyn ChefServer>, fanout: FanOutService, log: ResultLog) -> Self {
        Self { chef, fanout, log }
    }

    pub fn find_environment(&self, name: &str) -> ApplicationResult<Environment> {
        self.chef
            .find_environment(name)?
            .ok_or_else(|| ApplicationError::EnvironmentNotFound(name.to_string()))
    }

    pub fn find_nodes(&self, environment: &str) -> ApplicationResult<Vec<Node>> {
        let nodes = self
            .chef
            .search_nodes(&format!("chef_environment:{environment}"))?;
        debug!("find_nodes: {} nodes in {}", nodes.len(), environment);
        Ok(nodes)
    }

    /// Run a shell command on every node in the environment.
    #[instrument(skip(self, progress))]
    pub fn execute(
        &self,
        environment: &str,
        command: &str,
        sudo: bool,
        progress: &mut dyn FnMut(Progress),
    ) -> ApplicationResult<FanOutResult> {
        self.fan_out(environment, command, sudo, progress)
    }

    /// Run Chef Client on every node in the environment.
    #[instrument(skip(self, progress))]
    pub fn run_chef(
        &self,
        environment: &str,
        progress: &mut dyn FnMut(Progress),
    ) -> ApplicationResult<FanOutResult> {
        self.fan_out(environment, CHEF_CLIENT, true, progress)
    }

    fn fan_out(
        &self,
        environment: &str,
        command: &str,
        sudo: bool,
        progress: &mut dyn FnMut(Progress),
    ) -> ApplicationResult<FanOutResult> {
        self.find_environment(environment)?;

        progress(Progress::DiscoveringNodes { environment });
        let nodes = self.find_nodes(environment)?;
        if nodes.is_empty() {
            return Ok(FanOutResult::NoNodes);
        }

        progress(Progress::Dispatching {
            command,
            count: nodes.len(),
        });
        let outcomes = self.fanout.run(&nodes, command, sudo);
        let summary = self.log.write(&outcomes)?;
        Ok(FanOutResult::Completed(summary))
    }

    /// Lock the environment to a cookbook version, then converge its nodes.
    ///
    /// Fails before any node is touched if the environment, the cookbook or
    /// its lockfile cannot be found, or the locks cannot be saved.
    #[instrument(skip(self, progress))]
    pub fn upgrade(
        &self,
        environment: &str,
        application: &str,
        version: &VersionSpec,
        force: bool,
        progress: &mut dyn FnMut(Progress),
    ) -> ApplicationResult<UpgradeResult> {
        let mut env = self.find_environment(environment)?;
        let cookbook = self.find_cookbook(application, version)?;

        if !force && self.is_locked_at(&env, application, &cookbook.version) {
            return Ok(UpgradeResult::AlreadyAt(cookbook.version));
        }

        let lockfile = self.fetch_lockfile(&cookbook)?;

        progress(Progress::Upgrading {
            environment,
            version: &cookbook.version,
        });
        progress(Progress::ApplyingLocks { environment });
        lockfile.apply_to(&mut env);
        self.chef
            .save_environment(&env)
            .map_err(|source| ApplicationError::LockApplyFailed {
                environment: environment.to_string(),
                source,
            })?;

        let chef_run = self.run_chef(environment, progress)?;
        Ok(UpgradeResult::Upgraded {
            version: cookbook.version,
            chef_run,
        })
    }

    /// Resolve `latest` and fetch the cookbook version from the server.
    pub fn find_cookbook(
        &self,
        name: &str,
        version: &VersionSpec,
    ) -> ApplicationResult<RemoteCookbook> {
        let version = match version {
            VersionSpec::Exact(v) => v.to_string(),
            VersionSpec::Latest => {
                let versions = self.chef.cookbook_versions(name)?;
                crate::domain::version::greatest(versions.iter().map(String::as_str))
                    .ok_or_else(|| ApplicationError::NoCookbookVersions(name.to_string()))?
                    .to_string()
            }
        };

        self.chef
            .find_cookbook(name, &version)?
            .ok_or_else(|| ApplicationError::CookbookNotFound {
                name: name.to_string(),
                version,
            })
    }

    fn is_locked_at(&self, env: &Environment, application: &str, version: &str) -> bool {
        env.cookbook_versions
            .get(application)
            .and_then(|constraint| locked_version(constraint))
            .is_some_and(|locked| locked.to_string() == version)
    }

    fn fetch_lockfile(&self, cookbook: &RemoteCookbook) -> ApplicationResult<Lockfile> {
        let missing = || ApplicationError::MissingLockfile {
            name: cookbook.name.clone(),
            version: cookbook.version.clone(),
        };
        let url = cookbook.root_file_url(LOCKFILE_NAME).ok_or_else(missing)?;

        let file = NamedTempFile::new().map_err(|e| ApplicationError::OperationFailed {
            context: "create temp file for lockfile".into(),
            source: Box::new(e),
        })?;
        self.chef.download_file(url, file.path())?;
        let content =
            std::fs::read_to_string(file.path()).with_path_context("read lockfile", file.path())?;
        if content.trim().is_empty() {
            return Err(missing());
        }
        Ok(Lockfile::parse(&content)?)
    }
}
