//! In-memory implementations of the I/O boundary traits

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{ExitStatus, Output};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use berkflow::domain::{Cookbook, Environment, Node, NodeOutcome, RemoteCookbook, LOCKFILE_NAME};
use berkflow::infrastructure::traits::{
    ChefServer, CommandRunner, Downloader, NodeRunner, Release, ReleaseHost,
};
use berkflow::infrastructure::ApiError;

pub fn node(name: &str) -> Node {
    Node {
        name: name.to_string(),
        public_hostname: format!("{name}.example.com"),
    }
}

pub fn nodes(count: usize) -> Vec<Node> {
    (1..=count).map(|i| node(&format!("web{i}"))).collect()
}

// ============================================================
// Chef Server
// ============================================================

#[derive(Default)]
pub struct MockChefServer {
    pub environments: Mutex<BTreeMap<String, Environment>>,
    pub nodes: Vec<Node>,
    pub cookbooks: BTreeMap<(String, String), RemoteCookbook>,
    /// Download URL -> content
    pub files: BTreeMap<String, String>,
    /// Cookbook names already frozen on the server
    pub frozen: BTreeSet<String>,
    pub fail_save: bool,

    pub search_calls: AtomicUsize,
    pub saved: Mutex<Vec<Environment>>,
    pub uploaded: Mutex<Vec<(String, String, bool)>>,
}

impl MockChefServer {
    pub fn with_environment(self, env: Environment) -> Self {
        self.environments
            .lock()
            .unwrap()
            .insert(env.name.clone(), env);
        self
    }

    pub fn with_nodes(mut self, nodes: Vec<Node>) -> Self {
        self.nodes = nodes;
        self
    }

    /// Register a cookbook version; `lockfile` becomes its `Berksfile.lock` root file.
    pub fn with_cookbook(mut self, name: &str, version: &str, lockfile: Option<&str>) -> Self {
        let mut root_files = BTreeMap::new();
        if let Some(content) = lockfile {
            let url = format!("https://chef.example.com/files/{name}-{version}-lock");
            root_files.insert(LOCKFILE_NAME.to_string(), url.clone());
            self.files.insert(url, content.to_string());
        }
        self.cookbooks.insert(
            (name.to_string(), version.to_string()),
            RemoteCookbook {
                name: name.to_string(),
                version: version.to_string(),
                root_files,
            },
        );
        self
    }

    pub fn searches(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }
}

impl ChefServer for MockChefServer {
    fn find_environment(&self, name: &str) -> Result<Option<Environment>, ApiError> {
        Ok(self.environments.lock().unwrap().get(name).cloned())
    }

    fn save_environment(&self, environment: &Environment) -> Result<(), ApiError> {
        if self.fail_save {
            return Err(ApiError::Status {
                method: "PUT".into(),
                url: format!("/environments/{}", environment.name),
                status: 500,
                body: "boom".into(),
            });
        }
        self.saved.lock().unwrap().push(environment.clone());
        self.environments
            .lock()
            .unwrap()
            .insert(environment.name.clone(), environment.clone());
        Ok(())
    }

    fn search_nodes(&self, _query: &str) -> Result<Vec<Node>, ApiError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.nodes.clone())
    }

    fn cookbook_versions(&self, name: &str) -> Result<Vec<String>, ApiError> {
        Ok(self
            .cookbooks
            .keys()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .collect())
    }

    fn find_cookbook(&self, name: &str, version: &str) -> Result<Option<RemoteCookbook>, ApiError> {
        Ok(self
            .cookbooks
            .get(&(name.to_string(), version.to_string()))
            .cloned())
    }

    fn download_file(&self, url: &str, dest: &Path) -> Result<(), ApiError> {
        let content = self
            .files
            .get(url)
            .ok_or_else(|| ApiError::NotFound(url.to_string()))?;
        std::fs::write(dest, content).map_err(|e| ApiError::io("write", e))
    }

    fn upload_cookbook(&self, cookbook: &Cookbook, force: bool) -> Result<(), ApiError> {
        self.uploaded.lock().unwrap().push((
            cookbook.name().to_string(),
            cookbook.version().to_string(),
            force,
        ));
        if self.frozen.contains(cookbook.name()) && !force {
            return Err(ApiError::Conflict(format!("{} is frozen", cookbook.name())));
        }
        Ok(())
    }
}

// ============================================================
// Nodes
// ============================================================

#[derive(Default)]
pub struct MockNodeRunner {
    /// Hosts whose command exits non-zero
    pub failing: BTreeSet<String>,
    /// Hosts that cannot be reached at all
    pub unreachable: BTreeSet<String>,
    pub calls: Mutex<Vec<(String, String, bool)>>,
}

impl MockNodeRunner {
    pub fn failing(hosts: &[&str]) -> Self {
        Self {
            failing: hosts.iter().map(|h| h.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl NodeRunner for MockNodeRunner {
    fn run(&self, host: &str, command: &str, sudo: bool) -> NodeOutcome {
        self.calls
            .lock()
            .unwrap()
            .push((host.to_string(), command.to_string(), sudo));
        if self.unreachable.contains(host) {
            return NodeOutcome::failed(host, "connection refused");
        }
        let failed = self.failing.contains(host);
        NodeOutcome {
            host: host.to_string(),
            stdout: format!("ran {command}\n"),
            stderr: if failed { "exit 1\n".into() } else { String::new() },
            exit_code: Some(if failed { 1 } else { 0 }),
            error: None,
        }
    }
}

// ============================================================
// Releases
// ============================================================

#[derive(Default)]
pub struct MockReleaseHost {
    pub existing: Vec<Release>,
    pub created: Mutex<Vec<(String, String)>>,
    pub uploads: Mutex<Vec<(u64, String, String)>>,
}

impl ReleaseHost for MockReleaseHost {
    fn create_release(&self, repository: &str, tag: &str) -> Result<Release, ApiError> {
        if self.existing.iter().any(|r| r.tag_name == tag) {
            return Err(ApiError::Conflict("already_exists".into()));
        }
        self.created
            .lock()
            .unwrap()
            .push((repository.to_string(), tag.to_string()));
        Ok(Release {
            id: 100,
            tag_name: tag.to_string(),
            upload_url: format!(
                "https://uploads.github.com/repos/{repository}/releases/100/assets{{?name,label}}"
            ),
        })
    }

    fn releases(&self, _repository: &str) -> Result<Vec<Release>, ApiError> {
        Ok(self.existing.clone())
    }

    fn upload_asset(
        &self,
        release: &Release,
        _file: &Path,
        name: &str,
        content_type: &str,
    ) -> Result<(), ApiError> {
        self.uploads
            .lock()
            .unwrap()
            .push((release.id, name.to_string(), content_type.to_string()));
        Ok(())
    }
}

// ============================================================
// Processes and downloads
// ============================================================

/// Replies to commands by program name; unknown programs exit 127.
#[derive(Default)]
pub struct MockCommandRunner {
    pub replies: BTreeMap<String, (i32, String)>,
    pub calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl MockCommandRunner {
    pub fn reply(mut self, cmd: &str, code: i32, stdout: &str) -> Self {
        self.replies
            .insert(cmd.to_string(), (code, stdout.to_string()));
        self
    }
}

impl CommandRunner for MockCommandRunner {
    fn run(&self, cmd: &str, args: &[&str]) -> io::Result<Output> {
        self.calls.lock().unwrap().push((
            cmd.to_string(),
            args.iter().map(|a| a.to_string()).collect(),
        ));
        let (code, stdout) = self
            .replies
            .get(cmd)
            .cloned()
            .unwrap_or((127, String::new()));
        Ok(Output {
            status: ExitStatus::from_raw(code << 8),
            stdout: stdout.into_bytes(),
            stderr: if code == 0 {
                Vec::new()
            } else {
                format!("{cmd} failed").into_bytes()
            },
        })
    }

    fn run_with_env(
        &self,
        cmd: &str,
        args: &[&str],
        _env: &[(&str, &str)],
        _timeout: Option<Duration>,
    ) -> io::Result<Output> {
        self.run(cmd, args)
    }
}

/// Serves a fixed file, or 404 for any other URL.
pub struct MockDownloader {
    pub url: String,
    pub content: Vec<u8>,
}

impl Downloader for MockDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<(), ApiError> {
        if url != self.url {
            return Err(ApiError::NotFound(url.to_string()));
        }
        std::fs::write(dest, &self.content).map_err(|e| ApiError::io("write", e))
    }
}
