//! I/O boundary traits for testability
//!
//! These traits abstract the remote services berkflow talks to, allowing
//! services to be tested with mock implementations.

use std::io::{self, Read};
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::Duration;

use tracing::debug;
use wait_timeout::ChildExt;

use crate::domain::{Cookbook, Environment, Node, NodeOutcome, RemoteCookbook};
use crate::infrastructure::ApiError;

/// External command runner abstraction.
pub trait CommandRunner: Send + Sync {
    /// Run a command with arguments.
    fn run(&self, cmd: &str, args: &[&str]) -> io::Result<Output>;

    /// Run a command with extra environment variables and an optional deadline.
    ///
    /// On expiry the process is killed and `ErrorKind::TimedOut` is returned.
    fn run_with_env(
        &self,
        cmd: &str,
        args: &[&str],
        env: &[(&str, &str)],
        timeout: Option<Duration>,
    ) -> io::Result<Output>;
}

/// Chef Server API, limited to the endpoints berkflow uses.
pub trait ChefServer: Send + Sync {
    /// Fetch an environment, `None` if it does not exist.
    fn find_environment(&self, name: &str) -> Result<Option<Environment>, ApiError>;

    /// Save an environment back to the server.
    fn save_environment(&self, environment: &Environment) -> Result<(), ApiError>;

    /// Run a node search query, returning all matching nodes.
    fn search_nodes(&self, query: &str) -> Result<Vec<Node>, ApiError>;

    /// All versions of a cookbook, empty if the cookbook is unknown.
    fn cookbook_versions(&self, name: &str) -> Result<Vec<String>, ApiError>;

    /// Fetch one cookbook version, `None` if it does not exist.
    fn find_cookbook(&self, name: &str, version: &str)
        -> Result<Option<RemoteCookbook>, ApiError>;

    /// Download a cookbook file URL to `dest`.
    fn download_file(&self, url: &str, dest: &Path) -> Result<(), ApiError>;

    /// Upload and freeze a cookbook version.
    ///
    /// Returns `Err(ApiError::Conflict)` if the version is frozen and `force` is off.
    fn upload_cookbook(&self, cookbook: &Cookbook, force: bool) -> Result<(), ApiError>;
}

/// Executes commands on a remote node.
pub trait NodeRunner: Send + Sync {
    /// Run `command` on `host`. Failures are reported in the outcome, never raised.
    fn run(&self, host: &str, command: &str, sudo: bool) -> NodeOutcome;
}

/// A release entry on the source hosting platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub id: u64,
    pub tag_name: String,
    /// Asset upload URL template, as returned by the API
    pub upload_url: String,
}

/// Source hosting platform releases (GitHub).
pub trait ReleaseHost: Send + Sync {
    /// Create a release for `tag`. `Err(ApiError::Conflict)` if it already exists.
    fn create_release(&self, repository: &str, tag: &str) -> Result<Release, ApiError>;

    /// List releases of a repository.
    fn releases(&self, repository: &str) -> Result<Vec<Release>, ApiError>;

    /// Attach a file to a release.
    fn upload_asset(
        &self,
        release: &Release,
        file: &Path,
        name: &str,
        content_type: &str,
    ) -> Result<(), ApiError>;
}

/// Fetches a remote package to a local file.
pub trait Downloader: Send + Sync {
    fn download(&self, url: &str, dest: &Path) -> Result<(), ApiError>;
}

// ============================================================
// REAL IMPLEMENTATIONS
// ============================================================

/// Real command runner implementation.
#[derive(Debug, Default)]
pub struct RealCommandRunner;

impl CommandRunner for RealCommandRunner {
    fn run(&self, cmd: &str, args: &[&str]) -> io::Result<Output> {
        Command::new(cmd).args(args).output()
    }

    fn run_with_env(
        &self,
        cmd: &str,
        args: &[&str],
        env: &[(&str, &str)],
        timeout: Option<Duration>,
    ) -> io::Result<Output> {
        let mut command = Command::new(cmd);
        command
            .args(args)
            .envs(env.iter().copied())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let Some(timeout) = timeout else {
            return command.output();
        };

        let mut child = command.spawn()?;

        // Drain pipes on their own threads so a chatty child cannot block on a full pipe
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = match child.wait_timeout(timeout)? {
            Some(status) => status,
            None => {
                child.kill()?;
                child.wait()?;
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("{cmd} timed out after {}s", timeout.as_secs()),
                ));
            }
        };

        Ok(Output {
            status,
            stdout: join_drain(stdout),
            stderr: join_drain(stderr),
        })
    }
}

/// Appended to captured output when the pipe could not be read to the end.
pub const TRUNCATED_MARKER: &str = "\n[berkflow: output truncated]\n";

fn drain<R: Read + Send + 'static>(reader: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || read_all(reader))
}

fn read_all<R: Read>(mut reader: R) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Err(e) = reader.read_to_end(&mut buf) {
        debug!("read_all: pipe read failed after {} bytes: {}", buf.len(), e);
        buf.extend_from_slice(TRUNCATED_MARKER.as_bytes());
    }
    buf
}

fn join_drain(handle: Option<thread::JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}
