//! Remote execution over the system `ssh` client
//!
//! Password logins go through `sshpass -e`, which reads the password from
//! `SSHPASS` so it never shows up in the process list.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::config::SshConfig;
use crate::domain::NodeOutcome;
use crate::infrastructure::traits::{CommandRunner, NodeRunner};

/// Who to log in as.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SshCredentials {
    pub user: String,
    pub password: Option<String>,
    pub key: Option<String>,
}

/// Runs commands on nodes by shelling out to `ssh`.
pub struct SshRunner {
    cmd: Arc<dyn CommandRunner>,
    credentials: SshCredentials,
    options: SshConfig,
}

impl SshRunner {
    pub fn new(cmd: Arc<dyn CommandRunner>, credentials: SshCredentials, options: SshConfig) -> Self {
        Self {
            cmd,
            credentials,
            options,
        }
    }

    /// Arguments passed to `ssh` for one invocation.
    pub fn ssh_args(&self, host: &str, command: &str, sudo: bool) -> Vec<String> {
        let mut args: Vec<String> = Vec::new();
        if self.credentials.password.is_none() {
            args.extend(["-o".into(), "BatchMode=yes".into()]);
        }
        args.extend([
            "-o".into(),
            "StrictHostKeyChecking=no".into(),
            "-o".into(),
            format!("ConnectTimeout={}", self.options.connect_timeout_secs),
            "-l".into(),
            self.credentials.user.clone(),
        ]);
        if let Some(key) = &self.credentials.key {
            args.extend(["-i".into(), key.clone()]);
        }
        args.push(host.to_string());
        args.push(if sudo {
            format!("sudo -E {command}")
        } else {
            command.to_string()
        });
        args
    }
}

impl NodeRunner for SshRunner {
    fn run(&self, host: &str, command: &str, sudo: bool) -> NodeOutcome {
        let ssh_args = self.ssh_args(host, command, sudo);
        let timeout = self.options.command_timeout_secs.map(Duration::from_secs);

        let result = match &self.credentials.password {
            Some(password) => {
                let mut args = vec!["-e", "ssh"];
                args.extend(ssh_args.iter().map(String::as_str));
                self.cmd
                    .run_with_env("sshpass", &args, &[("SSHPASS", password.as_str())], timeout)
            }
            None => {
                let args: Vec<&str> = ssh_args.iter().map(String::as_str).collect();
                self.cmd.run_with_env("ssh", &args, &[], timeout)
            }
        };

        match result {
            Ok(output) => {
                debug!("ssh {}: exit {:?}", host, output.status.code());
                NodeOutcome {
                    host: host.to_string(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    exit_code: output.status.code(),
                    error: None,
                }
            }
            Err(e) => {
                debug!("ssh {}: {}", host, e);
                NodeOutcome::failed(host, e.to_string())
            }
        }
    }
}
