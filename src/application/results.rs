//! Per-node result logs
//!
//! Layout: `<root>/<YYYYmmddHHMMSS>/{success,failure}/<host>.{stdout,stderr}`

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::debug;

use crate::application::{ApplicationResult, IoResultExt};
use crate::domain::{FanOutSummary, NodeOutcome};

const SUCCESS_DIR: &str = "success";
const FAILURE_DIR: &str = "failure";

/// Writes the stdout/stderr of every node outcome to disk.
#[derive(Debug, Clone)]
pub struct ResultLog {
    root: PathBuf,
}

impl ResultLog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Write logs into a directory named after the current local time.
    pub fn write(&self, outcomes: &[NodeOutcome]) -> ApplicationResult<FanOutSummary> {
        let stamp = Local::now().format("%Y%m%d%H%M%S").to_string();
        self.write_at(outcomes, &stamp)
    }

    /// Write logs into `<root>/<stamp>` and count outcomes.
    pub fn write_at(&self, outcomes: &[NodeOutcome], stamp: &str) -> ApplicationResult<FanOutSummary> {
        let out_dir = self.root.join(stamp);
        let success_dir = out_dir.join(SUCCESS_DIR);
        let failure_dir = out_dir.join(FAILURE_DIR);
        for dir in [&success_dir, &failure_dir] {
            std::fs::create_dir_all(dir).with_path_context("create log dir", dir)?;
        }

        let (failed, succeeded): (Vec<&NodeOutcome>, Vec<&NodeOutcome>) =
            outcomes.iter().partition(|o| o.is_error());

        let mut seen = HashMap::new();
        for outcome in &succeeded {
            write_logs(outcome, &success_dir, &mut seen)?;
        }
        for outcome in &failed {
            write_logs(outcome, &failure_dir, &mut seen)?;
        }

        debug!(
            "write_at: {} succeeded, {} failed, logs in {}",
            succeeded.len(),
            failed.len(),
            out_dir.display()
        );
        Ok(FanOutSummary {
            succeeded: succeeded.len(),
            failed: failed.len(),
            log_dir: out_dir,
        })
    }
}

/// File stem for a host; repeated hosts get `-2`, `-3`, ... so no log is overwritten.
fn log_stem(host: &str, seen: &mut HashMap<String, usize>) -> String {
    let host = host.replace(['/', '\\'], "_");
    let count = seen.entry(host.clone()).or_insert(0);
    *count += 1;
    if *count == 1 {
        host
    } else {
        format!("{host}-{count}")
    }
}

fn write_logs(
    outcome: &NodeOutcome,
    dir: &Path,
    seen: &mut HashMap<String, usize>,
) -> ApplicationResult<()> {
    let host = log_stem(&outcome.host, seen);
    let stdout = dir.join(format!("{host}.stdout"));
    std::fs::write(&stdout, &outcome.stdout).with_path_context("write log", &stdout)?;
    let stderr = dir.join(format!("{host}.stderr"));
    std::fs::write(&stderr, &outcome.stderr).with_path_context("write log", &stderr)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn outcome(host: &str, exit_code: i32) -> NodeOutcome {
        NodeOutcome {
            host: host.to_string(),
            stdout: format!("{host} out"),
            stderr: format!("{host} err"),
            exit_code: Some(exit_code),
            error: None,
        }
    }

    #[test]
    fn given_mixed_outcomes_when_write_then_splits_by_result() {
        let temp = TempDir::new().unwrap();
        let log = ResultLog::new(temp.path());

        let summary = log
            .write_at(
                &[outcome("a", 0), outcome("b", 1), outcome("c", 0)],
                "20260101120000",
            )
            .unwrap();

        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        let out = temp.path().join("20260101120000");
        assert_eq!(summary.log_dir, out);
        assert_eq!(
            std::fs::read_to_string(out.join("success/a.stdout")).unwrap(),
            "a out"
        );
        assert_eq!(
            std::fs::read_to_string(out.join("failure/b.stderr")).unwrap(),
            "b err"
        );
        assert!(!out.join("success/b.stdout").exists());
    }

    #[test]
    fn given_nodes_sharing_a_hostname_when_write_then_keeps_both_logs() {
        let temp = TempDir::new().unwrap();
        let mut second = outcome("web.example.com", 0);
        second.stdout = "second out".into();

        let summary = ResultLog::new(temp.path())
            .write_at(&[outcome("web.example.com", 0), second], "20260101120000")
            .unwrap();

        assert_eq!(summary.succeeded, 2);
        let success = temp.path().join("20260101120000/success");
        assert_eq!(
            std::fs::read_to_string(success.join("web.example.com.stdout")).unwrap(),
            "web.example.com out"
        );
        assert_eq!(
            std::fs::read_to_string(success.join("web.example.com-2.stdout")).unwrap(),
            "second out"
        );
    }

    #[test]
    fn given_no_outcomes_when_write_then_creates_empty_dirs() {
        let temp = TempDir::new().unwrap();
        let summary = ResultLog::new(temp.path()).write(&[]).unwrap();
        assert!(summary.is_success());
        assert!(summary.log_dir.join("success").is_dir());
        assert!(summary.log_dir.join("failure").is_dir());
    }
}
