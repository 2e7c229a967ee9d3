//! Binary-level tests that need no Chef Server

use assert_cmd::Command;
use predicates::prelude::*;
use rstest::rstest;
use tempfile::TempDir;

fn berkflow(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("berkflow").unwrap();
    cmd.env("HOME", home.path())
        .env("BERKSHELF_PATH", home.path().join(".berkshelf"))
        .env("XDG_CONFIG_HOME", home.path().join(".config"))
        .env_remove("RUST_LOG");
    cmd
}

#[rstest]
#[case("abc")]
#[case("1.2")]
#[case("v1.2.3")]
fn given_malformed_version_when_upgrade_then_rejected(#[case] version: &str) {
    let home = TempDir::new().unwrap();

    berkflow(&home)
        .args(["upgrade", "production", "myapp", version])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(format!(
            "Invalid version: {version}. Provide a valid SemVer version string. (i.e. 1.2.3)."
        )));
}

#[test]
fn given_no_chef_config_when_run_chef_then_reports_missing_setting() {
    let home = TempDir::new().unwrap();

    berkflow(&home)
        .args(["run_chef", "production"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("chef.chef_server_url is not configured"));
}

#[test]
fn given_help_flag_when_run_then_lists_verbs() {
    let home = TempDir::new().unwrap();

    berkflow(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("execute")
                .and(predicate::str::contains("run_chef"))
                .and(predicate::str::contains("upgrade"))
                .and(predicate::str::contains("install"))
                .and(predicate::str::contains("release")),
        );
}

#[test]
fn given_version_verb_when_run_then_prints_crate_version() {
    let home = TempDir::new().unwrap();

    berkflow(&home)
        .arg("ver")
        .assert()
        .success()
        .stdout(predicate::str::diff(format!("{}\n", env!("CARGO_PKG_VERSION"))));
}

#[test]
fn given_config_init_when_run_then_writes_template_once() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("berkflow.toml");
    let path_arg = path.to_str().unwrap();

    berkflow(&home)
        .args(["--config", path_arg, "config", "init"])
        .assert()
        .success();
    assert!(std::fs::read_to_string(&path).unwrap().contains("[chef]"));

    berkflow(&home)
        .args(["--config", path_arg, "config", "init"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("already exists"));
}
