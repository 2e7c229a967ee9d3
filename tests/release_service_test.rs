//! Tests for ReleaseService: repository detection, release lookup, packaging

mod common;

use std::sync::Arc;

use tempfile::TempDir;

use berkflow::application::services::{ReleaseService, ASSET_NAME};
use berkflow::application::ApplicationError;
use berkflow::infrastructure::traits::Release;

use common::{MockCommandRunner, MockReleaseHost};

const REMOTE_SHOW: &str = "\
* remote origin
  Fetch URL: git@github.com:acme/myapp-cookbook.git
  Push  URL: git@github.com:acme/myapp-cookbook.git
  HEAD branch: master
";

fn cookbook_dir(version: &str) -> TempDir {
    let temp = TempDir::new().unwrap();
    std::fs::write(
        temp.path().join("metadata.rb"),
        format!("name 'myapp'\nversion '{version}'\n"),
    )
    .unwrap();
    std::fs::write(temp.path().join("Berksfile"), "source 'https://supermarket.chef.io'\nmetadata\n")
        .unwrap();
    temp
}

#[test]
fn given_new_version_when_release_then_creates_release_and_uploads_package() {
    let dir = cookbook_dir("1.2.0");
    let host = Arc::new(MockReleaseHost::default());
    let cmd = Arc::new(
        MockCommandRunner::default()
            .reply("git", 0, REMOTE_SHOW)
            .reply("berks", 0, ""),
    );
    let svc = ReleaseService::new(host.clone(), cmd.clone());

    let report = svc
        .release(dir.path(), &dir.path().join("Berksfile"), &mut |_| {})
        .unwrap();

    assert_eq!(report.repository, "acme/myapp-cookbook");
    assert_eq!(report.tag, "v1.2.0");
    assert!(report.package.starts_with(dir.path().join("pkg")));
    assert_eq!(
        host.created.lock().unwrap()[0],
        ("acme/myapp-cookbook".to_string(), "v1.2.0".to_string())
    );
    assert_eq!(
        host.uploads.lock().unwrap()[0],
        (100, ASSET_NAME.to_string(), "application/x-tar".to_string())
    );

    let calls = cmd.calls.lock().unwrap();
    let (program, args) = &calls[1];
    assert_eq!(program, "berks");
    assert_eq!(args[0], "package");
    assert_eq!(args[2], "--berksfile");
}

#[test]
fn given_existing_release_when_release_then_reuses_it() {
    let dir = cookbook_dir("1.2.0");
    let host = Arc::new(MockReleaseHost {
        existing: vec![Release {
            id: 42,
            tag_name: "v1.2.0".into(),
            upload_url: "https://uploads.github.com/repos/acme/myapp-cookbook/releases/42/assets{?name,label}".into(),
        }],
        ..MockReleaseHost::default()
    });
    let cmd = Arc::new(
        MockCommandRunner::default()
            .reply("git", 0, REMOTE_SHOW)
            .reply("berks", 0, ""),
    );
    let svc = ReleaseService::new(host.clone(), cmd);

    svc.release(dir.path(), &dir.path().join("Berksfile"), &mut |_| {})
        .unwrap();

    assert!(host.created.lock().unwrap().is_empty());
    assert_eq!(host.uploads.lock().unwrap()[0].0, 42);
}

#[test]
fn given_non_github_remote_when_release_then_unknown_repository() {
    let dir = cookbook_dir("1.2.0");
    let host = Arc::new(MockReleaseHost::default());
    let cmd = Arc::new(MockCommandRunner::default().reply(
        "git",
        0,
        "  Push  URL: git@gitlab.com:acme/myapp.git\n",
    ));
    let svc = ReleaseService::new(host.clone(), cmd);

    let err = svc
        .release(dir.path(), &dir.path().join("Berksfile"), &mut |_| {})
        .unwrap_err();

    assert!(matches!(err, ApplicationError::UnknownRepository));
    assert!(host.created.lock().unwrap().is_empty());
}

#[test]
fn given_failing_berks_when_release_then_nothing_uploaded() {
    let dir = cookbook_dir("1.2.0");
    let host = Arc::new(MockReleaseHost::default());
    let cmd = Arc::new(
        MockCommandRunner::default()
            .reply("git", 0, REMOTE_SHOW)
            .reply("berks", 1, ""),
    );
    let svc = ReleaseService::new(host.clone(), cmd);

    let err = svc
        .release(dir.path(), &dir.path().join("Berksfile"), &mut |_| {})
        .unwrap_err();

    assert!(err.to_string().contains("berks package"));
    assert!(host.uploads.lock().unwrap().is_empty());
}

#[test]
fn given_directory_without_metadata_when_release_then_fails_before_git() {
    let dir = TempDir::new().unwrap();
    let cmd = Arc::new(MockCommandRunner::default().reply("git", 0, REMOTE_SHOW));
    let svc = ReleaseService::new(Arc::new(MockReleaseHost::default()), cmd.clone());

    let result = svc.release(dir.path(), &dir.path().join("Berksfile"), &mut |_| {});

    assert!(result.is_err());
    assert!(cmd.calls.lock().unwrap().is_empty());
}
