//! Failures that must be reported before any AWS call is made.

use std::io::Write;
use std::path::Path;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use rstest::{fixture, rstest};
use tempfile::{NamedTempFile, TempDir};

struct Workspace {
    home: TempDir,
    config: NamedTempFile,
}

impl Workspace {
    fn rd(&self, region: Option<&str>) -> Command {
        self.rd_with_config(region, self.config.path())
    }

    fn rd_with_config(&self, region: Option<&str>, config: &Path) -> Command {
        let mut cmd = cargo_bin_cmd!("rd");
        cmd.env("HOME", self.home.path())
            .env_remove("AWS_REGION")
            .env_remove("AWS_DEFAULT_REGION")
            .env_remove("AWS_PROFILE")
            .env_remove("REMOTE_DOCKER_LOG_LEVEL")
            .arg("--config-path")
            .arg(config);
        if let Some(value) = region {
            cmd.env("AWS_REGION", value);
        }
        cmd
    }
}

#[fixture]
fn workspace() -> Workspace {
    let home = TempDir::new().expect("temp home");
    let mut config = NamedTempFile::new().expect("temp config");
    write!(
        config,
        r#"{{"profiles": {{"dev": {{"instance_type": "t3.large"}}}}}}"#
    )
    .expect("write config");
    Workspace { home, config }
}

#[rstest]
fn unknown_profile_exits_with_two(workspace: Workspace) {
    workspace
        .rd(Some("us-east-1"))
        .args(["--profile", "nope", "ip"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("profile `nope` is not defined"));
}

#[rstest]
fn missing_region_names_the_fix(workspace: Workspace) {
    workspace
        .rd(None)
        .arg("ip")
        .assert()
        .code(2)
        .stderr(
            predicate::str::contains("AWS_REGION").and(predicate::str::contains("aws_region")),
        );
}

#[rstest]
fn malformed_forward_exits_with_two(workspace: Workspace) {
    workspace
        .rd(Some("us-east-1"))
        .args(["tunnel", "-l", "8080"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid port forward"));
}

#[rstest]
#[case("relative/dir", "must be an absolute path")]
#[case("/tmp", "at least two levels below")]
fn invalid_sync_directory_exits_with_two(
    workspace: Workspace,
    #[case] directory: &str,
    #[case] message: &str,
) {
    workspace
        .rd(Some("us-east-1"))
        .args(["sync", directory])
        .assert()
        .code(2)
        .stderr(predicate::str::contains(message));
}

#[rstest]
fn malformed_config_is_reported(workspace: Workspace) {
    let mut broken = NamedTempFile::new().expect("temp config");
    write!(broken, "{{not json").expect("write config");

    workspace
        .rd_with_config(Some("us-east-1"), broken.path())
        .arg("ip")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("failed to parse"));
}

#[rstest]
fn cli_sync_directories_join_the_configured_ones(workspace: Workspace) {
    let mut config = NamedTempFile::new().expect("temp config");
    write!(config, r#"{{"watched_directories": ["/a/b"]}}"#).expect("write config");

    workspace
        .rd_with_config(Some("us-east-1"), config.path())
        .args(["sync", "/x/y"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains(
            "/x/y does not share the replica root /a",
        ));
}

#[rstest]
fn cli_sync_directories_expand_home(workspace: Workspace) {
    let mut config = NamedTempFile::new().expect("temp config");
    write!(config, r#"{{"watched_directories": ["/a/b"]}}"#).expect("write config");
    let expanded = workspace.home.path().join("proj");

    workspace
        .rd_with_config(Some("us-east-1"), config.path())
        .args(["sync", "~/proj"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains(format!(
            "{} does not share the replica root",
            expanded.display()
        )));
}
