//! Unit tests for docker context switching.

use rstest::rstest;

use super::*;
use crate::test_support::ScriptedRunner;

fn commands(runner: &ScriptedRunner) -> Vec<String> {
    runner
        .invocations()
        .iter()
        .map(|call| call.command_string())
        .collect()
}

#[rstest]
fn existing_remote_context_is_only_selected() {
    let runner = ScriptedRunner::new();
    runner.push_success();
    runner.push_success();

    DockerContext::new(runner.clone())
        .use_remote()
        .expect("switch");

    assert_eq!(
        commands(&runner),
        [
            "docker context inspect remote-docker",
            "docker context use remote-docker",
        ]
    );
}

#[rstest]
fn missing_remote_context_is_created_first() {
    let runner = ScriptedRunner::new();
    runner.push_failure(1);
    runner.push_success();
    runner.push_success();

    DockerContext::new(runner.clone())
        .use_remote()
        .expect("switch");

    assert_eq!(
        commands(&runner),
        [
            "docker context inspect remote-docker",
            "docker context create --docker host=unix:///var/run/remote-docker.sock remote-docker",
            "docker context use remote-docker",
        ]
    );
}

#[rstest]
fn failed_create_stops_before_switching() {
    let runner = ScriptedRunner::new();
    runner.push_failure(1);
    runner.push_failure(1);

    let err = DockerContext::new(runner.clone())
        .use_remote()
        .expect_err("create fails");

    assert!(matches!(err, ProcessError::CommandFailure { .. }));
    assert_eq!(runner.invocations().len(), 2);
}

#[rstest]
fn default_context_is_selected() {
    let runner = ScriptedRunner::new();
    runner.push_success();

    DockerContext::new(runner.clone())
        .use_default()
        .expect("switch");

    assert_eq!(commands(&runner), ["docker context use default"]);
}
