//! Unit tests for command specs and the run-to-completion helpers.

use super::*;
use crate::test_support::ScriptedRunner;
use rstest::rstest;

#[rstest]
fn render_escapes_arguments_with_spaces() {
    let command = CommandSpec::new("unison")
        .arg("-sshargs")
        .arg("-i /tmp/key");

    assert_eq!(command.render(), "unison -sshargs '-i /tmp/key'");
}

#[rstest]
fn argv_prepends_program() {
    let command = CommandSpec::new("ssh").with_args(["-N", "-T"]);

    assert_eq!(command.argv(), vec!["ssh", "-N", "-T"]);
    assert_eq!(command.args(), ["-N", "-T"]);
}

#[rstest]
fn run_checked_returns_output_on_success() {
    let runner = ScriptedRunner::new();
    runner.push_output(Some(0), "done", "");

    let output = run_checked(&runner, &CommandSpec::new("true")).expect("command succeeds");

    assert_eq!(output.stdout, "done");
    assert_eq!(runner.invocations().len(), 1);
}

#[rstest]
#[case(Some(3), "3")]
#[case(None, "unknown")]
fn run_checked_reports_failures(#[case] code: Option<i32>, #[case] status_text: &str) {
    let runner = ScriptedRunner::new();
    runner.push_output(code, "", "boom");

    let err = run_checked(&runner, &CommandSpec::new("false").arg("x"))
        .expect_err("non-zero exit should fail");

    assert_eq!(
        err,
        ProcessError::CommandFailure {
            command: String::from("false x"),
            status: code,
            status_text: status_text.to_owned(),
            stderr: String::from("boom"),
        }
    );
    assert!(err.to_string().ends_with(": boom"), "unexpected message: {err}");
}

#[rstest]
fn command_failure_message_omits_empty_stderr() {
    let err = ProcessError::CommandFailure {
        command: String::from("ssh host"),
        status: Some(255),
        status_text: String::from("255"),
        stderr: String::new(),
    };

    assert_eq!(err.to_string(), "ssh host exited with status 255");
}

#[rstest]
fn process_runner_reports_spawn_failure() {
    let command = CommandSpec::new("/nonexistent/remote-docker-test-binary");

    let err = ProcessCommandRunner
        .run(&command)
        .expect_err("missing binary cannot spawn");

    assert!(matches!(err, ProcessError::Spawn { .. }), "unexpected: {err:?}");
}

#[cfg(unix)]
#[rstest]
fn process_runner_captures_output() {
    let command = CommandSpec::new("sh").with_args(["-c", "printf out; printf err >&2; exit 4"]);

    let output = ProcessCommandRunner.run(&command).expect("sh should spawn");

    assert_eq!(output.code, Some(4));
    assert_eq!(output.stdout, "out");
    assert_eq!(output.stderr, "err");
}

#[cfg(unix)]
#[rstest]
fn replace_process_returns_error_when_program_is_missing() {
    let err = replace_process(&CommandSpec::new("/nonexistent/remote-docker-test-binary"));

    assert!(matches!(err, ProcessError::Exec { .. }), "unexpected: {err:?}");
}
