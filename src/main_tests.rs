//! Unit tests for the `rd` binary helpers.

use super::*;
use clap::CommandFactory;
use remote_docker::config::DEFAULT_CONFIG_PATH;
use rstest::rstest;

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn default_config_path_matches_library() {
    let cli = Cli::try_parse_from(["rd", "ip"]).expect("parse");

    assert_eq!(cli.config_path, DEFAULT_CONFIG_PATH);
}

#[rstest]
#[case(&["rd", "ssh", "--ssh_options", "-A -v"], &["-A", "-v"])]
#[case(&["rd", "ssh", "--ssh-options", "-A -v"], &["-A", "-v"])]
#[case(
    &["rd", "ssh", "--ssh_options", r#"-o "ProxyCommand=ssh -W %h:%p bastion""#],
    &["-o", "ProxyCommand=ssh -W %h:%p bastion"]
)]
fn ssh_options_accept_both_spellings(#[case] argv: &[&str], #[case] expected: &[&str]) {
    let cli = Cli::try_parse_from(argv).expect("parse");

    let Command::Ssh(args) = cli.command else {
        panic!("expected ssh subcommand");
    };
    assert_eq!(
        split_ssh_options(args.ssh_options.as_deref()).expect("balanced quotes"),
        expected
    );
}

#[test]
fn unbalanced_ssh_option_quotes_are_rejected() {
    let err = split_ssh_options(Some(r#"-o "ProxyCommand=ssh"#)).expect_err("unbalanced");

    assert_eq!(CliError::from(err).exit_code(), 2);
}

#[test]
fn tunnel_collects_repeated_forwards() {
    let cli = Cli::try_parse_from([
        "rd",
        "tunnel",
        "-l",
        "8080:80",
        "--local",
        "5432:5432",
        "-r",
        "3000:3000",
    ])
    .expect("parse");

    let Command::Tunnel(args) = cli.command else {
        panic!("expected tunnel subcommand");
    };
    let local = cli_forwards(&args.local).expect("valid forwards");
    assert_eq!(
        local.iter().copied().collect::<Vec<_>>(),
        [PortForward::new(8080, 80), PortForward::new(5432, 5432)]
    );
    assert_eq!(args.remote, ["3000:3000"]);
}

#[test]
fn tunnel_forwards_layer_cli_over_configured_groups() {
    let mut configured = PortForwardSet::new();
    configured.insert_group("web", vec![PortForward::new(8080, 80)]);

    let layered = layered_forwards(configured, &[String::from("5432:5432")])
        .expect("valid forwards");

    assert_eq!(
        layered.iter().copied().collect::<Vec<_>>(),
        [PortForward::new(8080, 80), PortForward::new(5432, 5432)]
    );
}

#[rstest]
#[case("8080")]
#[case("8080:http")]
#[case("0:80")]
fn malformed_forward_is_rejected(#[case] value: &str) {
    let err = cli_forwards(&[value.to_owned()]).expect_err("malformed");

    assert_eq!(CliError::from(err).exit_code(), 2);
}

#[test]
fn empty_ssh_options_yield_no_arguments() {
    assert!(split_ssh_options(None).expect("none").is_empty());
    assert!(split_ssh_options(Some("   ")).expect("blank").is_empty());
}

#[rstest]
#[case(
    CliError::Lifecycle(LifecycleError::Guard(GuardError::TerminationProtected)),
    1
)]
#[case(CliError::Lifecycle(LifecycleError::Guard(GuardError::Aborted)), 2)]
#[case(
    CliError::Config(ConfigError::UnknownProfile { name: String::from("dev") }),
    2
)]
fn exit_codes_follow_error_kind(#[case] err: CliError, #[case] expected: i32) {
    assert_eq!(err.exit_code(), expected);
}

#[test]
fn write_error_prefixes_message() {
    let mut buf = Vec::new();
    let err = CliError::Lifecycle(LifecycleError::Guard(GuardError::Aborted));
    write_error(&mut buf, &err);
    let rendered = String::from_utf8(buf).expect("utf8");

    assert_eq!(rendered, "error: aborted: instance was not deleted\n");
}

#[test]
fn local_user_is_never_empty() {
    assert!(!local_user().is_empty());
}
