//! Unit tests for the `aws` CLI bindings.

use std::net::{IpAddr, Ipv4Addr};

use rstest::{fixture, rstest};
use serde_json::Value;

use super::*;
use crate::instance::{InstanceState, select_instance};
use crate::provision::{Provisioner, StackParameters, StackStatus};
use crate::test_support::ScriptedRunner;

const DESCRIBE_INSTANCES: &str = r#"{
  "Reservations": [
    {
      "Instances": [
        {
          "InstanceId": "i-0abc",
          "State": { "Code": 16, "Name": "running" },
          "PublicIpAddress": "3.80.1.2"
        }
      ]
    },
    {
      "Instances": [
        {
          "InstanceId": "i-0old",
          "State": { "Code": 48, "Name": "terminated" }
        }
      ]
    }
  ]
}"#;

#[fixture]
fn target() -> AwsTarget {
    AwsTarget::new("us-east-1", None)
}

#[fixture]
fn parameters() -> StackParameters {
    StackParameters {
        service_name: String::from("remote-docker-ec2-agent"),
        key_pair_name: String::from("remote-docker-keypair"),
        image_id: String::from("ami-0ac80df6eff0e70b5"),
        instance_type: String::from("t3.medium"),
        region: String::from("eu-west-1"),
        volume_size: 30,
        project_code: String::from("remote-docker"),
    }
}

fn describe_stacks(name: &str, status: &str) -> String {
    format!(r#"{{"Stacks": [{{"StackName": "{name}", "StackStatus": "{status}"}}]}}"#)
}

#[rstest]
fn command_appends_region_profile_and_output() {
    let command = AwsTarget::new("eu-west-2", Some(String::from("work")))
        .command("ec2", "stop-instances", ["--instance-ids", "i-1"]);

    assert_eq!(
        command.render(),
        "aws ec2 stop-instances --instance-ids i-1 --region eu-west-2 --profile work --output json"
    );
}

#[rstest]
fn command_omits_profile_when_unset(target: AwsTarget) {
    let command = target.command("ec2", "describe-instances", Vec::<String>::new());

    assert!(!command.args().iter().any(|arg| arg == "--profile"));
}

#[rstest]
fn describe_filters_by_service_tag_and_parses_reservations(target: AwsTarget) {
    let runner = ScriptedRunner::new();
    runner.push_output(Some(0), DESCRIBE_INSTANCES, "");
    let api = AwsCli::new(target, runner.clone());
    let tag = ServiceTag::new("remote-docker-ec2-agent");

    let reservations = api.describe_tagged_instances(&tag).expect("describe");

    let calls = runner.invocations();
    assert!(
        calls
            .first()
            .is_some_and(|call| call.args.contains(&String::from(
                "Name=tag:service,Values=remote-docker-ec2-agent"
            ))),
        "filter missing: {calls:?}"
    );
    assert_eq!(reservations.len(), 2);
    let instance = select_instance(&tag, reservations).expect("one live instance");
    assert_eq!(instance.id, "i-0abc");
    assert_eq!(instance.state, InstanceState::Running);
    assert_eq!(
        instance.public_ip,
        Some(IpAddr::V4(Ipv4Addr::new(3, 80, 1, 2)))
    );
}

#[rstest]
#[case("not json")]
#[case(r#"{"Reservations": [{"Instances": [{"InstanceId": "i-1", "State": {"Name": "running"}, "PublicIpAddress": "nope"}]}]}"#)]
fn describe_rejects_unreadable_output(target: AwsTarget, #[case] stdout: &str) {
    let runner = ScriptedRunner::new();
    runner.push_output(Some(0), stdout, "");
    let api = AwsCli::new(target, runner);

    let err = api
        .describe_tagged_instances(&ServiceTag::new("svc"))
        .expect_err("unreadable");

    assert!(matches!(
        err,
        InstanceError::Provider { ref operation, .. } if operation == "describe-instances"
    ));
}

#[rstest]
fn failed_call_surfaces_stderr(target: AwsTarget) {
    let runner = ScriptedRunner::new();
    runner.push_output(Some(254), "", "UnauthorizedOperation");
    let api = AwsCli::new(target, runner);

    let err = api.start_instance("i-1").expect_err("denied");

    assert!(err.to_string().contains("UnauthorizedOperation"), "{err}");
}

#[rstest]
#[case(true, "--disable-api-termination")]
#[case(false, "--no-disable-api-termination")]
fn protection_flag_matches_request(target: AwsTarget, #[case] enabled: bool, #[case] flag: &str) {
    let runner = ScriptedRunner::new();
    runner.push_success();
    let api = AwsCli::new(target, runner.clone());

    api.set_termination_protection("i-1", enabled)
        .expect("modify");

    let calls = runner.invocations();
    let call = calls.first().expect("one call");
    assert_eq!(call.args.get(1).map(String::as_str), Some("modify-instance-attribute"));
    assert!(call.args.iter().any(|arg| arg == flag));
}

#[rstest]
#[case(r#"{"InstanceId": "i-1", "DisableApiTermination": {"Value": true}}"#, true)]
#[case(r#"{"InstanceId": "i-1", "DisableApiTermination": {"Value": false}}"#, false)]
fn protection_flag_is_read_back(target: AwsTarget, #[case] stdout: &str, #[case] expected: bool) {
    let runner = ScriptedRunner::new();
    runner.push_output(Some(0), stdout, "");
    let api = AwsCli::new(target, runner);

    assert_eq!(api.termination_protection("i-1"), Ok(expected));
}

#[rstest]
fn import_key_pair_reads_public_key_file(target: AwsTarget) {
    let runner = ScriptedRunner::new();
    runner.push_success();
    let api = AwsCli::new(target, runner.clone());

    api.import_key_pair("remote-docker-keypair", Utf8Path::new("/home/me/.ssh/id_rsa.pub"))
        .expect("import");

    let calls = runner.invocations();
    let command = calls.first().expect("one call").command_string();
    assert!(command.starts_with(
        "aws ec2 import-key-pair --key-name remote-docker-keypair \
         --public-key-material fileb:///home/me/.ssh/id_rsa.pub"
    ));
}

#[rstest]
#[case("CREATE_COMPLETE", StackStatus::Complete)]
#[case("UPDATE_COMPLETE", StackStatus::Complete)]
#[case("DELETE_COMPLETE", StackStatus::Complete)]
#[case("ROLLBACK_COMPLETE", StackStatus::Other(String::from("ROLLBACK_COMPLETE")))]
#[case(
    "UPDATE_ROLLBACK_COMPLETE",
    StackStatus::Other(String::from("UPDATE_ROLLBACK_COMPLETE"))
)]
#[case("CREATE_FAILED", StackStatus::Other(String::from("CREATE_FAILED")))]
fn raw_statuses_map_onto_stack_status(#[case] raw: &str, #[case] expected: StackStatus) {
    assert_eq!(stack_status(raw), expected);
}

#[rstest]
fn create_waits_then_reports_final_status(target: AwsTarget, parameters: StackParameters) {
    let runner = ScriptedRunner::new();
    runner.push_output(Some(0), r#"{"StackId": "arn:aws:cloudformation:stack"}"#, "");
    runner.push_success();
    runner.push_output(
        Some(0),
        describe_stacks("remote-docker-application", "CREATE_COMPLETE"),
        "",
    );
    let provisioner = CloudFormation::new(target, runner.clone());

    let report = provisioner.create(&parameters).expect("create");

    assert!(report.is_complete());
    let calls = runner.invocations();
    let commands: Vec<String> = calls.iter().map(|call| call.command_string()).collect();
    assert_eq!(commands.len(), 3);
    let create = commands.first().expect("create call");
    assert!(create.starts_with("aws cloudformation create-stack --stack-name remote-docker-application"));
    assert!(create.contains("ParameterKey=VolumeSize,ParameterValue=30"));
    assert!(create.contains("ParameterKey=ServiceName,ParameterValue=remote-docker-ec2-agent"));
    assert!(create.contains("--region eu-west-1"), "stack region wins: {create}");
    assert!(
        commands
            .get(1)
            .is_some_and(|wait| wait.contains("wait stack-create-complete"))
    );
}

#[rstest]
fn each_mutation_carries_a_fresh_request_token(target: AwsTarget, parameters: StackParameters) {
    let runner = ScriptedRunner::new();
    for _ in 0..2 {
        runner.push_success();
        runner.push_success();
        runner.push_output(
            Some(0),
            describe_stacks("remote-docker-application", "CREATE_COMPLETE"),
            "",
        );
    }
    let provisioner = CloudFormation::new(target, runner.clone());
    provisioner.create(&parameters).expect("first");
    provisioner.create(&parameters).expect("second");

    let tokens: Vec<String> = runner
        .invocations()
        .into_iter()
        .filter_map(|call| {
            let mut args = call.args.into_iter();
            args.by_ref().find(|arg| arg == "--client-request-token")?;
            args.next()
        })
        .collect();

    assert_eq!(tokens.len(), 2);
    for token in &tokens {
        uuid::Uuid::parse_str(token).expect("uuid token");
    }
    assert_ne!(tokens.first(), tokens.get(1));
}

#[rstest]
fn rolled_back_create_reports_raw_status(target: AwsTarget, parameters: StackParameters) {
    let runner = ScriptedRunner::new();
    runner.push_success();
    runner.push_failure(255);
    runner.push_output(
        Some(0),
        describe_stacks("remote-docker-application", "ROLLBACK_COMPLETE"),
        "",
    );
    let provisioner = CloudFormation::new(target, runner);

    let report = provisioner.create(&parameters).expect("report");

    assert!(!report.is_complete());
    assert_eq!(report.to_string(), "remote-docker-application: ROLLBACK_COMPLETE");
}

#[rstest]
fn rejected_create_is_a_provider_error(target: AwsTarget, parameters: StackParameters) {
    let runner = ScriptedRunner::new();
    runner.push_output(Some(254), "", "AlreadyExistsException");
    let provisioner = CloudFormation::new(target, runner.clone());

    let err = provisioner.create(&parameters).expect_err("exists");

    assert!(matches!(err, ProvisionError::Provider { .. }));
    assert!(err.to_string().contains("AlreadyExistsException"));
    assert_eq!(runner.invocations().len(), 1);
}

#[rstest]
fn update_without_changes_is_complete(target: AwsTarget, parameters: StackParameters) {
    let runner = ScriptedRunner::new();
    runner.push_output(
        Some(254),
        "",
        "An error occurred (ValidationError) when calling the UpdateStack operation: \
         No updates are to be performed.",
    );
    let provisioner = CloudFormation::new(target, runner.clone());

    let report = provisioner.update(&parameters).expect("no-op update");

    assert!(report.is_complete());
    assert_eq!(runner.invocations().len(), 1);
}

#[rstest]
fn delete_of_vanished_stack_is_complete(target: AwsTarget, parameters: StackParameters) {
    let runner = ScriptedRunner::new();
    runner.push_success();
    runner.push_success();
    runner.push_output(
        Some(254),
        "",
        "An error occurred (ValidationError) when calling the DescribeStacks operation: \
         Stack with id remote-docker-application does not exist",
    );
    let provisioner = CloudFormation::new(target, runner.clone());

    let report = provisioner.delete(&parameters).expect("delete");

    assert!(report.is_complete());
    let calls = runner.invocations();
    assert!(
        calls
            .first()
            .is_some_and(|call| !call.args.iter().any(|arg| arg == "--template-body"))
    );
}

#[rstest]
fn template_declares_every_passed_parameter(parameters: StackParameters) {
    let template: Value = serde_json::from_str(STACK_TEMPLATE).expect("template is JSON");
    let declared = template
        .get("Parameters")
        .and_then(Value::as_object)
        .expect("parameters block");

    for entry in cloudformation_parameter_keys(&parameters) {
        assert!(declared.contains_key(&entry), "{entry} not declared");
    }
    assert!(
        template
            .pointer("/Resources/DockerHost/Properties/Tags")
            .and_then(Value::as_array)
            .is_some_and(|tags| tags.iter().any(|tag| tag.get("Key")
                == Some(&Value::String(String::from("service")))))
    );
}

fn cloudformation_parameter_keys(parameters: &StackParameters) -> Vec<String> {
    let runner = ScriptedRunner::new();
    runner.push_failure(1);
    let provisioner = CloudFormation::new(AwsTarget::new("us-east-1", None), runner.clone());
    let _outcome = provisioner.create(parameters);
    runner
        .invocations()
        .into_iter()
        .flat_map(|call| call.args)
        .filter_map(|arg| {
            arg.strip_prefix("ParameterKey=")
                .and_then(|rest| rest.split(',').next())
                .map(str::to_owned)
        })
        .collect()
}
