//! Stack provisioning through `aws cloudformation`.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::types::DescribeStacksOutput;
use super::{AwsError, AwsTarget, parse_json, run_aws};
use crate::process::{CommandOutput, CommandRunner, ProcessCommandRunner, ProcessError};
use crate::provision::{ProvisionError, Provisioner, StackParameters, StackReport, StackStatus};

/// Template describing the instance, its security group, and its volume.
pub const STACK_TEMPLATE: &str = include_str!("../../assets/remote-docker.template.json");

const NO_UPDATES_MARKER: &str = "No updates are to be performed";
const MISSING_STACK_MARKER: &str = "does not exist";

/// Maps a raw CloudFormation status onto [`StackStatus`].
///
/// Any `*_COMPLETE` status counts, except the rollback family.
#[must_use]
pub fn stack_status(raw: &str) -> StackStatus {
    if raw.ends_with("_COMPLETE") && !raw.contains("ROLLBACK") {
        StackStatus::Complete
    } else {
        StackStatus::Other(raw.to_owned())
    }
}

/// [`Provisioner`] backed by the embedded CloudFormation template.
#[derive(Clone, Debug)]
pub struct CloudFormation<R: CommandRunner> {
    target: AwsTarget,
    runner: R,
}

impl CloudFormation<ProcessCommandRunner> {
    /// Creates a provisioner wired to the real process runner.
    #[must_use]
    pub const fn with_process_runner(target: AwsTarget) -> Self {
        Self::new(target, ProcessCommandRunner)
    }
}

impl<R: CommandRunner> CloudFormation<R> {
    /// Creates a provisioner using the provided runner.
    ///
    /// Calls go to the region named in the stack parameters; `target`
    /// supplies the profile and binary.
    #[must_use]
    pub const fn new(target: AwsTarget, runner: R) -> Self {
        Self { target, runner }
    }

    fn mutate(
        &self,
        target: &AwsTarget,
        operation: &str,
        parameters: &StackParameters,
        with_template: bool,
    ) -> Result<CommandOutput, ProvisionError> {
        let mut args = vec![String::from("--stack-name"), parameters.stack_name()];
        if with_template {
            args.push(String::from("--template-body"));
            args.push(String::from(STACK_TEMPLATE));
            args.push(String::from("--parameters"));
            args.extend(template_parameters(parameters));
        }
        args.push(String::from("--client-request-token"));
        args.push(Uuid::new_v4().to_string());
        let command = target.command("cloudformation", operation, args);
        debug!(operation, stack = %parameters.stack_name(), "calling aws");
        self.runner
            .run(&command)
            .map_err(|source| provider_error(operation, &source))
    }

    /// Blocks on the CLI waiter. A failed wait is not fatal; the final status
    /// read afterwards decides the outcome.
    fn wait(
        &self,
        target: &AwsTarget,
        waiter: &str,
        stack_name: &str,
    ) -> Result<(), ProvisionError> {
        info!(stack = stack_name, waiter, "waiting for stack");
        let command = target.command(
            "cloudformation",
            "wait",
            [waiter, "--stack-name", stack_name],
        );
        let output = self
            .runner
            .run(&command)
            .map_err(|source| provider_error("wait", &source))?;
        if !output.is_success() {
            warn!(
                stack = stack_name,
                status = %output.status_text(),
                stderr = output.stderr.trim(),
                "stack waiter gave up"
            );
        }
        Ok(())
    }

    fn describe(
        &self,
        target: &AwsTarget,
        stack_name: &str,
    ) -> Result<StackReport, ProvisionError> {
        let command = target.command(
            "cloudformation",
            "describe-stacks",
            ["--stack-name", stack_name],
        );
        let output = run_aws(&self.runner, "describe-stacks", &command)?;
        let described: DescribeStacksOutput = parse_json("describe-stacks", &output.stdout)?;
        let statuses = described
            .stacks
            .into_iter()
            .map(|stack| {
                let status = stack_status(&stack.stack_status);
                (stack.stack_name, status)
            })
            .collect::<BTreeMap<_, _>>();
        Ok(StackReport::new(statuses))
    }

    fn target_for(&self, parameters: &StackParameters) -> AwsTarget {
        self.target.in_region(&parameters.region)
    }
}

impl<R: CommandRunner> Provisioner for CloudFormation<R> {
    fn create(&self, parameters: &StackParameters) -> Result<StackReport, ProvisionError> {
        let target = self.target_for(parameters);
        let stack_name = parameters.stack_name();
        let output = self.mutate(&target, "create-stack", parameters, true)?;
        ensure_success("create-stack", output)?;
        self.wait(&target, "stack-create-complete", &stack_name)?;
        self.describe(&target, &stack_name)
    }

    fn update(&self, parameters: &StackParameters) -> Result<StackReport, ProvisionError> {
        let target = self.target_for(parameters);
        let stack_name = parameters.stack_name();
        let output = self.mutate(&target, "update-stack", parameters, true)?;
        if !output.is_success() && output.stderr.contains(NO_UPDATES_MARKER) {
            info!(stack = %stack_name, "stack already up to date");
            return Ok(StackReport::single(stack_name, StackStatus::Complete));
        }
        ensure_success("update-stack", output)?;
        self.wait(&target, "stack-update-complete", &stack_name)?;
        self.describe(&target, &stack_name)
    }

    fn delete(&self, parameters: &StackParameters) -> Result<StackReport, ProvisionError> {
        let target = self.target_for(parameters);
        let stack_name = parameters.stack_name();
        let output = self.mutate(&target, "delete-stack", parameters, false)?;
        ensure_success("delete-stack", output)?;
        self.wait(&target, "stack-delete-complete", &stack_name)?;
        match self.describe(&target, &stack_name) {
            Err(ProvisionError::Provider { message, .. })
                if message.contains(MISSING_STACK_MARKER) =>
            {
                Ok(StackReport::single(stack_name, StackStatus::Complete))
            }
            other => other,
        }
    }
}

/// `ParameterKey=K,ParameterValue=V` entries for the template.
fn template_parameters(parameters: &StackParameters) -> Vec<String> {
    let volume_size = parameters.volume_size.to_string();
    [
        ("ProjectCode", parameters.project_code.as_str()),
        ("ServiceName", parameters.service_name.as_str()),
        ("KeyPairName", parameters.key_pair_name.as_str()),
        ("ImageId", parameters.image_id.as_str()),
        ("InstanceType", parameters.instance_type.as_str()),
        ("VolumeSize", volume_size.as_str()),
    ]
    .into_iter()
    .map(|(key, value)| format!("ParameterKey={key},ParameterValue={value}"))
    .collect()
}

fn ensure_success(operation: &str, output: CommandOutput) -> Result<(), ProvisionError> {
    if output.is_success() {
        return Ok(());
    }
    let source = ProcessError::CommandFailure {
        command: format!("aws cloudformation {operation}"),
        status: output.code,
        status_text: output.status_text(),
        stderr: output.stderr,
    };
    Err(AwsError::Command {
        operation: operation.to_owned(),
        source,
    }
    .into())
}

fn provider_error(operation: &str, source: &ProcessError) -> ProvisionError {
    ProvisionError::Provider {
        operation: operation.to_owned(),
        message: source.to_string(),
    }
}
