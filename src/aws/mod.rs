//! AWS bindings that shell out to the `aws` command line tool.
//!
//! [`AwsCli`] implements [`Ec2Api`] and [`CloudFormation`] implements
//! [`crate::provision::Provisioner`]. Both build argument vectors, run them
//! through a [`CommandRunner`], and parse the JSON the CLI prints. Credentials
//! are whatever the `aws` tool resolves for the selected profile.

mod cloudformation;
mod types;

use camino::Utf8Path;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::instance::{Ec2Api, InstanceError, Reservation, ServiceTag};
use crate::process::{
    CommandOutput, CommandRunner, CommandSpec, ProcessCommandRunner, ProcessError, run_checked,
};
use crate::provision::ProvisionError;
use types::{DescribeInstanceAttributeOutput, DescribeInstancesOutput};

pub use cloudformation::{CloudFormation, STACK_TEMPLATE, stack_status};

/// Default `aws` CLI binary name.
pub const DEFAULT_AWS_BIN: &str = "aws";

/// Region, profile, and binary every `aws` invocation is aimed at.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AwsTarget {
    /// Region passed as `--region`.
    pub region: String,
    /// Named profile passed as `--profile`, omitted when `None`.
    pub profile: Option<String>,
    /// Path to the `aws` binary.
    pub aws_bin: String,
}

impl AwsTarget {
    /// Targets `region` with the default binary.
    #[must_use]
    pub fn new(region: impl Into<String>, profile: Option<String>) -> Self {
        Self {
            region: region.into(),
            profile,
            aws_bin: String::from(DEFAULT_AWS_BIN),
        }
    }

    /// Replaces the `aws` binary.
    #[must_use]
    pub fn with_aws_bin(mut self, aws_bin: impl Into<String>) -> Self {
        self.aws_bin = aws_bin.into();
        self
    }

    /// Same profile and binary, different region.
    #[must_use]
    pub fn in_region(&self, region: &str) -> Self {
        Self {
            region: region.to_owned(),
            ..self.clone()
        }
    }

    /// Builds `aws <service> <operation> <args> --region R [--profile P] --output json`.
    #[must_use]
    pub fn command<I, S>(&self, service: &str, operation: &str, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut command = CommandSpec::new(self.aws_bin.as_str())
            .arg(service)
            .arg(operation)
            .with_args(args)
            .arg("--region")
            .arg(self.region.as_str());
        if let Some(profile) = &self.profile {
            command.extend_args(["--profile", profile.as_str()]);
        }
        command.extend_args(["--output", "json"]);
        command
    }
}

/// Failure of a single `aws` invocation.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum AwsError {
    /// The CLI could not start or exited unsuccessfully.
    #[error("aws {operation} failed: {source}")]
    Command {
        /// CLI operation, for example `describe-instances`.
        operation: String,
        /// Underlying process failure.
        source: ProcessError,
    },
    /// The CLI printed JSON this binding does not understand.
    #[error("failed to parse aws {operation} output: {message}")]
    Parse {
        /// CLI operation whose output was rejected.
        operation: String,
        /// Parser error text.
        message: String,
    },
}

impl AwsError {
    fn into_parts(self) -> (String, String) {
        match self {
            Self::Command { operation, source } => (operation, source.to_string()),
            Self::Parse { operation, message } => (operation, message),
        }
    }
}

impl From<AwsError> for InstanceError {
    fn from(err: AwsError) -> Self {
        let (operation, message) = err.into_parts();
        Self::Provider { operation, message }
    }
}

impl From<AwsError> for ProvisionError {
    fn from(err: AwsError) -> Self {
        let (operation, message) = err.into_parts();
        Self::Provider { operation, message }
    }
}

/// Runs `command` and fails on a non-zero exit.
fn run_aws<R: CommandRunner>(
    runner: &R,
    operation: &str,
    command: &CommandSpec,
) -> Result<CommandOutput, AwsError> {
    debug!(operation, "calling aws");
    run_checked(runner, command).map_err(|source| AwsError::Command {
        operation: operation.to_owned(),
        source,
    })
}

/// Runs `command` and deserializes its stdout.
fn run_aws_json<R: CommandRunner, T: DeserializeOwned>(
    runner: &R,
    operation: &str,
    command: &CommandSpec,
) -> Result<T, AwsError> {
    let output = run_aws(runner, operation, command)?;
    parse_json(operation, &output.stdout)
}

fn parse_json<T: DeserializeOwned>(operation: &str, stdout: &str) -> Result<T, AwsError> {
    serde_json::from_str(stdout).map_err(|err| AwsError::Parse {
        operation: operation.to_owned(),
        message: err.to_string(),
    })
}

/// EC2 operations backed by `aws ec2`.
#[derive(Clone, Debug)]
pub struct AwsCli<R: CommandRunner> {
    target: AwsTarget,
    runner: R,
}

impl AwsCli<ProcessCommandRunner> {
    /// Creates a binding wired to the real process runner.
    #[must_use]
    pub const fn with_process_runner(target: AwsTarget) -> Self {
        Self::new(target, ProcessCommandRunner)
    }
}

impl<R: CommandRunner> AwsCli<R> {
    /// Creates a binding using the provided runner.
    #[must_use]
    pub const fn new(target: AwsTarget, runner: R) -> Self {
        Self { target, runner }
    }

    /// Region and profile in use.
    #[must_use]
    pub const fn target(&self) -> &AwsTarget {
        &self.target
    }

    fn ec2<I, S>(&self, operation: &str, args: I) -> Result<CommandOutput, AwsError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let command = self.target.command("ec2", operation, args);
        run_aws(&self.runner, operation, &command)
    }

    fn ec2_json<T, I, S>(&self, operation: &str, args: I) -> Result<T, AwsError>
    where
        T: DeserializeOwned,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let command = self.target.command("ec2", operation, args);
        run_aws_json(&self.runner, operation, &command)
    }
}

impl<R: CommandRunner> Ec2Api for AwsCli<R> {
    fn describe_tagged_instances(
        &self,
        tag: &ServiceTag,
    ) -> Result<Vec<Reservation>, InstanceError> {
        let filter = format!("Name=tag:{},Values={}", tag.key(), tag.value());
        let output: DescribeInstancesOutput =
            self.ec2_json("describe-instances", ["--filters", filter.as_str()])?;
        output
            .reservations
            .into_iter()
            .map(types::AwsReservation::into_reservation)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|message| InstanceError::Provider {
                operation: String::from("describe-instances"),
                message,
            })
    }

    fn start_instance(&self, instance_id: &str) -> Result<(), InstanceError> {
        self.ec2("start-instances", ["--instance-ids", instance_id])?;
        Ok(())
    }

    fn stop_instance(&self, instance_id: &str) -> Result<(), InstanceError> {
        self.ec2("stop-instances", ["--instance-ids", instance_id])?;
        Ok(())
    }

    fn set_termination_protection(
        &self,
        instance_id: &str,
        enabled: bool,
    ) -> Result<(), InstanceError> {
        let flag = if enabled {
            "--disable-api-termination"
        } else {
            "--no-disable-api-termination"
        };
        self.ec2("modify-instance-attribute", ["--instance-id", instance_id, flag])?;
        Ok(())
    }

    fn termination_protection(&self, instance_id: &str) -> Result<bool, InstanceError> {
        let output: DescribeInstanceAttributeOutput = self.ec2_json(
            "describe-instance-attribute",
            [
                "--instance-id",
                instance_id,
                "--attribute",
                "disableApiTermination",
            ],
        )?;
        Ok(output.disable_api_termination.value)
    }

    fn delete_key_pair(&self, name: &str) -> Result<(), InstanceError> {
        self.ec2("delete-key-pair", ["--key-name", name])?;
        Ok(())
    }

    fn import_key_pair(&self, name: &str, public_key: &Utf8Path) -> Result<(), InstanceError> {
        let material = format!("fileb://{public_key}");
        self.ec2(
            "import-key-pair",
            ["--key-name", name, "--public-key-material", material.as_str()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests;
