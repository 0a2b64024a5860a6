//! Binary entry point for the `rd` CLI.

mod cli;

use std::io::{self, Write};
use std::process;

use clap::Parser;
use nix::unistd::{User, getuid};
use thiserror::Error;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use remote_docker::config::INSTANCE_USERNAME;
use remote_docker::{
    AwsCli, AwsTarget, CloudFormation, ConfigError, DockerContext, ForwardParseError, GuardError,
    InstanceError, InstanceLocator, KeyPairError, LifecycleController, LifecycleError,
    PortForward, PortForwardSet, ProcessCommandRunner, ProcessError, RemoteDockerConfig,
    SessionError, SessionPlanner, SshIdentity, StreamingCommandRunner, TerminalConfirmer,
    create_keypair, replace_process,
};

use cli::{Cli, Command, SshCommand, SyncCommand, TunnelCommand};

/// Environment variable holding the tracing filter directive.
const LOG_LEVEL_ENV: &str = "REMOTE_DOCKER_LOG_LEVEL";
const DEFAULT_LOG_LEVEL: &str = "warn";

type Ec2 = AwsCli<ProcessCommandRunner>;
type Lifecycle =
    LifecycleController<Ec2, CloudFormation<ProcessCommandRunner>, StreamingCommandRunner>;
type Planner = SessionPlanner<Ec2, StreamingCommandRunner>;

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid port forward: {0}")]
    Forward(#[from] ForwardParseError),
    #[error("invalid ssh options: {0}")]
    SshOptions(#[from] shell_words::ParseError),
    #[error(transparent)]
    Instance(#[from] InstanceError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error(transparent)]
    KeyPair(#[from] KeyPairError),
}

impl CliError {
    /// 1 when termination protection refused a delete, 2 otherwise.
    const fn exit_code(&self) -> i32 {
        match self {
            Self::Lifecycle(LifecycleError::Guard(GuardError::TerminationProtected)) => 1,
            _ => 2,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging();
    let exit_code = match dispatch(cli) {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            err.exit_code()
        }
    };

    process::exit(exit_code);
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_LEVEL_ENV)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn dispatch(cli: Cli) -> Result<(), CliError> {
    let Cli {
        profile,
        config_path,
        command,
    } = cli;
    let remote = || Remote::load(&config_path, profile.as_deref());
    match command {
        Command::Create => {
            let ip = remote()?.lifecycle()?.create()?;
            DockerContext::new(ProcessCommandRunner).use_remote()?;
            status(&format!("instance created at {ip}"));
        }
        Command::Start => {
            remote()?.lifecycle()?.start()?;
            DockerContext::new(ProcessCommandRunner).use_remote()?;
            status("instance started");
        }
        Command::Stop => {
            remote()?.lifecycle()?.stop()?;
            DockerContext::new(ProcessCommandRunner).use_default()?;
            status("instance stopped");
        }
        Command::Delete => {
            remote()?
                .lifecycle()?
                .delete_guarded(&TerminalConfirmer)?;
            DockerContext::new(ProcessCommandRunner).use_default()?;
            status("instance deleted");
        }
        Command::Update => {
            let report = remote()?.lifecycle()?.update()?;
            status(&format!("stack updated ({report})"));
        }
        Command::Ip => {
            let ip = remote()?.locator()?.get_ip()?;
            status(&ip.to_string());
        }
        Command::Ssh(args) => return Err(run_ssh(&remote()?, &args)),
        Command::CreateKeypair => {
            let loaded = remote()?;
            let public_key = create_keypair(
                &loaded.ec2(),
                &StreamingCommandRunner,
                &loaded.identity.key_path,
                &loaded.config.key_pair_name()?,
            )?;
            status(&format!("key pair imported from {public_key}"));
        }
        Command::Tunnel(args) => return Err(run_tunnel(&remote()?, &args)),
        Command::Sync(args) => return Err(run_sync(&remote()?, &args)),
        Command::EnableTerminationProtection => {
            remote()?.lifecycle()?.enable_termination_protection()?;
            status("termination protection enabled");
        }
        Command::DisableTerminationProtection => {
            remote()?.lifecycle()?.disable_termination_protection()?;
            status("termination protection disabled");
        }
        Command::Context => DockerContext::new(ProcessCommandRunner).use_remote()?,
    }
    Ok(())
}

/// Hands the process over to ssh. Only returns on failure.
fn run_ssh(remote: &Remote, args: &SshCommand) -> CliError {
    let prepared = || -> Result<_, CliError> {
        let options = split_ssh_options(args.ssh_options.as_deref())?;
        Ok(remote
            .planner()?
            .shell(args.command.as_deref(), &options)?)
    };
    match prepared() {
        Ok(command) => replace_process(&command).into(),
        Err(err) => err,
    }
}

fn run_tunnel(remote: &Remote, args: &TunnelCommand) -> CliError {
    let prepared = || -> Result<_, CliError> {
        let local = layered_forwards(remote.config.local_port_forwards()?, &args.local)?;
        let remote_forwards =
            layered_forwards(remote.config.remote_port_forwards()?, &args.remote)?;
        Ok(remote
            .planner()?
            .tunnel(&local_user(), &local, &remote_forwards)?)
    };
    match prepared() {
        Ok(command) => replace_process(&command).into(),
        Err(err) => err,
    }
}

fn run_sync(remote: &Remote, args: &SyncCommand) -> CliError {
    let prepared = || -> Result<_, CliError> {
        let directories = remote.config.sync_directories(&args.directories)?;
        let patterns = remote.config.sync_ignore_patterns()?;
        Ok(remote.planner()?.sync(directories, &patterns)?)
    };
    match prepared() {
        Ok(command) => replace_process(&command).into(),
        Err(err) => err,
    }
}

/// Configuration resolved once per invocation plus the collaborators built
/// from it.
struct Remote {
    config: RemoteDockerConfig,
    target: AwsTarget,
    identity: SshIdentity,
}

impl Remote {
    fn load(config_path: &str, profile: Option<&str>) -> Result<Self, CliError> {
        let config = RemoteDockerConfig::load(config_path, profile)?;
        let target = AwsTarget::new(config.aws_region()?, config.aws_profile()?);
        let identity = SshIdentity::new(INSTANCE_USERNAME, config.key_path()?);
        debug!(region = %target.region, profile = ?target.profile, "resolved aws target");
        Ok(Self {
            config,
            target,
            identity,
        })
    }

    fn ec2(&self) -> Ec2 {
        AwsCli::with_process_runner(self.target.clone())
    }

    fn locator(&self) -> Result<InstanceLocator<Ec2>, CliError> {
        Ok(InstanceLocator::new(self.ec2(), self.config.service_tag()?))
    }

    fn lifecycle(&self) -> Result<Lifecycle, CliError> {
        Ok(LifecycleController::new(
            self.locator()?,
            CloudFormation::with_process_runner(self.target.clone()),
            StreamingCommandRunner,
            self.config.stack_parameters()?,
            self.identity.clone(),
        ))
    }

    fn planner(&self) -> Result<Planner, CliError> {
        Ok(SessionPlanner::new(
            self.locator()?,
            StreamingCommandRunner,
            self.identity.clone(),
        ))
    }
}

/// Built-in defaults, then configured groups, then the command-line group.
fn layered_forwards(
    configured: PortForwardSet,
    cli: &[String],
) -> Result<PortForwardSet, ForwardParseError> {
    Ok(PortForwardSet::defaults()
        .merged(configured)
        .merged(cli_forwards(cli)?))
}

fn cli_forwards(values: &[String]) -> Result<PortForwardSet, ForwardParseError> {
    let forwards = values
        .iter()
        .map(|value| value.parse::<PortForward>())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(PortForwardSet::from_cli(&forwards))
}

/// Splits `--ssh_options` with shell quoting rules.
fn split_ssh_options(options: Option<&str>) -> Result<Vec<String>, shell_words::ParseError> {
    options.map_or_else(|| Ok(Vec::new()), shell_words::split)
}

/// Login name of the invoking user, or the numeric uid when unknown.
fn local_user() -> String {
    let uid = getuid();
    User::from_uid(uid)
        .ok()
        .flatten()
        .map_or_else(|| uid.to_string(), |user| user.name)
}

fn status(line: &str) {
    writeln!(io::stdout(), "{line}").ok();
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "error: {err}").ok();
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
