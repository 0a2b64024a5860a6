//! Instance-aware session preparation.

use camino::Utf8PathBuf;
use thiserror::Error;
use tracing::{debug, info};

use crate::forwards::PortForwardSet;
use crate::instance::{Ec2Api, InstanceError, InstanceLocator};
use crate::process::{CommandRunner, CommandSpec, ProcessError, run_checked};

use super::{
    SshIdentity, SyncError, SyncPlan, UnisonMode, ensure_directories_command, shell_command,
    tunnel_command, unison_command,
};

/// Errors raised while preparing a session.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SessionError {
    /// The sync directories broke an invariant.
    #[error(transparent)]
    Sync(#[from] SyncError),
    /// The instance could not be located or is not reachable.
    #[error(transparent)]
    Instance(#[from] InstanceError),
    /// A run-to-completion step failed.
    #[error(transparent)]
    Process(#[from] ProcessError),
}

/// Resolves the instance address and prepares ssh, tunnel, and sync sessions.
///
/// Methods return the final long-lived command; the caller hands the process
/// over to it.
#[derive(Clone, Debug)]
pub struct SessionPlanner<E, R> {
    locator: InstanceLocator<E>,
    runner: R,
    identity: SshIdentity,
}

impl<E: Ec2Api, R: CommandRunner> SessionPlanner<E, R> {
    /// Creates a planner using `runner` for pre-flight and push steps.
    #[must_use]
    pub const fn new(locator: InstanceLocator<E>, runner: R, identity: SshIdentity) -> Self {
        Self {
            locator,
            runner,
            identity,
        }
    }

    /// Interactive shell, optionally running `remote_command`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Instance`] when the instance is not running.
    pub fn shell(
        &self,
        remote_command: Option<&str>,
        extra_options: &[String],
    ) -> Result<CommandSpec, SessionError> {
        let ip = self.locator.get_ip()?;
        Ok(shell_command(
            &self.identity,
            ip,
            extra_options,
            remote_command,
        ))
    }

    /// Tunnel session forwarding the docker socket and the given ports.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Instance`] when the instance is not running.
    pub fn tunnel(
        &self,
        local_user: &str,
        local: &PortForwardSet,
        remote: &PortForwardSet,
    ) -> Result<CommandSpec, SessionError> {
        let ip = self.locator.get_ip()?;
        debug!(local = ?local, remote = ?remote, "forwarding ports");
        info!("starting tunnel");
        Ok(tunnel_command(&self.identity, ip, local_user, local, remote))
    }

    /// Validates `directories`, creates them remotely, pushes the local
    /// replica, and returns the watch session.
    ///
    /// Validation happens before any remote call, and a failed pre-flight
    /// stops before unison runs.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Sync`] for invalid directories,
    /// [`SessionError::Instance`] when the instance is not running, and
    /// [`SessionError::Process`] when the pre-flight or push fails.
    pub fn sync(
        &self,
        directories: Vec<Utf8PathBuf>,
        ignore_patterns: &[String],
    ) -> Result<CommandSpec, SessionError> {
        let plan = SyncPlan::new(directories)?;
        let ip = self.locator.get_ip()?;

        info!("ensuring remote directories exist");
        run_checked(
            &self.runner,
            &ensure_directories_command(&self.identity, ip, plan.directories()),
        )?;

        info!("pushing local files to remote server");
        run_checked(
            &self.runner,
            &unison_command(&self.identity, ip, &plan, ignore_patterns, UnisonMode::Push),
        )?;

        info!("watching local and remote filesystems for changes");
        debug!(directories = ?plan.directories(), "watching");
        Ok(unison_command(
            &self.identity,
            ip,
            &plan,
            ignore_patterns,
            UnisonMode::Watch,
        ))
    }
}
