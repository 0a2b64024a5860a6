//! Instance lifecycle: create, update, start, stop, delete, and protect.
//!
//! ```text
//! absent --create--> provisioning --stack complete--> pending -> running
//! running --stop--> stopping -> stopped --start--> pending -> running
//! any --delete--> absent
//! ```
//!
//! The instance is located by tag before every mutation; nothing is cached
//! between calls.

mod bootstrap;
mod wait;

use std::net::{IpAddr, SocketAddr};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};

use crate::guard::{Confirmer, GuardError, authorize_delete};
use crate::instance::{Ec2Api, InstanceError, InstanceLocator, InstanceState};
use crate::process::{CommandRunner, ProcessError, run_checked};
use crate::provision::{ProvisionError, Provisioner, StackParameters, StackReport, ensure_complete};
use crate::session::{SshIdentity, shell_command};

pub use bootstrap::bootstrap_script;
pub use wait::{WaitSettings, wait_for_port};

/// Port probed for ssh readiness after creation.
pub const SSH_PORT: u16 = 22;

/// Errors raised by lifecycle operations.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum LifecycleError {
    /// Locating or talking to the instance failed.
    #[error(transparent)]
    Instance(#[from] InstanceError),
    /// A stack operation failed or did not complete.
    #[error(transparent)]
    Provision(#[from] ProvisionError),
    /// A run-to-completion command failed.
    #[error(transparent)]
    Process(#[from] ProcessError),
    /// A deletion gate refused.
    #[error(transparent)]
    Guard(#[from] GuardError),
    /// A start or stop did not settle in time.
    #[error(
        "timed out after {}s waiting for instance to reach {desired} (still {last_seen})",
        .waited.as_secs()
    )]
    Timeout {
        /// State that was awaited.
        desired: InstanceState,
        /// Last state observed.
        last_seen: InstanceState,
        /// Time spent waiting.
        waited: Duration,
    },
    /// The ssh port never accepted a connection.
    #[error("{address} has not opened after {attempts} attempts")]
    PortNeverOpened {
        /// Address probed.
        address: SocketAddr,
        /// Probes made.
        attempts: u32,
    },
}

/// Drives the instance through its lifecycle.
#[derive(Clone, Debug)]
pub struct LifecycleController<E, P, R> {
    locator: InstanceLocator<E>,
    provisioner: P,
    runner: R,
    parameters: StackParameters,
    identity: SshIdentity,
    wait: WaitSettings,
    ssh_port: u16,
}

impl<E: Ec2Api, P: Provisioner, R: CommandRunner> LifecycleController<E, P, R> {
    /// Creates a controller with default wait settings.
    ///
    /// `runner` executes the bootstrap session and should stream output.
    #[must_use]
    pub fn new(
        locator: InstanceLocator<E>,
        provisioner: P,
        runner: R,
        parameters: StackParameters,
        identity: SshIdentity,
    ) -> Self {
        Self {
            locator,
            provisioner,
            runner,
            parameters,
            identity,
            wait: WaitSettings::default(),
            ssh_port: SSH_PORT,
        }
    }

    /// Replaces the wait settings.
    #[must_use]
    pub const fn with_wait_settings(mut self, wait: WaitSettings) -> Self {
        self.wait = wait;
        self
    }

    /// Probes `port` instead of 22 for readiness.
    #[must_use]
    pub const fn with_ssh_port(mut self, port: u16) -> Self {
        self.ssh_port = port;
        self
    }

    /// Locator used for every lookup.
    #[must_use]
    pub const fn locator(&self) -> &InstanceLocator<E> {
        &self.locator
    }

    /// Creates the stack, waits for the instance and its ssh port, then runs
    /// the bootstrap script. Returns the instance address.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Provision`] when the stack does not complete,
    /// [`LifecycleError::PortNeverOpened`] when ssh never comes up, and
    /// [`LifecycleError::Process`] when bootstrap fails.
    pub fn create(&self) -> Result<IpAddr, LifecycleError> {
        info!(stack = %self.parameters.stack_name(), "creating stack");
        let report = self.provisioner.create(&self.parameters)?;
        ensure_complete("create", report)?;
        info!("stack created");

        self.wait_until_booted()?;

        info!("waiting until ssh access is available");
        let ip = self.locator.get_ip()?;
        wait_for_port(SocketAddr::new(ip, self.ssh_port), &self.wait)?;
        thread::sleep(self.wait.settle_delay);

        info!("bootstrapping instance, this takes a few minutes");
        let script = bootstrap_script(&self.identity.user);
        run_checked(
            &self.runner,
            &shell_command(&self.identity, ip, &[], Some(&script)),
        )?;
        Ok(ip)
    }

    /// Applies the current parameters to the existing stack.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Provision`] when the update does not complete.
    pub fn update(&self) -> Result<StackReport, LifecycleError> {
        info!(stack = %self.parameters.stack_name(), "updating stack");
        let report = self.provisioner.update(&self.parameters)?;
        Ok(ensure_complete("update", report)?)
    }

    /// Deletes the stack without consulting the deletion gates.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Provision`] when the deletion does not
    /// complete.
    pub fn delete(&self) -> Result<StackReport, LifecycleError> {
        warn!(stack = %self.parameters.stack_name(), "deleting stack");
        let report = self.provisioner.delete(&self.parameters)?;
        Ok(ensure_complete("delete", report)?)
    }

    /// Deletes the stack once termination protection is off and `confirmer`
    /// agrees.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Guard`] when a gate refuses, before any
    /// destructive call.
    pub fn delete_guarded(&self, confirmer: &dyn Confirmer) -> Result<StackReport, LifecycleError> {
        let protected = self.is_termination_protection_enabled()?;
        authorize_delete(protected, confirmer)?;
        self.delete()
    }

    /// Starts the instance and waits until it runs.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Timeout`] when the state does not settle.
    pub fn start(&self) -> Result<(), LifecycleError> {
        let instance_id = self.locator.instance_id()?;
        info!(%instance_id, "starting instance");
        self.locator.api().start_instance(&instance_id)?;
        self.wait_for_state(&InstanceState::Running)
    }

    /// Stops the instance and waits until it halts.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Timeout`] when the state does not settle.
    pub fn stop(&self) -> Result<(), LifecycleError> {
        let instance_id = self.locator.instance_id()?;
        info!(%instance_id, "stopping instance");
        self.locator.api().stop_instance(&instance_id)?;
        self.wait_for_state(&InstanceState::Stopped)
    }

    /// Turns API termination protection on. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Instance`] when the instance cannot be found
    /// or updated.
    pub fn enable_termination_protection(&self) -> Result<(), LifecycleError> {
        self.set_termination_protection(true)
    }

    /// Turns API termination protection off. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Instance`] when the instance cannot be found
    /// or updated.
    pub fn disable_termination_protection(&self) -> Result<(), LifecycleError> {
        self.set_termination_protection(false)
    }

    /// Reads the API termination protection flag.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Instance`] when the instance cannot be found
    /// or queried.
    pub fn is_termination_protection_enabled(&self) -> Result<bool, LifecycleError> {
        let instance_id = self.locator.instance_id()?;
        Ok(self.locator.api().termination_protection(&instance_id)?)
    }

    fn set_termination_protection(&self, enabled: bool) -> Result<(), LifecycleError> {
        let instance_id = self.locator.instance_id()?;
        info!(%instance_id, enabled, "setting termination protection");
        self.locator
            .api()
            .set_termination_protection(&instance_id, enabled)?;
        Ok(())
    }

    // Unbounded: a fresh stack may not expose its instance immediately.
    fn wait_until_booted(&self) -> Result<(), LifecycleError> {
        loop {
            match self.locator.state() {
                Ok(InstanceState::Running) => return Ok(()),
                Ok(state) => warn!(%state, "waiting to bootstrap: instance not yet running"),
                Err(InstanceError::NotFound { .. }) => {
                    warn!("waiting to bootstrap: instance not yet visible");
                }
                Err(err) => return Err(err.into()),
            }
            thread::sleep(self.wait.state_poll_interval);
        }
    }

    fn wait_for_state(&self, desired: &InstanceState) -> Result<(), LifecycleError> {
        let started = Instant::now();
        loop {
            let state = self.locator.state()?;
            if state == *desired {
                return Ok(());
            }
            let waited = started.elapsed();
            if waited >= self.wait.state_timeout {
                return Err(LifecycleError::Timeout {
                    desired: desired.clone(),
                    last_seen: state,
                    waited,
                });
            }
            info!(%desired, current = %state, "waiting for instance state");
            thread::sleep(self.wait.state_poll_interval);
        }
    }
}
