//! Switching the local docker client between the laptop daemon and the
//! tunnelled remote socket.

use tracing::{debug, info};

use crate::process::{CommandRunner, CommandSpec, ProcessError, run_checked};
use crate::session::LOCAL_DOCKER_SOCKET;

/// Name of the docker context pointing at the tunnelled socket.
pub const REMOTE_CONTEXT: &str = "remote-docker";
/// Built-in docker context for the local daemon.
pub const DEFAULT_CONTEXT: &str = "default";

const DOCKER_BIN: &str = "docker";

/// Drives `docker context` through a runner.
#[derive(Clone, Debug)]
pub struct DockerContext<R> {
    runner: R,
}

impl<R: CommandRunner> DockerContext<R> {
    /// Creates a switcher using `runner`.
    #[must_use]
    pub const fn new(runner: R) -> Self {
        Self { runner }
    }

    /// Points docker at the remote socket, creating the context on first use.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError`] when docker cannot be run or refuses to
    /// create or select the context.
    pub fn use_remote(&self) -> Result<(), ProcessError> {
        let inspect = context_command("inspect").arg(REMOTE_CONTEXT);
        if self.runner.run(&inspect)?.is_success() {
            debug!(context = REMOTE_CONTEXT, "docker context exists");
        } else {
            info!(context = REMOTE_CONTEXT, "creating docker context");
            let create = context_command("create")
                .arg("--docker")
                .arg(format!("host=unix://{LOCAL_DOCKER_SOCKET}"))
                .arg(REMOTE_CONTEXT);
            run_checked(&self.runner, &create)?;
        }
        self.switch(REMOTE_CONTEXT)
    }

    /// Points docker back at the local daemon.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError`] when docker cannot be run or refuses the
    /// switch.
    pub fn use_default(&self) -> Result<(), ProcessError> {
        self.switch(DEFAULT_CONTEXT)
    }

    fn switch(&self, name: &str) -> Result<(), ProcessError> {
        info!(context = name, "switching docker context");
        run_checked(&self.runner, &context_command("use").arg(name))?;
        Ok(())
    }
}

fn context_command(subcommand: &str) -> CommandSpec {
    CommandSpec::new(DOCKER_BIN).arg("context").arg(subcommand)
}

#[cfg(test)]
mod tests;
