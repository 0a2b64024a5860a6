//! Session command builders.
//!
//! Everything here is a pure function from structured inputs to a
//! [`CommandSpec`]; the same inputs always yield the same argument vector.
//! [`SessionPlanner`] adds the instance lookup and the run-to-completion
//! steps that precede a long-lived session.

mod ignore;
mod planner;
mod sync_plan;

use std::net::IpAddr;

use camino::{Utf8Path, Utf8PathBuf};
use shell_escape::unix::escape;

use crate::forwards::PortForwardSet;
use crate::process::CommandSpec;

pub use ignore::{IgnoreRule, translate_pattern, unison_ignore_args};
pub use planner::{SessionError, SessionPlanner};
pub use sync_plan::{SyncError, SyncPlan};

/// Socket the tunnel binds locally for the remote docker daemon.
pub const LOCAL_DOCKER_SOCKET: &str = "/var/run/remote-docker.sock";
/// Docker daemon socket on the remote host.
pub const REMOTE_DOCKER_SOCKET: &str = "/var/run/docker.sock";
/// File synchronisation program.
pub const UNISON_BIN: &str = "unison";

const SSH_BIN: &str = "ssh";
const KEEPALIVE_OPTIONS: [&str; 4] = [
    "-o",
    "StrictHostKeyChecking=no",
    "-o",
    "ServerAliveInterval=60",
];

/// Remote login user and the private key that authenticates it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SshIdentity {
    /// Remote login user.
    pub user: String,
    /// Private key passed with `-i`.
    pub key_path: Utf8PathBuf,
}

impl SshIdentity {
    /// Creates an identity.
    #[must_use]
    pub fn new(user: impl Into<String>, key_path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            user: user.into(),
            key_path: key_path.into(),
        }
    }

    /// `user@ip` destination.
    #[must_use]
    pub fn destination(&self, ip: IpAddr) -> String {
        format!("{}@{ip}", self.user)
    }
}

/// Interactive ssh session, optionally running `remote_command`.
#[must_use]
pub fn shell_command(
    identity: &SshIdentity,
    ip: IpAddr,
    extra_options: &[String],
    remote_command: Option<&str>,
) -> CommandSpec {
    let mut command = CommandSpec::new(SSH_BIN)
        .with_args(KEEPALIVE_OPTIONS)
        .arg("-i")
        .arg(identity.key_path.as_str())
        .with_args(extra_options.iter().cloned())
        .arg(identity.destination(ip));
    if let Some(remote) = remote_command.filter(|text| !text.trim().is_empty()) {
        command.push_arg(remote);
    }
    command
}

/// Foreground tunnel forwarding the docker socket plus every port forward.
///
/// Runs under `sudo` so the socket can be bound below `/var/run`; the socket
/// is handed back to `local_user` once the connection is up. All `-L`
/// forwards precede all `-R` forwards.
#[must_use]
pub fn tunnel_command(
    identity: &SshIdentity,
    ip: IpAddr,
    local_user: &str,
    local: &PortForwardSet,
    remote: &PortForwardSet,
) -> CommandSpec {
    let mut command = CommandSpec::new("sudo")
        .with_args([SSH_BIN, "-v", "-o", "ExitOnForwardFailure=yes"])
        .with_args(KEEPALIVE_OPTIONS)
        .with_args(["-N", "-T", "-i"])
        .arg(identity.key_path.as_str())
        .arg(identity.destination(ip))
        .arg("-L")
        .arg(format!("{LOCAL_DOCKER_SOCKET}:{REMOTE_DOCKER_SOCKET}"))
        .with_args([
            "-o",
            "StreamLocalBindUnlink=yes",
            "-o",
            "PermitLocalCommand=yes",
            "-o",
        ])
        .arg(format!(
            "LocalCommand=sudo chown {local_user} {LOCAL_DOCKER_SOCKET}"
        ));

    for forward in local.iter() {
        command.push_arg("-L");
        command.push_arg(format!(
            "localhost:{}:localhost:{}",
            forward.from, forward.to
        ));
    }
    for forward in remote.iter() {
        command.push_arg("-R");
        command.push_arg(format!("0.0.0.0:{}:localhost:{}", forward.from, forward.to));
    }
    command
}

/// Remote pre-flight creating every sync directory, owned by the login user.
#[must_use]
pub fn ensure_directories_command(
    identity: &SshIdentity,
    ip: IpAddr,
    directories: &[Utf8PathBuf],
) -> CommandSpec {
    let mut remote = format!(
        "sudo install -d -o {user} -g {user}",
        user = escape(identity.user.as_str().into())
    );
    for directory in directories {
        remote.push(' ');
        remote.push_str(&escape(directory.as_str().into()));
    }
    shell_command(identity, ip, &[], Some(&remote))
}

/// Which unison invocation to build.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UnisonMode {
    /// One-shot batch run forcing the local replica onto the remote.
    Push,
    /// Long-lived run that keeps watching both replicas.
    Watch,
}

/// Unison invocation for `plan` against the host at `ip`.
#[must_use]
pub fn unison_command(
    identity: &SshIdentity,
    ip: IpAddr,
    plan: &SyncPlan,
    ignore_patterns: &[String],
    mode: UnisonMode,
) -> CommandSpec {
    let root: &Utf8Path = plan.replica_root();
    let mut command = CommandSpec::new(UNISON_BIN)
        .arg(root.as_str())
        .arg(format!("ssh://{}@{ip}/{root}", identity.user))
        .arg("-prefer")
        .arg(root.as_str())
        .arg("-batch")
        .arg("-sshargs")
        .arg(format!("-i {}", identity.key_path))
        .with_args(unison_ignore_args(ignore_patterns));
    for path in plan.sync_paths() {
        command.push_arg("-path");
        command.push_arg(path.as_str());
    }
    match mode {
        UnisonMode::Push => command.extend_args(["-force", root.as_str()]),
        UnisonMode::Watch => command.extend_args(["-repeat", "watch"]),
    }
    command
}
