//! Local ssh key generation and registration with EC2.

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::info;

use crate::instance::{Ec2Api, InstanceError};
use crate::process::{CommandRunner, CommandSpec, ProcessError, run_checked};

/// Errors raised while creating the key pair.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum KeyPairError {
    /// `ssh-keygen` or `ssh-add` failed.
    #[error(transparent)]
    Process(#[from] ProcessError),
    /// EC2 refused to replace the key pair.
    #[error(transparent)]
    Instance(#[from] InstanceError),
}

/// Public half written by `ssh-keygen` next to `key_path`.
#[must_use]
pub fn public_key_path(key_path: &Utf8Path) -> Utf8PathBuf {
    Utf8PathBuf::from(format!("{key_path}.pub"))
}

/// Generates an RSA key at `key_path`, loads it into the agent, and replaces
/// the EC2 key pair `name` with its public half.
///
/// `runner` should inherit the terminal; `ssh-keygen` asks for a passphrase.
///
/// # Errors
///
/// Returns [`KeyPairError::Process`] when a local step fails, before EC2 is
/// touched, and [`KeyPairError::Instance`] when the import fails.
pub fn create_keypair<E: Ec2Api, R: CommandRunner>(
    api: &E,
    runner: &R,
    key_path: &Utf8Path,
    name: &str,
) -> Result<Utf8PathBuf, KeyPairError> {
    info!(%key_path, "generating ssh key");
    let keygen = CommandSpec::new("ssh-keygen").with_args([
        "-t",
        "rsa",
        "-b",
        "4096",
        "-f",
        key_path.as_str(),
    ]);
    run_checked(runner, &keygen)?;
    run_checked(runner, &CommandSpec::new("ssh-add").arg(key_path.as_str()))?;

    let public_key = public_key_path(key_path);
    info!(name, "importing key pair");
    api.delete_key_pair(name)?;
    api.import_key_pair(name, &public_key)?;
    Ok(public_key)
}
