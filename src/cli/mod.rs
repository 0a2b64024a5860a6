//! Command-line interface definitions for the `rd` binary.
//!
//! This module isolates the clap parser structures so both the main binary
//! and the build script can use them; the build script renders the manual
//! page from them. Values stay as plain strings here and are validated by
//! the binary.

use clap::{Parser, Subcommand};

/// Top-level CLI for the `rd` binary.
#[derive(Debug, Parser)]
#[command(
    name = "rd",
    about = "Provision and connect to a remote Docker host on AWS EC2",
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    /// Configuration profile to overlay on the defaults.
    #[arg(long, global = true, value_name = "NAME")]
    pub(crate) profile: Option<String>,
    /// Path of the JSON configuration file.
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        default_value = "~/.remote-docker.config.json"
    )]
    pub(crate) config_path: String,
    /// Operation to perform.
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Subcommands of `rd`.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Create the stack, wait for ssh, and bootstrap Docker on the instance.
    Create,
    /// Start the stopped instance.
    Start,
    /// Stop the running instance.
    Stop,
    /// Delete the stack after confirmation.
    Delete,
    /// Apply the current configuration to the existing stack.
    Update,
    /// Print the public IP address of the instance.
    Ip,
    /// Open an ssh session, optionally running a command.
    Ssh(SshCommand),
    /// Generate an ssh key and register it as the EC2 key pair.
    CreateKeypair,
    /// Forward the Docker socket and ports over ssh.
    Tunnel(TunnelCommand),
    /// Push local directories to the instance and keep them in sync.
    Sync(SyncCommand),
    /// Protect the instance from API termination.
    EnableTerminationProtection,
    /// Allow the instance to be terminated again.
    DisableTerminationProtection,
    /// Point the local docker client at the tunnelled socket.
    Context,
}

/// Arguments for `rd ssh`.
#[derive(Debug, Parser)]
pub(crate) struct SshCommand {
    /// Command to run on the instance instead of an interactive shell.
    #[arg(value_name = "COMMAND")]
    pub(crate) command: Option<String>,
    /// Extra ssh options, split on whitespace.
    #[arg(
        long = "ssh_options",
        alias = "ssh-options",
        value_name = "OPTIONS",
        allow_hyphen_values = true
    )]
    pub(crate) ssh_options: Option<String>,
}

/// Arguments for `rd tunnel`.
#[derive(Debug, Parser)]
pub(crate) struct TunnelCommand {
    /// Extra local forward as `from:to` (laptop port to instance port).
    #[arg(short = 'l', long = "local", value_name = "FROM:TO")]
    pub(crate) local: Vec<String>,
    /// Extra remote forward as `from:to` (instance port to laptop port).
    #[arg(short = 'r', long = "remote", value_name = "FROM:TO")]
    pub(crate) remote: Vec<String>,
}

/// Arguments for `rd sync`.
#[derive(Debug, Parser)]
pub(crate) struct SyncCommand {
    /// Absolute directories to sync; defaults to the configured set.
    #[arg(value_name = "DIR")]
    pub(crate) directories: Vec<String>,
}
