//! Core library for the `rd` remote Docker tool.
//!
//! The crate provisions one EC2 instance running Docker, finds it again by
//! its `service` tag, and builds the ssh, tunnel, and unison commands that
//! connect a laptop to it. Provider access goes through the [`Ec2Api`] and
//! [`Provisioner`] traits so the lifecycle can run against in-memory fakes.

pub mod aws;
pub mod config;
pub mod context;
pub mod forwards;
pub mod guard;
pub mod instance;
pub mod keypair;
pub mod lifecycle;
pub mod process;
pub mod provision;
pub mod session;
pub mod test_support;

pub use aws::{AwsCli, AwsError, AwsTarget, CloudFormation};
pub use config::{ConfigError, RemoteDockerConfig};
pub use context::DockerContext;
pub use forwards::{ForwardParseError, PortForward, PortForwardSet};
pub use guard::{Confirmer, GuardError, TerminalConfirmer};
pub use instance::{Ec2Api, Instance, InstanceError, InstanceLocator, InstanceState, ServiceTag};
pub use keypair::{KeyPairError, create_keypair};
pub use lifecycle::{LifecycleController, LifecycleError, WaitSettings};
pub use process::{
    CommandOutput, CommandRunner, CommandSpec, ProcessCommandRunner, ProcessError,
    StreamingCommandRunner, replace_process,
};
pub use provision::{ProvisionError, Provisioner, StackParameters, StackReport, StackStatus};
pub use session::{SessionError, SessionPlanner, SshIdentity, SyncError, SyncPlan, UnisonMode};
