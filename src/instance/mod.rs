//! Tag-based discovery of the single remote Docker host.
//!
//! The instance is never remembered between invocations. Every query asks the
//! provider for all instances carrying the service tag and insists that
//! exactly one non-terminated instance remains.

use std::fmt;
use std::net::IpAddr;

use camino::Utf8Path;
use thiserror::Error;
use tracing::debug;

/// Tag key used to mark the remote Docker host.
pub const SERVICE_TAG_KEY: &str = "service";

/// Provider lifecycle state of an instance.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum InstanceState {
    /// Booting.
    Pending,
    /// Up and reachable.
    Running,
    /// Being terminated.
    ShuttingDown,
    /// Gone; ignored by discovery.
    Terminated,
    /// Shutting down but keeping its volume.
    Stopping,
    /// Halted.
    Stopped,
    /// Any state string the provider reports that is not listed above.
    Other(String),
}

impl InstanceState {
    /// Maps a provider state name onto the enum, keeping unknown names.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "pending" => Self::Pending,
            "running" => Self::Running,
            "shutting-down" => Self::ShuttingDown,
            "terminated" => Self::Terminated,
            "stopping" => Self::Stopping,
            "stopped" => Self::Stopped,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Provider spelling of the state.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::ShuttingDown => "shutting-down",
            Self::Terminated => "terminated",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one provider instance.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Instance {
    /// Provider identifier.
    pub id: String,
    /// Current lifecycle state.
    pub state: InstanceState,
    /// Public address, present only while running.
    pub public_ip: Option<IpAddr>,
}

/// Instances launched together, as grouped by the provider.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Reservation {
    /// Member instances.
    pub instances: Vec<Instance>,
}

/// `service=<name>` tag identifying the remote host.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServiceTag {
    value: String,
}

impl ServiceTag {
    /// Builds the tag for the given service name.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// Tag key, always [`SERVICE_TAG_KEY`].
    #[must_use]
    pub const fn key(&self) -> &'static str {
        SERVICE_TAG_KEY
    }

    /// Tag value, the service name.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for ServiceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", SERVICE_TAG_KEY, self.value)
    }
}

/// Errors raised by discovery and by the EC2 binding.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum InstanceError {
    /// No non-terminated instance carries the tag.
    #[error("no instance tagged {tag} was found; did you create the instance?")]
    NotFound {
        /// Tag that was searched for.
        tag: String,
    },
    /// More than one instance carries the tag.
    #[error(
        "found {count} instances tagged {tag}; remove the extra instances before continuing"
    )]
    Ambiguous {
        /// Tag that was searched for.
        tag: String,
        /// Number of matching reservations.
        count: usize,
    },
    /// An address was requested while the instance is not running.
    #[error("instance is {state}; start it before connecting")]
    NotRunning {
        /// Observed state.
        state: InstanceState,
    },
    /// A running instance reported no public address.
    #[error("instance {instance_id} is running but has no public IP address")]
    MissingPublicIp {
        /// Provider identifier.
        instance_id: String,
    },
    /// The provider call itself failed.
    #[error("{operation} failed: {message}")]
    Provider {
        /// Provider operation name.
        operation: String,
        /// Error text reported by the provider.
        message: String,
    },
}

/// Instance operations the lifecycle needs from the cloud provider.
pub trait Ec2Api {
    /// Lists every reservation holding an instance with `tag`, in any state.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceError::Provider`] when the provider call fails.
    fn describe_tagged_instances(&self, tag: &ServiceTag)
    -> Result<Vec<Reservation>, InstanceError>;

    /// Requests a start; does not wait.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceError::Provider`] when the provider call fails.
    fn start_instance(&self, instance_id: &str) -> Result<(), InstanceError>;

    /// Requests a stop; does not wait.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceError::Provider`] when the provider call fails.
    fn stop_instance(&self, instance_id: &str) -> Result<(), InstanceError>;

    /// Writes the API termination protection flag.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceError::Provider`] when the provider call fails.
    fn set_termination_protection(
        &self,
        instance_id: &str,
        enabled: bool,
    ) -> Result<(), InstanceError>;

    /// Reads the API termination protection flag.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceError::Provider`] when the provider call fails.
    fn termination_protection(&self, instance_id: &str) -> Result<bool, InstanceError>;

    /// Deletes a key pair by name; succeeds when none exists.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceError::Provider`] when the provider call fails.
    fn delete_key_pair(&self, name: &str) -> Result<(), InstanceError>;

    /// Imports the public key at `public_key` under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceError::Provider`] when the provider call fails.
    fn import_key_pair(&self, name: &str, public_key: &Utf8Path) -> Result<(), InstanceError>;
}

impl<E: Ec2Api + ?Sized> Ec2Api for &E {
    fn describe_tagged_instances(
        &self,
        tag: &ServiceTag,
    ) -> Result<Vec<Reservation>, InstanceError> {
        (**self).describe_tagged_instances(tag)
    }

    fn start_instance(&self, instance_id: &str) -> Result<(), InstanceError> {
        (**self).start_instance(instance_id)
    }

    fn stop_instance(&self, instance_id: &str) -> Result<(), InstanceError> {
        (**self).stop_instance(instance_id)
    }

    fn set_termination_protection(
        &self,
        instance_id: &str,
        enabled: bool,
    ) -> Result<(), InstanceError> {
        (**self).set_termination_protection(instance_id, enabled)
    }

    fn termination_protection(&self, instance_id: &str) -> Result<bool, InstanceError> {
        (**self).termination_protection(instance_id)
    }

    fn delete_key_pair(&self, name: &str) -> Result<(), InstanceError> {
        (**self).delete_key_pair(name)
    }

    fn import_key_pair(&self, name: &str, public_key: &Utf8Path) -> Result<(), InstanceError> {
        (**self).import_key_pair(name, public_key)
    }
}

/// Picks the single live instance out of a describe result.
///
/// Reservations count only when they hold exactly one instance that is not
/// terminated.
///
/// # Errors
///
/// Returns [`InstanceError::NotFound`] for zero survivors and
/// [`InstanceError::Ambiguous`] for more than one.
pub fn select_instance(
    tag: &ServiceTag,
    reservations: Vec<Reservation>,
) -> Result<Instance, InstanceError> {
    let mut live: Vec<Instance> = reservations
        .into_iter()
        .filter_map(|reservation| {
            let mut alive = reservation
                .instances
                .into_iter()
                .filter(|instance| instance.state != InstanceState::Terminated);
            match (alive.next(), alive.next()) {
                (Some(instance), None) => Some(instance),
                _ => None,
            }
        })
        .collect();

    match live.len() {
        0 => Err(InstanceError::NotFound {
            tag: tag.to_string(),
        }),
        1 => live.pop().ok_or_else(|| InstanceError::NotFound {
            tag: tag.to_string(),
        }),
        count => Err(InstanceError::Ambiguous {
            tag: tag.to_string(),
            count,
        }),
    }
}

/// Finds the tagged instance afresh on every call.
#[derive(Clone, Debug)]
pub struct InstanceLocator<E> {
    api: E,
    tag: ServiceTag,
}

impl<E: Ec2Api> InstanceLocator<E> {
    /// Creates a locator querying `api` for `tag`.
    #[must_use]
    pub const fn new(api: E, tag: ServiceTag) -> Self {
        Self { api, tag }
    }

    /// Underlying provider binding.
    #[must_use]
    pub const fn api(&self) -> &E {
        &self.api
    }

    /// Tag searched for.
    #[must_use]
    pub const fn tag(&self) -> &ServiceTag {
        &self.tag
    }

    /// Queries the provider and returns the single live instance.
    ///
    /// # Errors
    ///
    /// Propagates provider failures and the discovery errors of
    /// [`select_instance`].
    pub fn locate(&self) -> Result<Instance, InstanceError> {
        let reservations = self.api.describe_tagged_instances(&self.tag)?;
        debug!(tag = %self.tag, reservations = reservations.len(), "described tagged instances");
        select_instance(&self.tag, reservations)
    }

    /// Identifier of the live instance.
    ///
    /// # Errors
    ///
    /// See [`InstanceLocator::locate`].
    pub fn instance_id(&self) -> Result<String, InstanceError> {
        self.locate().map(|instance| instance.id)
    }

    /// State of the live instance.
    ///
    /// # Errors
    ///
    /// See [`InstanceLocator::locate`].
    pub fn state(&self) -> Result<InstanceState, InstanceError> {
        self.locate().map(|instance| instance.state)
    }

    /// Whether the live instance is running.
    ///
    /// # Errors
    ///
    /// See [`InstanceLocator::locate`].
    pub fn is_running(&self) -> Result<bool, InstanceError> {
        Ok(self.state()? == InstanceState::Running)
    }

    /// Whether the live instance is stopped.
    ///
    /// # Errors
    ///
    /// See [`InstanceLocator::locate`].
    pub fn is_stopped(&self) -> Result<bool, InstanceError> {
        Ok(self.state()? == InstanceState::Stopped)
    }

    /// Public address of the running instance.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceError::NotRunning`] unless the instance is running and
    /// [`InstanceError::MissingPublicIp`] when no address is assigned.
    pub fn get_ip(&self) -> Result<IpAddr, InstanceError> {
        let instance = self.locate()?;
        if instance.state != InstanceState::Running {
            return Err(InstanceError::NotRunning {
                state: instance.state,
            });
        }
        instance
            .public_ip
            .ok_or(InstanceError::MissingPublicIp {
                instance_id: instance.id,
            })
    }
}
