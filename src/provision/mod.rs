//! Stack provisioning collaborator.
//!
//! The stack turns a handful of parameters into the tagged instance, its key
//! pair reference, and its security group. Each operation returns a report
//! mapping stack names to their final status; callers treat anything but a
//! non-empty, all-complete report as fatal.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Inputs for creating or updating the stack.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StackParameters {
    /// Value of the `service` tag applied to the instance.
    pub service_name: String,
    /// EC2 key pair installed on the instance.
    pub key_pair_name: String,
    /// Machine image.
    pub image_id: String,
    /// EC2 instance type.
    pub instance_type: String,
    /// Region hosting the stack.
    pub region: String,
    /// Root volume size in GiB.
    pub volume_size: u32,
    /// Project code used to name the stack.
    pub project_code: String,
}

impl StackParameters {
    /// Name of the stack holding the instance.
    #[must_use]
    pub fn stack_name(&self) -> String {
        format!("{}-application", self.project_code)
    }
}

/// Final status of one stack.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StackStatus {
    /// The operation finished successfully.
    Complete,
    /// Any other status, kept verbatim for diagnostics.
    Other(String),
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete => f.write_str("complete"),
            Self::Other(raw) => f.write_str(raw),
        }
    }
}

/// Stack name to status map returned by every provisioner call.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct StackReport {
    statuses: BTreeMap<String, StackStatus>,
}

impl StackReport {
    /// Wraps a status map.
    #[must_use]
    pub const fn new(statuses: BTreeMap<String, StackStatus>) -> Self {
        Self { statuses }
    }

    /// Report for a single stack.
    #[must_use]
    pub fn single(stack_name: impl Into<String>, status: StackStatus) -> Self {
        let mut statuses = BTreeMap::new();
        statuses.insert(stack_name.into(), status);
        Self::new(statuses)
    }

    /// Returns `true` when the report is non-empty and every stack completed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.statuses.is_empty()
            && self
                .statuses
                .values()
                .all(|status| *status == StackStatus::Complete)
    }

    /// Raw status map.
    #[must_use]
    pub const fn statuses(&self) -> &BTreeMap<String, StackStatus> {
        &self.statuses
    }
}

impl fmt::Display for StackReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.statuses.is_empty() {
            return f.write_str("no stacks reported");
        }
        let rendered = self
            .statuses
            .iter()
            .map(|(name, status)| format!("{name}: {status}"))
            .collect::<Vec<_>>()
            .join(", ");
        f.write_str(&rendered)
    }
}

/// Errors raised by stack operations.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProvisionError {
    /// The stack operation ended without completing.
    #[error("stack {operation} did not complete ({report})")]
    Incomplete {
        /// Operation that was attempted.
        operation: String,
        /// Raw statuses reported by the provider.
        report: StackReport,
    },
    /// The provider call failed outright.
    #[error("stack {operation} failed: {message}")]
    Provider {
        /// Operation that was attempted.
        operation: String,
        /// Error text reported by the provider.
        message: String,
    },
}

/// Declarative stack operations.
pub trait Provisioner {
    /// Creates the stack and waits until the provider settles.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Provider`] when the provider call fails.
    fn create(&self, parameters: &StackParameters) -> Result<StackReport, ProvisionError>;

    /// Applies changed parameters to the existing stack.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Provider`] when the provider call fails.
    fn update(&self, parameters: &StackParameters) -> Result<StackReport, ProvisionError>;

    /// Deletes the stack and everything it created.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Provider`] when the provider call fails.
    fn delete(&self, parameters: &StackParameters) -> Result<StackReport, ProvisionError>;
}

impl<P: Provisioner + ?Sized> Provisioner for &P {
    fn create(&self, parameters: &StackParameters) -> Result<StackReport, ProvisionError> {
        (**self).create(parameters)
    }

    fn update(&self, parameters: &StackParameters) -> Result<StackReport, ProvisionError> {
        (**self).update(parameters)
    }

    fn delete(&self, parameters: &StackParameters) -> Result<StackReport, ProvisionError> {
        (**self).delete(parameters)
    }
}

/// Turns an incomplete report into [`ProvisionError::Incomplete`].
///
/// # Errors
///
/// Returns [`ProvisionError::Incomplete`] unless [`StackReport::is_complete`].
pub fn ensure_complete(operation: &str, report: StackReport) -> Result<StackReport, ProvisionError> {
    if report.is_complete() {
        return Ok(report);
    }
    Err(ProvisionError::Incomplete {
        operation: operation.to_owned(),
        report,
    })
}
