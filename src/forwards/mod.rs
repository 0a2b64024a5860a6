//! Named, ordered port-forward groups.
//!
//! A [`PortForwardSet`] is built per direction by layering tiers: built-in
//! defaults, configuration groups, then the command line. A later tier that
//! reuses a group name replaces that group's entries without moving it.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Group name used for forwards given on the command line.
pub const CLI_GROUP_NAME: &str = "cli_port_forward";

/// One `from -> to` port pair.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct PortForward {
    /// Port bound on the listening side.
    pub from: u16,
    /// Port connected to on the far side.
    pub to: u16,
}

impl PortForward {
    /// Creates a forward from `from` to `to`.
    #[must_use]
    pub const fn new(from: u16, to: u16) -> Self {
        Self { from, to }
    }

    /// Parses a single port value as it appears in configuration or on the
    /// command line.
    ///
    /// # Errors
    ///
    /// Returns [`ForwardParseError::InvalidPort`] when `value` is not a port
    /// number between 1 and 65535.
    pub fn parse_port(value: &str) -> Result<u16, ForwardParseError> {
        let trimmed = value.trim();
        match trimmed.parse::<u16>() {
            Ok(port) if port > 0 => Ok(port),
            _ => Err(ForwardParseError::InvalidPort {
                value: trimmed.to_owned(),
            }),
        }
    }
}

impl FromStr for PortForward {
    type Err = ForwardParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (from, to) = value
            .split_once(':')
            .ok_or_else(|| ForwardParseError::MissingSeparator {
                value: value.to_owned(),
            })?;
        Ok(Self::new(Self::parse_port(from)?, Self::parse_port(to)?))
    }
}

impl fmt::Display for PortForward {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.from, self.to)
    }
}

/// Errors raised while parsing forward definitions.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ForwardParseError {
    /// Raised when a `from:to` pair lacks the colon.
    #[error("port forward `{value}` must be written as from:to")]
    MissingSeparator {
        /// Raw input.
        value: String,
    },
    /// Raised when a port is not a number in range.
    #[error("`{value}` is not a valid port number")]
    InvalidPort {
        /// Raw port text.
        value: String,
    },
}

/// A named, ordered list of forwards.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ForwardGroup {
    /// Group name, unique within a set.
    pub name: String,
    /// Forwards in declaration order.
    pub forwards: Vec<PortForward>,
}

/// Ordered collection of named forward groups.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PortForwardSet {
    groups: Vec<ForwardGroup>,
}

impl PortForwardSet {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self { groups: Vec::new() }
    }

    /// Built-in defaults.
    ///
    /// Empty: the docker daemon is always reached through the forwarded unix
    /// socket, never a TCP port.
    #[must_use]
    pub const fn defaults() -> Self {
        Self::new()
    }

    /// Builds the command-line tier, a single [`CLI_GROUP_NAME`] group.
    ///
    /// A repeated source port keeps its first position and takes the last
    /// destination. No group is added when `forwards` is empty.
    #[must_use]
    pub fn from_cli(forwards: &[PortForward]) -> Self {
        let mut unique: Vec<PortForward> = Vec::with_capacity(forwards.len());
        for forward in forwards {
            match unique.iter_mut().find(|seen| seen.from == forward.from) {
                Some(seen) => *seen = *forward,
                None => unique.push(*forward),
            }
        }
        let mut set = Self::new();
        if !unique.is_empty() {
            set.insert_group(CLI_GROUP_NAME, unique);
        }
        set
    }

    /// Adds a group, replacing the entries of an existing group of the same
    /// name in place.
    pub fn insert_group(&mut self, name: impl Into<String>, forwards: Vec<PortForward>) {
        let group_name = name.into();
        if let Some(existing) = self.groups.iter_mut().find(|group| group.name == group_name) {
            existing.forwards = forwards;
            return;
        }
        self.groups.push(ForwardGroup {
            name: group_name,
            forwards,
        });
    }

    /// Layers `later` over `self`, group by group.
    #[must_use]
    pub fn merged(mut self, later: Self) -> Self {
        for group in later.groups {
            self.insert_group(group.name, group.forwards);
        }
        self
    }

    /// Groups in order.
    #[must_use]
    pub fn groups(&self) -> &[ForwardGroup] {
        &self.groups
    }

    /// Every forward, group order first, then entry order.
    pub fn iter(&self) -> impl Iterator<Item = &PortForward> {
        self.groups.iter().flat_map(|group| group.forwards.iter())
    }

    /// Returns `true` when no group holds any forward.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

#[cfg(test)]
mod tests;
