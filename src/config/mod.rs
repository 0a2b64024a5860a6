//! Configuration resolution.
//!
//! The JSON file at `~/.remote-docker.config.json` is read once, overlaid
//! with the selected profile, and then queried through typed accessors. AWS
//! environment variables only fill in keys the file leaves unset.

mod environment;
mod images;
mod profile;

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::forwards::{PortForward, PortForwardSet};
use crate::instance::ServiceTag;
use crate::provision::StackParameters;

pub use environment::AwsEnvironment;
pub use images::default_image_for;
pub use profile::{ConfigProfile, PROFILE_SELECTION_KEYS};

/// Configuration file used when `--config-path` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "~/.remote-docker.config.json";
/// Private key used for every ssh connection unless `key_path` is set.
pub const DEFAULT_KEY_PATH: &str = "~/.ssh/id_rsa_remote_docker";
/// EC2 instance type used unless `instance_type` is set.
pub const DEFAULT_INSTANCE_TYPE: &str = "t3.medium";
/// Root volume size in GiB; the AWS free tier covers 30.
pub const DEFAULT_VOLUME_SIZE: u32 = 30;
/// Login user on the remote host.
pub const INSTANCE_USERNAME: &str = "ubuntu";
/// Base value of the `service` tag.
pub const SERVICE_NAME_BASE: &str = "remote-docker-ec2-agent";
/// Base name of the EC2 key pair.
pub const KEY_PAIR_NAME_BASE: &str = "remote-docker-keypair";
/// Base project code used to name the stack.
pub const PROJECT_CODE_BASE: &str = "remote-docker";

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_vars: &'static str,
    json_key: &'static str,
}

impl FieldMetadata {
    const fn new(
        description: &'static str,
        env_vars: &'static str,
        json_key: &'static str,
    ) -> Self {
        Self {
            description,
            env_vars,
            json_key,
        }
    }

    fn missing(&self) -> ConfigError {
        ConfigError::MissingField(format!(
            "missing {}: set {} or add \"{}\" to {}",
            self.description, self.env_vars, self.json_key, DEFAULT_CONFIG_PATH
        ))
    }
}

const REGION_FIELD: FieldMetadata =
    FieldMetadata::new("AWS region", "AWS_REGION or AWS_DEFAULT_REGION", "aws_region");

/// Errors raised during configuration loading and validation.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Raised when a source cannot be parsed.
    #[error("failed to parse {origin}: {message}")]
    Parse {
        /// File path or source name.
        origin: String,
        /// Parser error message.
        message: String,
    },
    /// Raised when the configuration file cannot be read.
    #[error("failed to read {path}: {message}")]
    Io {
        /// Path that failed.
        path: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
    /// Raised when the selected profile is not defined.
    #[error("profile `{name}` is not defined under \"profiles\"")]
    UnknownProfile {
        /// Requested profile name.
        name: String,
    },
    /// Raised when no image is known for the region and none is configured.
    #[error("no default image for region {region}; set \"image_id\" in the configuration")]
    UnsupportedRegion {
        /// Configured region.
        region: String,
    },
    /// Raised when a key holds a value of the wrong shape.
    #[error("invalid value for \"{key}\": {message}")]
    InvalidValue {
        /// Offending key.
        key: String,
        /// What was expected.
        message: String,
    },
}

/// Expands a leading `~` against `home`. Other paths are returned unchanged.
#[must_use]
pub fn expand_home(path: &str, home: Option<&Utf8Path>) -> Utf8PathBuf {
    match (path, home) {
        ("~", Some(dir)) => dir.to_path_buf(),
        (_, Some(dir)) => path
            .strip_prefix("~/")
            .map_or_else(|| Utf8PathBuf::from(path), |rest| dir.join(rest)),
        (_, None) => Utf8PathBuf::from(path),
    }
}

/// Current user's home directory, when it is valid UTF-8.
#[must_use]
pub fn home_dir() -> Option<Utf8PathBuf> {
    dirs::home_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
}

/// Reads `path` and resolves it for `profile`.
///
/// A missing file resolves like an empty JSON object.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when the file exists but cannot be read,
/// [`ConfigError::Parse`] for malformed JSON, and the errors of
/// [`ConfigProfile::resolve`].
pub fn load_profile(path: &Utf8Path, profile: Option<&str>) -> Result<ConfigProfile, ConfigError> {
    let document = match read_config(path)? {
        Some(contents) if !contents.trim().is_empty() => {
            serde_json::from_str(&contents).map_err(|err| ConfigError::Parse {
                origin: path.to_string(),
                message: err.to_string(),
            })?
        }
        Some(_) => Value::Object(Map::new()),
        None => {
            debug!(path = %path, "configuration file not found; using defaults");
            Value::Object(Map::new())
        }
    };
    ConfigProfile::resolve(document, profile)
}

fn read_config(path: &Utf8Path) -> Result<Option<String>, ConfigError> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_str().is_empty() => dir,
        _ => Utf8Path::new("."),
    };
    let file_name = path.file_name().ok_or_else(|| ConfigError::Io {
        path: path.to_path_buf(),
        message: String::from("configuration file path is missing a filename"),
    })?;

    let dir = match Dir::open_ambient_dir(parent, ambient_authority()) {
        Ok(dir) => dir,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(ConfigError::Io {
                path: parent.to_path_buf(),
                message: err.to_string(),
            });
        }
    };

    match dir.read_to_string(file_name) {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }),
    }
}

/// Resolved configuration plus the environment it falls back to.
#[derive(Clone, Debug, PartialEq)]
pub struct RemoteDockerConfig {
    profile: ConfigProfile,
    environment: AwsEnvironment,
    home: Option<Utf8PathBuf>,
}

impl RemoteDockerConfig {
    /// Combines a resolved profile with environment fallbacks.
    #[must_use]
    pub fn new(profile: ConfigProfile, environment: AwsEnvironment) -> Self {
        Self {
            profile,
            environment,
            home: home_dir(),
        }
    }

    /// Overrides the home directory used for `~` expansion.
    #[must_use]
    pub fn with_home(mut self, home: Option<Utf8PathBuf>) -> Self {
        self.home = home;
        self
    }

    /// Loads the file at `path` (with `~` expanded) for `profile` and reads
    /// the AWS environment.
    ///
    /// # Errors
    ///
    /// See [`load_profile`] and [`AwsEnvironment::from_environment`].
    pub fn load(path: &str, profile: Option<&str>) -> Result<Self, ConfigError> {
        let home = home_dir();
        let expanded = expand_home(path, home.as_deref());
        let resolved = load_profile(&expanded, profile)?;
        let environment = AwsEnvironment::from_environment()?;
        Ok(Self::new(resolved, environment).with_home(home))
    }

    /// The resolved profile.
    #[must_use]
    pub const fn profile(&self) -> &ConfigProfile {
        &self.profile
    }

    /// Credentials profile for the AWS CLI, from the file or `AWS_PROFILE`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when the key is not a string.
    pub fn aws_profile(&self) -> Result<Option<String>, ConfigError> {
        if let Some(value) = self.string("aws_profile")? {
            return Ok(Some(value));
        }
        Ok(self.environment.effective_profile().map(str::to_owned))
    }

    /// Region hosting the instance, from the file, `AWS_REGION`, or
    /// `AWS_DEFAULT_REGION`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when no source provides a region.
    pub fn aws_region(&self) -> Result<String, ConfigError> {
        if let Some(value) = self.string("aws_region")? {
            return Ok(value);
        }
        self.environment
            .effective_region()
            .map(str::to_owned)
            .ok_or_else(|| REGION_FIELD.missing())
    }

    /// Private key path with `~` expanded.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when the key is not a string.
    pub fn key_path(&self) -> Result<Utf8PathBuf, ConfigError> {
        let raw = self
            .string("key_path")?
            .unwrap_or_else(|| DEFAULT_KEY_PATH.to_owned());
        Ok(expand_home(&raw, self.home.as_deref()))
    }

    /// EC2 instance type.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when the key is not a string.
    pub fn instance_type(&self) -> Result<String, ConfigError> {
        Ok(self
            .string("instance_type")?
            .unwrap_or_else(|| DEFAULT_INSTANCE_TYPE.to_owned()))
    }

    /// Root volume size in GiB.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] unless the value is a positive
    /// integer.
    pub fn volume_size(&self) -> Result<u32, ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: String::from("volume_size"),
            message: String::from("expected a positive whole number of GiB"),
        };
        match self.profile.get("volume_size") {
            None | Some(Value::Null) => Ok(DEFAULT_VOLUME_SIZE),
            Some(Value::Number(number)) => number
                .as_u64()
                .and_then(|size| u32::try_from(size).ok())
                .filter(|size| *size > 0)
                .ok_or_else(invalid),
            Some(Value::String(text)) => text
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|size| *size > 0)
                .ok_or_else(invalid),
            Some(_) => Err(invalid()),
        }
    }

    /// Optional user id suffixed onto every derived name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] unless the value is a string or a
    /// number.
    pub fn user_id(&self) -> Result<Option<String>, ConfigError> {
        match self.profile.get("user_id") {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
            Some(Value::String(text)) => Ok(Some(text.trim().to_owned())),
            Some(Value::Number(number)) => Ok(Some(number.to_string())),
            Some(_) => Err(ConfigError::InvalidValue {
                key: String::from("user_id"),
                message: String::from("expected a string or a number"),
            }),
        }
    }

    /// Machine image: `image_id` when set, else the default for the region.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnsupportedRegion`] when no image is known for
    /// the region, plus the errors of [`RemoteDockerConfig::aws_region`].
    pub fn image_id(&self) -> Result<String, ConfigError> {
        if let Some(image) = self.string("image_id")? {
            return Ok(image);
        }
        let region = self.aws_region()?;
        default_image_for(&region)
            .map(str::to_owned)
            .ok_or(ConfigError::UnsupportedRegion { region })
    }

    /// Directories synchronised on every `sync`, with `~` expanded.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] unless the value is a list of
    /// strings.
    pub fn watched_directories(&self) -> Result<Vec<Utf8PathBuf>, ConfigError> {
        Ok(self
            .string_list("watched_directories")?
            .iter()
            .map(|dir| expand_home(dir, self.home.as_deref()))
            .collect())
    }

    /// Configured directories followed by `extra`, all with `~` expanded.
    ///
    /// # Errors
    ///
    /// See [`Self::watched_directories`].
    pub fn sync_directories(&self, extra: &[String]) -> Result<Vec<Utf8PathBuf>, ConfigError> {
        let mut directories = self.watched_directories()?;
        directories.extend(
            extra
                .iter()
                .map(|dir| expand_home(dir, self.home.as_deref())),
        );
        Ok(directories)
    }

    /// Gitignore-style patterns excluded from synchronisation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] unless the value is a list of
    /// strings.
    pub fn sync_ignore_patterns(&self) -> Result<Vec<String>, ConfigError> {
        self.string_list("sync_ignore_patterns_git")
    }

    /// Configured local forwards (`-L`), in file order.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for malformed groups or ports.
    pub fn local_port_forwards(&self) -> Result<PortForwardSet, ConfigError> {
        self.forwards("local_port_forwards")
    }

    /// Configured remote forwards (`-R`), in file order.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for malformed groups or ports.
    pub fn remote_port_forwards(&self) -> Result<PortForwardSet, ConfigError> {
        self.forwards("remote_port_forwards")
    }

    /// Value of the `service` tag.
    ///
    /// # Errors
    ///
    /// See [`RemoteDockerConfig::user_id`].
    pub fn service_name(&self) -> Result<String, ConfigError> {
        self.suffixed(SERVICE_NAME_BASE)
    }

    /// Name of the EC2 key pair.
    ///
    /// # Errors
    ///
    /// See [`RemoteDockerConfig::user_id`].
    pub fn key_pair_name(&self) -> Result<String, ConfigError> {
        self.suffixed(KEY_PAIR_NAME_BASE)
    }

    /// Project code naming the stack.
    ///
    /// # Errors
    ///
    /// See [`RemoteDockerConfig::user_id`].
    pub fn project_code(&self) -> Result<String, ConfigError> {
        self.suffixed(PROJECT_CODE_BASE)
    }

    /// Tag identifying the instance.
    ///
    /// # Errors
    ///
    /// See [`RemoteDockerConfig::user_id`].
    pub fn service_tag(&self) -> Result<ServiceTag, ConfigError> {
        self.service_name().map(ServiceTag::new)
    }

    /// Parameters for the stack operations.
    ///
    /// # Errors
    ///
    /// Propagates the errors of the individual accessors.
    pub fn stack_parameters(&self) -> Result<StackParameters, ConfigError> {
        Ok(StackParameters {
            service_name: self.service_name()?,
            key_pair_name: self.key_pair_name()?,
            image_id: self.image_id()?,
            instance_type: self.instance_type()?,
            region: self.aws_region()?,
            volume_size: self.volume_size()?,
            project_code: self.project_code()?,
        })
    }

    fn suffixed(&self, base: &str) -> Result<String, ConfigError> {
        Ok(match self.user_id()? {
            Some(user_id) => format!("{base}-{user_id}"),
            None => base.to_owned(),
        })
    }

    fn string(&self, key: &str) -> Result<Option<String>, ConfigError> {
        match self.profile.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(text)) => Ok(Some(text.clone())),
            Some(_) => Err(ConfigError::InvalidValue {
                key: key.to_owned(),
                message: String::from("expected a string"),
            }),
        }
    }

    fn string_list(&self, key: &str) -> Result<Vec<String>, ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: key.to_owned(),
            message: String::from("expected a list of strings"),
        };
        match self.profile.get(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| item.as_str().map(str::to_owned).ok_or_else(invalid))
                .collect(),
            Some(_) => Err(invalid()),
        }
    }

    fn forwards(&self, key: &str) -> Result<PortForwardSet, ConfigError> {
        let mut set = PortForwardSet::new();
        let groups = match self.profile.get(key) {
            None | Some(Value::Null) => return Ok(set),
            Some(Value::Object(groups)) => groups,
            Some(_) => {
                return Err(ConfigError::InvalidValue {
                    key: key.to_owned(),
                    message: String::from("expected a mapping of group name to {from: to}"),
                });
            }
        };

        for (name, mapping) in groups {
            let group_key = format!("{key}.{name}");
            let Value::Object(pairs) = mapping else {
                return Err(ConfigError::InvalidValue {
                    key: group_key,
                    message: String::from("expected a mapping of {from: to} ports"),
                });
            };
            let forwards = pairs
                .iter()
                .map(|(from, to)| parse_pair(&group_key, from, to))
                .collect::<Result<Vec<_>, _>>()?;
            set.insert_group(name.clone(), forwards);
        }
        Ok(set)
    }
}

fn parse_pair(key: &str, from: &str, to: &Value) -> Result<PortForward, ConfigError> {
    let invalid = |message: String| ConfigError::InvalidValue {
        key: key.to_owned(),
        message,
    };
    let to_text = match to {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        _ => return Err(invalid(format!("port for {from} must be a string or a number"))),
    };
    let from_port = PortForward::parse_port(from).map_err(|err| invalid(err.to_string()))?;
    let to_port = PortForward::parse_port(&to_text).map_err(|err| invalid(err.to_string()))?;
    Ok(PortForward::new(from_port, to_port))
}
