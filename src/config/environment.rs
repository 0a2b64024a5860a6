//! AWS environment fallbacks loaded via `ortho-config`.

use std::ffi::OsString;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use super::ConfigError;

/// AWS variables consulted when the configuration file leaves a key unset.
///
/// Read from `AWS_PROFILE`, `AWS_REGION`, and `AWS_DEFAULT_REGION`.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "AWS")]
pub struct AwsEnvironment {
    /// Named credentials profile for the AWS CLI.
    pub profile: Option<String>,
    /// Preferred region.
    pub region: Option<String>,
    /// Region used when `AWS_REGION` is unset.
    pub default_region: Option<String>,
}

impl AwsEnvironment {
    /// Environment with nothing set.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            profile: None,
            region: None,
            default_region: None,
        }
    }

    /// Loads the variables from the process environment without parsing CLI
    /// arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the loader fails to merge sources.
    pub fn from_environment() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("rd")]).map_err(|err| ConfigError::Parse {
            origin: String::from("AWS environment"),
            message: err.to_string(),
        })
    }

    /// `AWS_REGION`, else `AWS_DEFAULT_REGION`, ignoring blank values.
    #[must_use]
    pub fn effective_region(&self) -> Option<&str> {
        non_blank(self.region.as_deref()).or_else(|| non_blank(self.default_region.as_deref()))
    }

    /// `AWS_PROFILE`, ignoring a blank value.
    #[must_use]
    pub fn effective_profile(&self) -> Option<&str> {
        non_blank(self.profile.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|text| !text.trim().is_empty())
}
