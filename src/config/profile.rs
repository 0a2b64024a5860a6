//! Profile overlay for the JSON configuration document.

use serde_json::{Map, Value};

use super::ConfigError;

/// Keys that only drive profile selection and never reach the resolved view.
pub const PROFILE_SELECTION_KEYS: [&str; 2] = ["profiles", "default_profile"];

/// Flat key/value view of the configuration after the profile overlay.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConfigProfile {
    values: Map<String, Value>,
}

impl ConfigProfile {
    /// Profile with no keys; every accessor falls back to its default.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Resolves `document` for `profile`, or for the document's
    /// `default_profile` when no name is given.
    ///
    /// Lists are concatenated base first, mappings are merged one level deep
    /// with the profile winning, and everything else is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when the document or a profile is
    /// not a JSON object, and [`ConfigError::UnknownProfile`] when the selected
    /// profile does not exist.
    pub fn resolve(document: Value, profile: Option<&str>) -> Result<Self, ConfigError> {
        let Value::Object(mut raw) = document else {
            return Err(ConfigError::InvalidValue {
                key: String::from("<root>"),
                message: String::from("configuration must be a JSON object"),
            });
        };

        let selected = match profile {
            Some(name) => Some(name.to_owned()),
            None => default_profile_name(&raw)?,
        };
        let overrides = match selected {
            Some(name) => Some(take_profile(&mut raw, &name)?),
            None => None,
        };

        let mut values: Map<String, Value> = raw
            .into_iter()
            .filter(|(key, _)| !PROFILE_SELECTION_KEYS.contains(&key.as_str()))
            .collect();
        if let Some(profile_values) = overrides {
            overlay(&mut values, profile_values);
        }
        Ok(Self { values })
    }

    /// Raw value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Whether `key` is set to a non-null value.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some_and(|value| !value.is_null())
    }

    /// All resolved keys in file order.
    #[must_use]
    pub const fn values(&self) -> &Map<String, Value> {
        &self.values
    }
}

fn default_profile_name(raw: &Map<String, Value>) -> Result<Option<String>, ConfigError> {
    match raw.get("default_profile") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(name)) if name.is_empty() => Ok(None),
        Some(Value::String(name)) => Ok(Some(name.clone())),
        Some(_) => Err(ConfigError::InvalidValue {
            key: String::from("default_profile"),
            message: String::from("expected a profile name"),
        }),
    }
}

fn take_profile(raw: &mut Map<String, Value>, name: &str) -> Result<Map<String, Value>, ConfigError> {
    let unknown = || ConfigError::UnknownProfile {
        name: name.to_owned(),
    };
    let Some(Value::Object(profiles)) = raw.get_mut("profiles") else {
        return Err(unknown());
    };
    match profiles.remove(name) {
        Some(Value::Object(values)) => Ok(values),
        Some(_) => Err(ConfigError::InvalidValue {
            key: format!("profiles.{name}"),
            message: String::from("profile must be a JSON object"),
        }),
        None => Err(unknown()),
    }
}

fn overlay(base: &mut Map<String, Value>, overrides: Map<String, Value>) {
    for (key, value) in overrides {
        if PROFILE_SELECTION_KEYS.contains(&key.as_str()) {
            continue;
        }
        let replacement = match (base.get_mut(&key), value) {
            (Some(Value::Array(existing)), Value::Array(extra)) => {
                existing.extend(extra);
                None
            }
            (Some(Value::Object(existing)), Value::Object(extra)) => {
                existing.extend(extra);
                None
            }
            (_, other) => Some(other),
        };
        if let Some(replaced) = replacement {
            base.insert(key, replaced);
        }
    }
}
