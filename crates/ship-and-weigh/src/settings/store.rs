use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use super::spec::{SettingValue, SettingsSpec};
use crate::store::{option_key, OptionStore, StoreError};

/// Resolved settings keyed by setting name.
pub type SettingsMap = BTreeMap<String, SettingValue>;

/// Reads and writes settings one option per key.
#[derive(Clone)]
pub struct SettingsStore {
    spec: Arc<SettingsSpec>,
    options: Arc<dyn OptionStore>,
}

impl SettingsStore {
    pub fn new(spec: Arc<SettingsSpec>, options: Arc<dyn OptionStore>) -> Self {
        Self { spec, options }
    }

    pub fn spec(&self) -> &SettingsSpec {
        &self.spec
    }

    /// Every declared key with its persisted value, or the default when unset.
    pub fn get_settings(&self) -> Result<SettingsMap, SettingsError> {
        let mut settings = SettingsMap::new();
        for definition in self.spec.definitions() {
            let stored = self.options.get(&option_key(&definition.key))?;
            let value = match stored {
                None => definition.default.clone(),
                Some(raw) => match serde_json::from_value::<SettingValue>(raw) {
                    Ok(value) if value.kind() == definition.kind => value,
                    _ => {
                        warn!(
                            setting = %definition.key,
                            "persisted setting does not match its declared type; using default"
                        );
                        definition.default.clone()
                    }
                },
            };
            settings.insert(definition.key.clone(), value);
        }
        Ok(settings)
    }

    /// Validate, sanitize and persist the given settings, then return the full
    /// resulting mapping.
    ///
    /// Nothing is written unless every key is declared and every value has the
    /// declared type.
    pub fn save_settings(
        &self,
        input: &BTreeMap<String, Value>,
    ) -> Result<SettingsMap, SettingsError> {
        let mut sanitized = Vec::with_capacity(input.len());
        for (key, raw) in input {
            let definition = self
                .spec
                .get(key)
                .ok_or_else(|| SettingsError::UnknownSetting(key.clone()))?;
            let value = definition
                .kind
                .coerce(raw)
                .map_err(|reason| SettingsError::InvalidValue {
                    key: key.clone(),
                    reason,
                })?;
            sanitized.push((key, definition.sanitize(&value)));
        }

        for (key, value) in sanitized {
            self.options.set(&option_key(key), value.to_json())?;
            debug!(setting = %key, "setting saved");
        }

        self.get_settings()
    }
}

/// Error raised by the settings store.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("unknown setting '{0}'")]
    UnknownSetting(String),
    #[error("invalid value for setting '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}
