use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sanitize::Sanitizer;

/// Declared shape of a setting value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettingType {
    #[serde(rename = "string")]
    String,
    #[serde(rename = "string[]")]
    StringArray,
}

impl SettingType {
    pub fn label(self) -> &'static str {
        match self {
            SettingType::String => "string",
            SettingType::StringArray => "string[]",
        }
    }

    /// Coerce a loosely typed JSON value into this shape.
    ///
    /// Scalars are stringified the way form submissions arrive; a lone string
    /// is accepted where a list is declared.
    pub fn coerce(self, raw: &Value) -> Result<SettingValue, String> {
        match (self, raw) {
            (SettingType::String, value) => scalar_text(value)
                .map(SettingValue::Text)
                .ok_or_else(|| format!("expected {}", self.label())),
            (SettingType::StringArray, Value::Array(items)) => items
                .iter()
                .map(|item| scalar_text(item).ok_or_else(|| format!("expected {}", self.label())))
                .collect::<Result<Vec<_>, _>>()
                .map(SettingValue::List),
            (SettingType::StringArray, value) => scalar_text(value)
                .map(|text| SettingValue::List(vec![text]))
                .ok_or_else(|| format!("expected {}", self.label())),
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// A setting value: a single string or an ordered list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Text(String),
    List(Vec<String>),
}

impl SettingValue {
    pub fn kind(&self) -> SettingType {
        match self {
            SettingValue::Text(_) => SettingType::String,
            SettingValue::List(_) => SettingType::StringArray,
        }
    }

    pub fn sanitized(&self, sanitizer: Sanitizer) -> SettingValue {
        match self {
            SettingValue::Text(text) => SettingValue::Text(sanitizer.apply(text)),
            SettingValue::List(items) => SettingValue::List(sanitizer.apply_all(items)),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            SettingValue::Text(text) => Value::String(text.clone()),
            SettingValue::List(items) => {
                Value::Array(items.iter().cloned().map(Value::String).collect())
            }
        }
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::Text(value.to_string())
    }
}

/// One entry of the settings specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingDefinition {
    #[serde(skip)]
    pub key: String,
    #[serde(rename = "type")]
    pub kind: SettingType,
    #[serde(rename = "value")]
    pub default: SettingValue,
    #[serde(skip)]
    pub sanitizer: Sanitizer,
}

impl SettingDefinition {
    pub fn text(key: &str, default: &str, sanitizer: Sanitizer) -> Self {
        Self {
            key: key.to_string(),
            kind: SettingType::String,
            default: SettingValue::Text(default.to_string()),
            sanitizer,
        }
    }

    pub fn list(key: &str, sanitizer: Sanitizer) -> Self {
        Self {
            key: key.to_string(),
            kind: SettingType::StringArray,
            default: SettingValue::List(Vec::new()),
            sanitizer,
        }
    }

    pub fn sanitize(&self, value: &SettingValue) -> SettingValue {
        value.sanitized(self.sanitizer)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpecError {
    #[error("setting '{0}' is declared more than once")]
    Duplicate(String),
    #[error("setting '{key}' declares {declared} but its default is {actual}")]
    DefaultMismatch {
        key: String,
        declared: &'static str,
        actual: &'static str,
    },
    #[error("setting keys must be non-empty")]
    EmptyKey,
}

/// Fixed mapping from setting key to type, default and sanitizer.
///
/// Built once at startup and shared read-only by the store and the API layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsSpec {
    definitions: BTreeMap<String, SettingDefinition>,
}

impl SettingsSpec {
    pub fn new(
        definitions: impl IntoIterator<Item = SettingDefinition>,
    ) -> Result<Self, SpecError> {
        let mut map = BTreeMap::new();
        for definition in definitions {
            if definition.key.trim().is_empty() {
                return Err(SpecError::EmptyKey);
            }
            if definition.default.kind() != definition.kind {
                return Err(SpecError::DefaultMismatch {
                    key: definition.key,
                    declared: definition.kind.label(),
                    actual: definition.default.kind().label(),
                });
            }
            if map.contains_key(&definition.key) {
                return Err(SpecError::Duplicate(definition.key));
            }
            map.insert(definition.key.clone(), definition);
        }
        Ok(Self { definitions: map })
    }

    /// Sender profile plus the carrier accounts used when buying labels.
    pub fn standard() -> Self {
        let mut map = BTreeMap::new();
        for definition in standard_definitions() {
            map.insert(definition.key.clone(), definition);
        }
        Self { definitions: map }
    }

    pub fn get(&self, key: &str) -> Option<&SettingDefinition> {
        self.definitions.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.definitions.contains_key(key)
    }

    pub fn definitions(&self) -> impl Iterator<Item = &SettingDefinition> {
        self.definitions.values()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn defaults(&self) -> BTreeMap<String, SettingValue> {
        self.definitions
            .values()
            .map(|definition| (definition.key.clone(), definition.default.clone()))
            .collect()
    }

    /// Public description handed to admin clients: `{key: {type, value}}`.
    pub fn describe(&self) -> BTreeMap<&str, &SettingDefinition> {
        self.definitions
            .iter()
            .map(|(key, definition)| (key.as_str(), definition))
            .collect()
    }
}

/// Definitions behind [`SettingsSpec::standard`].
fn standard_definitions() -> Vec<SettingDefinition> {
    vec![
        SettingDefinition::text("name", "", Sanitizer::TextField),
        SettingDefinition::text("company", "", Sanitizer::TextField),
        SettingDefinition::text("street1", "", Sanitizer::TextField),
        SettingDefinition::text("street2", "", Sanitizer::TextField),
        SettingDefinition::text("city", "", Sanitizer::TextField),
        SettingDefinition::text("state", "", Sanitizer::TextField),
        SettingDefinition::text("zip", "", Sanitizer::TextField),
        SettingDefinition::text("country", "US", Sanitizer::CountryCode),
        SettingDefinition::text("phone", "", Sanitizer::Phone),
        SettingDefinition::text("email", "", Sanitizer::Email),
        SettingDefinition::list("carrier_accounts", Sanitizer::TextField),
    ]
}
