//! Sender profile and shipping preferences, validated against an immutable
//! [`SettingsSpec`].

pub mod spec;
pub mod store;

pub use spec::{SettingDefinition, SettingType, SettingValue, SettingsSpec, SpecError};
pub use store::{SettingsError, SettingsMap, SettingsStore};
