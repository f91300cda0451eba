//! Key-value persistence for plugin options.
//!
//! The hosting platform owns the real options table; this module describes the
//! slice of it the stores rely on and ships two local backends.

mod file;
mod memory;

pub use file::FileOptionStore;
pub use memory::InMemoryOptionStore;

use serde_json::Value;

/// Prefix shared by every option this service writes.
pub const OPTION_PREFIX: &str = "sg_ship_and_weigh_";

pub fn option_key(name: &str) -> String {
    format!("{OPTION_PREFIX}{name}")
}

/// Storage abstraction over the platform's options table.
pub trait OptionStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
    fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Atomic read-modify-write of a single option.
    ///
    /// `apply` receives the current value and returns the replacement. When it
    /// fails nothing is written.
    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<Value>) -> Result<Value, StoreError>,
    ) -> Result<Value, StoreError>;
}

/// Error enumeration for persistence failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("option store unavailable: {0}")]
    Unavailable(String),
    #[error("option '{key}' holds unexpected data: {reason}")]
    Corrupt { key: String, reason: String },
    #[error("option store io failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("option store serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn poisoned() -> Self {
        Self::Unavailable("option store lock poisoned".to_string())
    }
}
