use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use super::{OptionStore, StoreError};

/// Process-local option table, used by tests and when no store path is set.
#[derive(Debug, Default, Clone)]
pub struct InMemoryOptionStore {
    options: Arc<Mutex<HashMap<String, Value>>>,
}

impl InMemoryOptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        let guard = self.options.lock().map_err(|_| StoreError::poisoned())?;
        Ok(guard.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

impl OptionStore for InMemoryOptionStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let guard = self.options.lock().map_err(|_| StoreError::poisoned())?;
        Ok(guard.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut guard = self.options.lock().map_err(|_| StoreError::poisoned())?;
        guard.insert(key.to_string(), value);
        Ok(())
    }

    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<Value>) -> Result<Value, StoreError>,
    ) -> Result<Value, StoreError> {
        let mut guard = self.options.lock().map_err(|_| StoreError::poisoned())?;
        let next = apply(guard.get(key).cloned())?;
        guard.insert(key.to_string(), next.clone());
        Ok(next)
    }
}
