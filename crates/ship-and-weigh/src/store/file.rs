use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::Value;
use tracing::debug;

use super::{OptionStore, StoreError};

/// Option table persisted as a single JSON document.
///
/// Every write rewrites the whole document through a sibling temp file and a
/// rename, all under one lock, so readers never observe a torn file.
#[derive(Debug)]
pub struct FileOptionStore {
    path: PathBuf,
    options: Mutex<BTreeMap<String, Value>>,
}

impl FileOptionStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let options = if path.exists() {
            let raw = fs::read(&path)?;
            if raw.iter().all(u8::is_ascii_whitespace) {
                BTreeMap::new()
            } else {
                serde_json::from_slice(&raw)?
            }
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            BTreeMap::new()
        };

        debug!(path = %path.display(), options = options.len(), "opened option store");
        Ok(Self {
            path,
            options: Mutex::new(options),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, options: &BTreeMap<String, Value>) -> Result<(), StoreError> {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let mut file = fs::File::create(&tmp)?;
        file.write_all(&serde_json::to_vec_pretty(options)?)?;
        file.sync_all()?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl OptionStore for FileOptionStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let guard = self.options.lock().map_err(|_| StoreError::poisoned())?;
        Ok(guard.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut guard = self.options.lock().map_err(|_| StoreError::poisoned())?;
        let previous = guard.insert(key.to_string(), value);
        if let Err(err) = self.flush(&guard) {
            match previous {
                Some(previous) => guard.insert(key.to_string(), previous),
                None => guard.remove(key),
            };
            return Err(err);
        }
        Ok(())
    }

    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<Value>) -> Result<Value, StoreError>,
    ) -> Result<Value, StoreError> {
        let mut guard = self.options.lock().map_err(|_| StoreError::poisoned())?;
        let previous = guard.get(key).cloned();
        let next = apply(previous.clone())?;
        guard.insert(key.to_string(), next.clone());
        if let Err(err) = self.flush(&guard) {
            match previous {
                Some(previous) => guard.insert(key.to_string(), previous),
                None => guard.remove(key),
            };
            return Err(err);
        }
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("options.json");

        let store = FileOptionStore::open(&path).expect("store opens");
        store.set("zip", json!("97201")).expect("set works");
        store
            .update("list", &mut |_| Ok(json!(["a", "b"])))
            .expect("update works");
        drop(store);

        let reopened = FileOptionStore::open(&path).expect("store reopens");
        assert_eq!(reopened.get("zip").expect("get"), Some(json!("97201")));
        assert_eq!(reopened.get("list").expect("get"), Some(json!(["a", "b"])));
    }

    #[test]
    fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("options.json");

        let store = FileOptionStore::open(&path).expect("store opens");
        store.set("city", json!("Portland")).expect("set works");
        assert!(path.exists());
        assert_eq!(store.path(), path.as_path());
    }

    #[test]
    fn rejects_corrupt_documents() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("options.json");
        fs::write(&path, b"{not json").expect("write fixture");

        assert!(matches!(
            FileOptionStore::open(&path),
            Err(StoreError::Serialization(_))
        ));
    }
}
