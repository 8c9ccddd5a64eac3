//! Key/value persistence backends for the settings record.
//!
//! A store maps string keys to JSON values, like browser local storage.
//! [`JsonFileStore`] keeps every key in one flat JSON object on disk;
//! [`MemoryStore`] keeps them in process.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use gifcut_common::{Error, Result};
use parking_lot::Mutex;
use serde_json::{Map, Value};

/// Storage backend for persisted settings.
pub trait SettingsStore: Send + Sync {
    /// Read the value stored under `key`, `None` if absent.
    fn read(&self, key: &str) -> Result<Option<Value>>;

    /// Store `value` under `key`, replacing any previous value.
    fn write(&self, key: &str, value: &Value) -> Result<()>;
}

// ---------------------------------------------------------------------------
// JsonFileStore
// ---------------------------------------------------------------------------

/// A flat JSON object on disk, one entry per key.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.config/gifcut/settings.json`, or `./gifcut-settings.json` when the
    /// home directory cannot be resolved.
    pub fn default_path() -> PathBuf {
        let expanded = shellexpand::tilde("~/.config/gifcut/settings.json");
        if expanded.starts_with('~') {
            PathBuf::from("gifcut-settings.json")
        } else {
            PathBuf::from(expanded.as_ref())
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the whole object. A missing file is empty; a corrupt file is
    /// logged and treated as empty so the next write replaces it.
    fn load_map(&self) -> Result<Map<String, Value>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => {
                return Err(Error::Settings(format!(
                    "failed to read {}: {e}",
                    self.path.display()
                )))
            }
        };

        match serde_json::from_str::<Value>(&contents) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => {
                tracing::warn!(
                    "Settings file {} is not a JSON object; ignoring it",
                    self.path.display()
                );
                Ok(Map::new())
            }
            Err(e) => {
                tracing::warn!(
                    "Settings file {} is corrupt ({e}); ignoring it",
                    self.path.display()
                );
                Ok(Map::new())
            }
        }
    }
}

impl SettingsStore for JsonFileStore {
    fn read(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.load_map()?.remove(key))
    }

    fn write(&self, key: &str, value: &Value) -> Result<()> {
        let mut map = self.load_map()?;
        map.insert(key.to_string(), value.clone());

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::Settings(format!("failed to create {}: {e}", parent.display()))
                })?;
            }
        }

        let contents = serde_json::to_string_pretty(&Value::Object(map))
            .map_err(|e| Error::Settings(format!("failed to serialize settings: {e}")))?;

        // Write to a sibling file first so a crash never leaves half a record.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, contents)
            .map_err(|e| Error::Settings(format!("failed to write {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            Error::Settings(format!("failed to replace {}: {e}", self.path.display()))
        })?;

        tracing::debug!("Saved settings key '{key}' to {}", self.path.display());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-process store for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn write(&self, key: &str, value: &Value) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.clone());
        Ok(())
    }
}
