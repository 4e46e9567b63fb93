//! Durable key-value preferences (preferred unit, last searched location).
//!
//! Values are stored as plain strings; interpreting them is up to the caller.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const PREFERENCES_FILE: &str = "preferences.json";

/// The preference keys SkyCast persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PreferenceKey {
    PreferredUnit,
    LastSearchedLocation,
}

impl PreferenceKey {
    pub const ALL: [PreferenceKey; 2] = [
        PreferenceKey::PreferredUnit,
        PreferenceKey::LastSearchedLocation,
    ];

    /// Storage name of the key
    pub fn as_str(&self) -> &'static str {
        match self {
            PreferenceKey::PreferredUnit => "preferredUnit",
            PreferenceKey::LastSearchedLocation => "lastSearchedLocation",
        }
    }
}

/// Synchronous key-value preference storage.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: PreferenceKey) -> Option<String>;

    fn set(&self, key: PreferenceKey, value: &str) -> Result<()>;

    fn remove(&self, key: PreferenceKey) -> Result<()>;
}

/// File-backed preferences stored as a JSON object in the config directory.
///
/// The file is re-read on every access so values written by a previous
/// process are always visible.
pub struct FilePreferences {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FilePreferences {
    /// Preferences stored in `<config_dir>/preferences.json`
    pub fn new(config_dir: &Path) -> Self {
        Self {
            path: config_dir.join(PREFERENCES_FILE),
            write_lock: Mutex::new(()),
        }
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let json = fs::read_to_string(&self.path).context("Failed to read preferences file")?;

        if json.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&json).context("Failed to deserialize preferences")
    }

    fn write_all(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("Failed to create preferences directory")?;
        }

        let json = serde_json::to_string_pretty(values).context("Failed to serialize preferences")?;

        fs::write(&self.path, json).context("Failed to write preferences file")?;
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut values = match self.read_all() {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!("Discarding unreadable preferences at {:?}: {:#}", self.path, e);
                BTreeMap::new()
            }
        };
        f(&mut values);
        self.write_all(&values)
    }
}

impl PreferenceStore for FilePreferences {
    fn get(&self, key: PreferenceKey) -> Option<String> {
        match self.read_all() {
            Ok(mut values) => values.remove(key.as_str()),
            Err(e) => {
                tracing::warn!("Failed to read preferences: {:#}", e);
                None
            }
        }
    }

    fn set(&self, key: PreferenceKey, value: &str) -> Result<()> {
        self.update(|values| {
            values.insert(key.as_str().to_string(), value.to_string());
        })?;
        tracing::debug!("Stored preference {} = {}", key.as_str(), value);
        Ok(())
    }

    fn remove(&self, key: PreferenceKey) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        self.update(|values| {
            values.remove(key.as_str());
        })?;
        tracing::debug!("Removed preference {}", key.as_str());
        Ok(())
    }
}

/// In-memory preferences for tests and `--no-persist` runs.
#[derive(Default)]
pub struct MemoryPreferences {
    values: Mutex<BTreeMap<PreferenceKey, String>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: PreferenceKey) -> Option<String> {
        self.values.lock().get(&key).cloned()
    }

    fn set(&self, key: PreferenceKey, value: &str) -> Result<()> {
        self.values.lock().insert(key, value.to_string());
        Ok(())
    }

    fn remove(&self, key: PreferenceKey) -> Result<()> {
        self.values.lock().remove(&key);
        Ok(())
    }
}

impl<T: PreferenceStore + ?Sized> PreferenceStore for std::sync::Arc<T> {
    fn get(&self, key: PreferenceKey) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: PreferenceKey, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: PreferenceKey) -> Result<()> {
        (**self).remove(key)
    }
}
