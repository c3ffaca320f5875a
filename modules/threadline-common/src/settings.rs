//! Key-value settings store: the fetch-service credential and the list of
//! handles to scrape per platform. The harvester core only reads it; the
//! mutation helpers exist for the `handles` CLI subcommands.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{Map, Value};

use crate::types::Platform;

pub const API_KEY_SETTING: &str = "apify_api_key";
pub const HANDLES_SETTING: &str = "social_handles";

/// Read-only view of the settings store, as the harvester core sees it.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    fn api_token(&self) -> Option<String> {
        self.get(API_KEY_SETTING)
            .and_then(|v| v.as_str().map(str::to_string))
            .filter(|t| !t.is_empty())
    }

    fn handles_for(&self, platform: Platform) -> Vec<String> {
        self.get(HANDLES_SETTING)
            .and_then(|v| v.get(platform.as_str()).cloned())
            .and_then(|v| v.as_array().cloned())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Settings backed by a single flat JSON object on disk, mirroring the
/// browser-local-storage layout this tool's data was originally kept in.
#[derive(Debug, Clone)]
pub struct JsonFileSettings {
    path: PathBuf,
    values: Map<String, Value>,
}

impl JsonFileSettings {
    /// Load from `path`. A missing file is an empty store, not an error;
    /// a present-but-unparseable file is.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text)
                .with_context(|| format!("parsing {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        };
        Ok(Self { path, values })
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let text = serde_json::to_string_pretty(&Value::Object(self.values.clone()))?;
        std::fs::write(&self.path, text)
            .with_context(|| format!("writing {}", self.path.display()))
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_string(), value);
    }

    /// Add a handle to a platform's list. Returns false if it was already
    /// present. A malformed settings value is replaced rather than erroring.
    pub fn add_handle(&mut self, platform: Platform, handle: &str) -> bool {
        let handles = self
            .values
            .entry(HANDLES_SETTING.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !handles.is_object() {
            *handles = Value::Object(Map::new());
        }
        let Value::Object(by_platform) = handles else {
            return false;
        };

        let list = by_platform
            .entry(platform.as_str().to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if !list.is_array() {
            *list = Value::Array(Vec::new());
        }
        let Value::Array(entries) = list else {
            return false;
        };

        if entries.iter().any(|v| v.as_str() == Some(handle)) {
            return false;
        }
        entries.push(Value::String(handle.to_string()));
        true
    }

    /// Remove a handle from a platform's list. Returns false if it wasn't
    /// there.
    pub fn remove_handle(&mut self, platform: Platform, handle: &str) -> bool {
        let Some(Value::Object(by_platform)) = self.values.get_mut(HANDLES_SETTING) else {
            return false;
        };
        let Some(Value::Array(entries)) = by_platform.get_mut(platform.as_str()) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|v| v.as_str() != Some(handle));
        entries.len() < before
    }
}

impl SettingsStore for JsonFileSettings {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let settings = JsonFileSettings::load(dir.path().join("settings.json")).unwrap();
        assert!(settings.api_token().is_none());
        assert!(settings.handles_for(Platform::Twitter).is_empty());
    }

    #[test]
    fn add_remove_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut settings = JsonFileSettings::load(&path).unwrap();
        assert!(settings.add_handle(Platform::Twitter, "acme"));
        assert!(!settings.add_handle(Platform::Twitter, "acme"), "duplicate add is a no-op");
        settings.set(API_KEY_SETTING, json!("apify_test_token"));
        settings.save().unwrap();

        let reloaded = JsonFileSettings::load(&path).unwrap();
        assert_eq!(reloaded.handles_for(Platform::Twitter), vec!["acme"]);
        assert_eq!(reloaded.api_token().as_deref(), Some("apify_test_token"));

        let mut reloaded = reloaded;
        assert!(reloaded.remove_handle(Platform::Twitter, "acme"));
        assert!(!reloaded.remove_handle(Platform::Twitter, "acme"));
        assert!(!reloaded.remove_handle(Platform::Facebook, "acme"));
    }

    #[test]
    fn handles_are_scoped_per_platform() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = JsonFileSettings::load(dir.path().join("s.json")).unwrap();
        settings.add_handle(Platform::Twitter, "a");
        settings.add_handle(Platform::Instagram, "b");

        assert_eq!(settings.handles_for(Platform::Twitter), vec!["a"]);
        assert_eq!(settings.handles_for(Platform::Instagram), vec!["b"]);
        assert!(settings.handles_for(Platform::Facebook).is_empty());
    }
}
