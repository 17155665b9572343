//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the photo service API key, the store location, and the
//! persisted map preferences (last map region and the first-launch flag).
//!
//! Configuration is stored at `~/.config/pincache/config.json`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::Coordinate;

/// Application name used for config/data directory paths
const APP_NAME: &str = "pincache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Store directory name under the data directory
const STORE_DIR: &str = "store";

/// Environment variable that overrides the configured API key
pub const API_KEY_ENV: &str = "FLICKR_API_KEY";

/// Visible map area, restored across sessions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapRegion {
    pub center: Coordinate,
    pub latitude_delta: f64,
    pub longitude_delta: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_key: Option<String>,
    pub store_dir: Option<PathBuf>,
    pub map_region: Option<MapRegion>,
    #[serde(default)]
    pub has_launched_before: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory for application data (store, logs).
    pub fn data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn store_dir(&self) -> Result<PathBuf> {
        match &self.store_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::data_dir()?.join(STORE_DIR)),
        }
    }

    /// API key from the environment, falling back to the config file.
    pub fn api_key(&self) -> Result<String> {
        Self::resolve_api_key(std::env::var(API_KEY_ENV).ok(), self.api_key.as_deref())
    }

    fn resolve_api_key(env: Option<String>, configured: Option<&str>) -> Result<String> {
        env.filter(|k| !k.trim().is_empty())
            .or_else(|| configured.filter(|k| !k.trim().is_empty()).map(str::to_string))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "No API key configured. Set {} or add \"api_key\" to the config file",
                    API_KEY_ENV
                )
            })
    }

    /// Returns true the first time it is called for this config, then
    /// records that the app has launched.
    pub fn mark_launched(&mut self) -> bool {
        let first = !self.has_launched_before;
        self.has_launched_before = true;
        first
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_config_is_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config::load_from(&dir.path().join("config.json")).expect("load");
        assert!(config.api_key.is_none());
        assert!(!config.has_launched_before);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        assert!(config.mark_launched());
        assert!(!config.mark_launched());
        config.map_region = Some(MapRegion {
            center: Coordinate::new(37.7749, -122.4194),
            latitude_delta: 0.2,
            longitude_delta: 0.2,
        });
        config.save_to(&path).expect("save");

        let loaded = Config::load_from(&path).expect("load");
        assert!(loaded.has_launched_before);
        assert_eq!(loaded.map_region, config.map_region);
    }

    #[test]
    fn test_resolve_api_key_prefers_environment() {
        let key = Config::resolve_api_key(Some("from-env".into()), Some("from-file")).unwrap();
        assert_eq!(key, "from-env");

        let key = Config::resolve_api_key(Some("  ".into()), Some("from-file")).unwrap();
        assert_eq!(key, "from-file");

        assert!(Config::resolve_api_key(None, None).is_err());
    }

    #[test]
    fn test_store_dir_override() {
        let config = Config {
            store_dir: Some(PathBuf::from("/tmp/pins")),
            ..Config::default()
        };
        assert_eq!(config.store_dir().unwrap(), PathBuf::from("/tmp/pins"));
    }

    #[test]
    fn test_corrupt_config_reports_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
