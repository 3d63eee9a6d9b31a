//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! backend URL, refresh endpoint, request timeout, where tokens are kept
//! and the last used username.
//!
//! Configuration is stored at `~/.config/fundportal/config.json`.
//! `FUNDPORTAL_API_URL` and `FUNDPORTAL_USERNAME` override the file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::gateway::DEFAULT_REFRESH_PATH;
use crate::auth::{FileTokenStore, KeyringTokenStore, MemoryTokenStore, TokenStore};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "fundportal";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// HTTP request timeout in seconds
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const API_URL_ENV: &str = "FUNDPORTAL_API_URL";
pub const USERNAME_ENV: &str = "FUNDPORTAL_USERNAME";

/// Where the session tokens are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStorage {
    /// `tokens.json` in the cache directory
    #[default]
    File,
    /// OS keychain
    Keyring,
    /// Process memory only; the session ends with the process
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub refresh_path: String,
    pub request_timeout_secs: u64,
    pub token_storage: TokenStorage,
    pub last_username: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            token_storage: TokenStorage::default(),
            last_username: None,
        }
    }
}

impl Config {
    /// Load from the default location and apply environment overrides.
    ///
    /// The result is not validated; callers layer their own overrides on
    /// top and validate the final value. Overrides never reach the file:
    /// persist settings through `remember_username`.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(std::env::var(API_URL_ENV).ok(), std::env::var(USERNAME_ENV).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    /// Record the last used username in the config file, leaving every
    /// other persisted setting as the file has it
    pub fn remember_username(username: &str) -> Result<()> {
        Self::remember_username_in(&Self::config_path()?, username)
    }

    pub fn remember_username_in(path: &Path, username: &str) -> Result<()> {
        let mut stored = Self::load_from(path)?;
        stored.last_username = Some(username.to_string());
        stored.save_to(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply non-empty override values on top of the file settings
    pub fn apply_overrides(&mut self, api_url: Option<String>, username: Option<String>) {
        if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
            self.api_base_url = url.trim().to_string();
        }
        if let Some(name) = username.filter(|u| !u.trim().is_empty()) {
            self.last_username = Some(name.trim().to_string());
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.api_base_url.starts_with("https://") || self.api_base_url.starts_with("http://")) {
            bail!("api_base_url must start with http:// or https://: {}", self.api_base_url);
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be greater than zero");
        }
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Open the configured token store
    pub fn token_store(&self) -> Result<Arc<dyn TokenStore>> {
        Ok(match self.token_storage {
            TokenStorage::File => Arc::new(FileTokenStore::new(&self.cache_dir()?)),
            TokenStorage::Keyring => Arc::new(KeyringTokenStore::new()),
            TokenStorage::Memory => Arc::new(MemoryTokenStore::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.refresh_path, "/api/auth/refresh-token");
        assert_eq!(config.token_storage, TokenStorage::File);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"api_base_url": "https://portal.example.com", "token_storage": "keyring"}"#)
                .unwrap();
        assert_eq!(config.api_base_url, "https://portal.example.com");
        assert_eq!(config.token_storage, TokenStorage::Keyring);
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config.apply_overrides(Some(" https://api.example.com ".to_string()), Some(String::new()));
        assert_eq!(config.api_base_url, "https://api.example.com");
        assert_eq!(config.last_username, None);

        config.apply_overrides(None, Some("ana".to_string()));
        assert_eq!(config.last_username.as_deref(), Some("ana"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config {
            api_base_url: "portal.example.com".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());

        config.api_base_url = "https://portal.example.com".to_string();
        config.request_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let path = std::env::temp_dir()
            .join(format!("fundportal-config-{}", std::process::id()))
            .join(CONFIG_FILE);
        let config = Config {
            last_username: Some("ana".to_string()),
            token_storage: TokenStorage::Memory,
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.last_username.as_deref(), Some("ana"));
        assert_eq!(loaded.token_storage, TokenStorage::Memory);

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn test_remember_username_keeps_file_settings() {
        let path = std::env::temp_dir()
            .join(format!("fundportal-remember-{}", std::process::id()))
            .join(CONFIG_FILE);
        Config {
            api_base_url: "https://portal.example.com".to_string(),
            ..Config::default()
        }
        .save_to(&path)
        .unwrap();

        // A one-off override on the in-memory config
        let mut config = Config::load_from(&path).unwrap();
        config.apply_overrides(Some("https://staging.example.com".to_string()), None);
        Config::remember_username_in(&path, "ana").unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.api_base_url, "https://portal.example.com");
        assert_eq!(loaded.last_username.as_deref(), Some("ana"));

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn test_override_rescues_bad_file_url() {
        let mut config = Config {
            api_base_url: "portal.example.com".to_string(),
            ..Config::default()
        };
        config.apply_overrides(Some("https://portal.example.com".to_string()), None);
        assert!(config.validate().is_ok());
    }
}
