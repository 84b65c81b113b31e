use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, anyhow, bail};

use crate::api::{DEFAULT_BASE_URL, DEFAULT_LIST_LIMIT};
use crate::app::{ChatSettings, DEFAULT_TEMPERATURE};

/// Environment variable overriding the configured API base URL.
pub const API_URL_ENV: &str = "MESSENGER_API_URL";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub temperature: f32,
    pub list_limit: u32,
    pub system_prompt: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub tick_rate_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            list_limit: DEFAULT_LIST_LIMIT,
            system_prompt: None,
            request_timeout_secs: None,
            tick_rate_ms: 250,
        }
    }
}

impl Config {
    /// Load the user's config file, then apply the environment override.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::get_config_path()?)?;
        if let Ok(url) = std::env::var(API_URL_ENV) {
            config.base_url = url;
        }
        Ok(config)
    }

    /// Missing file means defaults; keys absent from the file keep their
    /// default values.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)
            .map_err(|e| anyhow!("Invalid config file {:?}: {}", path, e))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf> {
        let config_path = Self::get_config_path()?;
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// Reject values the chat service would refuse anyway.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.temperature) {
            bail!("temperature must be between 0.0 and 1.0, got {}", self.temperature);
        }
        if self.list_limit == 0 {
            bail!("list limit must be at least 1");
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            bail!("base URL must start with http:// or https://, got {}", self.base_url);
        }
        Ok(())
    }

    pub fn chat_settings(&self) -> ChatSettings {
        ChatSettings {
            temperature: self.temperature,
            list_limit: self.list_limit,
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.tick_rate_ms.max(16))
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("messenger-tui").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.base_url, "http://localhost:8000/api");
        assert!((config.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.list_limit, 50);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"base_url": "https://chat.example.com/api", "list_limit": 20}"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();

        assert_eq!(config.base_url, "https://chat.example.com/api");
        assert_eq!(config.list_limit, 20);
        assert_eq!(config.tick_rate_ms, Config::default().tick_rate_ms);
        assert_eq!(config.system_prompt, None);
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            system_prompt: Some("Be brief".to_string()),
            request_timeout_secs: Some(30),
            ..Config::default()
        };

        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();

        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_validate() {
        assert!(Config::default().validate().is_ok());

        let hot = Config { temperature: 1.5, ..Config::default() };
        assert!(hot.validate().is_err());

        let no_scheme = Config { base_url: "localhost:8000".to_string(), ..Config::default() };
        assert!(no_scheme.validate().is_err());

        let empty_page = Config { list_limit: 0, ..Config::default() };
        assert!(empty_page.validate().is_err());
    }

    #[test]
    fn test_durations() {
        let config = Config {
            tick_rate_ms: 1,
            request_timeout_secs: Some(10),
            ..Config::default()
        };
        assert_eq!(config.tick_rate(), Duration::from_millis(16));
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(10)));
        assert_eq!(Config::default().request_timeout(), None);
    }
}
