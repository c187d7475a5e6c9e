use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ChatError, ChatResult};

/// Environment variable that overrides the configured backend URL
pub const API_URL_ENV: &str = "BACKOFFICE_CHAT_API_URL";

const DEFAULT_API_URL: &str = "http://localhost:3001";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    /// Dictation language; detected from the locale when unset
    pub language: Option<String>,
    pub use_context: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            language: None,
            use_context: true,
        }
    }

    /// Load from the user config directory, falling back to defaults.
    /// The API URL environment override is applied either way.
    pub fn load() -> ChatResult<Self> {
        let mut config = match Self::get_config_path() {
            Some(path) => Self::load_from(&path)?,
            None => Self::new(),
        };
        config.apply_env_override(std::env::var(API_URL_ENV).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> ChatResult<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> ChatResult<()> {
        let config_path = Self::get_config_path().ok_or_else(|| {
            ChatError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine config directory",
            ))
        })?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, path: &Path) -> ChatResult<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    fn apply_env_override(&mut self, api_url: Option<String>) {
        if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
            self.api_url = url.trim().trim_end_matches('/').to_string();
        }
    }

    fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("backoffice-chat").join("config.json"))
    }
}
