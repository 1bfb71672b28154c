//! YAML-backed user settings.
//!
//! Every read re-parses the file and every write overwrites it in full.
//! There is no cache and no temp-file-then-rename.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai_api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gemini_api_key: Option<String>,
    /// Keys we don't recognize, kept so a save doesn't drop them.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Settings {
    pub fn openai_key(&self) -> Option<&str> {
        nonempty(&self.openai_api_key)
    }

    pub fn gemini_key(&self) -> Option<&str> {
        nonempty(&self.gemini_api_key)
    }

    /// `(api_url, api_token)` when both are set.
    pub fn paperless(&self) -> Option<(&str, &str)> {
        Some((nonempty(&self.api_url)?, nonempty(&self.api_token)?))
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "api_url" => self.api_url.clone(),
            "api_token" => self.api_token.clone(),
            "openai_api_key" => self.openai_api_key.clone(),
            "gemini_api_key" => self.gemini_api_key.clone(),
            other => self.extra.get(other).map(|v| match v {
                serde_yaml::Value::String(s) => s.clone(),
                v => serde_yaml::to_string(v)
                    .map(|s| s.trim_end().to_string())
                    .unwrap_or_default(),
            }),
        }
    }

    pub fn set(&mut self, key: &str, value: String) {
        match key {
            "api_url" => self.api_url = Some(value),
            "api_token" => self.api_token = Some(value),
            "openai_api_key" => self.openai_api_key = Some(value),
            "gemini_api_key" => self.gemini_api_key = Some(value),
            other => {
                self.extra
                    .insert(other.to_string(), serde_yaml::Value::String(value));
            }
        }
    }
}

fn nonempty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[derive(Clone, Debug)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file loads as empty settings. `None` means the file exists
    /// but could not be read or parsed; the cause is logged.
    pub fn load(&self) -> Option<Settings> {
        match self.try_load() {
            Ok(settings) => Some(settings),
            Err(e) => {
                tracing::error!(path = %self.path.display(), "Error loading config: {}", e);
                None
            }
        }
    }

    fn try_load(&self) -> Result<Settings, ConfigError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "Config file not found");
                return Ok(Settings::default());
            }
            Err(e) => return Err(e.into()),
        };
        if contents.trim().is_empty() {
            return Ok(Settings::default());
        }
        // A document that is just `null` or `~` is also empty.
        let settings: Option<Settings> = serde_yaml::from_str(&contents)?;
        Ok(settings.unwrap_or_default())
    }

    pub fn save(&self, settings: &Settings) -> Result<(), ConfigError> {
        let yaml = serde_yaml::to_string(settings)?;
        std::fs::write(&self.path, yaml).inspect_err(|e| {
            tracing::error!(path = %self.path.display(), "Error saving config: {}", e);
        })?;
        tracing::debug!(path = %self.path.display(), "Config saved");
        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        self.load()?.get(key)
    }

    /// Not atomic: two concurrent callers can lose one another's write.
    pub fn set_value(&self, key: &str, value: impl Into<String>) -> Result<(), ConfigError> {
        let mut settings = self.load().unwrap_or_default();
        settings.set(key, value.into());
        self.save(&settings)
    }
}
