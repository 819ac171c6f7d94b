//! Application settings management

use crate::PathManager;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Application settings stored in settings.toml, overridable from the environment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Gemini API key. Never written back to disk by `save`.
    #[serde(skip_serializing)]
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: String,
    /// Model used for mentor chat and hints
    pub chat_model: String,
    /// Model used to guess the relevant file for an issue
    pub file_finder_model: String,
    /// Backend invocations allowed per completion call
    pub max_attempts: u32,
    pub cache_ttl_secs: u64,
    pub sweep_interval_secs: u64,
    /// Timeout applied to every single backend invocation
    pub backend_timeout_secs: u64,
    /// Share one backend call between concurrent identical requests
    pub coalesce_in_flight: bool,
    /// SQLite database for chat history; in-memory storage when unset
    pub database_path: Option<PathBuf>,
    /// Mark the session cookie `Secure`
    pub secure_cookies: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            chat_model: "gemini-2.5-flash".to_string(),
            file_finder_model: "gemini-1.5-flash-latest".to_string(),
            max_attempts: 4,
            cache_ttl_secs: 3600,
            sweep_interval_secs: 60,
            backend_timeout_secs: 30,
            coalesce_in_flight: false,
            database_path: None,
            secure_cookies: false,
        }
    }
}

impl Settings {
    /// Load settings from the settings file, or return defaults if there is none.
    /// A file that exists but cannot be read or parsed is an error.
    pub fn load() -> Result<Self, String> {
        match PathManager::settings_path() {
            Some(path) => Self::load_from_path(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(format!("Failed to read {}: {}", path.display(), e)),
        };

        Self::from_toml_str(&content).map_err(|e| format!("{} ({})", e, path.display()))
    }

    /// Load the settings file and apply overrides from the process environment
    pub fn load_with_env() -> Result<Self, String> {
        let mut settings = Self::load()?;
        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("Failed to parse settings: {}", e))
    }

    /// Override fields from environment-style variables.
    /// Unset or empty variables leave the current value untouched.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("GEMINI_API_KEY") {
            self.gemini_api_key = Some(v);
        }
        if let Some(v) = get("GEMINI_BASE_URL") {
            self.gemini_base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = get("MENTOR_CHAT_MODEL") {
            self.chat_model = v;
        }
        if let Some(v) = get("MENTOR_FILE_FINDER_MODEL") {
            self.file_finder_model = v;
        }
        if let Some(v) = get("MENTOR_MAX_ATTEMPTS") {
            self.max_attempts = parse_var("MENTOR_MAX_ATTEMPTS", &v)?;
        }
        if let Some(v) = get("MENTOR_CACHE_TTL_SECS") {
            self.cache_ttl_secs = parse_var("MENTOR_CACHE_TTL_SECS", &v)?;
        }
        if let Some(v) = get("MENTOR_SWEEP_INTERVAL_SECS") {
            self.sweep_interval_secs = parse_var("MENTOR_SWEEP_INTERVAL_SECS", &v)?;
        }
        if let Some(v) = get("MENTOR_BACKEND_TIMEOUT_SECS") {
            self.backend_timeout_secs = parse_var("MENTOR_BACKEND_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("MENTOR_COALESCE_IN_FLIGHT") {
            self.coalesce_in_flight = parse_var("MENTOR_COALESCE_IN_FLIGHT", &v)?;
        }
        if let Some(v) = get("MENTOR_DATABASE_PATH") {
            self.database_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("MENTOR_SECURE_COOKIES") {
            self.secure_cookies = parse_var("MENTOR_SECURE_COOKIES", &v)?;
        }

        if self.max_attempts == 0 {
            return Err("MENTOR_MAX_ATTEMPTS must be at least 1".to_string());
        }
        Ok(())
    }

    /// Save settings to the settings file
    pub fn save(&self) -> Result<(), String> {
        let path = PathManager::settings_path().ok_or("Could not determine settings path")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config dir: {}", e))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;
        fs::write(&path, content).map_err(|e| format!("Failed to write settings: {}", e))?;
        Ok(())
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("Invalid value for {}: {:?}", key, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.max_attempts, 4);
        assert_eq!(settings.cache_ttl_secs, 3600);
        assert_eq!(settings.sweep_interval_secs, 60);
        assert_eq!(settings.backend_timeout_secs, 30);
        assert!(!settings.coalesce_in_flight);
        assert!(settings.gemini_api_key.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings = Settings::from_toml_str("max_attempts = 6\nchat_model = \"gemini-pro\"\n").unwrap();
        assert_eq!(settings.max_attempts, 6);
        assert_eq!(settings.chat_model, "gemini-pro");
        assert_eq!(settings.cache_ttl_secs, 3600);
    }

    #[test]
    fn test_env_overrides() {
        let mut settings = Settings::default();
        settings
            .apply_env(env(&[
                ("GEMINI_API_KEY", "secret"),
                ("GEMINI_BASE_URL", "http://localhost:9000/models/"),
                ("MENTOR_MAX_ATTEMPTS", "2"),
                ("MENTOR_COALESCE_IN_FLIGHT", "true"),
                ("MENTOR_CACHE_TTL_SECS", ""),
            ]))
            .unwrap();

        assert_eq!(settings.gemini_api_key.as_deref(), Some("secret"));
        assert_eq!(settings.gemini_base_url, "http://localhost:9000/models");
        assert_eq!(settings.max_attempts, 2);
        assert!(settings.coalesce_in_flight);
        assert_eq!(settings.cache_ttl_secs, 3600);
    }

    #[test]
    fn test_invalid_env_value_is_rejected() {
        let mut settings = Settings::default();
        let err = settings
            .apply_env(env(&[("MENTOR_MAX_ATTEMPTS", "many")]))
            .unwrap_err();
        assert!(err.contains("MENTOR_MAX_ATTEMPTS"));

        let err = settings
            .apply_env(env(&[("MENTOR_MAX_ATTEMPTS", "0")]))
            .unwrap_err();
        assert!(err.contains("at least 1"));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from_path(&dir.path().join("settings.toml")).unwrap();
        assert_eq!(settings.max_attempts, 4);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "max_attempts = \"four\"\n").unwrap();

        let err = Settings::load_from_path(&path).unwrap_err();
        assert!(err.contains("Failed to parse settings"));
        assert!(err.contains("settings.toml"));
    }

    #[test]
    fn test_api_key_not_serialized() {
        let settings = Settings {
            gemini_api_key: Some("secret".to_string()),
            ..Settings::default()
        };
        let toml = toml::to_string_pretty(&settings).unwrap();
        assert!(!toml.contains("secret"));
    }
}
