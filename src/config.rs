use anyhow::{anyhow, Result};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MAX_EMAIL_LENGTH: usize = 5_000;
pub const DEFAULT_MAX_TOKENS: u32 = 1024;
pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";

pub fn default_models() -> Vec<String> {
    [
        "claude-sonnet-4-20250514",
        "claude-3-5-sonnet-20241022",
        "claude-3-5-sonnet-20240620",
        "claude-3-sonnet-20240229",
        "claude-3-opus-20240229",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_max_email_length() -> usize {
    DEFAULT_MAX_EMAIL_LENGTH
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub anthropic_api_key: Option<String>,
    #[serde(default)]
    pub use_mock: bool,
    #[serde(default = "default_timeout_ms")]
    pub api_timeout_ms: u64,
    #[serde(default = "default_max_email_length")]
    pub max_email_length: usize,
    #[serde(default = "default_models")]
    pub models: Vec<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            anthropic_api_key: None,
            use_mock: false,
            api_timeout_ms: DEFAULT_TIMEOUT_MS,
            max_email_length: DEFAULT_MAX_EMAIL_LENGTH,
            models: default_models(),
            max_tokens: DEFAULT_MAX_TOKENS,
            api_url: default_api_url(),
            port: DEFAULT_PORT,
        }
    }
}

/// Validated, immutable settings handed to clients at construction time.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: String,
    pub use_mock: bool,
    pub timeout: Duration,
    pub max_email_length: usize,
    pub models: Vec<String>,
    pub max_tokens: u32,
    pub api_url: String,
    pub port: u16,
}

impl Settings {
    /// Settings for tests and embedding, with defaults around the given key.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        let defaults = Config::default();
        Self {
            api_key: api_key.into(),
            use_mock: false,
            timeout: Duration::from_millis(defaults.api_timeout_ms),
            max_email_length: defaults.max_email_length,
            models: defaults.models,
            max_tokens: defaults.max_tokens,
            api_url: defaults.api_url,
            port: defaults.port,
        }
    }
}

/// Parses a positive integer, falling back to `default` with a warning.
fn parse_positive<T>(name: &str, raw: &str, default: T) -> T
where
    T: std::str::FromStr + PartialOrd + Default + Copy + std::fmt::Display,
{
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => value,
        _ => {
            warn!("{} is invalid ({:?}). Using default: {}", name, raw, default);
            default
        }
    }
}

/// Reads an on/off switch. Unrecognized values count as off.
fn parse_flag(name: &str, raw: &str) -> bool {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "" | "0" | "false" | "no" | "off" => false,
        _ => {
            warn!("{} is not a recognized switch ({:?}). Treating it as off", name, raw);
            false
        }
    }
}

impl Config {
    /// Load configuration from file, `.env`, and environment variables
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::get_config_path()
            .and_then(|path| Self::load_from_path(&path))
            .unwrap_or_else(|_| {
                info!("No config file found, using defaults");
                Self::default()
            });

        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Environment variables override the config file.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(api_key) = var("ANTHROPIC_API_KEY") {
            self.anthropic_api_key = Some(api_key);
        }

        if let Some(raw) = var("EMAIL_RESPONDER_USE_MOCK") {
            self.use_mock = parse_flag("EMAIL_RESPONDER_USE_MOCK", &raw);
        }

        if let Some(raw) = var("EMAIL_RESPONDER_TIMEOUT_MS") {
            self.api_timeout_ms = parse_positive("EMAIL_RESPONDER_TIMEOUT_MS", &raw, DEFAULT_TIMEOUT_MS);
        }

        if let Some(raw) = var("EMAIL_RESPONDER_MAX_EMAIL_LENGTH") {
            self.max_email_length =
                parse_positive("EMAIL_RESPONDER_MAX_EMAIL_LENGTH", &raw, DEFAULT_MAX_EMAIL_LENGTH);
        }

        if let Some(raw) = var("PORT") {
            self.port = parse_positive("PORT", &raw, DEFAULT_PORT);
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            info!("Loaded config from: {}", path.display());
            Ok(config)
        } else {
            Err(anyhow!("Config file not found"))
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::get_config_path()?)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        info!("Saved config to: {}", path.display());
        Ok(())
    }

    fn get_config_path() -> Result<PathBuf> {
        Ok(Self::get_config_dir()?.join("config.toml"))
    }

    pub fn get_config_dir() -> Result<PathBuf> {
        let home = home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
        Ok(home.join(".email-responder"))
    }

    /// Set API key and save config
    pub fn set_api_key(&mut self, api_key: String) -> Result<()> {
        self.anthropic_api_key = Some(api_key);
        self.save()?;
        info!("API key saved to config file");
        Ok(())
    }

    /// The single start-up check. Fails fast when the credential is absent.
    pub fn validate(&self) -> Result<Settings> {
        self.settings(true)
    }

    /// Start-up check for a process that generates through a relay. The relay
    /// holds the credential, so none is required here.
    pub fn validate_for_relay(&self) -> Result<Settings> {
        self.settings(false)
    }

    fn settings(&self, require_key: bool) -> Result<Settings> {
        let api_key = self
            .anthropic_api_key
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string();

        if require_key && api_key.is_empty() && !self.use_mock {
            return Err(anyhow!(
                "No Anthropic API key found. Please set it using one of these methods:

1. Set API key in config:
   responder --set-api-key sk-ant-your-key-here

2. Set environment variable (or add it to .env):
   export ANTHROPIC_API_KEY=sk-ant-your-key-here

3. Check current config:
   responder --config

Get your API key from: https://console.anthropic.com"
            ));
        }

        let timeout_ms = if self.api_timeout_ms == 0 {
            warn!("api_timeout_ms is invalid. Using default: {}ms", DEFAULT_TIMEOUT_MS);
            DEFAULT_TIMEOUT_MS
        } else {
            self.api_timeout_ms
        };

        let max_email_length = if self.max_email_length == 0 {
            warn!("max_email_length is invalid. Using default: {}", DEFAULT_MAX_EMAIL_LENGTH);
            DEFAULT_MAX_EMAIL_LENGTH
        } else {
            self.max_email_length
        };

        let models: Vec<String> = self
            .models
            .iter()
            .map(|m| m.trim())
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Settings {
            api_key,
            use_mock: self.use_mock,
            timeout: Duration::from_millis(timeout_ms),
            max_email_length,
            models: if models.is_empty() { default_models() } else { models },
            max_tokens: self.max_tokens,
            api_url: self.api_url.clone(),
            port: self.port,
        })
    }

    pub fn show_config_info() -> Result<()> {
        let config_path = Self::get_config_path()?;
        println!("Configuration file: {}", config_path.display());

        if config_path.exists() {
            println!("Status: Found");
            let config = Self::load_from_path(&config_path)?;
            println!("API Key: {}", if config.anthropic_api_key.is_some() { "Set" } else { "Not set" });
            println!("Mock mode: {}", config.use_mock);
            println!("Timeout: {}ms", config.api_timeout_ms);
            println!("Models: {}", config.models.join(", "));
        } else {
            println!("Status: Not found (using defaults)");
        }

        println!("\nTo set API key:");
        println!("  responder --set-api-key <your-key>");
        println!("\nOr set environment variable:");
        println!("  export ANTHROPIC_API_KEY=<your-key>");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_missing_key_fails_validation() {
        let config = Config::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("No Anthropic API key found"));
    }

    #[test]
    fn test_blank_key_fails_validation() {
        let config = Config {
            anthropic_api_key: Some("   ".to_string()),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mock_mode_needs_no_key() {
        let config = Config {
            use_mock: true,
            ..Config::default()
        };
        let settings = config.validate().unwrap();
        assert!(settings.use_mock);
        assert!(settings.api_key.is_empty());
    }

    #[test]
    fn test_validate_trims_key_and_applies_defaults() {
        let config = Config {
            anthropic_api_key: Some("  sk-test  ".to_string()),
            models: vec![" ".to_string()],
            ..Config::default()
        };
        let settings = config.validate().unwrap();
        assert_eq!(settings.api_key, "sk-test");
        assert_eq!(settings.timeout, Duration::from_millis(30_000));
        assert_eq!(settings.max_email_length, 5_000);
        assert_eq!(settings.models, default_models());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env(env(&[
            ("ANTHROPIC_API_KEY", "sk-env"),
            ("EMAIL_RESPONDER_TIMEOUT_MS", "1500"),
            ("EMAIL_RESPONDER_MAX_EMAIL_LENGTH", "200"),
            ("PORT", "8080"),
        ]));
        assert_eq!(config.anthropic_api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.api_timeout_ms, 1500);
        assert_eq!(config.max_email_length, 200);
        assert_eq!(config.port, 8080);
        assert!(!config.use_mock);
    }

    #[test]
    fn test_relay_mode_needs_no_key() {
        let config = Config::default();
        let settings = config.validate_for_relay().unwrap();
        assert!(settings.api_key.is_empty());
        assert!(!settings.use_mock);
        assert_eq!(settings.models, default_models());
    }

    #[test]
    fn test_use_mock_switch_values() {
        for (raw, expected) in [
            ("1", true),
            ("true", true),
            ("YES", true),
            (" on ", true),
            ("0", false),
            ("false", false),
            ("False", false),
            ("off", false),
            ("", false),
            ("maybe", false),
        ] {
            let mut config = Config::default();
            config.apply_env(env(&[("EMAIL_RESPONDER_USE_MOCK", raw)]));
            assert_eq!(config.use_mock, expected, "EMAIL_RESPONDER_USE_MOCK={:?}", raw);
        }
    }

    #[test]
    fn test_use_mock_off_overrides_file() {
        let mut config = Config {
            use_mock: true,
            ..Config::default()
        };
        config.apply_env(env(&[("EMAIL_RESPONDER_USE_MOCK", "0")]));
        assert!(!config.use_mock);
    }

    #[test]
    fn test_invalid_numbers_fall_back_to_defaults() {
        let mut config = Config::default();
        config.apply_env(env(&[
            ("EMAIL_RESPONDER_TIMEOUT_MS", "soon"),
            ("EMAIL_RESPONDER_MAX_EMAIL_LENGTH", "0"),
        ]));
        assert_eq!(config.api_timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(config.max_email_length, DEFAULT_MAX_EMAIL_LENGTH);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config {
            anthropic_api_key: Some("sk-file".to_string()),
            models: vec!["model-a".to_string(), "model-b".to_string()],
            ..Config::default()
        };
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.anthropic_api_key.as_deref(), Some("sk-file"));
        assert_eq!(loaded.models, vec!["model-a", "model-b"]);
        assert_eq!(loaded.api_timeout_ms, DEFAULT_TIMEOUT_MS);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "use_mock = true\n").unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert!(loaded.use_mock);
        assert_eq!(loaded.port, DEFAULT_PORT);
        assert_eq!(loaded.models.len(), 5);
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(Config::load_from_path(&dir.path().join("absent.toml")).is_err());
    }
}
