//! Configuration management.
//!
//! flowsmith configuration can come from:
//! - Environment variables (FLOWSMITH_*)
//! - Config file (~/.config/flowsmith/config.toml)
//!
//! Nothing in the library reads the environment on its own: [`Config::load`]
//! is called once by the binary and the resulting [`EngineConfig`] is handed
//! to [`EngineClient::new`](crate::remote::EngineClient::new).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// flowsmith configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote execution engine connection
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Shared secret used to sign engine requests. Zeroized on drop. Can be read
/// from config but never written back out.
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop, Deserialize)]
#[serde(transparent)]
pub struct SecretKey(String);

impl SecretKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Connection settings for the remote execution engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Engine base URL, e.g. `https://engine.example.com`
    #[serde(default)]
    pub base_url: Option<String>,

    /// Shared HMAC secret
    #[serde(default, skip_serializing)]
    pub api_key: Option<SecretKey>,

    /// Time budget for ordinary requests (seconds)
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Time budget for bulk operations (seconds)
    #[serde(default = "default_bulk_timeout")]
    pub bulk_timeout_seconds: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            timeout_seconds: default_timeout(),
            bulk_timeout_seconds: default_bulk_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    10
}

fn default_bulk_timeout() -> u64 {
    30
}

impl EngineConfig {
    /// Build a config with explicit credentials and default timeouts.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            api_key: Some(SecretKey::new(api_key)),
            ..Self::default()
        }
    }

    /// Whether both the base URL and the API key are present and non-empty.
    pub fn is_configured(&self) -> bool {
        self.base_url.as_deref().is_some_and(|u| !u.trim().is_empty())
            && self.api_key.as_ref().is_some_and(|k| !k.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn bulk_timeout(&self) -> Duration {
        Duration::from_secs(self.bulk_timeout_seconds)
    }
}

impl Config {
    /// Load configuration from default locations.
    pub fn load() -> Self {
        let mut config = Self::default();

        let primary_path = Self::config_dir().join("config.toml");
        if let Ok(partial) = Self::load_partial_from_path(&primary_path) {
            config.apply_partial(partial);
        }

        config.apply_env_overrides();
        config
    }

    /// Load configuration from an explicit file, then apply env overrides.
    pub fn load_from(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let partial: PartialConfig = toml::from_str(&content).map_err(|e| {
            crate::error::Error::Config(format!("Invalid config file {}: {}", path.display(), e))
        })?;

        let mut config = Self::default();
        config.apply_partial(partial);
        config.apply_env_overrides();
        Ok(config)
    }

    /// Get the config directory.
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("flowsmith"))
            .unwrap_or_else(|| PathBuf::from(".flowsmith"))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("FLOWSMITH_ENGINE_URL") {
            self.engine.base_url = Some(url);
        }
        if let Ok(key) = std::env::var("FLOWSMITH_ENGINE_API_KEY") {
            self.engine.api_key = Some(SecretKey::new(key));
        }
        if let Ok(timeout) = std::env::var("FLOWSMITH_TIMEOUT_SECONDS") {
            if let Ok(parsed) = timeout.parse::<u64>() {
                self.engine.timeout_seconds = parsed;
            }
        }
        if let Ok(timeout) = std::env::var("FLOWSMITH_BULK_TIMEOUT_SECONDS") {
            if let Ok(parsed) = timeout.parse::<u64>() {
                self.engine.bulk_timeout_seconds = parsed;
            }
        }
    }

    fn load_partial_from_path(path: &Path) -> std::result::Result<PartialConfig, ()> {
        let content = std::fs::read_to_string(path).map_err(|_| ())?;
        toml::from_str(&content).map_err(|_| ())
    }

    fn apply_partial(&mut self, partial: PartialConfig) {
        if let Some(engine) = partial.engine {
            self.engine = engine;
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    engine: Option<EngineConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_engine_config_is_unconfigured() {
        let config = EngineConfig::default();
        assert!(!config.is_configured());
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.bulk_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_blank_credentials_are_unconfigured() {
        let config = EngineConfig::new("  ", "secret");
        assert!(!config.is_configured());

        let config = EngineConfig::new("https://engine.example.com", "");
        assert!(!config.is_configured());

        let config = EngineConfig::new("https://engine.example.com", "secret");
        assert!(config.is_configured());
    }

    #[test]
    fn test_secret_key_is_redacted() {
        let config = EngineConfig::new("https://engine.example.com", "super-secret");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_secret_key_is_never_serialized() {
        let config = Config {
            engine: EngineConfig::new("https://engine.example.com", "super-secret"),
        };

        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("super-secret"));
        assert!(!json.contains("api_key"));

        let toml = toml::to_string(&config).unwrap();
        assert!(!toml.contains("super-secret"));
        assert!(toml.contains("base_url"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[engine]
base_url = "https://engine.example.com"
api_key = "from-file"
timeout_seconds = 5
"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(
            config.engine.base_url.as_deref(),
            Some("https://engine.example.com")
        );
        assert_eq!(
            config.engine.api_key.as_ref().map(SecretKey::expose),
            Some("from-file")
        );
        assert_eq!(config.engine.timeout_seconds, 5);
        assert_eq!(config.engine.bulk_timeout_seconds, 30);
    }

    #[test]
    fn test_load_from_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "engine = 3").unwrap();

        let err = Config::load_from(file.path()).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }
}
