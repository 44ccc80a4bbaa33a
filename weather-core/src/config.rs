use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

/// Environment variable holding the OpenWeather credential.
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

pub const DEFAULT_ONECALL_URL: &str = "https://api.openweathermap.org/data/3.0/onecall";
pub const DEFAULT_GEOCODING_URL: &str = "http://api.openweathermap.org/geo/1.0/direct";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// timeout_secs = 10
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// OpenWeather API key. `OPENWEATHER_API_KEY` takes precedence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Override for the One Call 3.0 endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onecall_url: Option<String>,

    /// Override for the direct geocoding endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geocoding_url: Option<String>,
}

/// Everything the gateway client needs, resolved once at startup.
#[derive(Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub api_key: String,
    pub onecall_url: String,
    pub geocoding_url: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("api_key", &"<redacted>")
            .field("onecall_url", &self.onecall_url)
            .field("geocoding_url", &self.geocoding_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet
    /// or the platform has no config directory.
    pub fn load() -> Result<Self> {
        match Self::config_file_path() {
            Ok(path) => Self::load_from(&path),
            Err(err) => {
                tracing::debug!(error = %err, "no config directory, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-task", "weather-mcp")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Applies `OPENWEATHER_API_KEY` from the process environment.
    pub fn with_env(self) -> Self {
        self.with_api_key_override(std::env::var(API_KEY_ENV).ok())
    }

    /// Replaces the stored key when `key` is set and non-blank.
    pub fn with_api_key_override(mut self, key: Option<String>) -> Self {
        if let Some(key) = key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty()) {
            self.api_key = Some(key);
        }
        self
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.api_key = Some(api_key);
    }

    /// Resolve the settings for the gateway client. Fails when no credential
    /// is available from any source.
    pub fn gateway_config(&self) -> Result<GatewayConfig> {
        let api_key = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "{API_KEY_ENV} environment variable is required.\n\
                     Hint: export {API_KEY_ENV}=<key> or run `weather-mcp configure`."
                )
            })?;

        let timeout_secs = self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(anyhow!("timeout_secs must be greater than zero"));
        }

        Ok(GatewayConfig {
            api_key: api_key.to_string(),
            onecall_url: self.onecall_url.clone().unwrap_or_else(|| DEFAULT_ONECALL_URL.into()),
            geocoding_url: self
                .geocoding_url
                .clone()
                .unwrap_or_else(|| DEFAULT_GEOCODING_URL.into()),
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_config_errors_without_api_key() {
        let cfg = Config::default();
        let err = cfg.gateway_config().unwrap_err();

        assert!(err.to_string().contains("OPENWEATHER_API_KEY environment variable is required"));
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let cfg = Config { api_key: Some("  ".into()), ..Config::default() };
        assert!(cfg.gateway_config().is_err());
    }

    #[test]
    fn gateway_config_uses_defaults() {
        let mut cfg = Config::default();
        cfg.set_api_key("KEY".into());

        let gw = cfg.gateway_config().expect("key is set");

        assert_eq!(gw.api_key, "KEY");
        assert_eq!(gw.onecall_url, DEFAULT_ONECALL_URL);
        assert_eq!(gw.geocoding_url, DEFAULT_GEOCODING_URL);
        assert_eq!(gw.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn env_override_wins_over_file_value() {
        let cfg = Config { api_key: Some("FILE".into()), ..Config::default() }
            .with_api_key_override(Some("ENV".into()));
        assert_eq!(cfg.api_key.as_deref(), Some("ENV"));

        let cfg = Config { api_key: Some("FILE".into()), ..Config::default() }
            .with_api_key_override(Some(String::new()));
        assert_eq!(cfg.api_key.as_deref(), Some("FILE"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let cfg = Config { api_key: Some("KEY".into()), timeout_secs: Some(0), ..Config::default() };
        assert!(cfg.gateway_config().is_err());
    }

    #[test]
    fn debug_output_redacts_key() {
        let gw = Config { api_key: Some("SECRET".into()), ..Config::default() }
            .gateway_config()
            .unwrap();

        assert!(!format!("{gw:?}").contains("SECRET"));
    }

    #[test]
    fn save_and_load_roundtrip_through_toml() {
        let dir = std::env::temp_dir().join(format!("weather-mcp-config-{}", std::process::id()));
        let path = dir.join("config.toml");

        let cfg = Config {
            api_key: Some("KEY".into()),
            timeout_secs: Some(10),
            ..Config::default()
        };
        cfg.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, cfg);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_file_loads_default() {
        let path = std::env::temp_dir().join("weather-mcp-does-not-exist/config.toml");
        assert_eq!(Config::load_from(&path).unwrap(), Config::default());
    }
}
