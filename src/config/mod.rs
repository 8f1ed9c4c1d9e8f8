//! Configuration management for the softener poller
//!
//! The host supplies credentials, the device serial number and an optional
//! poll interval override. Options set after setup overlay the stored data.

use crate::error::{Result, SoftenerError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::{env, fmt, time::Duration};
use url::Url;

/// Default refresh cadence
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Shortest accepted poll interval override; the cloud API is rate limited
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Default device API endpoint
pub const DEFAULT_API_URL: &str = "https://api.myiquaapp.com/v1/";

/// Softener configuration record
#[derive(Clone, Serialize, Deserialize)]
pub struct SoftenerConfig {
    pub username: String,

    pub password: String,

    /// Serial number of the softener to poll
    pub device_serial_number: String,

    /// Replaces [`DEFAULT_POLL_INTERVAL`] when set
    #[serde(default, with = "humantime_serde")]
    pub poll_interval_override: Option<Duration>,

    /// Device API settings
    #[serde(default)]
    pub api: ApiConfig,
}

/// Device API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the device API
    pub base_url: Url,

    /// Transport timeout for a single fetch
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

/// Option overrides applied on top of the stored configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigOptions {
    pub username: Option<String>,
    pub password: Option<String>,
    pub device_serial_number: Option<String>,
    #[serde(default, with = "humantime_serde")]
    pub poll_interval_override: Option<Duration>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_API_URL).expect("default API URL is valid"),
            timeout: Duration::from_secs(30),
        }
    }
}

impl fmt::Debug for SoftenerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftenerConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("device_serial_number", &self.device_serial_number)
            .field("poll_interval_override", &self.poll_interval_override)
            .field("api", &self.api)
            .finish()
    }
}

impl SoftenerConfig {
    /// Create a configuration with default API settings
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        device_serial_number: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            device_serial_number: device_serial_number.into(),
            poll_interval_override: None,
            api: ApiConfig::default(),
        }
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SoftenerError::config(format!("Failed to read {}: {e}", path.display()))
        })?;

        toml::from_str(&content).map_err(|e| {
            SoftenerError::config(format!("Failed to parse {}: {e}", path.display()))
        })
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let required = |name: &str| {
            env::var(name).map_err(|_| SoftenerError::config(format!("{name} is not set")))
        };

        let mut config = Self::new(
            required("IQUA_USERNAME")?,
            required("IQUA_PASSWORD")?,
            required("IQUA_DEVICE_SERIAL_NUMBER")?,
        );
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Override individual settings from the environment, leaving unset ones alone
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(username) = env::var("IQUA_USERNAME") {
            self.username = username;
        }

        if let Ok(password) = env::var("IQUA_PASSWORD") {
            self.password = password;
        }

        if let Ok(serial) = env::var("IQUA_DEVICE_SERIAL_NUMBER") {
            self.device_serial_number = serial;
        }

        if let Ok(interval) = env::var("IQUA_POLL_INTERVAL") {
            self.poll_interval_override = Some(
                humantime_serde::re::humantime::parse_duration(&interval).map_err(|e| {
                    SoftenerError::config(format!("Invalid IQUA_POLL_INTERVAL: {e}"))
                })?,
            );
        }

        if let Ok(url) = env::var("IQUA_API_URL") {
            self.api.base_url = url
                .parse()
                .map_err(|e| SoftenerError::config(format!("Invalid IQUA_API_URL: {e}")))?;
        }

        if let Ok(timeout) = env::var("IQUA_TIMEOUT") {
            self.api.timeout = Duration::from_secs(
                timeout
                    .parse()
                    .map_err(|e| SoftenerError::config(format!("Invalid IQUA_TIMEOUT: {e}")))?,
            );
        }

        Ok(())
    }

    /// Overlay option overrides; set options win over stored values
    pub fn apply_options(&mut self, options: &ConfigOptions) {
        if let Some(username) = &options.username {
            self.username = username.clone();
        }
        if let Some(password) = &options.password {
            self.password = password.clone();
        }
        if let Some(serial) = &options.device_serial_number {
            self.device_serial_number = serial.clone();
        }
        if options.poll_interval_override.is_some() {
            self.poll_interval_override = options.poll_interval_override;
        }
    }

    /// Effective refresh interval
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval_override.unwrap_or(DEFAULT_POLL_INTERVAL)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.username.is_empty() {
            return Err(SoftenerError::config("Username cannot be empty"));
        }

        if self.password.is_empty() {
            return Err(SoftenerError::config("Password cannot be empty"));
        }

        if self.device_serial_number.trim().is_empty() {
            return Err(SoftenerError::config("Device serial number cannot be empty"));
        }

        if self.api.base_url.scheme() != "http" && self.api.base_url.scheme() != "https" {
            return Err(SoftenerError::config("API URL must use http or https scheme"));
        }

        if self.api.timeout.is_zero() {
            return Err(SoftenerError::config("Timeout must be greater than zero"));
        }

        if let Some(interval) = self.poll_interval_override {
            if interval < MIN_POLL_INTERVAL {
                return Err(SoftenerError::config(format!(
                    "Poll interval must be at least {}s, got {interval:?}",
                    MIN_POLL_INTERVAL.as_secs()
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_default_poll_interval() {
        let config = SoftenerConfig::new("user", "secret", "SN-1");
        assert_eq!(config.poll_interval(), Duration::from_secs(900));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = SoftenerConfig::new("user", "hunter2", "SN-1");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_options_overlay() {
        let mut config = SoftenerConfig::new("user", "secret", "SN-1");
        config.apply_options(&ConfigOptions {
            password: Some("rotated".to_string()),
            poll_interval_override: Some(Duration::from_secs(300)),
            ..Default::default()
        });

        assert_eq!(config.username, "user");
        assert_eq!(config.password, "rotated");
        assert_eq!(config.poll_interval(), Duration::from_secs(300));
    }

    #[test]
    fn test_validate_rejects_short_interval_and_empty_serial() {
        let mut config = SoftenerConfig::new("user", "secret", "SN-1");
        config.poll_interval_override = Some(Duration::from_secs(5));
        assert!(matches!(config.validate(), Err(SoftenerError::Config(_))));

        let config = SoftenerConfig::new("user", "secret", "  ");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
username = "alice"
password = "secret"
device_serial_number = "SN-42"
poll_interval_override = "10m"

[api]
base_url = "http://localhost:8080/"
timeout = "5s"
"#
        )
        .unwrap();

        let config = SoftenerConfig::load(file.path()).unwrap();
        assert_eq!(config.device_serial_number, "SN-42");
        assert_eq!(config.poll_interval(), Duration::from_secs(600));
        assert_eq!(config.api.base_url.as_str(), "http://localhost:8080/");
        assert_eq!(config.api.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_load_missing_file() {
        let result = SoftenerConfig::load("/nonexistent/iqua.toml");
        assert!(matches!(result, Err(SoftenerError::Config(_))));
    }

    #[test]
    #[serial]
    fn test_from_env() {
        temp_env::with_vars(
            [
                ("IQUA_USERNAME", Some("bob")),
                ("IQUA_PASSWORD", Some("pw")),
                ("IQUA_DEVICE_SERIAL_NUMBER", Some("SN-7")),
                ("IQUA_POLL_INTERVAL", Some("20m")),
                ("IQUA_API_URL", None),
                ("IQUA_TIMEOUT", Some("12")),
            ],
            || {
                let config = SoftenerConfig::from_env().unwrap();
                assert_eq!(config.username, "bob");
                assert_eq!(config.device_serial_number, "SN-7");
                assert_eq!(config.poll_interval(), Duration::from_secs(1200));
                assert_eq!(config.api.timeout, Duration::from_secs(12));
                assert_eq!(config.api.base_url.as_str(), DEFAULT_API_URL);
            },
        );
    }

    #[test]
    #[serial]
    fn test_from_env_missing_serial() {
        temp_env::with_vars(
            [
                ("IQUA_USERNAME", Some("bob")),
                ("IQUA_PASSWORD", Some("pw")),
                ("IQUA_DEVICE_SERIAL_NUMBER", None),
            ],
            || {
                let err = SoftenerConfig::from_env().unwrap_err();
                assert!(err.to_string().contains("IQUA_DEVICE_SERIAL_NUMBER"));
            },
        );
    }
}
