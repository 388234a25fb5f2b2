use serde::Deserialize;
use std::time::Duration;

use domain::models::EntityId;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub tracking: TrackingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the tracking backend, e.g. `https://fleet.example.com/api`
    pub base_url: String,

    /// Bearer token sent with every request (optional)
    #[serde(default)]
    pub auth_token: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Path of the latest-location endpoint; the entity id is appended
    #[serde(default = "default_location_path")]
    pub location_path: String,

    /// Path of the assigned-geofences endpoint; the entity id is appended
    #[serde(default = "default_geofence_path")]
    pub geofence_path: String,

    #[serde(default = "default_threat_path")]
    pub threat_path: String,

    #[serde(default = "default_line_path")]
    pub line_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackingConfig {
    /// Entities selected when the session starts
    #[serde(default)]
    pub entity_ids: Vec<EntityId>,

    /// Polling cadence while several entities are tracked
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Polling cadence for a single-entity dashboard
    #[serde(default = "default_single_entity_poll_interval")]
    pub single_entity_poll_interval_secs: u64,

    /// Whether threat zones and line layers are fetched every cycle
    #[serde(default)]
    pub include_layers: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_timeout() -> u64 {
    15
}
fn default_location_path() -> String {
    "locations/employee".to_string()
}
fn default_geofence_path() -> String {
    "geofences/employee".to_string()
}
fn default_threat_path() -> String {
    "layers/threats".to_string()
}
fn default_line_path() -> String {
    "layers/lines".to_string()
}
fn default_poll_interval() -> u64 {
    10
}
fn default_single_entity_poll_interval() -> u64 {
    30
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with FT__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("FT")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("tracking.entity_ids")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Load configuration for testing with custom overrides.
    ///
    /// Defaults are embedded so tests do not depend on the working directory.
    #[cfg(test)]
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let defaults = r#"
            [api]
            base_url = ""
            timeout_secs = 15
            location_path = "locations/employee"
            geofence_path = "geofences/employee"
            threat_path = "layers/threats"
            line_path = "layers/lines"

            [tracking]
            entity_ids = []
            poll_interval_secs = 10
            single_entity_poll_interval_secs = 30
            include_layers = false

            [logging]
            level = "info"
            format = "json"
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        // Skip validation in tests to allow partial configs
        Ok(cfg)
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "FT__API__BASE_URL environment variable must be set".to_string(),
            ));
        }

        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            return Err(ConfigValidationError::InvalidValue(
                "api.base_url must start with http:// or https://".to_string(),
            ));
        }

        if self.api.timeout_secs == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "api.timeout_secs cannot be 0".to_string(),
            ));
        }

        if self.tracking.poll_interval_secs == 0 || self.tracking.single_entity_poll_interval_secs == 0
        {
            return Err(ConfigValidationError::InvalidValue(
                "Polling intervals cannot be 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_load_with_defaults() {
        let config = Config::load_for_test(&[("api.base_url", "https://fleet.example.com/api")])
            .expect("Failed to load config");

        assert_eq!(config.api.base_url, "https://fleet.example.com/api");
        assert_eq!(config.api.timeout_secs, 15);
        assert!(config.api.auth_token.is_none());
        assert_eq!(config.tracking.poll_interval_secs, 10);
        assert_eq!(config.tracking.single_entity_poll_interval_secs, 30);
        assert!(config.tracking.entity_ids.is_empty());
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_override() {
        let config = Config::load_for_test(&[
            ("api.base_url", "http://localhost:8000"),
            ("api.auth_token", "secret"),
            ("tracking.poll_interval_secs", "5"),
            ("logging.level", "debug"),
        ])
        .expect("Failed to load config");

        assert_eq!(config.api.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.tracking.poll_interval_secs, 5);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_config_validation_missing_base_url() {
        let config = Config::load_for_test(&[]).expect("Failed to load config");
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("FT__API__BASE_URL"));
    }

    #[test]
    fn test_config_validation_bad_scheme() {
        let config = Config::load_for_test(&[("api.base_url", "fleet.example.com")])
            .expect("Failed to load config");
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("http://"));
    }

    #[test]
    fn test_config_validation_zero_interval() {
        let config = Config::load_for_test(&[
            ("api.base_url", "http://localhost:8000"),
            ("tracking.poll_interval_secs", "0"),
        ])
        .expect("Failed to load config");
        assert!(config.validate().is_err());
    }
}
