//! Configuration loading and management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub uploads: UploadsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl DatabaseConfig {
    /// sqlx connection URL for the configured path
    pub fn url(&self) -> String {
        if self.path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}?mode=rwc", self.path)
        }
    }
}

/// Ten years; expiry timestamps stay far from chrono's range limits
const MAX_TOKEN_TTL_HOURS: i64 = 10 * 366 * 24;

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret; there is no built-in fallback
    #[serde(default)]
    pub jwt_secret: Option<String>,
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
    #[serde(default = "default_blacklist_sweep_secs")]
    pub blacklist_sweep_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl_hours: default_token_ttl_hours(),
            blacklist_sweep_secs: default_blacklist_sweep_secs(),
        }
    }
}

impl AuthConfig {
    /// `None` unless the configured hours lie in `1..=MAX_TOKEN_TTL_HOURS`
    pub fn token_ttl(&self) -> Option<chrono::Duration> {
        if !(1..=MAX_TOKEN_TTL_HOURS).contains(&self.token_ttl_hours) {
            return None;
        }
        chrono::Duration::try_hours(self.token_ttl_hours)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.blacklist_sweep_secs)
    }
}

/// Uploaded image storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadsConfig {
    #[serde(default = "default_uploads_dir")]
    pub dir: String,
    /// Prefix for absolute image links
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            dir: default_uploads_dir(),
            base_url: default_base_url(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Prometheus exporter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
}

/// Initial administrator, created only when no admin exists yet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default = "default_admin_phone")]
    pub admin_phone: String,
    #[serde(default = "default_admin_name")]
    pub admin_name: String,
    #[serde(default)]
    pub admin_password: Option<String>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            admin_phone: default_admin_phone(),
            admin_name: default_admin_name(),
            admin_password: None,
        }
    }
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_db_path() -> String {
    "./data/simaling.db".to_string()
}

fn default_token_ttl_hours() -> i64 {
    24
}

fn default_blacklist_sweep_secs() -> u64 {
    3600
}

fn default_uploads_dir() -> String {
    "./uploads".to_string()
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_admin_phone() -> String {
    "080000000000".to_string()
}

fn default_admin_name() -> String {
    "Administrator".to_string()
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &str) -> Result<Self> {
        let config_path = Path::new(path);

        if !config_path.exists() {
            info!("Config file not found at {}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        info!("Loaded configuration from {}", path);
        Ok(config)
    }

    /// Reject settings the server cannot start with
    pub fn validate(&self) -> Result<()> {
        match self.auth.jwt_secret.as_deref() {
            Some(secret) if !secret.trim().is_empty() => {}
            _ => anyhow::bail!(
                "auth.jwt_secret is not set (configure it or export SIMALING_JWT_SECRET)"
            ),
        }
        if self.auth.token_ttl().is_none() {
            anyhow::bail!(
                "auth.token_ttl_hours must be between 1 and {}, got {}",
                MAX_TOKEN_TTL_HOURS,
                self.auth.token_ttl_hours
            );
        }
        if self.auth.blacklist_sweep_secs == 0 {
            anyhow::bail!("auth.blacklist_sweep_secs must be positive");
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            anyhow::bail!("logging.format must be 'pretty' or 'json'");
        }
        if let Some(password) = &self.bootstrap.admin_password
            && password.len() < 8
        {
            anyhow::bail!("bootstrap.admin_password must be at least 8 characters");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = Config::load("/nonexistent/simaling.toml").unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.auth.token_ttl_hours, 24);
        assert_eq!(config.auth.blacklist_sweep_secs, 3600);
        assert!(config.auth.jwt_secret.is_none());
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn partial_file_keeps_section_defaults() {
        let file = write_config(
            r#"
            [server]
            port = 8080

            [auth]
            jwt_secret = "s3cret"

            [uploads]
            base_url = "https://rt05.example.id"
            "#,
        );
        let config = Config::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(config.auth.jwt_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.auth.token_ttl_hours, 24);
        assert_eq!(config.uploads.base_url, "https://rt05.example.id");
        assert_eq!(config.uploads.dir, "./uploads");
        assert_eq!(config.logging.format, "pretty");
        config.validate().unwrap();
    }

    #[test]
    fn malformed_file_is_an_error() {
        let file = write_config("[server\nport = ");
        assert!(Config::load(file.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn validate_requires_secret() {
        let mut config = Config::default();
        assert!(config.validate().is_err());

        config.auth.jwt_secret = Some("   ".to_string());
        assert!(config.validate().is_err());

        config.auth.jwt_secret = Some("s3cret".to_string());
        config.validate().unwrap();

        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_unrepresentable_ttl() {
        let mut config = Config::default();
        config.auth.jwt_secret = Some("s3cret".to_string());

        for hours in [0, -5, MAX_TOKEN_TTL_HOURS + 1, i64::MAX] {
            config.auth.token_ttl_hours = hours;
            assert!(config.auth.token_ttl().is_none(), "{}", hours);
            assert!(config.validate().is_err(), "{}", hours);
        }

        config.auth.token_ttl_hours = 24;
        assert_eq!(config.auth.token_ttl(), Some(chrono::Duration::hours(24)));
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_short_bootstrap_password() {
        let mut config = Config::default();
        config.auth.jwt_secret = Some("s3cret".to_string());
        config.bootstrap.admin_password = Some("short".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn database_url_from_path() {
        let mut db = DatabaseConfig::default();
        assert_eq!(db.url(), "sqlite:./data/simaling.db?mode=rwc");
        db.path = ":memory:".to_string();
        assert_eq!(db.url(), "sqlite::memory:");
    }
}
