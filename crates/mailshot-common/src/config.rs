//! Configuration for Mailshot

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix; `MAILSHOT__DISPATCH__INTERVAL_SECS=30` overrides `dispatch.interval_secs`
pub const ENV_PREFIX: &str = "MAILSHOT";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Outbound SMTP relay
    #[serde(default)]
    pub smtp: SmtpConfig,

    /// Dispatcher configuration
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: Option<String>,

    /// Maximum connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
        }
    }
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API port
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_api_port(),
        }
    }
}

fn default_api_port() -> u16 {
    8080
}

/// Outbound SMTP relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// Relay host
    #[serde(default = "default_smtp_host")]
    pub host: String,

    /// Relay port
    #[serde(default = "default_smtp_port")]
    pub port: u16,

    pub username: Option<String>,

    pub password: Option<String>,

    /// Implicit TLS (SMTPS)
    #[serde(default)]
    pub use_tls: bool,

    /// Upgrade with STARTTLS
    #[serde(default = "default_use_starttls")]
    pub use_starttls: bool,

    /// Per-send timeout in seconds
    #[serde(default = "default_smtp_timeout")]
    pub timeout_secs: u64,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            username: None,
            password: None,
            use_tls: false,
            use_starttls: default_use_starttls(),
            timeout_secs: default_smtp_timeout(),
        }
    }
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_smtp_port() -> u16 {
    25
}

fn default_use_starttls() -> bool {
    true
}

fn default_smtp_timeout() -> u64 {
    30
}

/// Dispatcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Run the recurring dispatch worker inside `serve`
    #[serde(default = "default_dispatch_enabled")]
    pub enabled: bool,

    /// Seconds between dispatch passes
    #[serde(default = "default_dispatch_interval")]
    pub interval_secs: u64,

    /// Sender address for every campaign message
    #[serde(default = "default_from_address")]
    pub from_address: String,

    /// Maximum in-flight deliveries per campaign
    #[serde(default = "default_dispatch_concurrency")]
    pub concurrency: usize,

    /// Lease held on a campaign while it is being dispatched
    #[serde(default = "default_claim_lease")]
    pub claim_lease_secs: i64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            enabled: default_dispatch_enabled(),
            interval_secs: default_dispatch_interval(),
            from_address: default_from_address(),
            concurrency: default_dispatch_concurrency(),
            claim_lease_secs: default_claim_lease(),
        }
    }
}

fn default_dispatch_enabled() -> bool {
    true
}

fn default_dispatch_interval() -> u64 {
    60
}

fn default_from_address() -> String {
    "noreply@localhost".to_string()
}

fn default_dispatch_concurrency() -> usize {
    1
}

fn default_claim_lease() -> i64 {
    600
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "json" or "text"
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

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Config {
    /// Load configuration from a file, overlaid with environment variables
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        Self::build(Some(path))
    }

    /// Load configuration from the default locations, overlaid with environment variables.
    ///
    /// A missing file is not an error: every section has defaults and the
    /// database URL may come from `MAILSHOT__DATABASE__URL`.
    pub fn load() -> crate::Result<Self> {
        let paths = [
            PathBuf::from("./config.toml"),
            PathBuf::from("/etc/mailshot/config.toml"),
        ];

        let found = paths.iter().find(|p| p.exists());
        Self::build(found.map(PathBuf::as_path))
    }

    fn build(path: Option<&Path>) -> crate::Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| crate::Error::Config(format!("Failed to load config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api.port, 8080);
        assert_eq!(config.smtp.port, 25);
        assert!(config.smtp.use_starttls);
        assert_eq!(config.dispatch.interval_secs, 60);
        assert_eq!(config.dispatch.concurrency, 1);
        assert!(config.database.url.is_none());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[database]
url = "postgres://localhost/mailshot"

[smtp]
host = "smtp.example.com"
port = 587
username = "mailer"
password = "secret"

[dispatch]
interval_secs = 30
from_address = "admin@mailing.example.com"
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(
            config.database.url.as_deref(),
            Some("postgres://localhost/mailshot")
        );
        assert_eq!(config.smtp.host, "smtp.example.com");
        assert_eq!(config.smtp.port, 587);
        assert_eq!(config.dispatch.interval_secs, 30);
        assert_eq!(config.dispatch.from_address, "admin@mailing.example.com");
        // untouched keys keep their defaults
        assert_eq!(config.dispatch.claim_lease_secs, 600);
        assert_eq!(config.logging.format, "text");
    }
}
