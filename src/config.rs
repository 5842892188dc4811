//! Configuration management for PingyThingy.
//!
//! Settings are layered: built-in defaults, then an optional config file, then
//! `PINGY__`-prefixed environment variables (`__` separates nested keys).

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{PingyError, Result};
use crate::ratelimit::{EvaluationMode, LimiterConfig};

/// Prefix of environment variables that override configuration values.
pub const ENV_PREFIX: &str = "PINGY";

/// Main configuration for the PingyThingy service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,

    /// Bearer token configuration
    #[serde(default)]
    pub jwt: JwtConfig,

    /// Cross-origin resource sharing configuration
    #[serde(default)]
    pub cors: CorsConfig,

    /// Development-only features
    #[serde(default)]
    pub development: DevelopmentConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Process-wide limiter
    #[serde(default = "default_global_limiter")]
    pub global: LimiterSettings,

    /// Limiter applied to each resolved identity
    #[serde(default = "default_identity_limiter")]
    pub per_identity: LimiterSettings,

    /// How the two limiters are combined
    #[serde(default)]
    pub evaluation: EvaluationMode,

    /// What the edge does with queued requests
    #[serde(default)]
    pub queued: QueuedPolicy,

    /// Idle time after which an identity partition may be dropped
    #[serde(default = "default_idle_eviction_secs")]
    pub idle_eviction_secs: u64,

    /// Interval between idle partition sweeps
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            global: default_global_limiter(),
            per_identity: default_identity_limiter(),
            evaluation: EvaluationMode::default(),
            queued: QueuedPolicy::default(),
            idle_eviction_secs: default_idle_eviction_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

impl RateLimitingConfig {
    pub fn idle_eviction(&self) -> Duration {
        Duration::from_secs(self.idle_eviction_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

/// Parameters of one limiter class as they appear in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimiterSettings {
    /// Permits per window
    pub permit_limit: u32,
    /// Window length in seconds
    pub window_secs: u64,
    /// Requests allowed to wait once permits run out
    #[serde(default)]
    pub queue_limit: u32,
}

impl From<LimiterSettings> for LimiterConfig {
    fn from(settings: LimiterSettings) -> Self {
        LimiterConfig::new(
            settings.permit_limit,
            Duration::from_secs(settings.window_secs),
            settings.queue_limit,
        )
    }
}

fn default_global_limiter() -> LimiterSettings {
    LimiterSettings {
        permit_limit: 100,
        window_secs: 60,
        queue_limit: 0,
    }
}

fn default_identity_limiter() -> LimiterSettings {
    LimiterSettings {
        permit_limit: 10,
        window_secs: 10,
        queue_limit: 0,
    }
}

fn default_idle_eviction_secs() -> u64 {
    600
}

fn default_cleanup_interval_secs() -> u64 {
    60
}

/// Edge behaviour for requests that were queued rather than admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum QueuedPolicy {
    /// Hold the request and re-poll at each window rollover.
    Wait {
        /// Upper bound on how long one request may be held
        #[serde(default = "default_max_wait_ms")]
        max_wait_ms: u64,
    },
    /// Answer 429 straight away with the queued verdict's retry hint.
    Reject,
}

impl Default for QueuedPolicy {
    fn default() -> Self {
        QueuedPolicy::Wait {
            max_wait_ms: default_max_wait_ms(),
        }
    }
}

fn default_max_wait_ms() -> u64 {
    5000
}

/// Bearer token configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    #[serde(default = "default_issuer")]
    pub issuer: String,

    #[serde(default = "default_audience")]
    pub audience: String,

    /// Symmetric signing key
    #[serde(default = "default_key")]
    pub key: String,

    /// Lifetime of issued development tokens in minutes
    #[serde(default = "default_token_lifetime_mins")]
    pub token_lifetime_mins: i64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            issuer: default_issuer(),
            audience: default_audience(),
            key: default_key(),
            token_lifetime_mins: default_token_lifetime_mins(),
        }
    }
}

fn default_issuer() -> String {
    "YOUR_ISSUER".to_string()
}

fn default_audience() -> String {
    "YOUR_AUDIENCE".to_string()
}

fn default_key() -> String {
    "YOUR_SUPER_SECRET_KEY_REPLACE_ME".to_string()
}

fn default_token_lifetime_mins() -> i64 {
    15
}

/// Cross-origin resource sharing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Origins allowed to call the API from a browser
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

/// Development-only features.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DevelopmentConfig {
    /// Mount the development token endpoint
    #[serde(default)]
    pub enabled: bool,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,

    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from an optional file plus the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // Seed with the defaults so a single overridden field keeps its siblings.
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&AppConfig::default())?);

        if let Some(path) = path {
            info!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: AppConfig = serde_yaml::from_str(yaml)
            .map_err(|e| PingyError::Config(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values serde cannot check on its own.
    pub fn validate(&self) -> Result<()> {
        LimiterConfig::from(self.rate_limiting.global).validate("global")?;
        LimiterConfig::from(self.rate_limiting.per_identity).validate("identity")?;

        if self.cors.allowed_origins.iter().any(|o| o.trim() == "*") {
            return Err(PingyError::Config(
                "cors.allowed_origins must list explicit origins, not '*'".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.server.bind_addr.port(), 8080);
        assert_eq!(config.rate_limiting.global.permit_limit, 100);
        assert_eq!(config.rate_limiting.global.window_secs, 60);
        assert_eq!(config.rate_limiting.global.queue_limit, 0);
        assert_eq!(config.rate_limiting.per_identity.permit_limit, 10);
        assert_eq!(config.rate_limiting.per_identity.window_secs, 10);
        assert_eq!(config.rate_limiting.per_identity.queue_limit, 0);
        assert_eq!(config.rate_limiting.evaluation, EvaluationMode::ShortCircuit);
        assert_eq!(config.cors.allowed_origins, vec!["http://localhost:3000"]);
        assert!(!config.development.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_yaml_keeps_defaults() {
        let yaml = r#"
rate_limiting:
  per_identity:
    permit_limit: 5
    window_secs: 30
    queue_limit: 2
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.rate_limiting.per_identity.permit_limit, 5);
        assert_eq!(config.rate_limiting.per_identity.queue_limit, 2);
        assert_eq!(config.rate_limiting.global.permit_limit, 100);
        assert_eq!(config.jwt.issuer, "YOUR_ISSUER");
    }

    #[test]
    fn test_parse_full_yaml() {
        let yaml = r#"
server:
  bind_addr: "127.0.0.1:9000"
rate_limiting:
  global:
    permit_limit: 1000
    window_secs: 60
  evaluation: independent
  queued:
    mode: reject
jwt:
  issuer: pingy
  audience: pingy-clients
  key: secret
cors:
  allowed_origins:
    - https://app.example.com
development:
  enabled: true
logging:
  format: json
  level: debug
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.server.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.rate_limiting.global.permit_limit, 1000);
        assert_eq!(config.rate_limiting.evaluation, EvaluationMode::Independent);
        assert_eq!(config.rate_limiting.queued, QueuedPolicy::Reject);
        assert_eq!(config.jwt.audience, "pingy-clients");
        assert!(config.development.enabled);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_queued_wait_policy() {
        let yaml = r#"
rate_limiting:
  queued:
    mode: wait
    max_wait_ms: 250
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(
            config.rate_limiting.queued,
            QueuedPolicy::Wait { max_wait_ms: 250 }
        );
    }

    #[test]
    fn test_invalid_limiter_is_rejected() {
        let yaml = r#"
rate_limiting:
  global:
    permit_limit: 0
    window_secs: 60
"#;
        let err = AppConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, PingyError::Config(_)));
    }

    #[test]
    fn test_wildcard_origin_is_rejected() {
        let yaml = r#"
cors:
  allowed_origins: ["*"]
"#;
        assert!(AppConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_limiter_settings_conversion() {
        let config = LimiterConfig::from(default_identity_limiter());
        assert_eq!(config.permit_limit, 10);
        assert_eq!(config.window, Duration::from_secs(10));
        assert_eq!(config.queue_limit, 0);
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = AppConfig::load(None).unwrap();
        assert_eq!(config.rate_limiting.global.permit_limit, 100);
    }
}
