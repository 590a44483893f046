//! Type-Safe Configuration with Validation
//!
//! Loaded from environment variables (and an optional `.env` file).

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rust_common::RetryConfig;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::channel::ChannelSettings;
use crate::retry::signing_retry_config;

/// Disables gateway certificate verification when set to `true`.
pub const INSECURE_SKIP_VERIFY_VAR: &str = "SIGNING_GATEWAY_INSECURE_SKIP_VERIFY";

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid URL format
    #[error("Invalid URL for {field}: {reason}")]
    InvalidUrl {
        /// Environment variable holding the URL
        field: String,
        /// Why it was rejected
        reason: String,
    },

    /// Invalid port number
    #[error("Invalid port: must be between 1 and 65535")]
    InvalidPort,

    /// Zero timeout or size limit
    #[error("Invalid value for {0}: must be greater than 0")]
    NotPositive(String),

    /// Environment variable parse error
    #[error("Failed to parse environment variable {name}: {reason}")]
    ParseError {
        /// Environment variable name
        name: String,
        /// Parser message
        reason: String,
    },
}

/// Service configuration with validation.
#[derive(Debug)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port (1-65535)
    pub port: u16,
    /// Signing gateway RPC address
    pub gateway_url: Url,
    /// Base of the redirect URLs handed to signers
    pub redirect_base_url: Url,
    /// Client certificate bundle, absolute or relative to `cert_base_dir`
    pub cert_path: Option<String>,
    /// Password of an encrypted private key
    pub cert_password: Option<SecretString>,
    /// Base directory for a relative `cert_path`
    pub cert_base_dir: PathBuf,
    /// Accept any gateway server certificate (non-production only)
    pub insecure_skip_verify: bool,
    /// Connection open timeout in seconds
    pub open_timeout_secs: u64,
    /// Send timeout in seconds
    pub send_timeout_secs: u64,
    /// Receive timeout in seconds
    pub receive_timeout_secs: u64,
    /// Graceful close timeout in seconds
    pub close_timeout_secs: u64,
    /// Gateway message size limit in bytes
    pub max_message_bytes: usize,
    /// Language for status queries without one
    pub default_language: String,
    /// HTTP request body limit in bytes
    pub max_request_bytes: usize,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
    /// Log level filter
    pub log_level: String,
    /// Emit JSON logs
    pub log_json: bool,
}

impl Config {
    /// Loads configuration from environment variables with validation.
    ///
    /// `CERT_PATH` and `CERT_PASSWORD` are optional here; the client reports
    /// them as missing when it is built.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable cannot be parsed or a value is out
    /// of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_env("PORT", 8080)?,
            gateway_url: parse_url_env("SIGNING_GATEWAY_URL", "https://signing-gateway.local:443")?,
            redirect_base_url: parse_url_env(
                "SIGNING_REDIRECT_BASE_URL",
                "https://signing-gateway.local",
            )?,
            cert_path: env::var("CERT_PATH").ok(),
            cert_password: env::var("CERT_PASSWORD").ok().map(SecretString::from),
            cert_base_dir: env::var("CERT_BASE_DIR")
                .map_or_else(|_| executable_dir(), PathBuf::from),
            insecure_skip_verify: parse_env(INSECURE_SKIP_VERIFY_VAR, false)?,
            open_timeout_secs: parse_env("GATEWAY_OPEN_TIMEOUT", 15)?,
            send_timeout_secs: parse_env("GATEWAY_SEND_TIMEOUT", 45)?,
            receive_timeout_secs: parse_env("GATEWAY_RECEIVE_TIMEOUT", 45)?,
            close_timeout_secs: parse_env("GATEWAY_CLOSE_TIMEOUT", 10)?,
            max_message_bytes: parse_env("GATEWAY_MAX_MESSAGE_BYTES", 10 * 1024 * 1024)?,
            default_language: env::var("DEFAULT_LANGUAGE").unwrap_or_else(|_| "en".to_string()),
            max_request_bytes: parse_env("MAX_REQUEST_BYTES", 16 * 1024 * 1024)?,
            shutdown_timeout_seconds: parse_env("SHUTDOWN_TIMEOUT", 30)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_json: parse_env("LOG_JSON", false)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }

        for (name, value) in [
            ("GATEWAY_OPEN_TIMEOUT", self.open_timeout_secs),
            ("GATEWAY_SEND_TIMEOUT", self.send_timeout_secs),
            ("GATEWAY_RECEIVE_TIMEOUT", self.receive_timeout_secs),
            ("GATEWAY_CLOSE_TIMEOUT", self.close_timeout_secs),
            ("SHUTDOWN_TIMEOUT", self.shutdown_timeout_seconds),
        ] {
            if value == 0 {
                return Err(ConfigError::NotPositive(name.to_string()));
            }
        }
        if self.max_message_bytes == 0 {
            return Err(ConfigError::NotPositive("GATEWAY_MAX_MESSAGE_BYTES".to_string()));
        }
        if self.max_request_bytes == 0 {
            return Err(ConfigError::NotPositive("MAX_REQUEST_BYTES".to_string()));
        }

        check_web_url("SIGNING_GATEWAY_URL", &self.gateway_url)?;
        check_web_url("SIGNING_REDIRECT_BASE_URL", &self.redirect_base_url)?;
        if self.redirect_base_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidUrl {
                field: "SIGNING_REDIRECT_BASE_URL".to_string(),
                reason: "cannot carry a path".to_string(),
            });
        }
        Ok(())
    }

    /// Socket address string for the HTTP listener.
    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Settings for the gateway channel factory.
    #[must_use]
    pub fn channel_settings(&self) -> ChannelSettings {
        let mut settings = ChannelSettings::new(self.gateway_url.clone())
            .with_insecure_skip_verify(self.insecure_skip_verify);
        settings.open_timeout = Duration::from_secs(self.open_timeout_secs);
        settings.send_timeout = Duration::from_secs(self.send_timeout_secs);
        settings.receive_timeout = Duration::from_secs(self.receive_timeout_secs);
        settings.close_timeout = Duration::from_secs(self.close_timeout_secs);
        settings.max_message_bytes = self.max_message_bytes;
        settings
    }

    /// Retry configuration for gateway calls.
    #[must_use]
    pub fn retry_config(&self) -> RetryConfig {
        signing_retry_config()
    }

    /// Graceful shutdown bound.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }
}

/// Parse an environment variable with a default value.
fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    parse_value(name, env::var(name).ok(), default)
}

fn parse_value<T: std::str::FromStr>(
    name: &str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match raw {
        Some(val) => val.trim().parse().map_err(|e: T::Err| ConfigError::ParseError {
            name: name.to_string(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Parse a URL environment variable with a default value.
fn parse_url_env(name: &str, default: &str) -> Result<Url, ConfigError> {
    let url_str = env::var(name).unwrap_or_else(|_| default.to_string());
    Url::parse(&url_str).map_err(|e| ConfigError::InvalidUrl {
        field: name.to_string(),
        reason: e.to_string(),
    })
}

fn check_web_url(field: &str, url: &Url) -> Result<(), ConfigError> {
    if !matches!(url.scheme(), "http" | "https") || url.host().is_none() {
        return Err(ConfigError::InvalidUrl {
            field: field.to_string(),
            reason: format!("expected an http(s) URL with a host, got '{url}'"),
        });
    }
    Ok(())
}

fn executable_dir() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}
