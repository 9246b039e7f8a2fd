//! Configuration management for the storefront.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Storefront configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Backend API configuration
    pub api: ApiConfig,
    /// Durable client storage configuration
    pub storage: StorageConfig,
    /// Checkout session configuration
    pub checkout: CheckoutConfig,
    /// Authentication configuration
    pub auth: AuthConfig,
}

/// Backend API configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL, without trailing slash (e.g. `https://api.example.com/api`)
    pub base_url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

/// Durable client storage configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one file per storage key
    pub dir: PathBuf,
}

/// Checkout session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutConfig {
    /// Session length in seconds (default: 1800)
    pub session_seconds: u32,
    /// Payment verification interval in milliseconds (default: 3000)
    pub poll_interval_ms: u64,
    /// Countdown tick in milliseconds (default: 1000)
    pub tick_ms: u64,
}

/// Authentication configuration
///
/// Token storage is an external concern; the storefront only reads a bearer
/// token and the signed-in user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Bearer token sent with backend requests
    pub token: Option<String>,
    /// Signed-in user id
    pub user_id: Option<String>,
}

/// Payment verification interval used when none (or zero) is configured
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3000;

/// Countdown tick used when none (or zero) is configured
pub const DEFAULT_TICK_MS: u64 = 1000;

impl CheckoutConfig {
    /// Interval between payment verification requests; zero falls back to the default
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(non_zero_or(self.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS))
    }

    /// Interval between countdown ticks; zero falls back to the default
    #[must_use]
    pub const fn tick(&self) -> Duration {
        Duration::from_millis(non_zero_or(self.tick_ms, DEFAULT_TICK_MS))
    }
}

const fn non_zero_or(value: u64, default: u64) -> u64 {
    if value == 0 { default } else { value }
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            session_seconds: 1800,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            tick_ms: DEFAULT_TICK_MS,
        }
    }
}

impl ApiConfig {
    /// Per-request timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set to a value that does not parse
    /// or a setting is out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set to a value that does not parse
    /// or a setting is out of range.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = CheckoutConfig::default();

        let config = Self {
            api: ApiConfig {
                base_url: lookup("BOXOFFICE_API_URL")
                    .map(|url| url.trim_end_matches('/').to_string())
                    .unwrap_or_else(|| "http://localhost:8000/api".to_string()),
                timeout_secs: parse(&lookup, "BOXOFFICE_API_TIMEOUT_SECS")?.unwrap_or(30),
            },
            storage: StorageConfig {
                dir: lookup("BOXOFFICE_STORAGE_DIR")
                    .map_or_else(|| PathBuf::from(".boxoffice"), PathBuf::from),
            },
            checkout: CheckoutConfig {
                session_seconds: parse(&lookup, "BOXOFFICE_SESSION_SECONDS")?
                    .unwrap_or(defaults.session_seconds),
                poll_interval_ms: parse(&lookup, "BOXOFFICE_POLL_INTERVAL_MS")?
                    .unwrap_or(defaults.poll_interval_ms),
                tick_ms: parse(&lookup, "BOXOFFICE_TICK_MS")?.unwrap_or(defaults.tick_ms),
            },
            auth: AuthConfig {
                token: lookup("BOXOFFICE_API_TOKEN").filter(|t| !t.trim().is_empty()),
                user_id: lookup("BOXOFFICE_USER_ID").filter(|u| !u.trim().is_empty()),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Check ranges that parsing alone does not enforce.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] for empty URLs or zero intervals.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::OutOfRange("BOXOFFICE_API_URL must not be empty".into()));
        }
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::OutOfRange("BOXOFFICE_API_TIMEOUT_SECS must be positive".into()));
        }
        if self.checkout.session_seconds == 0 {
            return Err(ConfigError::OutOfRange("BOXOFFICE_SESSION_SECONDS must be positive".into()));
        }
        if self.checkout.poll_interval_ms == 0 || self.checkout.tick_ms == 0 {
            return Err(ConfigError::OutOfRange("checkout intervals must be positive".into()));
        }
        Ok(())
    }
}

fn parse<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { key, value })
        })
        .transpose()
}
