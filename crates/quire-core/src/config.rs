//! Environment-driven configuration for the repository layer.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `QUIRE_DEFAULT_TAG_COLOR` | [`defaults::TAG_COLOR`] |
//! | `QUIRE_RATE_LIMIT_ENABLED` | `true` |
//! | `QUIRE_RATE_LIMIT_REQUESTS` | [`defaults::RATE_LIMIT_REQUESTS`] |
//! | `QUIRE_RATE_LIMIT_WINDOW_SECS` | [`defaults::RATE_LIMIT_WINDOW_SECS`] |

use std::str::FromStr;
use std::time::Duration;

use crate::defaults;
use crate::error::{Error, Result};
use crate::validation::validate_color;

/// Write rate limit settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests: defaults::RATE_LIMIT_REQUESTS,
            window: Duration::from_secs(defaults::RATE_LIMIT_WINDOW_SECS),
        }
    }
}

/// Settings consumed by [`crate::Quire`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuireConfig {
    pub default_tag_color: String,
    pub rate_limit: RateLimitConfig,
}

impl Default for QuireConfig {
    fn default() -> Self {
        Self {
            default_tag_color: defaults::TAG_COLOR.to_string(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl QuireConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(color) = lookup("QUIRE_DEFAULT_TAG_COLOR") {
            validate_color(&color).map_err(|e| Error::Config(e.to_string()))?;
            config.default_tag_color = color;
        }
        if let Some(enabled) = parse_var::<bool>(&lookup, "QUIRE_RATE_LIMIT_ENABLED")? {
            config.rate_limit.enabled = enabled;
        }
        if let Some(requests) = parse_var::<u32>(&lookup, "QUIRE_RATE_LIMIT_REQUESTS")? {
            if requests == 0 {
                return Err(Error::Config(
                    "QUIRE_RATE_LIMIT_REQUESTS must be non-zero".to_string(),
                ));
            }
            config.rate_limit.requests = requests;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "QUIRE_RATE_LIMIT_WINDOW_SECS")? {
            if secs == 0 {
                return Err(Error::Config(
                    "QUIRE_RATE_LIMIT_WINDOW_SECS must be non-zero".to_string(),
                ));
            }
            config.rate_limit.window = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

/// Parse an optional variable, reporting malformed values as config errors.
pub fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::Config(format!("{}='{}': {}", key, raw, e))),
    }
}
