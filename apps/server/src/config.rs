//! Application configuration from environment variables.

use chrono_tz::Tz;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tipocambio_alerts::{DEFAULT_BROADCAST_DELAY, DEFAULT_TIMEZONE};
use tipocambio_feeds::{RateBounds, SourcesConfig, DEFAULT_TIMEOUT_SECS};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://tipocambio.db";
pub const DEFAULT_NOTIFY_HOUR: u32 = 8;
pub const DEFAULT_NOTIFY_MINUTE: u32 = 0;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Application configuration.
#[derive(Clone)]
pub struct AppConfig {
    /// Telegram bot token.
    pub telegram_token: String,
    pub database_url: String,
    /// Timezone for the daily schedule and rendered timestamps.
    pub timezone: Tz,
    pub notify_hour: u32,
    pub notify_minute: u32,
    /// Pause between two broadcast sends.
    pub broadcast_delay: Duration,
    /// Upstream source endpoints and limits.
    pub sources: SourcesConfig,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("telegram_token", &"<redacted>")
            .field("database_url", &self.database_url)
            .field("timezone", &self.timezone)
            .field("notify_hour", &self.notify_hour)
            .field("notify_minute", &self.notify_minute)
            .field("broadcast_delay", &self.broadcast_delay)
            .field("sources", &self.sources)
            .finish()
    }
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let telegram_token = get("TELEGRAM_BOT_TOKEN").ok_or(ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?;
        let database_url = get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let timezone = match get("TIMEZONE") {
            Some(name) => name.parse::<Tz>().map_err(|e| ConfigError::Invalid {
                key: "TIMEZONE",
                value: name.clone(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_TIMEZONE,
        };

        let notify_hour = parse_or(&get, "NOTIFY_HOUR", DEFAULT_NOTIFY_HOUR)?;
        if notify_hour > 23 {
            return Err(invalid("NOTIFY_HOUR", notify_hour, "must be 0-23"));
        }
        let notify_minute = parse_or(&get, "NOTIFY_MINUTE", DEFAULT_NOTIFY_MINUTE)?;
        if notify_minute > 59 {
            return Err(invalid("NOTIFY_MINUTE", notify_minute, "must be 0-59"));
        }

        let delay_ms = parse_or(
            &get,
            "BROADCAST_DELAY_MS",
            DEFAULT_BROADCAST_DELAY.as_millis() as u64,
        )?;

        let timeout_secs = parse_or(&get, "FETCH_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(invalid("FETCH_TIMEOUT_SECS", timeout_secs, "must be positive"));
        }

        let defaults = RateBounds::default();
        let bounds = RateBounds {
            min: parse_or(&get, "RATE_MIN", defaults.min)?,
            max: parse_or(&get, "RATE_MAX", defaults.max)?,
        };
        if !(bounds.min.is_finite() && bounds.max.is_finite() && 0.0 < bounds.min && bounds.min <= bounds.max) {
            return Err(ConfigError::Invalid {
                key: "RATE_MIN",
                value: format!("{}..{}", bounds.min, bounds.max),
                reason: "bounds must satisfy 0 < RATE_MIN <= RATE_MAX".to_string(),
            });
        }

        let mut sources = SourcesConfig::default()
            .with_timeout(Duration::from_secs(timeout_secs))
            .with_bounds(bounds);
        if let Some(url) = get("BANGUAT_URL") {
            sources.banguat.url = url;
        }
        if let Some(url) = get("BANRURAL_API_URL") {
            sources.banrural.api_url = url;
        }
        if let Some(url) = get("BANRURAL_PAGE_URL") {
            sources.banrural.page_url = url;
        }
        if let Some(url) = get("NEXA_URL") {
            sources.nexa.url = url;
        }

        Ok(Self {
            telegram_token,
            database_url,
            timezone,
            notify_hour,
            notify_minute,
            broadcast_delay: Duration::from_millis(delay_ms),
            sources,
        })
    }
}

fn parse_or<G, T>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match get(key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn invalid(key: &'static str, value: impl fmt::Display, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("TELEGRAM_BOT_TOKEN", "123:abc")]).unwrap();

        assert_eq!(config.telegram_token, "123:abc");
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.timezone, chrono_tz::America::Guatemala);
        assert_eq!((config.notify_hour, config.notify_minute), (8, 0));
        assert_eq!(config.broadcast_delay, Duration::from_millis(100));
        assert_eq!(config.sources.banguat.timeout_secs, 30);
        assert_eq!(config.sources.banrural.bounds, RateBounds::default());
    }

    #[test]
    fn test_missing_token() {
        assert_eq!(load(&[]).unwrap_err(), ConfigError::Missing("TELEGRAM_BOT_TOKEN"));
        assert_eq!(
            load(&[("TELEGRAM_BOT_TOKEN", "  ")]).unwrap_err(),
            ConfigError::Missing("TELEGRAM_BOT_TOKEN")
        );
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("TIMEZONE", "America/Mexico_City"),
            ("NOTIFY_HOUR", "7"),
            ("NOTIFY_MINUTE", "30"),
            ("FETCH_TIMEOUT_SECS", "10"),
            ("RATE_MIN", "6.5"),
            ("RATE_MAX", "9.5"),
            ("NEXA_URL", "http://localhost:8080/nexa"),
        ])
        .unwrap();

        assert_eq!(config.timezone, chrono_tz::America::Mexico_City);
        assert_eq!((config.notify_hour, config.notify_minute), (7, 30));
        assert_eq!(config.sources.nexa.timeout_secs, 10);
        assert_eq!(config.sources.banguat.timeout_secs, 10);
        assert_eq!(config.sources.banrural.bounds, RateBounds { min: 6.5, max: 9.5 });
        assert_eq!(config.sources.nexa.url, "http://localhost:8080/nexa");
    }

    #[test]
    fn test_invalid_values() {
        let err = load(&[("TELEGRAM_BOT_TOKEN", "t"), ("NOTIFY_HOUR", "24")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "NOTIFY_HOUR", .. }));

        let err = load(&[("TELEGRAM_BOT_TOKEN", "t"), ("TIMEZONE", "Mars/Olympus")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "TIMEZONE", .. }));

        let err = load(&[("TELEGRAM_BOT_TOKEN", "t"), ("RATE_MIN", "9"), ("RATE_MAX", "8")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "RATE_MIN", .. }));

        let err = load(&[("TELEGRAM_BOT_TOKEN", "t"), ("FETCH_TIMEOUT_SECS", "abc")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "FETCH_TIMEOUT_SECS", .. }));
    }
}
