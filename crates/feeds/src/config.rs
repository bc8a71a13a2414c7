//! Per-source fetcher configuration.
//!
//! Supplied once at construction; fetchers never re-read it.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default per-fetch timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// HTTP headers sent to every upstream site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderSettings {
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
}

impl Default for HeaderSettings {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            accept: "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"
                .to_string(),
            accept_language: "es-ES,es;q=0.8,en-US;q=0.5,en;q=0.3".to_string(),
        }
    }
}

/// Plausible range for a scraped USD/GTQ figure, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateBounds {
    pub min: f64,
    pub max: f64,
}

impl Default for RateBounds {
    fn default() -> Self {
        Self { min: 7.0, max: 9.0 }
    }
}

impl RateBounds {
    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }
}

/// Banco de Guatemala SOAP service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BanguatConfig {
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for BanguatConfig {
    fn default() -> Self {
        Self {
            url: "https://www.banguat.gob.gt/variables/ws/TipoCambio.asmx".to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Banrural JSON API plus the public page used as fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BanruralConfig {
    pub api_url: String,
    pub page_url: String,
    /// JSON key holding the virtual-banking buy rate.
    pub rate_field: String,
    pub bounds: RateBounds,
    /// Whole-fetch budget covering the API call and the page fallback.
    pub timeout_secs: u64,
    /// Share of `timeout_secs` the API call may use before falling back.
    #[serde(default = "default_api_timeout_secs")]
    pub api_timeout_secs: u64,
}

fn default_api_timeout_secs() -> u64 {
    api_share(DEFAULT_TIMEOUT_SECS)
}

/// A third of the total, at least one second.
fn api_share(total_secs: u64) -> u64 {
    (total_secs / 3).max(1)
}

impl Default for BanruralConfig {
    fn default() -> Self {
        Self {
            api_url: "https://www.banrural.com.gt/_hcms/api/site/banrural/tasadecambio".to_string(),
            page_url: "https://www.banrural.com.gt/site/personas".to_string(),
            rate_field: "compra_dolares_docto_bv".to_string(),
            bounds: RateBounds::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            api_timeout_secs: default_api_timeout_secs(),
        }
    }
}

/// Nexa Banco public website.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NexaConfig {
    pub url: String,
    /// Text label that precedes the buy rate on the page.
    pub label: String,
    pub timeout_secs: u64,
}

impl Default for NexaConfig {
    fn default() -> Self {
        Self {
            url: "https://www.nexabanco.com/".to_string(),
            label: "Compra:".to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Configuration for every registered source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourcesConfig {
    pub headers: HeaderSettings,
    pub banguat: BanguatConfig,
    pub banrural: BanruralConfig,
    pub nexa: NexaConfig,
}

impl SourcesConfig {
    /// Apply one timeout to every source.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let secs = timeout.as_secs().max(1);
        self.banguat.timeout_secs = secs;
        self.banrural.timeout_secs = secs;
        self.banrural.api_timeout_secs = api_share(secs);
        self.nexa.timeout_secs = secs;
        self
    }

    /// Apply sanity bounds to every HTML-scraped source.
    pub fn with_bounds(mut self, bounds: RateBounds) -> Self {
        self.banrural.bounds = bounds;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_are_inclusive() {
        let bounds = RateBounds::default();
        assert!(bounds.contains(7.0));
        assert!(bounds.contains(7.8));
        assert!(bounds.contains(9.0));
        assert!(!bounds.contains(6.99));
        assert!(!bounds.contains(107.8));
        assert!(!bounds.contains(f64::NAN));
    }

    #[test]
    fn test_with_timeout_applies_to_all_sources() {
        let config = SourcesConfig::default().with_timeout(Duration::from_secs(5));
        assert_eq!(config.banguat.timeout_secs, 5);
        assert_eq!(config.banrural.timeout_secs, 5);
        assert_eq!(config.nexa.timeout_secs, 5);
        assert_eq!(config.banrural.api_timeout_secs, 1);

        let config = SourcesConfig::default().with_timeout(Duration::from_secs(30));
        assert_eq!(config.banrural.api_timeout_secs, 10);
    }

    #[test]
    fn test_config_deserializes_with_overrides() {
        let json = r#"{
            "headers": {"user_agent": "bot", "accept": "*/*", "accept_language": "es"},
            "banguat": {"url": "http://localhost/soap", "timeout_secs": 3},
            "banrural": {
                "api_url": "http://localhost/api",
                "page_url": "http://localhost/page",
                "rate_field": "compra",
                "bounds": {"min": 6.5, "max": 8.5},
                "timeout_secs": 3
            },
            "nexa": {"url": "http://localhost/", "label": "Compra:", "timeout_secs": 3}
        }"#;
        let config: SourcesConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.banrural.bounds.min, 6.5);
        assert_eq!(config.headers.user_agent, "bot");
        assert_eq!(config.nexa.timeout_secs, 3);
        assert_eq!(config.banrural.api_timeout_secs, 10);
    }
}
