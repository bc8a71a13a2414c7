//! Banrural virtual-banking rate: JSON API first, public page as fallback.

use super::{parse_rate, plausible, RateFetcher};
use crate::config::{BanruralConfig, HeaderSettings, RateBounds};
use crate::error::FetchError;
use crate::html::page_text;
use crate::http::{build_client, send_for_text};
use async_trait::async_trait;
use regex::Regex;
use reqwest::header::REFERER;
use reqwest::Client;
use std::sync::LazyLock;
use std::time::Duration;
use tipocambio_core::Source;
use tokio::time::Instant;
use tracing::{debug, info};

/// Decimal amounts written with a quetzal marker before or after them,
/// e.g. "Q7.65", "GTQ 7.65", "7.65 Q".
static CURRENCY_AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:GTQ|Q)\s*(\d+\.\d+)\b|\b(\d+\.\d+)\s*(?:GTQ|Q)\b")
        .expect("Invalid regex pattern")
});

pub struct BanruralClient {
    config: BanruralConfig,
    headers: HeaderSettings,
}

impl BanruralClient {
    pub fn new(config: BanruralConfig, headers: HeaderSettings) -> Self {
        Self { config, headers }
    }

    fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.config.api_timeout_secs)
    }

    async fn fetch_from_api(&self, client: &Client) -> Result<f64, FetchError> {
        let request = client
            .get(&self.config.api_url)
            .header(REFERER, &self.config.page_url)
            .header("X-Requested-With", "XMLHttpRequest");

        let body = send_for_text(request).await?;
        let json: serde_json::Value = serde_json::from_str(&body)?;
        extract_api_rate(&json, &self.config.rate_field)
    }

    async fn fetch_from_page(&self, client: &Client) -> Result<f64, FetchError> {
        let html = send_for_text(client.get(&self.config.page_url)).await?;
        let text = page_text(&html);
        first_in_bounds(&text, self.config.bounds).ok_or_else(|| {
            FetchError::NotFound(format!(
                "no quetzal amount within [{}, {}] on page",
                self.config.bounds.min, self.config.bounds.max
            ))
        })
    }
}

#[async_trait]
impl RateFetcher for BanruralClient {
    fn source(&self) -> Source {
        Source::Banrural
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    async fn fetch(&self) -> Result<f64, FetchError> {
        let deadline = Instant::now() + self.timeout();
        let api_budget = self.api_timeout().min(self.timeout());
        let client = build_client(&self.headers, self.timeout())?;

        match tokio::time::timeout(api_budget, self.fetch_from_api(&client)).await {
            Ok(Ok(rate)) => {
                info!(source = "banrural", rate, "Got buy rate from API");
                return Ok(rate);
            }
            Ok(Err(e)) => {
                debug!(source = "banrural", error = %e, "API lookup failed, scanning page");
            }
            Err(_) => {
                debug!(
                    source = "banrural",
                    budget_secs = api_budget.as_secs_f64(),
                    "API lookup timed out, scanning page"
                );
            }
        }

        let rate = tokio::time::timeout_at(deadline, self.fetch_from_page(&client))
            .await
            .map_err(|_| {
                FetchError::Timeout(format!(
                    "no rate within {}s",
                    self.timeout().as_secs_f64()
                ))
            })??;
        info!(source = "banrural", rate, "Got buy rate from page");
        Ok(rate)
    }
}

/// Read the buy rate from the API payload. The field may be a JSON number
/// or a numeric string.
pub fn extract_api_rate(json: &serde_json::Value, field: &str) -> Result<f64, FetchError> {
    match json.get(field) {
        None | Some(serde_json::Value::Null) => {
            Err(FetchError::NotFound(format!("field {} missing", field)))
        }
        Some(serde_json::Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| FetchError::ParseFailure(format!("{} is not a float", n)))
            .and_then(plausible),
        Some(serde_json::Value::String(s)) => parse_rate(s),
        Some(other) => Err(FetchError::ParseFailure(format!(
            "unexpected value for {}: {}",
            field, other
        ))),
    }
}

/// Every quetzal-marked decimal in `text`, in document order.
pub fn scan_currency_amounts(text: &str) -> Vec<f64> {
    CURRENCY_AMOUNT
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .collect()
}

fn first_in_bounds(text: &str, bounds: RateBounds) -> Option<f64> {
    scan_currency_amounts(text)
        .into_iter()
        .find(|v| bounds.contains(*v))
}
