//! Nexa Banco website scraper.

use super::{parse_rate, RateFetcher};
use crate::config::{HeaderSettings, NexaConfig};
use crate::error::FetchError;
use crate::html::page_text;
use crate::http::{build_client, send_for_text};
use async_trait::async_trait;
use regex::Regex;
use std::time::Duration;
use tipocambio_core::Source;
use tracing::{debug, warn};

pub struct NexaScraper {
    config: NexaConfig,
    headers: HeaderSettings,
}

impl NexaScraper {
    pub fn new(config: NexaConfig, headers: HeaderSettings) -> Self {
        Self { config, headers }
    }
}

#[async_trait]
impl RateFetcher for NexaScraper {
    fn source(&self) -> Source {
        Source::Nexa
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    async fn fetch(&self) -> Result<f64, FetchError> {
        let client = build_client(&self.headers, self.timeout())?;
        let html = send_for_text(client.get(&self.config.url)).await?;
        let text = page_text(&html);

        match extract_labeled_rate(&text, &self.config.label) {
            Ok(rate) => {
                debug!(source = "nexa", rate, "Found buy rate");
                Ok(rate)
            }
            Err(e) => {
                warn!(source = "nexa", label = %self.config.label, "Buy rate label not on page");
                Err(e)
            }
        }
    }
}

/// Find `label` (case-insensitive) followed by a decimal number in plain text.
pub fn extract_labeled_rate(text: &str, label: &str) -> Result<f64, FetchError> {
    let pattern = Regex::new(&format!(r"(?i){}\s*(\d+\.\d+)", regex::escape(label.trim())))?;

    let captures = pattern
        .captures(text)
        .ok_or_else(|| FetchError::NotFound(format!("label {:?} not found", label)))?;

    match captures.get(1) {
        Some(m) => parse_rate(m.as_str()),
        None => Err(FetchError::NotFound(format!("no number after {:?}", label))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header_exists, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_extract_labeled_rate() {
        assert_eq!(extract_labeled_rate("Dólar Compra: 7.62 Venta: 7.88", "Compra:"), Ok(7.62));
        assert_eq!(extract_labeled_rate("COMPRA:7.6", "Compra:"), Ok(7.6));
    }

    #[test]
    fn test_extract_labeled_rate_missing_label() {
        let result = extract_labeled_rate("Venta: 7.88", "Compra:");
        assert!(matches!(result, Err(FetchError::NotFound(_))));
    }

    #[test]
    fn test_extract_labeled_rate_label_without_number() {
        let result = extract_labeled_rate("Compra: consulte en agencia", "Compra:");
        assert!(matches!(result, Err(FetchError::NotFound(_))));
    }

    #[test]
    fn test_extract_labeled_rate_escapes_label() {
        assert_eq!(extract_labeled_rate("USD (compra) 7.61", "USD (compra)"), Ok(7.61));
        assert!(extract_labeled_rate("USD compra 7.61", "USD (compra)").is_err());
    }

    fn scraper_for(server: &MockServer) -> NexaScraper {
        NexaScraper::new(
            NexaConfig {
                url: format!("{}/", server.uri()),
                timeout_secs: 5,
                ..Default::default()
            },
            HeaderSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_fetch_scrapes_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header_exists("user-agent"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><body><div class="tipo-cambio"><span>Compra:</span> <strong>7.63</strong></div></body></html>"#,
            ))
            .mount(&server)
            .await;

        assert_eq!(scraper_for(&server).fetch().await, Ok(7.63));
    }

    #[tokio::test]
    async fn test_fetch_without_label_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>Mantenimiento</body></html>"))
            .mount(&server)
            .await;

        let result = scraper_for(&server).fetch().await;
        assert!(matches!(result, Err(FetchError::NotFound(_))));
    }
}
