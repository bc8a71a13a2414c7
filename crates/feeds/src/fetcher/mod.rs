//! Rate fetcher trait and the registered source implementations.
//!
//! Each institution publishes its rate in its own format.
//! Fetchers normalize these into a single `f64` buy rate.

mod banguat;
mod banrural;
mod nexa;

pub use banguat::{parse_reference_rate, BanguatClient};
pub use banrural::{extract_api_rate, scan_currency_amounts, BanruralClient};
pub use nexa::{extract_labeled_rate, NexaScraper};

use crate::config::SourcesConfig;
use crate::error::FetchError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tipocambio_core::Source;

/// Retrieves one buy rate from one upstream source.
///
/// Implementations hold only construction-time configuration and open a
/// new HTTP session on every call.
#[async_trait]
pub trait RateFetcher: Send + Sync {
    /// Source this fetcher reports for.
    fn source(&self) -> Source;

    /// Upper bound for a single `fetch` call.
    fn timeout(&self) -> Duration;

    /// Fetch the current buy rate.
    async fn fetch(&self) -> Result<f64, FetchError>;
}

/// The fixed set of sources, one fetcher each.
pub fn default_fetchers(config: &SourcesConfig) -> Vec<Arc<dyn RateFetcher>> {
    vec![
        Arc::new(BanguatClient::new(config.banguat.clone(), config.headers.clone())),
        Arc::new(BanruralClient::new(config.banrural.clone(), config.headers.clone())),
        Arc::new(NexaScraper::new(config.nexa.clone(), config.headers.clone())),
    ]
}

/// Parse a scraped number, rejecting anything that is not a positive finite rate.
pub(crate) fn parse_rate(raw: &str) -> Result<f64, FetchError> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| FetchError::ParseFailure(format!("not a number: {:?}", raw)))?;
    plausible(value)
}

pub(crate) fn plausible(value: f64) -> Result<f64, FetchError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(FetchError::ParseFailure(format!("implausible rate: {}", value)));
    }
    Ok(value)
}
