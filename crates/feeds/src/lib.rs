//! Exchange-rate collection from Guatemalan financial institutions.
//!
//! ## Architecture
//!
//! - `fetcher/` - One `RateFetcher` per institution (SOAP, JSON API, HTML page)
//! - `aggregator` - Concurrent fan-out over all fetchers into a `RateSnapshot`
//! - `config` - Endpoint, header and timeout settings per source

pub mod aggregator;
pub mod config;
pub mod error;
pub mod fetcher;

mod html;
mod http;

pub use aggregator::*;
pub use config::*;
pub use error::*;
pub use fetcher::*;
