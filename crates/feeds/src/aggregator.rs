//! Concurrent rate aggregation across every registered source.
//!
//! One aggregation round fans out one task per fetcher and waits for all of
//! them to settle. A failing source becomes an absent reading; it never
//! fails the round.

use crate::error::FetchError;
use crate::fetcher::RateFetcher;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tipocambio_core::{RateReading, RateSnapshot, Source};
use tokio::task::{Id, JoinSet};
use tracing::{debug, error, info, warn};

/// Malformed fetcher registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregateError {
    #[error("No rate fetchers registered")]
    NoFetchers,

    #[error("More than one fetcher registered for source: {0}")]
    DuplicateSource(Source),
}

type FetchOutcome = (Source, Result<f64, FetchError>, DateTime<Utc>);

/// Runs all fetchers concurrently and folds their results into a snapshot.
#[derive(Clone)]
pub struct RateAggregator {
    fetchers: Vec<Arc<dyn RateFetcher>>,
}

impl std::fmt::Debug for RateAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateAggregator")
            .field("sources", &self.sources())
            .finish()
    }
}

impl RateAggregator {
    /// Register fetchers. Each source may appear once.
    pub fn new(fetchers: Vec<Arc<dyn RateFetcher>>) -> Result<Self, AggregateError> {
        if fetchers.is_empty() {
            return Err(AggregateError::NoFetchers);
        }
        let mut seen = HashSet::new();
        for fetcher in &fetchers {
            if !seen.insert(fetcher.source()) {
                return Err(AggregateError::DuplicateSource(fetcher.source()));
            }
        }
        Ok(Self { fetchers })
    }

    /// Registered sources in key order.
    pub fn sources(&self) -> Vec<Source> {
        let mut sources: Vec<Source> = self.fetchers.iter().map(|f| f.source()).collect();
        sources.sort();
        sources
    }

    /// Fetch every source concurrently and build one snapshot.
    ///
    /// Always returns a snapshot with one entry per registered source.
    /// Each fetch is capped by its own timeout, so the round takes as long
    /// as the slowest source, never the sum. Dropping the returned future
    /// aborts any fetch still in flight.
    pub async fn aggregate(&self) -> RateSnapshot {
        info!(sources = self.fetchers.len(), "Fetching exchange rates from all sources");

        let mut tasks: JoinSet<FetchOutcome> = JoinSet::new();
        let mut task_sources: HashMap<Id, Source> = HashMap::with_capacity(self.fetchers.len());
        for fetcher in &self.fetchers {
            let source = fetcher.source();
            let fetcher = Arc::clone(fetcher);
            let handle = tasks.spawn(async move {
                let source = fetcher.source();
                let limit = fetcher.timeout();
                let result = match tokio::time::timeout(limit, fetcher.fetch()).await {
                    Ok(result) => result,
                    Err(_) => Err(FetchError::Timeout(format!(
                        "no response within {}s",
                        limit.as_secs_f64()
                    ))),
                };
                (source, result, Utc::now())
            });
            task_sources.insert(handle.id(), source);
        }

        let mut values: BTreeMap<Source, (f64, DateTime<Utc>)> = BTreeMap::new();
        let mut failed_at: BTreeMap<Source, DateTime<Utc>> = BTreeMap::new();

        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, (source, Ok(value), at))) if value.is_finite() && value > 0.0 => {
                    debug!(source = %source, rate = value, "Rate fetched");
                    values.insert(source, (value, at));
                }
                Ok((_, (source, Ok(value), at))) => {
                    error!(source = %source, rate = value, "Fetcher returned an invalid rate");
                    failed_at.insert(source, at);
                }
                Ok((_, (source, Err(e), at))) => {
                    if e.is_transient() {
                        warn!(source = %source, error = %e, "Failed to fetch rate");
                    } else {
                        error!(source = %source, error = %e, "Failed to fetch rate");
                    }
                    failed_at.insert(source, at);
                }
                Err(e) => match task_sources.get(&e.id()) {
                    Some(&source) => {
                        error!(source = %source, error = %e, "Rate fetch task did not complete");
                        failed_at.insert(source, Utc::now());
                    }
                    None => error!(error = %e, "Rate fetch task did not complete"),
                },
            }
        }

        let taken_at = Utc::now();
        let readings = self.fetchers.iter().map(|fetcher| {
            let source = fetcher.source();
            match values.get(&source) {
                Some(&(value, at)) => RateReading::present(source, value, at),
                None => RateReading::absent(
                    source,
                    failed_at.get(&source).copied().unwrap_or(taken_at),
                ),
            }
        });

        // Sources are unique (checked in `new`) and values are validated
        // above, so a rejected snapshot is a defect in this function.
        let snapshot = RateSnapshot::from_readings(readings, taken_at)
            .expect("aggregator built an invalid snapshot");

        info!(
            present = snapshot.present_count(),
            absent = snapshot.absent_count(),
            "Completed fetching rates"
        );
        snapshot
    }
}
