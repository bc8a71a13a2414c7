//! Best-rate selection, ranking and spread over a snapshot.

use crate::{RateSnapshot, Source};
use serde::Serialize;
use std::cmp::Ordering;

/// A source with the rate it reported this round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RankedRate {
    pub source: Source,
    pub value: f64,
}

/// Read-only view derived from one [`RateSnapshot`].
///
/// When no source reported a value the result is empty: `best` and
/// `spread` are `None` and `ranking` has no entries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    /// Highest rate; ties go to the lowest source key.
    pub best: Option<RankedRate>,
    /// Present rates, highest first.
    pub ranking: Vec<RankedRate>,
    /// Highest minus lowest present rate.
    pub spread: Option<f64>,
    pub present: usize,
    pub absent: usize,
    /// Sources without a value this round, in key order.
    pub unavailable: Vec<Source>,
}

impl ComparisonResult {
    /// True when no source had a value.
    pub fn is_empty(&self) -> bool {
        self.ranking.is_empty()
    }

    pub fn is_best(&self, source: Source) -> bool {
        self.best.is_some_and(|b| b.source == source)
    }
}

/// Descending by value, then ascending by source key.
fn rank_order(a: &RankedRate, b: &RankedRate) -> Ordering {
    b.value.total_cmp(&a.value).then_with(|| a.source.cmp(&b.source))
}

/// Compare every present rate in a snapshot. Absent sources are ignored.
pub fn compare(snapshot: &RateSnapshot) -> ComparisonResult {
    let mut ranking = Vec::with_capacity(snapshot.len());
    let mut unavailable = Vec::new();

    for reading in snapshot.iter() {
        match reading.value {
            Some(value) => {
                // A snapshot can only be built from finite values.
                assert!(value.is_finite(), "non-finite rate for {}", reading.source);
                ranking.push(RankedRate {
                    source: reading.source,
                    value,
                });
            }
            None => unavailable.push(reading.source),
        }
    }

    ranking.sort_by(rank_order);

    let best = ranking.first().copied();
    let spread = match (ranking.first(), ranking.last()) {
        (Some(high), Some(low)) => Some(high.value - low.value),
        _ => None,
    };

    ComparisonResult {
        best,
        present: ranking.len(),
        absent: unavailable.len(),
        ranking,
        spread,
        unavailable,
    }
}
