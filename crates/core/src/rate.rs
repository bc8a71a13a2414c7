//! Rate readings and per-round snapshots.

use crate::Source;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SnapshotError {
    #[error("Duplicate reading for source: {0}")]
    DuplicateSource(Source),

    #[error("Invalid rate {value} for source {origin}")]
    InvalidValue { origin: Source, value: f64 },
}

/// One source's result for one aggregation round.
///
/// `value` is `None` when the fetch failed. An absent value is never zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RateReading {
    pub source: Source,
    pub value: Option<f64>,
    pub fetched_at: DateTime<Utc>,
}

impl RateReading {
    pub fn present(source: Source, value: f64, fetched_at: DateTime<Utc>) -> Self {
        Self {
            source,
            value: Some(value),
            fetched_at,
        }
    }

    pub fn absent(source: Source, fetched_at: DateTime<Utc>) -> Self {
        Self {
            source,
            value: None,
            fetched_at,
        }
    }

    #[inline]
    pub fn is_present(&self) -> bool {
        self.value.is_some()
    }
}

/// Point-in-time read across every registered source.
///
/// Holds exactly one reading per source. Built once per round and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateSnapshot {
    readings: BTreeMap<Source, RateReading>,
    taken_at: DateTime<Utc>,
}

impl RateSnapshot {
    /// Build a snapshot, rejecting duplicate sources and values that are
    /// not finite positive numbers.
    pub fn from_readings(
        readings: impl IntoIterator<Item = RateReading>,
        taken_at: DateTime<Utc>,
    ) -> Result<Self, SnapshotError> {
        let mut map = BTreeMap::new();
        for reading in readings {
            if let Some(value) = reading.value {
                if !value.is_finite() || value <= 0.0 {
                    return Err(SnapshotError::InvalidValue {
                        origin: reading.source,
                        value,
                    });
                }
            }
            if map.insert(reading.source, reading).is_some() {
                return Err(SnapshotError::DuplicateSource(reading.source));
            }
        }
        Ok(Self {
            readings: map,
            taken_at,
        })
    }

    pub fn get(&self, source: Source) -> Option<&RateReading> {
        self.readings.get(&source)
    }

    /// Rate for a source, `None` if the source is unknown or absent.
    pub fn value(&self, source: Source) -> Option<f64> {
        self.get(source).and_then(|r| r.value)
    }

    /// Readings in source key order.
    pub fn iter(&self) -> impl Iterator<Item = &RateReading> {
        self.readings.values()
    }

    pub fn sources(&self) -> impl Iterator<Item = Source> + '_ {
        self.readings.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn present_count(&self) -> usize {
        self.readings.values().filter(|r| r.is_present()).count()
    }

    pub fn absent_count(&self) -> usize {
        self.len() - self.present_count()
    }

    pub fn has_any_rate(&self) -> bool {
        self.readings.values().any(RateReading::is_present)
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 14, 0, 0).unwrap()
    }

    #[test]
    fn test_snapshot_orders_by_source_key() {
        let snapshot = RateSnapshot::from_readings(
            [
                RateReading::present(Source::Nexa, 7.70, ts()),
                RateReading::absent(Source::Banguat, ts()),
                RateReading::present(Source::Banrural, 7.72, ts()),
            ],
            ts(),
        )
        .unwrap();

        let order: Vec<Source> = snapshot.sources().collect();
        assert_eq!(order, vec![Source::Banguat, Source::Banrural, Source::Nexa]);
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.present_count(), 2);
        assert_eq!(snapshot.absent_count(), 1);
        assert!(snapshot.has_any_rate());
        assert_eq!(snapshot.value(Source::Banguat), None);
        assert_eq!(snapshot.value(Source::Nexa), Some(7.70));
    }

    #[test]
    fn test_snapshot_keeps_absent_sources_as_entries() {
        let snapshot = RateSnapshot::from_readings(
            Source::ALL.map(|s| RateReading::absent(s, ts())),
            ts(),
        )
        .unwrap();

        assert_eq!(snapshot.len(), 3);
        assert!(!snapshot.has_any_rate());
        assert!(snapshot.get(Source::Banrural).is_some());
    }

    #[test]
    fn test_snapshot_rejects_duplicates() {
        let result = RateSnapshot::from_readings(
            [
                RateReading::present(Source::Nexa, 7.70, ts()),
                RateReading::absent(Source::Nexa, ts()),
            ],
            ts(),
        );
        assert_eq!(result, Err(SnapshotError::DuplicateSource(Source::Nexa)));
    }

    #[test]
    fn test_snapshot_rejects_invalid_values() {
        for bad in [f64::NAN, f64::INFINITY, 0.0, -7.8] {
            let result = RateSnapshot::from_readings(
                [RateReading::present(Source::Banguat, bad, ts())],
                ts(),
            );
            assert!(
                matches!(result, Err(SnapshotError::InvalidValue { origin: Source::Banguat, .. })),
                "value {bad} should be rejected"
            );
        }
    }
}
