//! Row types for the subscriber store and rate archive.

use chrono::{DateTime, Utc};
use tipocambio_core::Source;

/// A chat that receives the daily notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscriber {
    /// Database ID
    pub id: i64,
    /// Telegram chat ID, unique per subscriber
    pub chat_id: i64,
    pub subscribed_at: DateTime<Utc>,
}

/// One archived buy rate.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchivedRate {
    pub id: i64,
    pub source: Source,
    pub buy_rate: f64,
    pub recorded_at: DateTime<Utc>,
}
