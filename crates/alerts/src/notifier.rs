//! Daily rate notification to every subscriber.

use crate::broadcast::{broadcast, BroadcastOutcome, MessageSender, DEFAULT_BROADCAST_DELAY};
use crate::db::Database;
use crate::formatter::RateFormatter;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tipocambio_core::compare;
use tipocambio_feeds::RateAggregator;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum NotifierError {
    #[error("No exchange rates available")]
    NoRates,
    #[error("A notification run is already in progress")]
    AlreadyRunning,
}

/// Fetches rates once and broadcasts them to all subscribers.
pub struct DailyNotifier<S: MessageSender> {
    aggregator: RateAggregator,
    formatter: RateFormatter,
    db: Database,
    sender: Arc<S>,
    delay: Duration,
    running: Mutex<()>,
}

impl<S: MessageSender> DailyNotifier<S> {
    pub fn new(
        aggregator: RateAggregator,
        formatter: RateFormatter,
        db: Database,
        sender: Arc<S>,
    ) -> Self {
        Self {
            aggregator,
            formatter,
            db,
            sender,
            delay: DEFAULT_BROADCAST_DELAY,
            running: Mutex::new(()),
        }
    }

    /// Set the pause between two sends.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Run one notification round.
    ///
    /// Nothing is sent when no source reported a rate. A call made while a
    /// previous round is still running returns `AlreadyRunning` immediately.
    pub async fn run(&self) -> Result<BroadcastOutcome, NotifierError> {
        let Ok(_guard) = self.running.try_lock() else {
            warn!("Daily notification still running, skipping this trigger");
            return Err(NotifierError::AlreadyRunning);
        };

        info!("Starting daily rates notification");
        let snapshot = self.aggregator.aggregate().await;
        let comparison = compare(&snapshot);

        if comparison.is_empty() {
            error!(
                sources = snapshot.len(),
                "No exchange rates available, notification not sent"
            );
            return Err(NotifierError::NoRates);
        }

        let text = self.formatter.format_daily(&snapshot, &comparison);

        match self.db.record_snapshot(&snapshot).await {
            Ok(rows) => info!(rows, "Archived today's rates"),
            Err(e) => warn!(error = %e, "Failed to archive rates"),
        }

        let outcome = broadcast(
            self.sender.as_ref(),
            self.db.stream_all_chat_ids(),
            &text,
            self.delay,
        )
        .await;

        if outcome.had_recipients() {
            info!(
                sent = outcome.sent,
                failed = outcome.failed,
                "Daily rates notification completed"
            );
        } else {
            warn!("No subscribers found for daily notification; send /subscribe to the bot to add one");
        }

        Ok(outcome)
    }
}
