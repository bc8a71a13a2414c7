//! Sequential delivery of one message to many chats.

use async_trait::async_trait;
use futures_util::{pin_mut, Stream, StreamExt};
use std::time::Duration;
use tracing::{debug, error, info};

/// Default pause between two sends.
pub const DEFAULT_BROADCAST_DELAY: Duration = Duration::from_millis(100);

/// Outbound message transport.
#[async_trait]
pub trait MessageSender: Send + Sync {
    type Error: std::fmt::Display + Send;

    /// Send HTML-formatted text to one chat.
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), Self::Error>;
}

/// Delivery counts for one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastOutcome {
    pub sent: usize,
    pub failed: usize,
}

impl BroadcastOutcome {
    pub fn total(&self) -> usize {
        self.sent + self.failed
    }

    pub fn had_recipients(&self) -> bool {
        self.total() > 0
    }
}

/// Send `text` to every chat in `chat_ids`, one at a time.
///
/// A failed send is logged and counted; delivery continues with the next
/// chat. `delay` is slept between sends to stay under the transport's rate
/// limit.
pub async fn broadcast<S, C>(
    sender: &S,
    chat_ids: C,
    text: &str,
    delay: Duration,
) -> BroadcastOutcome
where
    S: MessageSender + ?Sized,
    C: Stream<Item = i64>,
{
    pin_mut!(chat_ids);
    let mut outcome = BroadcastOutcome::default();

    while let Some(chat_id) = chat_ids.next().await {
        if outcome.had_recipients() && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match sender.send_message(chat_id, text).await {
            Ok(()) => {
                debug!(chat_id, "Message delivered");
                outcome.sent += 1;
            }
            Err(e) => {
                error!(chat_id, error = %e, "Failed to deliver message");
                outcome.failed += 1;
            }
        }
    }

    info!(sent = outcome.sent, failed = outcome.failed, "Broadcast completed");
    outcome
}
