//! Telegram delivery of USD/GTQ exchange rates.
//!
//! This crate provides:
//! - SQLite storage for subscribers and archived rates
//! - Telegram HTML formatting of rate snapshots
//! - The Telegram bot, subscriber broadcast and the daily notifier

pub mod broadcast;
pub mod db;
pub mod formatter;
pub mod models;
pub mod notifier;
pub mod telegram;

pub use broadcast::{broadcast, BroadcastOutcome, MessageSender, DEFAULT_BROADCAST_DELAY};
pub use db::{Database, DbError};
pub use formatter::{DisplayNames, MessageKind, RateFormatter, DEFAULT_TIMEZONE};
pub use models::{ArchivedRate, Subscriber};
pub use notifier::{DailyNotifier, NotifierError};
pub use telegram::{Command, TelegramBot, TelegramError};
