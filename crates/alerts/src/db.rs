//! SQLite storage for notification subscribers and archived rates.

use crate::models::{ArchivedRate, Subscriber};
use chrono::{DateTime, Utc};
use futures_util::stream::{self, BoxStream, StreamExt};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use thiserror::Error;
use tipocambio_core::{RateSnapshot, Source};
use tracing::{debug, error, info};

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Unknown institution in archive: {0}")]
    UnknownInstitution(String),
}

/// Database connection for subscribers and the rate archive.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    in_memory: bool,
}

impl Database {
    /// Connect to SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self, DbError> {
        let in_memory = database_url.contains(":memory:");
        let mut options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // Every connection to an in-memory database sees its own empty
        // database, so keep exactly one alive for the pool's lifetime.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options.connect_with(options).await?;

        let db = Self { pool, in_memory };
        db.run_migrations().await?;
        info!(url = %database_url, "Database ready");
        Ok(db)
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<(), DbError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS notification_subscriptions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id INTEGER NOT NULL UNIQUE,
                subscribed_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS institutions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS exchange_rates (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                institution_id INTEGER NOT NULL REFERENCES institutions(id),
                buy_rate REAL NOT NULL,
                recorded_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_exchange_rates_institution
            ON exchange_rates(institution_id, recorded_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Subscribe a chat. Subscribing twice returns the existing row.
    pub async fn add_subscriber(&self, chat_id: i64) -> Result<Subscriber, DbError> {
        if let Some(existing) = self.get_subscriber(chat_id).await? {
            debug!(chat_id, "Chat already subscribed");
            return Ok(existing);
        }

        let subscribed_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO notification_subscriptions (chat_id, subscribed_at) VALUES (?, ?)",
        )
        .bind(chat_id)
        .bind(subscribed_at)
        .execute(&self.pool)
        .await?;

        Ok(Subscriber {
            id: result.last_insert_rowid(),
            chat_id,
            subscribed_at,
        })
    }

    /// Look up one subscriber.
    pub async fn get_subscriber(&self, chat_id: i64) -> Result<Option<Subscriber>, DbError> {
        let row = sqlx::query_as::<_, (i64, i64, DateTime<Utc>)>(
            "SELECT id, chat_id, subscribed_at FROM notification_subscriptions WHERE chat_id = ?",
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, chat_id, subscribed_at)| Subscriber {
            id,
            chat_id,
            subscribed_at,
        }))
    }

    /// Unsubscribe a chat. Returns false if it was not subscribed.
    pub async fn remove_subscriber(&self, chat_id: i64) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM notification_subscriptions WHERE chat_id = ?")
            .bind(chat_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn subscriber_count(&self) -> Result<i64, DbError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM notification_subscriptions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Stream every subscribed chat ID in subscription order.
    ///
    /// Rows that fail to decode are logged and skipped. A file database keeps
    /// one pooled connection checked out until the stream is dropped. An
    /// in-memory database reads all IDs up front instead, since its single
    /// connection must stay free for subscribe and unsubscribe during a
    /// broadcast.
    pub fn stream_all_chat_ids(&self) -> BoxStream<'_, i64> {
        let query =
            sqlx::query_scalar::<_, i64>("SELECT chat_id FROM notification_subscriptions ORDER BY id");

        if self.in_memory {
            return stream::once(query.fetch_all(&self.pool))
                .flat_map(|rows| {
                    let chat_ids = rows.unwrap_or_else(|e| {
                        error!(error = %e, "Failed to read subscribers");
                        Vec::new()
                    });
                    stream::iter(chat_ids)
                })
                .boxed();
        }

        query
            .fetch(&self.pool)
            .filter_map(|row| async move {
                match row {
                    Ok(chat_id) => Some(chat_id),
                    Err(e) => {
                        error!(error = %e, "Failed to read subscriber row");
                        None
                    }
                }
            })
            .boxed()
    }

    /// Archive every present reading of a snapshot. Returns rows written.
    pub async fn record_snapshot(&self, snapshot: &RateSnapshot) -> Result<usize, DbError> {
        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for reading in snapshot.iter() {
            let Some(value) = reading.value else {
                continue;
            };
            let name = reading.source.institution_name();

            sqlx::query("INSERT OR IGNORE INTO institutions (name) VALUES (?)")
                .bind(name)
                .execute(&mut *tx)
                .await?;
            let institution_id =
                sqlx::query_scalar::<_, i64>("SELECT id FROM institutions WHERE name = ?")
                    .bind(name)
                    .fetch_one(&mut *tx)
                    .await?;

            sqlx::query(
                "INSERT INTO exchange_rates (institution_id, buy_rate, recorded_at) VALUES (?, ?, ?)",
            )
            .bind(institution_id)
            .bind(value)
            .bind(reading.fetched_at)
            .execute(&mut *tx)
            .await?;
            written += 1;
        }

        tx.commit().await?;
        debug!(rows = written, "Archived snapshot");
        Ok(written)
    }

    /// Most recent archived rate for a source.
    pub async fn latest_rate(&self, source: Source) -> Result<Option<ArchivedRate>, DbError> {
        let row = sqlx::query_as::<_, (i64, String, f64, DateTime<Utc>)>(
            r#"
            SELECT r.id, i.name, r.buy_rate, r.recorded_at
            FROM exchange_rates r
            JOIN institutions i ON i.id = r.institution_id
            WHERE i.name = ?
            ORDER BY r.recorded_at DESC, r.id DESC
            LIMIT 1
            "#,
        )
        .bind(source.institution_name())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(id, name, buy_rate, recorded_at)| {
            let source = Source::ALL
                .into_iter()
                .find(|s| s.institution_name() == name)
                .ok_or_else(|| DbError::UnknownInstitution(name.clone()))?;
            Ok(ArchivedRate {
                id,
                source,
                buy_rate,
                recorded_at,
            })
        })
        .transpose()
    }
}
