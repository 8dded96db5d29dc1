//! Append-only message history backing the operator's report.
//!
//! Recording is best-effort from the relay's point of view: a failed write
//! is logged and never blocks a forward.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::trace;

use crate::types::UserId;

/// Default report window in days.
pub const DEFAULT_WINDOW_DAYS: u32 = 7;

/// Maximum characters kept per summary.
pub const MAX_SUMMARY_CHARS: usize = 1024;

/// One recorded message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Sender.
    pub user_id: UserId,
    /// Text or a short description of the payload.
    pub summary: String,
    /// When the message was relayed.
    pub recorded_at: DateTime<Utc>,
}

/// Errors from the history store.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored timestamp could not be decoded.
    #[error("invalid timestamp in history row: {0}")]
    InvalidTimestamp(i64),
}

/// Append-only history of relayed messages.
#[async_trait]
pub trait MessageLog: Send + Sync {
    /// Append an entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn record(
        &self,
        user_id: UserId,
        summary: &str,
        at: DateTime<Utc>,
    ) -> Result<(), HistoryError>;

    /// Entries recorded strictly after `since`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    async fn query(&self, since: DateTime<Utc>) -> Result<Vec<HistoryEntry>, HistoryError>;
}

/// SQLite-backed message log over the `messages` table.
#[derive(Debug, Clone)]
pub struct SqliteMessageLog {
    db: SqlitePool,
}

impl SqliteMessageLog {
    /// Create a log over a pool that already has the schema applied.
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MessageLog for SqliteMessageLog {
    async fn record(
        &self,
        user_id: UserId,
        summary: &str,
        at: DateTime<Utc>,
    ) -> Result<(), HistoryError> {
        let summary = truncate_chars(summary, MAX_SUMMARY_CHARS);
        sqlx::query("INSERT INTO messages (user_id, summary, recorded_at) VALUES (?1, ?2, ?3)")
            .bind(user_id)
            .bind(summary)
            .bind(at.timestamp_millis())
            .execute(&self.db)
            .await?;
        trace!(user_id, "history entry recorded");
        Ok(())
    }

    async fn query(&self, since: DateTime<Utc>) -> Result<Vec<HistoryEntry>, HistoryError> {
        let rows: Vec<(i64, String, i64)> = sqlx::query_as(
            "SELECT user_id, summary, recorded_at \
             FROM messages \
             WHERE recorded_at > ?1 \
             ORDER BY recorded_at ASC, id ASC",
        )
        .bind(since.timestamp_millis())
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(|(user_id, summary, millis)| {
                let recorded_at = DateTime::from_timestamp_millis(millis)
                    .ok_or(HistoryError::InvalidTimestamp(millis))?;
                Ok(HistoryEntry {
                    user_id,
                    summary,
                    recorded_at,
                })
            })
            .collect()
    }
}

/// Render the operator report for the last `window_days` days.
pub fn format_report(entries: &[HistoryEntry], window_days: u32) -> String {
    if entries.is_empty() {
        return format!("No messages in the last {window_days} days.");
    }

    entries
        .iter()
        .map(|entry| {
            format!(
                "User ID: {} | Message: {} | Time: {}",
                entry.user_id,
                entry.summary,
                entry.recorded_at.format("%Y-%m-%d %H:%M:%S")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
