//! Durable persistence for [`UserVerificationRecord`]s.
//!
//! The gate only talks to the [`VerificationStateStore`] trait. The SQLite
//! implementation keeps one row per user in the `verification` table; the
//! in-memory implementation backs tests and ephemeral runs.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::DateTime;
use sqlx::SqlitePool;
use tracing::trace;

use super::challenge::Challenge;
use super::record::{AdmissionState, UserVerificationRecord};
use crate::types::UserId;

/// Errors from verification state persistence.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A persisted row does not describe a valid record.
    #[error("malformed verification record for user {user_id}: {reason}")]
    Malformed {
        /// User whose row is malformed.
        user_id: UserId,
        /// What was wrong with it.
        reason: String,
    },

    /// The in-memory store lock was poisoned.
    #[error("verification store lock poisoned")]
    Poisoned,
}

/// Keyed persistence for verification records, surviving restarts.
#[async_trait]
pub trait VerificationStateStore: Send + Sync {
    /// Load the record for `user_id`, or `None` if the user was never seen.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Malformed`] for rows that cannot be decoded and
    /// [`StoreError::Database`] for storage failures.
    async fn load(&self, user_id: UserId) -> Result<Option<UserVerificationRecord>, StoreError>;

    /// Insert or replace the record.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn save(&self, record: &UserVerificationRecord) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// SQLite
// ---------------------------------------------------------------------------

/// Raw `verification` row.
type VerificationRow = (
    i64,
    String,
    i64,
    Option<i64>,
    Option<i64>,
    Option<i64>,
    Option<i64>,
);

/// SQLite-backed verification store.
#[derive(Debug, Clone)]
pub struct SqliteVerificationStore {
    db: SqlitePool,
}

impl SqliteVerificationStore {
    /// Create a store over a pool that already has the schema applied.
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl VerificationStateStore for SqliteVerificationStore {
    async fn load(&self, user_id: UserId) -> Result<Option<UserVerificationRecord>, StoreError> {
        let row: Option<VerificationRow> = sqlx::query_as(
            "SELECT user_id, state, fail_count, locked_until, operand_a, operand_b, expected_answer \
             FROM verification WHERE user_id = ?1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        row.map(decode_row).transpose()
    }

    async fn save(&self, record: &UserVerificationRecord) -> Result<(), StoreError> {
        let challenge = record.pending_challenge();
        let locked_until = record.locked_until().map(|t| t.timestamp_millis());

        sqlx::query(
            "INSERT INTO verification \
                 (user_id, state, fail_count, locked_until, operand_a, operand_b, expected_answer, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, datetime('now')) \
             ON CONFLICT(user_id) DO UPDATE SET \
                 state = excluded.state, \
                 fail_count = excluded.fail_count, \
                 locked_until = excluded.locked_until, \
                 operand_a = excluded.operand_a, \
                 operand_b = excluded.operand_b, \
                 expected_answer = excluded.expected_answer, \
                 updated_at = excluded.updated_at",
        )
        .bind(record.user_id)
        .bind(record.state.as_str())
        .bind(i64::from(record.fail_count))
        .bind(locked_until)
        .bind(challenge.map(|c| i64::from(c.operand_a)))
        .bind(challenge.map(|c| i64::from(c.operand_b)))
        .bind(challenge.map(|c| i64::from(c.expected_answer)))
        .execute(&self.db)
        .await?;

        trace!(
            user_id = record.user_id,
            state = record.state.as_str(),
            "verification record saved"
        );
        Ok(())
    }
}

fn decode_row(row: VerificationRow) -> Result<UserVerificationRecord, StoreError> {
    let (user_id, state, fail_count, locked_until, operand_a, operand_b, expected) = row;
    let malformed = |reason: &str| StoreError::Malformed {
        user_id,
        reason: reason.to_owned(),
    };

    let fail_count = u32::try_from(fail_count).map_err(|_| malformed("fail_count out of range"))?;

    let state = match state.as_str() {
        "unverified" => AdmissionState::Unverified,
        "verified" => AdmissionState::Verified,
        "banned" => AdmissionState::Banned,
        "challenged" => {
            let (Some(a), Some(b), Some(expected)) = (operand_a, operand_b, expected) else {
                return Err(malformed("challenged without a pending challenge"));
            };
            let a = u32::try_from(a).map_err(|_| malformed("operand out of range"))?;
            let b = u32::try_from(b).map_err(|_| malformed("operand out of range"))?;
            let challenge = Challenge::new(a, b);
            if i64::from(challenge.expected_answer) != expected {
                return Err(malformed("expected answer does not match operands"));
            }
            AdmissionState::Challenged(challenge)
        }
        "locked" => {
            let until = locked_until
                .and_then(DateTime::from_timestamp_millis)
                .ok_or_else(|| malformed("locked without a valid deadline"))?;
            AdmissionState::Locked { until }
        }
        other => return Err(malformed(&format!("unknown state {other:?}"))),
    };

    Ok(UserVerificationRecord {
        user_id,
        state,
        fail_count,
    })
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Process-local verification store.
///
/// Uses a sync [`Mutex`] since the critical section is brief (no awaits).
#[derive(Debug, Default)]
pub struct InMemoryVerificationStore {
    records: Mutex<HashMap<UserId, UserVerificationRecord>>,
}

impl InMemoryVerificationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.lock().map(|m| m.len()).unwrap_or(0)
    }

    /// Whether no records are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VerificationStateStore for InMemoryVerificationStore {
    async fn load(&self, user_id: UserId) -> Result<Option<UserVerificationRecord>, StoreError> {
        let map = self.records.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(map.get(&user_id).copied())
    }

    async fn save(&self, record: &UserVerificationRecord) -> Result<(), StoreError> {
        let mut map = self.records.lock().map_err(|_| StoreError::Poisoned)?;
        map.insert(record.user_id, *record);
        Ok(())
    }
}
