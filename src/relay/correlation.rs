//! Correlation table mapping operator-facing message ids to origin users.
//!
//! Bounded LRU: once `capacity` entries exist, inserting evicts the least
//! recently inserted or looked-up entry. An evicted id behaves exactly like
//! one that was never tracked.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;
use tracing::debug;

use crate::types::{OutboundId, UserId};

/// Default number of tracked outbound messages.
pub const DEFAULT_CORRELATION_CAPACITY: usize = 100_000;

/// Concurrency-safe `OutboundId -> UserId` map.
///
/// Uses a sync [`Mutex`] because `LruCache::get` mutates recency order.
#[derive(Debug)]
pub struct CorrelationTable {
    entries: Mutex<LruCache<OutboundId, UserId>>,
}

impl CorrelationTable {
    /// Create a table holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    /// Record that `outbound` was emitted on behalf of `user_id`.
    pub fn insert(&self, outbound: OutboundId, user_id: UserId) {
        if let Ok(mut entries) = self.entries.lock() {
            if let Some((evicted, _)) = entries.push(outbound, user_id) {
                if evicted != outbound {
                    debug!(%evicted, "correlation table full, evicted oldest entry");
                }
            }
        }
    }

    /// Origin user of `outbound`, if tracked.
    pub fn lookup(&self, outbound: OutboundId) -> Option<UserId> {
        self.entries
            .lock()
            .ok()
            .and_then(|mut entries| entries.get(&outbound).copied())
    }

    /// Number of tracked entries.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CorrelationTable {
    fn default() -> Self {
        Self::new(DEFAULT_CORRELATION_CAPACITY)
    }
}
