//! Wall-clock abstraction.
//!
//! Lockouts expire by comparing against [`Clock::now`] on the next
//! evaluation, never through a timer. Reading the clock is fallible so that a
//! broken clock aborts an evaluation instead of silently admitting a user.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// Errors from reading a clock.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// The clock could not produce a reading.
    #[error("clock unavailable: {0}")]
    Unavailable(String),
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current UTC time.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError`] when no reading is available.
    fn now(&self) -> Result<DateTime<Utc>, ClockError>;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Result<DateTime<Utc>, ClockError> {
        Ok(Utc::now())
    }
}

/// A manually driven clock for simulations and tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Option<DateTime<Utc>>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(Some(start)),
        }
    }

    /// Move the clock forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = guard.and_then(|t| t.checked_add_signed(delta));
        }
    }

    /// Jump the clock to `at`.
    pub fn set(&self, at: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = Some(at);
        }
    }

    /// Make every following read fail until [`set`](Self::set) is called.
    pub fn break_clock(&self) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = None;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Result<DateTime<Utc>, ClockError> {
        let guard = self
            .now
            .lock()
            .map_err(|_| ClockError::Unavailable("manual clock poisoned".to_owned()))?;
        guard.ok_or_else(|| ClockError::Unavailable("manual clock has no reading".to_owned()))
    }
}
