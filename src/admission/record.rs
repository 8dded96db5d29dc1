//! Per-user verification record.
//!
//! The state enum carries the data that only exists in that state, so a
//! pending challenge without `Challenged` or a lock deadline without `Locked`
//! cannot be represented.

use chrono::{DateTime, Utc};

use super::challenge::Challenge;
use crate::types::UserId;

/// Admission state of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionState {
    /// Known but never challenged (or lock just expired).
    Unverified,
    /// A challenge is outstanding.
    Challenged(Challenge),
    /// Passed a challenge; messages are admitted.
    Verified,
    /// Temporarily suspended after repeated failures.
    Locked {
        /// When the suspension ends.
        until: DateTime<Utc>,
    },
    /// Permanently suspended.
    Banned,
}

impl AdmissionState {
    /// Returns the string representation stored in SQLite.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unverified => "unverified",
            Self::Challenged(_) => "challenged",
            Self::Verified => "verified",
            Self::Locked { .. } => "locked",
            Self::Banned => "banned",
        }
    }
}

/// Verification state for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserVerificationRecord {
    /// Owner of this record.
    pub user_id: UserId,
    /// Current state.
    pub state: AdmissionState,
    /// Wrong answers since the last successful verification or reset.
    pub fail_count: u32,
}

impl UserVerificationRecord {
    /// The default record created on first contact.
    pub fn fresh(user_id: UserId) -> Self {
        Self {
            user_id,
            state: AdmissionState::Unverified,
            fail_count: 0,
        }
    }

    /// The outstanding challenge, present iff the state is `Challenged`.
    pub fn pending_challenge(&self) -> Option<&Challenge> {
        match &self.state {
            AdmissionState::Challenged(challenge) => Some(challenge),
            _ => None,
        }
    }

    /// The lock deadline, present iff the state is `Locked`.
    pub fn locked_until(&self) -> Option<DateTime<Utc>> {
        match self.state {
            AdmissionState::Locked { until } => Some(until),
            _ => None,
        }
    }

    /// Whether the user is permanently banned.
    pub fn is_banned(&self) -> bool {
        matches!(self.state, AdmissionState::Banned)
    }
}
