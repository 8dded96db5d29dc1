//! Admission gate: challenge-response verification with escalating lockout.
//!
//! Every inbound user message passes through [`AdmissionGate::evaluate`]
//! before it may be relayed. The gate owns each user's
//! [`UserVerificationRecord`], issues arithmetic challenges, and escalates
//! wrong answers to a temporary lock and finally a permanent ban.
//!
//! Read-modify-write of a record is serialized per user through an async
//! mutex keyed by user id, so concurrent evaluations for the same user
//! cannot lose updates. Every mutation is persisted before the decision is
//! returned.

pub mod challenge;
pub mod record;
pub mod store;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::clock::{Clock, ClockError};
use crate::types::UserId;

use self::challenge::ChallengeSource;
use self::record::{AdmissionState, UserVerificationRecord};
use self::store::{StoreError, VerificationStateStore};

/// Default number of failures between lockouts.
pub const DEFAULT_LOCKOUT_EVERY: u32 = 3;

/// Default lockout length in hours.
pub const DEFAULT_LOCKOUT_HOURS: i64 = 24;

/// Default failure count that triggers a permanent ban.
pub const DEFAULT_BAN_AFTER: u32 = 10;

/// Command that counts as explicit first contact.
pub const START_COMMAND: &str = "/start";

/// Outcome of evaluating one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The message may be relayed.
    Admit,
    /// A new challenge was issued; carries the prompt.
    ChallengeIssued(String),
    /// The answer was wrong and a fresh challenge was issued; carries the prompt.
    ChallengeFailed(String),
    /// The user is locked out for the remaining duration.
    Locked(Duration),
    /// The user is permanently banned.
    Banned,
    /// The user has not sent the start command yet.
    AwaitingFirstStart,
}

/// A decision together with the state the user was in beforehand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// What to do with the message.
    pub decision: Decision,
    /// State before this evaluation; `None` for a user seen for the first time.
    pub prior: Option<AdmissionState>,
}

impl Evaluation {
    /// Whether this evaluation is the one that answered a challenge correctly.
    pub fn passed_challenge(&self) -> bool {
        self.decision == Decision::Admit
            && matches!(self.prior, Some(AdmissionState::Challenged(_)))
    }
}

/// Escalation thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatePolicy {
    /// Lock the user every time the failure count reaches a multiple of this.
    pub lockout_every: u32,
    /// Length of a lockout.
    pub lockout_duration: Duration,
    /// Failure count at which the user is banned.
    pub ban_after: u32,
    /// Require the start command before the first challenge.
    pub require_start: bool,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            lockout_every: DEFAULT_LOCKOUT_EVERY,
            lockout_duration: Duration::hours(DEFAULT_LOCKOUT_HOURS),
            ban_after: DEFAULT_BAN_AFTER,
            require_start: false,
        }
    }
}

/// Errors that abort an evaluation without a decision.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// Reading or writing the record failed.
    #[error("verification store error: {0}")]
    Store(#[from] StoreError),

    /// The clock could not be read.
    #[error(transparent)]
    Clock(#[from] ClockError),

    /// The per-user lock table was poisoned.
    #[error("admission lock table poisoned")]
    LockPoisoned,
}

/// Owns admission state and decides whether messages may be relayed.
pub struct AdmissionGate {
    store: Arc<dyn VerificationStateStore>,
    challenges: Arc<dyn ChallengeSource>,
    clock: Arc<dyn Clock>,
    policy: GatePolicy,
    /// Per-user async locks serializing record updates.
    user_locks: Mutex<HashMap<UserId, Arc<tokio::sync::Mutex<()>>>>,
}

impl std::fmt::Debug for AdmissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionGate")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl AdmissionGate {
    /// Create a gate over the given store, challenge source and clock.
    pub fn new(
        store: Arc<dyn VerificationStateStore>,
        challenges: Arc<dyn ChallengeSource>,
        clock: Arc<dyn Clock>,
        policy: GatePolicy,
    ) -> Self {
        Self {
            store,
            challenges,
            clock,
            policy,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    /// The escalation policy in force.
    pub fn policy(&self) -> &GatePolicy {
        &self.policy
    }

    /// Evaluate an inbound message from `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`GateError`] if the clock cannot be read or the record
    /// cannot be persisted. A malformed stored record is not an error; it is
    /// replaced by a fresh one.
    pub async fn evaluate(
        &self,
        user_id: UserId,
        message_text: Option<&str>,
    ) -> Result<Decision, GateError> {
        Ok(self
            .evaluate_with_prior(user_id, message_text)
            .await?
            .decision)
    }

    /// Like [`evaluate`](Self::evaluate), also reporting the prior state.
    ///
    /// # Errors
    ///
    /// Same as [`evaluate`](Self::evaluate).
    pub async fn evaluate_with_prior(
        &self,
        user_id: UserId,
        message_text: Option<&str>,
    ) -> Result<Evaluation, GateError> {
        let lock = self.user_lock(user_id)?;
        let _guard = lock.lock().await;

        let now = self.clock.now()?;
        let loaded = self.load_or_discard(user_id).await?;
        let prior = loaded.map(|r| r.state);

        let mut record = match loaded {
            Some(record) => record,
            None if self.policy.require_start && !is_start_command(message_text) => {
                debug!(user_id, "first contact without start command");
                return Ok(Evaluation {
                    decision: Decision::AwaitingFirstStart,
                    prior,
                });
            }
            None => UserVerificationRecord::fresh(user_id),
        };

        let decision = self.step(&mut record, message_text, now).await?;
        Ok(Evaluation { decision, prior })
    }

    /// Read a user's record without changing it.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Store`] on storage failures.
    pub async fn record(&self, user_id: UserId) -> Result<Option<UserVerificationRecord>, GateError> {
        self.load_or_discard(user_id).await
    }

    /// Reset a user to the fresh default, lifting any lock or ban.
    ///
    /// # Errors
    ///
    /// Returns [`GateError`] if the record cannot be written.
    pub async fn reset(&self, user_id: UserId) -> Result<(), GateError> {
        let lock = self.user_lock(user_id)?;
        let _guard = lock.lock().await;

        self.store
            .save(&UserVerificationRecord::fresh(user_id))
            .await?;
        info!(user_id, "verification record reset");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // State machine
    // -----------------------------------------------------------------------

    async fn step(
        &self,
        record: &mut UserVerificationRecord,
        message_text: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Decision, GateError> {
        match record.state {
            AdmissionState::Banned => return Ok(Decision::Banned),
            AdmissionState::Locked { until } if now < until => {
                return Ok(Decision::Locked(until.signed_duration_since(now)));
            }
            AdmissionState::Locked { .. } => {
                info!(
                    user_id = record.user_id,
                    fail_count = record.fail_count,
                    "lockout expired"
                );
                record.state = AdmissionState::Unverified;
            }
            AdmissionState::Verified => return Ok(Decision::Admit),
            AdmissionState::Unverified | AdmissionState::Challenged(_) => {}
        }

        let AdmissionState::Challenged(challenge) = record.state else {
            let challenge = self.challenges.next_challenge();
            record.state = AdmissionState::Challenged(challenge);
            self.store.save(record).await?;
            info!(user_id = record.user_id, "challenge issued");
            return Ok(Decision::ChallengeIssued(challenge.prompt()));
        };

        if message_text.is_some_and(|text| challenge.is_answered_by(text)) {
            record.state = AdmissionState::Verified;
            record.fail_count = 0;
            self.store.save(record).await?;
            info!(user_id = record.user_id, "user verified");
            return Ok(Decision::Admit);
        }

        self.record_failure(record, now).await
    }

    async fn record_failure(
        &self,
        record: &mut UserVerificationRecord,
        now: DateTime<Utc>,
    ) -> Result<Decision, GateError> {
        record.fail_count = record.fail_count.saturating_add(1);

        if record.fail_count >= self.policy.ban_after {
            record.state = AdmissionState::Banned;
            self.store.save(record).await?;
            warn!(
                user_id = record.user_id,
                fail_count = record.fail_count,
                "user banned"
            );
            return Ok(Decision::Banned);
        }

        if record.fail_count.checked_rem(self.policy.lockout_every) == Some(0) {
            let until = now
                .checked_add_signed(self.policy.lockout_duration)
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            record.state = AdmissionState::Locked { until };
            self.store.save(record).await?;
            info!(
                user_id = record.user_id,
                fail_count = record.fail_count,
                %until,
                "user locked out"
            );
            return Ok(Decision::Locked(self.policy.lockout_duration));
        }

        let challenge = self.challenges.next_challenge();
        record.state = AdmissionState::Challenged(challenge);
        self.store.save(record).await?;
        debug!(
            user_id = record.user_id,
            fail_count = record.fail_count,
            "wrong answer, new challenge issued"
        );
        Ok(Decision::ChallengeFailed(challenge.prompt()))
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Load a record, treating malformed rows as absent.
    async fn load_or_discard(
        &self,
        user_id: UserId,
    ) -> Result<Option<UserVerificationRecord>, GateError> {
        match self.store.load(user_id).await {
            Ok(record) => Ok(record),
            Err(StoreError::Malformed { reason, .. }) => {
                warn!(user_id, %reason, "discarding malformed verification record");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn user_lock(&self, user_id: UserId) -> Result<Arc<tokio::sync::Mutex<()>>, GateError> {
        let mut locks = self
            .user_locks
            .lock()
            .map_err(|_| GateError::LockPoisoned)?;
        Ok(Arc::clone(locks.entry(user_id).or_default()))
    }
}

/// Whether `text` is the start command, with or without a `@botname` suffix.
pub fn is_start_command(text: Option<&str>) -> bool {
    text.and_then(|t| t.split_whitespace().next())
        .and_then(|cmd| cmd.split('@').next())
        .is_some_and(|cmd| cmd == START_COMMAND)
}
