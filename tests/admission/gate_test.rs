//! Tests for `admission::AdmissionGate` state transitions.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};

use relaygate::admission::challenge::{Challenge, ChallengeSource};
use relaygate::admission::record::{AdmissionState, UserVerificationRecord};
use relaygate::admission::store::{
    InMemoryVerificationStore, SqliteVerificationStore, VerificationStateStore,
};
use relaygate::admission::{AdmissionGate, Decision, GateError, GatePolicy};
use relaygate::clock::ManualClock;

const USER: i64 = 42;

/// Hands out queued challenges, then `7 + 12` forever.
#[derive(Default)]
struct ScriptedChallenges {
    queue: Mutex<VecDeque<Challenge>>,
}

impl ScriptedChallenges {
    fn with(challenges: &[(u32, u32)]) -> Self {
        Self {
            queue: Mutex::new(
                challenges
                    .iter()
                    .map(|&(a, b)| Challenge::new(a, b))
                    .collect(),
            ),
        }
    }
}

impl ChallengeSource for ScriptedChallenges {
    fn next_challenge(&self) -> Challenge {
        self.queue
            .lock()
            .expect("queue lock")
            .pop_front()
            .unwrap_or_else(|| Challenge::new(7, 12))
    }
}

fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0)
        .single()
        .expect("valid time")
}

struct Harness {
    gate: Arc<AdmissionGate>,
    clock: Arc<ManualClock>,
    store: Arc<InMemoryVerificationStore>,
}

fn harness_with(policy: GatePolicy, challenges: ScriptedChallenges) -> Harness {
    let clock = Arc::new(ManualClock::new(start_time()));
    let store = Arc::new(InMemoryVerificationStore::new());
    let gate = Arc::new(AdmissionGate::new(
        Arc::clone(&store) as Arc<dyn VerificationStateStore>,
        Arc::new(challenges),
        Arc::clone(&clock) as Arc<dyn relaygate::clock::Clock>,
        policy,
    ));
    Harness { gate, clock, store }
}

fn harness() -> Harness {
    harness_with(GatePolicy::default(), ScriptedChallenges::default())
}

async fn send(h: &Harness, text: &str) -> Decision {
    h.gate
        .evaluate(USER, Some(text))
        .await
        .expect("evaluation should succeed")
}

async fn record(h: &Harness) -> UserVerificationRecord {
    h.gate
        .record(USER)
        .await
        .expect("record should load")
        .expect("record should exist")
}

/// Drive the user from a fresh challenge through `failures` wrong answers,
/// waiting out each lock on the way.
async fn fail_times(h: &Harness, failures: u32) -> Decision {
    let mut last = send(h, "hi").await;
    for _ in 0..failures {
        if matches!(last, Decision::Locked(_)) {
            h.clock.advance(Duration::hours(24));
            last = send(h, "hi").await;
            assert!(matches!(last, Decision::ChallengeIssued(_)));
        }
        last = send(h, "0").await;
    }
    last
}

#[tokio::test]
async fn fresh_user_receives_challenge() {
    let h = harness();
    let decision = send(&h, "hi").await;
    assert_eq!(decision, Decision::ChallengeIssued("7 + 12 = ?".to_owned()));

    let rec = record(&h).await;
    assert_eq!(rec.fail_count, 0);
    assert_eq!(
        rec.pending_challenge().map(|c| c.expected_answer),
        Some(19)
    );
    assert_eq!(h.store.len(), 1);
}

#[tokio::test]
async fn correct_answer_verifies_and_admits_later_messages() {
    let h = harness();
    send(&h, "hi").await;

    let evaluation = h
        .gate
        .evaluate_with_prior(USER, Some(" 19 "))
        .await
        .expect("evaluation should succeed");
    assert_eq!(evaluation.decision, Decision::Admit);
    assert!(evaluation.passed_challenge());

    let next = h
        .gate
        .evaluate_with_prior(USER, Some("hello"))
        .await
        .expect("evaluation should succeed");
    assert_eq!(next.decision, Decision::Admit);
    assert!(!next.passed_challenge());
    assert_eq!(record(&h).await.state, AdmissionState::Verified);
}

#[tokio::test]
async fn wrong_answer_issues_a_new_challenge() {
    let h = harness_with(
        GatePolicy::default(),
        ScriptedChallenges::with(&[(5, 6), (8, 9)]),
    );
    assert_eq!(
        send(&h, "hi").await,
        Decision::ChallengeIssued("5 + 6 = ?".to_owned())
    );
    assert_eq!(
        send(&h, "12").await,
        Decision::ChallengeFailed("8 + 9 = ?".to_owned())
    );
    assert_eq!(record(&h).await.fail_count, 1);

    // The old answer no longer counts.
    assert!(matches!(send(&h, "11").await, Decision::ChallengeFailed(_)));
    assert_eq!(send(&h, "17").await, Decision::Admit);
}

#[tokio::test]
async fn non_numeric_and_missing_answers_count_as_failures() {
    let h = harness();
    send(&h, "hi").await;
    assert!(matches!(
        send(&h, "nineteen").await,
        Decision::ChallengeFailed(_)
    ));
    let decision = h
        .gate
        .evaluate(USER, None)
        .await
        .expect("evaluation should succeed");
    assert!(matches!(decision, Decision::ChallengeFailed(_)));
    assert_eq!(record(&h).await.fail_count, 2);
}

#[tokio::test]
async fn correct_answer_resets_fail_count() {
    let h = harness();
    send(&h, "hi").await;
    send(&h, "1").await;
    send(&h, "2").await;
    assert_eq!(record(&h).await.fail_count, 2);

    assert_eq!(send(&h, "19").await, Decision::Admit);
    assert_eq!(record(&h).await.fail_count, 0);
}

#[tokio::test]
async fn third_failure_locks_for_full_duration() {
    let h = harness();
    let decision = fail_times(&h, 3).await;
    assert_eq!(decision, Decision::Locked(Duration::hours(24)));

    let rec = record(&h).await;
    assert_eq!(rec.fail_count, 3);
    assert_eq!(rec.locked_until(), Some(start_time() + Duration::hours(24)));
}

#[tokio::test]
async fn locked_user_sees_remaining_time_and_is_not_evaluated() {
    let h = harness();
    fail_times(&h, 3).await;

    h.clock.advance(Duration::hours(1));
    assert_eq!(send(&h, "19").await, Decision::Locked(Duration::hours(23)));

    h.clock.advance(Duration::minutes(30));
    assert_eq!(
        send(&h, "hi").await,
        Decision::Locked(Duration::hours(22) + Duration::minutes(30))
    );
    assert_eq!(record(&h).await.fail_count, 3);
}

#[tokio::test]
async fn expired_lock_issues_fresh_challenge_and_keeps_count() {
    let h = harness();
    fail_times(&h, 3).await;

    h.clock.advance(Duration::hours(24));
    assert!(matches!(send(&h, "19").await, Decision::ChallengeIssued(_)));

    let rec = record(&h).await;
    assert_eq!(rec.fail_count, 3);
    assert!(rec.pending_challenge().is_some());
}

#[tokio::test]
async fn locks_repeat_every_third_failure() {
    let h = harness();
    assert!(matches!(fail_times(&h, 6).await, Decision::Locked(_)));
    assert_eq!(record(&h).await.fail_count, 6);

    let h = harness();
    assert!(matches!(fail_times(&h, 9).await, Decision::Locked(_)));
    assert_eq!(record(&h).await.fail_count, 9);

    let h = harness();
    assert!(matches!(fail_times(&h, 8).await, Decision::ChallengeFailed(_)));
}

#[tokio::test]
async fn tenth_failure_bans_permanently() {
    let h = harness();
    assert_eq!(fail_times(&h, 10).await, Decision::Banned);

    let rec = record(&h).await;
    assert!(rec.is_banned());
    assert_eq!(rec.fail_count, 10);

    // Neither time nor a correct answer lifts a ban.
    h.clock.advance(Duration::days(365));
    assert_eq!(send(&h, "19").await, Decision::Banned);
    assert_eq!(send(&h, "hello").await, Decision::Banned);
}

#[tokio::test]
async fn reset_lifts_a_ban() {
    let h = harness();
    fail_times(&h, 10).await;

    h.gate.reset(USER).await.expect("reset should succeed");
    let rec = record(&h).await;
    assert_eq!(rec, UserVerificationRecord::fresh(USER));

    assert!(matches!(send(&h, "hi").await, Decision::ChallengeIssued(_)));
}

#[tokio::test]
async fn custom_policy_thresholds_apply() {
    let policy = GatePolicy {
        lockout_every: 2,
        lockout_duration: Duration::hours(1),
        ban_after: 4,
        require_start: false,
    };
    let h = harness_with(policy, ScriptedChallenges::default());
    assert_eq!(fail_times(&h, 2).await, Decision::Locked(Duration::hours(1)));
    assert_eq!(h.gate.policy().ban_after, 4);

    let h = harness_with(policy, ScriptedChallenges::default());
    send(&h, "hi").await;
    send(&h, "0").await;
    send(&h, "0").await;
    h.clock.advance(Duration::hours(1));
    send(&h, "hi").await;
    send(&h, "0").await;
    assert_eq!(send(&h, "0").await, Decision::Banned);
}

#[tokio::test]
async fn clock_failure_aborts_without_mutation() {
    let h = harness();
    send(&h, "hi").await;
    let before = record(&h).await;

    h.clock.break_clock();
    let result = h.gate.evaluate(USER, Some("19")).await;
    assert!(matches!(result, Err(GateError::Clock(_))));
    assert_eq!(record(&h).await, before);
}

#[tokio::test]
async fn require_start_waits_for_start_command() {
    let policy = GatePolicy {
        require_start: true,
        ..GatePolicy::default()
    };
    let h = harness_with(policy, ScriptedChallenges::default());

    assert_eq!(send(&h, "hello").await, Decision::AwaitingFirstStart);
    assert!(h.store.is_empty());

    assert!(matches!(
        send(&h, "/start@relay_bot").await,
        Decision::ChallengeIssued(_)
    ));
    assert_eq!(send(&h, "19").await, Decision::Admit);
}

#[tokio::test]
async fn without_require_start_any_first_message_challenges() {
    let h = harness();
    assert!(matches!(
        send(&h, "/start").await,
        Decision::ChallengeIssued(_)
    ));
}

#[tokio::test]
async fn malformed_record_is_reinitialised() {
    let pool = crate::store_test::test_pool().await;
    sqlx::query(
        "INSERT INTO verification (user_id, state, fail_count) VALUES (?1, 'challenged', 4)",
    )
    .bind(USER)
    .execute(&pool)
    .await
    .expect("insert should succeed");

    let clock = Arc::new(ManualClock::new(start_time()));
    let gate = AdmissionGate::new(
        Arc::new(SqliteVerificationStore::new(pool)),
        Arc::new(ScriptedChallenges::default()),
        clock,
        GatePolicy::default(),
    );

    let evaluation = gate
        .evaluate_with_prior(USER, Some("hi"))
        .await
        .expect("evaluation should succeed");
    assert_eq!(
        evaluation.decision,
        Decision::ChallengeIssued("7 + 12 = ?".to_owned())
    );
    assert_eq!(evaluation.prior, None);

    let rec = gate
        .record(USER)
        .await
        .expect("record should load")
        .expect("record should exist");
    assert_eq!(rec.fail_count, 0);
}

#[tokio::test]
async fn concurrent_wrong_answers_are_not_lost() {
    let h = harness();
    send(&h, "hi").await;

    let mut handles = Vec::new();
    for _ in 0..2 {
        let gate = Arc::clone(&h.gate);
        handles.push(tokio::spawn(async move {
            gate.evaluate(USER, Some("0")).await
        }));
    }
    for handle in handles {
        let decision = handle
            .await
            .expect("task should join")
            .expect("evaluation should succeed");
        assert!(matches!(decision, Decision::ChallengeFailed(_)));
    }

    assert_eq!(record(&h).await.fail_count, 2);
}

#[tokio::test]
async fn users_are_tracked_independently() {
    let h = harness();
    send(&h, "hi").await;
    send(&h, "19").await;

    let other = h
        .gate
        .evaluate(USER + 1, Some("hello"))
        .await
        .expect("evaluation should succeed");
    assert!(matches!(other, Decision::ChallengeIssued(_)));
    assert_eq!(send(&h, "hello").await, Decision::Admit);
}
