//! Tests for `telegram::commands` operator command handlers.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use relaygate::admission::challenge::{Challenge, ChallengeSource};
use relaygate::admission::store::InMemoryVerificationStore;
use relaygate::admission::{AdmissionGate, Decision, GatePolicy};
use relaygate::clock::ManualClock;
use relaygate::history::{MessageLog, SqliteMessageLog};
use relaygate::telegram::commands;

struct FixedChallenge;

impl ChallengeSource for FixedChallenge {
    fn next_challenge(&self) -> Challenge {
        Challenge::new(3, 4)
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 20, 12, 0, 0)
        .single()
        .expect("valid time")
}

async fn setup_log() -> SqliteMessageLog {
    let opts = SqliteConnectOptions::new()
        .filename(":memory:")
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(opts)
        .await
        .expect("pool should connect");
    relaygate::storage::apply_schema(&pool)
        .await
        .expect("schema should apply");
    SqliteMessageLog::new(pool)
}

fn setup_gate() -> AdmissionGate {
    AdmissionGate::new(
        Arc::new(InMemoryVerificationStore::new()),
        Arc::new(FixedChallenge),
        Arc::new(ManualClock::new(now())),
        GatePolicy::default(),
    )
}

#[test]
fn help_lists_operator_commands() {
    let result = commands::handle_help();
    assert!(result.contains("/history"));
    assert!(result.contains("/reset"));
    assert!(result.contains("/status"));
    assert!(result.contains("/help"));
}

#[test]
fn parse_command_splits_arguments() {
    assert_eq!(
        commands::parse_command(Some("/reset 12345")),
        Some(("reset", "12345"))
    );
    assert_eq!(
        commands::parse_command(Some("/history@my_bot")),
        Some(("history", ""))
    );
    assert_eq!(commands::parse_command(Some("19")), None);
}

#[tokio::test]
async fn history_uses_default_window() {
    let log = setup_log().await;
    let clock = ManualClock::new(now());
    log.record(42, "recent", now() - Duration::days(2))
        .await
        .expect("record");
    log.record(42, "ancient", now() - Duration::days(30))
        .await
        .expect("record");

    let report = commands::handle_history(&log, &clock, "", 7).await;
    assert_eq!(
        report,
        "User ID: 42 | Message: recent | Time: 2024-07-18 12:00:00"
    );
}

#[tokio::test]
async fn history_accepts_explicit_days() {
    let log = setup_log().await;
    let clock = ManualClock::new(now());
    log.record(42, "ancient", now() - Duration::days(30))
        .await
        .expect("record");

    let report = commands::handle_history(&log, &clock, "31", 7).await;
    assert!(report.contains("ancient"));

    let empty = commands::handle_history(&log, &clock, "1", 7).await;
    assert_eq!(empty, "No messages in the last 1 days.");
}

#[tokio::test]
async fn history_rejects_bad_days() {
    let log = setup_log().await;
    let clock = ManualClock::new(now());
    let report = commands::handle_history(&log, &clock, "lots", 7).await;
    assert!(report.contains("Invalid number of days"));
    let zero = commands::handle_history(&log, &clock, "0", 7).await;
    assert!(zero.contains("Invalid number of days"));
}

#[tokio::test]
async fn reset_clears_a_banned_user() {
    let gate = setup_gate();
    gate.evaluate(5, Some("hi")).await.expect("evaluate");
    for _ in 0..2 {
        gate.evaluate(5, Some("0")).await.expect("evaluate");
    }
    assert!(matches!(
        gate.evaluate(5, Some("0")).await.expect("evaluate"),
        Decision::Locked(_)
    ));

    let reply = commands::handle_reset(&gate, "5").await;
    assert!(reply.contains("cleared for user 5"));

    let record = gate
        .record(5)
        .await
        .expect("record should load")
        .expect("record should exist");
    assert_eq!(record.fail_count, 0);
    assert!(record.locked_until().is_none());
}

#[tokio::test]
async fn reset_requires_numeric_user_id() {
    let gate = setup_gate();
    assert_eq!(
        commands::handle_reset(&gate, "").await,
        "Usage: /reset <user_id>"
    );
    assert_eq!(
        commands::handle_reset(&gate, "alice").await,
        "Usage: /reset <user_id>"
    );
}

#[tokio::test]
async fn status_describes_pending_challenge() {
    let gate = setup_gate();
    gate.evaluate(9, Some("hi")).await.expect("evaluate");
    gate.evaluate(9, Some("1")).await.expect("evaluate");

    let status = commands::handle_status(&gate, "9").await;
    assert!(status.contains("State: challenged"));
    assert!(status.contains("Wrong answers: 1"));
    assert!(status.contains("Pending challenge: 3 + 4 = ?"));
}

#[tokio::test]
async fn status_for_unknown_user() {
    let gate = setup_gate();
    assert_eq!(
        commands::handle_status(&gate, "1000").await,
        "User 1000 has not contacted the bot."
    );
}
