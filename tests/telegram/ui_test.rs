//! Tests for `telegram::ui` notices and message chunking.

use chrono::Duration;

use relaygate::admission::Decision;
use relaygate::relay::transport::DeliveryError;
use relaygate::relay::{ForwardError, ReplyError};
use relaygate::telegram::transport::classify_error;
use relaygate::telegram::ui::{
    chunk_message, decision_notice, format_remaining, forward_error_notice, reply_error_notice,
    TELEGRAM_MESSAGE_LIMIT,
};
use relaygate::types::{OutboundId, PayloadKind};

#[test]
fn admit_has_no_notice() {
    assert_eq!(decision_notice(&Decision::Admit), None);
}

#[test]
fn challenge_notices_include_prompt() {
    let issued = decision_notice(&Decision::ChallengeIssued("7 + 12 = ?".to_owned()))
        .expect("notice");
    assert!(issued.contains("7 + 12 = ?"));

    let failed = decision_notice(&Decision::ChallengeFailed("5 + 5 = ?".to_owned()))
        .expect("notice");
    assert!(failed.starts_with("Wrong answer"));
    assert!(failed.contains("5 + 5 = ?"));
}

#[test]
fn lock_notice_shows_remaining_time() {
    let notice = decision_notice(&Decision::Locked(
        Duration::hours(23) + Duration::minutes(5),
    ))
    .expect("notice");
    assert!(notice.contains("23h 5m"));
}

#[test]
fn ban_and_start_notices() {
    assert!(decision_notice(&Decision::Banned)
        .expect("notice")
        .contains("blocked"));
    assert!(decision_notice(&Decision::AwaitingFirstStart)
        .expect("notice")
        .contains("/start"));
}

#[test]
fn remaining_time_formats() {
    assert_eq!(format_remaining(Duration::hours(24)), "24h");
    assert_eq!(format_remaining(Duration::minutes(45)), "45m");
    assert_eq!(format_remaining(Duration::seconds(1)), "1m");
    assert_eq!(format_remaining(Duration::seconds(-5)), "less than a minute");
}

#[test]
fn forward_errors_map_to_user_notices() {
    assert!(forward_error_notice(&ForwardError::Blocked).contains("advertisement"));
    assert!(forward_error_notice(&ForwardError::UnsupportedType).contains("not supported"));
    assert!(forward_error_notice(&ForwardError::Delivery(
        DeliveryError::KindForbidden(PayloadKind::Voice)
    ))
    .contains("cannot receive voice messages"));
    assert!(forward_error_notice(&ForwardError::Delivery(DeliveryError::Other(
        "timeout".to_owned()
    )))
    .contains("unknown error"));
}

#[test]
fn reply_errors_map_to_operator_notices() {
    assert!(reply_error_notice(&ReplyError::NoReplyTarget).contains("Reply to"));
    assert!(reply_error_notice(&ReplyError::UnknownOrigin(OutboundId(5))).contains("Cannot find"));
    assert!(reply_error_notice(&ReplyError::DeliveryFailed(DeliveryError::KindForbidden(
        PayloadKind::Voice
    )))
    .contains("voice"));
}

#[test]
fn short_text_is_a_single_chunk() {
    assert_eq!(chunk_message("hello", TELEGRAM_MESSAGE_LIMIT), vec!["hello"]);
    assert_eq!(chunk_message("", TELEGRAM_MESSAGE_LIMIT), vec![""]);
}

#[test]
fn chunks_break_on_lines_and_respect_limit() {
    let text = "aaaa\nbbbb\ncccc";
    assert_eq!(chunk_message(text, 9), vec!["aaaa\nbbbb", "cccc"]);

    let line = "x".repeat(50);
    let report = vec![line.as_str(); 200].join("\n");
    let chunks = chunk_message(&report, TELEGRAM_MESSAGE_LIMIT);
    assert!(chunks.len() > 1);
    assert!(chunks
        .iter()
        .all(|c| c.chars().count() <= TELEGRAM_MESSAGE_LIMIT));
    assert_eq!(chunks.join("\n"), report);
}

#[test]
fn overlong_line_is_split_by_characters() {
    let line = "é".repeat(25);
    let chunks = chunk_message(&line, 10);
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[2].chars().count(), 5);
}

#[test]
fn voice_forbidden_error_is_classified() {
    assert_eq!(
        classify_error(
            PayloadKind::Voice,
            "A Telegram's error: Bad Request: VOICE_MESSAGES_FORBIDDEN"
        ),
        DeliveryError::KindForbidden(PayloadKind::Voice)
    );
    assert!(matches!(
        classify_error(PayloadKind::Text, "chat not found"),
        DeliveryError::Other(_)
    ));
}
