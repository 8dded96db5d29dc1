//! User- and operator-facing notice texts.
//!
//! Everything is sent without a parse mode: relayed content and history
//! summaries are user-controlled and must not be interpreted as markup.

use chrono::Duration;

use crate::admission::Decision;
use crate::relay::transport::DeliveryError;
use crate::relay::{ForwardError, ReplyError};

/// Telegram's maximum message length in characters.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

/// Sent after a correct answer.
pub const VERIFIED: &str =
    "Verification passed. You can now send messages and they will be delivered.";

/// Sent to a verified user who sends `/start` again.
pub const GREETING: &str = "Hello! Send your message and it will be delivered.";

/// Sent when a non-operator asks for history.
pub const HISTORY_FORBIDDEN: &str = "You do not have permission to view the history.";

/// Sent when the gate cannot decide (storage or clock failure).
pub const TEMPORARY_FAILURE: &str =
    "Something went wrong on our side. Please try again later.";

/// Notice for a gate decision, or `None` for [`Decision::Admit`].
pub fn decision_notice(decision: &Decision) -> Option<String> {
    match decision {
        Decision::Admit => None,
        Decision::ChallengeIssued(prompt) => Some(format!(
            "Before your messages are delivered, please answer: {prompt}"
        )),
        Decision::ChallengeFailed(prompt) => {
            Some(format!("Wrong answer. Please try again: {prompt}"))
        }
        Decision::Locked(remaining) => Some(format!(
            "Too many wrong answers. Try again in {}.",
            format_remaining(*remaining)
        )),
        Decision::Banned => Some("You have been permanently blocked.".to_owned()),
        Decision::AwaitingFirstStart => Some("Send /start to begin.".to_owned()),
    }
}

/// Notice to the user when a forward fails.
pub fn forward_error_notice(error: &ForwardError) -> String {
    match error {
        ForwardError::Blocked => {
            "This message looks like an advertisement and was not delivered.".to_owned()
        }
        ForwardError::UnsupportedType => "This type of message is not supported yet.".to_owned(),
        ForwardError::Delivery(DeliveryError::KindForbidden(kind)) => format!(
            "The operator cannot receive {kind} messages. Please send another type of message."
        ),
        ForwardError::Delivery(DeliveryError::Other(_)) => {
            "An unknown error occurred while sending your message. Please try again later."
                .to_owned()
        }
    }
}

/// Notice to the operator when a reply cannot be routed.
pub fn reply_error_notice(error: &ReplyError) -> String {
    match error {
        ReplyError::NoReplyTarget => "Reply to a user's message to answer them.".to_owned(),
        ReplyError::UnknownOrigin(_) => {
            "Cannot find the user. Check that the message is a relayed user message.".to_owned()
        }
        ReplyError::UnsupportedType => "This type of reply is not supported yet.".to_owned(),
        ReplyError::DeliveryFailed(cause) => format!("Reply failed: {cause}"),
    }
}

/// Render a remaining lock time, rounded up to the minute.
pub fn format_remaining(remaining: Duration) -> String {
    let secs = remaining.num_seconds().max(0);
    let minutes = secs.saturating_add(59) / 60;
    let hours = minutes / 60;
    let minutes = minutes % 60;
    match (hours, minutes) {
        (0, 0) => "less than a minute".to_owned(),
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}m"),
    }
}

/// Split `text` into chunks of at most `limit` characters, preferring line breaks.
pub fn chunk_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for line in text.split('\n') {
        let line_len = line.chars().count();
        let needed = if current.is_empty() {
            line_len
        } else {
            line_len.saturating_add(1)
        };

        if current_len.saturating_add(needed) > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len > limit {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        if !current.is_empty() {
            current.push('\n');
            current_len = current_len.saturating_add(1);
        }
        current.push_str(line);
        current_len = current_len.saturating_add(line_len);
    }

    if !current.is_empty() || chunks.is_empty() {
        chunks.push(current);
    }
    chunks
}
