//! Operator slash commands.
//!
//! Each handler returns the plain-text reply for the operator chat.

use chrono::Duration;

use crate::admission::AdmissionGate;
use crate::clock::Clock;
use crate::history::{format_report, MessageLog};
use crate::types::UserId;

/// Split a slash command into `(command, args)`.
///
/// Strips the leading `/` and any `@bot_name` suffix. Returns `None` for
/// anything that is not a slash command.
pub fn parse_command(text: Option<&str>) -> Option<(&str, &str)> {
    let without_slash = text?.trim_start().strip_prefix('/')?;
    let (full_command, args) = match without_slash.split_once(char::is_whitespace) {
        Some((cmd, rest)) => (cmd, rest.trim()),
        None => (without_slash, ""),
    };
    let command = full_command.split('@').next().unwrap_or(full_command);
    if command.is_empty() {
        return None;
    }
    Some((command, args))
}

/// List the operator commands.
pub fn handle_help() -> String {
    [
        "Operator commands:",
        "",
        "/history [days] - messages relayed in the last N days (default 7)",
        "/reset <user_id> - clear a user's verification state, lifting locks and bans",
        "/status <user_id> - show a user's verification state",
        "/help - show this message",
        "",
        "Reply to a relayed message to answer its sender.",
    ]
    .join("\n")
}

/// Build the history report for `/history [days]`.
///
/// An empty or unparsable argument falls back to `default_days`.
pub async fn handle_history(
    log: &dyn MessageLog,
    clock: &dyn Clock,
    args: &str,
    default_days: u32,
) -> String {
    let days = match args {
        "" => default_days,
        raw => match raw.parse::<u32>() {
            Ok(days) if days > 0 => days,
            _ => return format!("Invalid number of days: {raw}"),
        },
    };

    let now = match clock.now() {
        Ok(now) => now,
        Err(e) => return format!("Cannot build history: {e}"),
    };
    let since = now
        .checked_sub_signed(Duration::days(i64::from(days)))
        .unwrap_or(chrono::DateTime::<chrono::Utc>::MIN_UTC);

    match log.query(since).await {
        Ok(entries) => format_report(&entries, days),
        Err(e) => format!("Failed to load history: {e}"),
    }
}

/// Clear a user's verification record for `/reset <user_id>`.
pub async fn handle_reset(gate: &AdmissionGate, args: &str) -> String {
    let user_id: UserId = match args.parse() {
        Ok(id) => id,
        Err(_) => return "Usage: /reset <user_id>".to_owned(),
    };
    match gate.reset(user_id).await {
        Ok(()) => format!("Verification state cleared for user {user_id}."),
        Err(e) => format!("Failed to reset user {user_id}: {e}"),
    }
}

/// Describe a user's verification record for `/status <user_id>`.
pub async fn handle_status(gate: &AdmissionGate, args: &str) -> String {
    let user_id: UserId = match args.parse() {
        Ok(id) => id,
        Err(_) => return "Usage: /status <user_id>".to_owned(),
    };
    let record = match gate.record(user_id).await {
        Ok(Some(record)) => record,
        Ok(None) => return format!("User {user_id} has not contacted the bot."),
        Err(e) => return format!("Failed to load user {user_id}: {e}"),
    };

    let mut lines = vec![
        format!("User {user_id}"),
        format!("State: {}", record.state.as_str()),
        format!("Wrong answers: {}", record.fail_count),
    ];
    if let Some(until) = record.locked_until() {
        lines.push(format!("Locked until: {}", until.format("%Y-%m-%d %H:%M:%S UTC")));
    }
    if let Some(challenge) = record.pending_challenge() {
        lines.push(format!("Pending challenge: {}", challenge.prompt()));
    }
    lines.join("\n")
}
