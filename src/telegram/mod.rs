//! Telegram adapter: message conversion, delivery, operator commands, and bot dispatcher.
//!
//! User messages pass through the [`AdmissionGate`] and, once admitted, are
//! forwarded by the [`RelayCorrelator`]. Messages in the operator chat are
//! either slash commands or replies routed back to the originating user.

use std::sync::Arc;

use teloxide::dispatching::UpdateFilterExt;
use teloxide::prelude::*;
use tracing::{debug, error, info, warn};

use crate::admission::{is_start_command, AdmissionGate, Decision};
use crate::clock::Clock;
use crate::history::MessageLog;
use crate::relay::RelayCorrelator;
use crate::types::UserId;

pub mod commands;
pub mod convert;
pub mod transport;
pub mod ui;

// ---------------------------------------------------------------------------
// Shared state for handler injection
// ---------------------------------------------------------------------------

/// Dependencies injected into teloxide handlers via `dptree::deps!`.
#[derive(Clone)]
pub struct BotContext {
    /// Verification gate for end-users.
    pub gate: Arc<AdmissionGate>,
    /// Forwarding and reply routing.
    pub relay: Arc<RelayCorrelator>,
    /// Relayed message log behind `/history`.
    pub log: Arc<dyn MessageLog>,
    /// Time source for history windows.
    pub clock: Arc<dyn Clock>,
    /// Telegram user ID of the operator.
    pub operator_id: UserId,
    /// Default `/history` window in days.
    pub history_window_days: u32,
}

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Run the Telegram bot until Ctrl+C.
///
/// # Errors
///
/// Currently infallible once the dispatcher starts; the `Result` leaves room
/// for startup checks.
pub async fn run_telegram(bot: Bot, context: BotContext) -> anyhow::Result<()> {
    let handler = Update::filter_message().endpoint(handle_message);

    info!(operator_id = context.operator_id, "telegram dispatcher starting");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![context])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

// ---------------------------------------------------------------------------
// Message handler
// ---------------------------------------------------------------------------

async fn handle_message(bot: Bot, msg: Message, context: BotContext) -> ResponseResult<()> {
    let user_id = match msg.from {
        Some(ref user) => {
            // teloxide uses u64 for user IDs; the rest of the crate uses i64.
            i64::try_from(user.id.0).unwrap_or(0)
        }
        None => return Ok(()),
    };

    if msg.chat.id == ChatId(context.operator_id) {
        return handle_operator_message(&bot, &msg, &context).await;
    }

    if !msg.chat.is_private() {
        debug!(user_id, chat_id = msg.chat.id.0, "ignoring message outside a private chat");
        return Ok(());
    }

    handle_user_message(&bot, &msg, user_id, &context).await
}

async fn handle_user_message(
    bot: &Bot,
    msg: &Message,
    user_id: UserId,
    context: &BotContext,
) -> ResponseResult<()> {
    let text = msg.text();
    debug!(user_id, "user message received");

    if let Some(("history", _)) = commands::parse_command(text) {
        bot.send_message(msg.chat.id, ui::HISTORY_FORBIDDEN).await?;
        return Ok(());
    }

    let evaluation = match context.gate.evaluate_with_prior(user_id, text).await {
        Ok(evaluation) => evaluation,
        Err(e) => {
            error!(user_id, error = %e, "admission evaluation failed");
            bot.send_message(msg.chat.id, ui::TEMPORARY_FAILURE).await?;
            return Ok(());
        }
    };

    match &evaluation.decision {
        Decision::Admit if evaluation.passed_challenge() => {
            info!(user_id, "user verified");
            bot.send_message(msg.chat.id, ui::VERIFIED).await?;
        }
        Decision::Admit if is_start_command(text) => {
            bot.send_message(msg.chat.id, ui::GREETING).await?;
        }
        Decision::Admit => {
            let inbound = convert::inbound_message(msg);
            if let Err(e) = context.relay.forward(user_id, &inbound).await {
                warn!(user_id, error = %e, "message not relayed");
                bot.send_message(msg.chat.id, ui::forward_error_notice(&e))
                    .await?;
            }
        }
        decision => {
            if let Some(notice) = ui::decision_notice(decision) {
                bot.send_message(msg.chat.id, notice).await?;
            }
        }
    }

    Ok(())
}

async fn handle_operator_message(
    bot: &Bot,
    msg: &Message,
    context: &BotContext,
) -> ResponseResult<()> {
    let replied_to = convert::replied_to(msg);

    // A slash command sent as a reply is relayed like any other reply.
    if replied_to.is_none() {
        if let Some((command, args)) = commands::parse_command(msg.text()) {
            let reply = dispatch_command(command, args, context).await;
            for chunk in ui::chunk_message(&reply, ui::TELEGRAM_MESSAGE_LIMIT) {
                bot.send_message(msg.chat.id, chunk).await?;
            }
            return Ok(());
        }
    }

    let inbound = convert::inbound_message(msg);
    if let Err(e) = context.relay.route_reply(replied_to, &inbound).await {
        warn!(error = %e, "operator reply not routed");
        bot.send_message(msg.chat.id, ui::reply_error_notice(&e))
            .await?;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Command dispatcher
// ---------------------------------------------------------------------------

async fn dispatch_command(command: &str, args: &str, context: &BotContext) -> String {
    match command {
        "help" | "start" => commands::handle_help(),
        "history" => {
            commands::handle_history(
                &*context.log,
                &*context.clock,
                args,
                context.history_window_days,
            )
            .await
        }
        "reset" => commands::handle_reset(&context.gate, args).await,
        "status" => commands::handle_status(&context.gate, args).await,
        _ => format!("Unknown command: /{command}"),
    }
}
