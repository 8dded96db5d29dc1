//! Relaygate CLI entry point.
//!
//! Provides `start`, `history`, and `reset` subcommands for running the bot,
//! printing the relayed message report, or clearing a user's verification
//! state from the shell.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use teloxide::prelude::*;
use tracing::info;

use relaygate::admission::challenge::RandomChallenges;
use relaygate::admission::store::SqliteVerificationStore;
use relaygate::admission::AdmissionGate;
use relaygate::clock::{Clock, SystemClock};
use relaygate::config::{load_config, resolve_bot_token, runtime_paths, Config, RuntimePaths};
use relaygate::history::{format_report, MessageLog, SqliteMessageLog};
use relaygate::relay::correlation::CorrelationTable;
use relaygate::relay::spam::AdFilter;
use relaygate::relay::RelayCorrelator;
use relaygate::telegram::transport::TelegramTransport;
use relaygate::telegram::{run_telegram, BotContext};
use relaygate::types::UserId;

/// Relaygate: Telegram relay bot with challenge-based admission.
#[derive(Parser)]
#[command(name = "relaygate", version, about)]
struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Run the bot until Ctrl+C.
    Start {
        /// Path to config.toml (default: ~/.relaygate/config.toml).
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print messages relayed in the last N days.
    History {
        /// Path to config.toml (default: ~/.relaygate/config.toml).
        #[arg(long)]
        config: Option<PathBuf>,
        /// Window in days (default: history.window_days).
        #[arg(long)]
        days: Option<u32>,
    },
    /// Clear a user's verification state, lifting any lock or ban.
    Reset {
        /// Path to config.toml (default: ~/.relaygate/config.toml).
        #[arg(long)]
        config: Option<PathBuf>,
        /// Telegram user ID to reset.
        user_id: UserId,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Start { config } => handle_start(config.as_deref()).await,
        Command::History { config, days } => handle_history(config.as_deref(), days).await,
        Command::Reset { config, user_id } => handle_reset(config.as_deref(), user_id).await,
    }
}

fn load(config_path: Option<&Path>) -> anyhow::Result<(Config, RuntimePaths)> {
    let paths = runtime_paths(config_path)?;
    let config = load_config(&paths.config_toml)
        .with_context(|| format!("failed to load {}", paths.config_toml.display()))?;
    Ok((config, paths))
}

fn build_gate(
    config: &Config,
    pool: &sqlx::SqlitePool,
    clock: Arc<dyn Clock>,
) -> AdmissionGate {
    let store = Arc::new(SqliteVerificationStore::new(pool.clone()));
    let challenges = Arc::new(RandomChallenges::new(
        config.admission.operand_min,
        config.admission.operand_max,
    ));
    AdmissionGate::new(store, challenges, clock, config.admission.policy())
}

/// Run the bot.
async fn handle_start(config_path: Option<&Path>) -> anyhow::Result<()> {
    let (config, paths) = load(config_path)?;
    let _logging_guard = relaygate::logging::init_production(&paths.logs_dir)?;

    let token = resolve_bot_token(&config.telegram, &paths.env_file)?;
    let database = config.database_path(&paths);
    let pool = relaygate::storage::open(&database).await?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let gate = Arc::new(build_gate(&config, &pool, Arc::clone(&clock)));
    let log: Arc<dyn MessageLog> = Arc::new(SqliteMessageLog::new(pool.clone()));

    let filter = AdFilter::new(config.relay.blocked_keywords.as_slice())
        .context("invalid relay.blocked_keywords")?;
    let bot = Bot::new(token);
    let transport = Arc::new(TelegramTransport::new(
        bot.clone(),
        ChatId(config.telegram.operator_id),
    ));
    let relay = Arc::new(RelayCorrelator::new(
        transport,
        Arc::clone(&log),
        Arc::clone(&clock),
        filter,
        CorrelationTable::new(config.relay.correlation_capacity),
    ));

    info!(
        config = %paths.config_toml.display(),
        database = %database.display(),
        operator_id = config.telegram.operator_id,
        "relaygate started"
    );

    let context = BotContext {
        gate,
        relay,
        log,
        clock,
        operator_id: config.telegram.operator_id,
        history_window_days: config.history.window_days,
    };
    run_telegram(bot, context).await?;

    info!("relaygate stopped");
    Ok(())
}

/// Print the history report to stdout.
async fn handle_history(config_path: Option<&Path>, days: Option<u32>) -> anyhow::Result<()> {
    relaygate::logging::init_cli();
    let (config, paths) = load(config_path)?;
    let pool = relaygate::storage::open(&config.database_path(&paths)).await?;

    let days = days.unwrap_or(config.history.window_days);
    let now = SystemClock.now()?;
    let since = now
        .checked_sub_signed(chrono::Duration::days(i64::from(days)))
        .context("history window out of range")?;

    let entries = SqliteMessageLog::new(pool)
        .query(since)
        .await
        .context("failed to query history")?;
    println!("{}", format_report(&entries, days));
    Ok(())
}

/// Reset one user's verification record.
async fn handle_reset(config_path: Option<&Path>, user_id: UserId) -> anyhow::Result<()> {
    relaygate::logging::init_cli();
    let (config, paths) = load(config_path)?;
    let pool = relaygate::storage::open(&config.database_path(&paths)).await?;

    let gate = build_gate(&config, &pool, Arc::new(SystemClock));
    gate.reset(user_id)
        .await
        .with_context(|| format!("failed to reset user {user_id}"))?;
    println!("Verification state cleared for user {user_id}.");
    Ok(())
}
