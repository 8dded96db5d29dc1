//! Configuration loading and validation.
//!
//! Relaygate reads a human-owned `config.toml` (default `~/.relaygate/`).
//! The bot token never lives in the file: `telegram.bot_token_env` names the
//! environment variable holding it, optionally supplied by a `.env` file
//! next to the config.

use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::Deserialize;

use crate::admission::challenge::{DEFAULT_OPERAND_MAX, DEFAULT_OPERAND_MIN};
use crate::admission::{GatePolicy, DEFAULT_BAN_AFTER, DEFAULT_LOCKOUT_EVERY};
use crate::history::DEFAULT_WINDOW_DAYS;
use crate::relay::correlation::DEFAULT_CORRELATION_CAPACITY;
use crate::relay::spam::DEFAULT_BLOCKED_KEYWORDS;

/// Top-level configuration.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Telegram bot settings.
    pub telegram: TelegramConfig,

    /// Verification thresholds.
    #[serde(default)]
    pub admission: AdmissionConfig,

    /// Relay settings.
    #[serde(default)]
    pub relay: RelayConfig,

    /// History report settings.
    #[serde(default)]
    pub history: HistoryConfig,

    /// Database location.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Telegram-specific configuration.
#[derive(Debug, Deserialize)]
pub struct TelegramConfig {
    /// Environment variable name holding the bot token.
    #[serde(default = "default_bot_token_env")]
    pub bot_token_env: String,

    /// Telegram user ID of the operator. Their chat is the operator inbox.
    pub operator_id: i64,
}

/// Challenge and escalation thresholds.
#[derive(Debug, Deserialize)]
pub struct AdmissionConfig {
    /// Smallest challenge operand.
    #[serde(default = "default_operand_min")]
    pub operand_min: u32,

    /// Largest challenge operand (inclusive).
    #[serde(default = "default_operand_max")]
    pub operand_max: u32,

    /// Lock the user after every this many wrong answers.
    #[serde(default = "default_lockout_every")]
    pub lockout_every: u32,

    /// Lockout length in hours.
    #[serde(default = "default_lockout_hours")]
    pub lockout_hours: u32,

    /// Wrong answers that trigger a permanent ban.
    #[serde(default = "default_ban_after")]
    pub ban_after: u32,

    /// Require `/start` before the first challenge.
    #[serde(default)]
    pub require_start: bool,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            operand_min: default_operand_min(),
            operand_max: default_operand_max(),
            lockout_every: default_lockout_every(),
            lockout_hours: default_lockout_hours(),
            ban_after: default_ban_after(),
            require_start: false,
        }
    }
}

impl AdmissionConfig {
    /// Escalation policy for the admission gate.
    pub fn policy(&self) -> GatePolicy {
        GatePolicy {
            lockout_every: self.lockout_every,
            lockout_duration: Duration::hours(i64::from(self.lockout_hours)),
            ban_after: self.ban_after,
            require_start: self.require_start,
        }
    }
}

/// Relay configuration.
#[derive(Debug, Deserialize)]
pub struct RelayConfig {
    /// Case-insensitive keywords that mark a message as an advertisement.
    #[serde(default = "default_blocked_keywords")]
    pub blocked_keywords: Vec<String>,

    /// Maximum tracked operator-facing messages.
    #[serde(default = "default_correlation_capacity")]
    pub correlation_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            blocked_keywords: default_blocked_keywords(),
            correlation_capacity: default_correlation_capacity(),
        }
    }
}

/// History report configuration.
#[derive(Debug, Deserialize)]
pub struct HistoryConfig {
    /// Days covered by `/history`.
    #[serde(default = "default_window_days")]
    pub window_days: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Default, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path; defaults to `relaygate.db` in the config directory.
    #[serde(default)]
    pub database: Option<PathBuf>,
}

// Default value functions for serde

fn default_bot_token_env() -> String {
    "RELAYGATE_TELEGRAM_TOKEN".to_owned()
}
fn default_operand_min() -> u32 {
    DEFAULT_OPERAND_MIN
}
fn default_operand_max() -> u32 {
    DEFAULT_OPERAND_MAX
}
fn default_lockout_every() -> u32 {
    DEFAULT_LOCKOUT_EVERY
}
fn default_lockout_hours() -> u32 {
    24
}
fn default_ban_after() -> u32 {
    DEFAULT_BAN_AFTER
}
fn default_blocked_keywords() -> Vec<String> {
    DEFAULT_BLOCKED_KEYWORDS
        .iter()
        .map(|k| (*k).to_owned())
        .collect()
}
fn default_correlation_capacity() -> usize {
    DEFAULT_CORRELATION_CAPACITY
}
fn default_window_days() -> u32 {
    DEFAULT_WINDOW_DAYS
}

impl Config {
    /// Check cross-field constraints serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        let a = &self.admission;
        if a.operand_min > a.operand_max {
            anyhow::bail!(
                "admission.operand_min ({}) exceeds admission.operand_max ({})",
                a.operand_min,
                a.operand_max
            );
        }
        if a.lockout_every == 0 {
            anyhow::bail!("admission.lockout_every must be at least 1");
        }
        if a.ban_after == 0 {
            anyhow::bail!("admission.ban_after must be at least 1");
        }
        if self.relay.correlation_capacity == 0 {
            anyhow::bail!("relay.correlation_capacity must be at least 1");
        }
        Ok(())
    }

    /// Database path, falling back to the runtime default.
    pub fn database_path(&self, paths: &RuntimePaths) -> PathBuf {
        self.storage
            .database
            .clone()
            .unwrap_or_else(|| paths.database.clone())
    }
}

/// Well-known locations under the config directory.
#[derive(Debug, Clone)]
pub struct RuntimePaths {
    /// Config directory root (`~/.relaygate`).
    pub root: PathBuf,
    /// `config.toml`.
    pub config_toml: PathBuf,
    /// `.env` with the bot token.
    pub env_file: PathBuf,
    /// Default SQLite database.
    pub database: PathBuf,
    /// Rotated JSON logs.
    pub logs_dir: PathBuf,
}

impl RuntimePaths {
    /// Derive all paths from a root directory.
    pub fn from_root(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            config_toml: root.join("config.toml"),
            env_file: root.join(".env"),
            database: root.join("relaygate.db"),
            logs_dir: root.join("logs"),
        }
    }
}

/// Load and validate the config from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed, or validated.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config at {}: {e}", path.display()))?;
    let config: Config = toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("failed to parse config at {}: {e}", path.display()))?;
    config.validate()?;
    Ok(config)
}

/// Resolve the default config directory (`~/.relaygate/`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_dir() -> anyhow::Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.home_dir().join(".relaygate"))
}

/// Runtime paths rooted at the directory containing `config_path`, or at
/// [`config_dir`] when no explicit config is given.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn runtime_paths(config_path: Option<&Path>) -> anyhow::Result<RuntimePaths> {
    match config_path.and_then(Path::parent) {
        Some(parent) if !parent.as_os_str().is_empty() => Ok(RuntimePaths {
            config_toml: config_path.map(Path::to_path_buf).unwrap_or_default(),
            ..RuntimePaths::from_root(parent)
        }),
        Some(_) => Ok(RuntimePaths {
            config_toml: config_path.map(Path::to_path_buf).unwrap_or_default(),
            ..RuntimePaths::from_root(Path::new("."))
        }),
        None => Ok(RuntimePaths::from_root(&config_dir()?)),
    }
}

/// Read the bot token from the variable named in the config.
///
/// Loads `env_file` first when it exists; variables already set in the
/// process environment win.
///
/// # Errors
///
/// Returns an error if the `.env` file is unreadable or the variable is unset.
pub fn resolve_bot_token(config: &TelegramConfig, env_file: &Path) -> anyhow::Result<String> {
    if env_file.exists() {
        dotenvy::from_path(env_file)
            .map_err(|e| anyhow::anyhow!("failed to load {}: {e}", env_file.display()))?;
    }
    std::env::var(&config.bot_token_env)
        .map_err(|_| anyhow::anyhow!("bot token variable {} is not set", config.bot_token_env))
}
