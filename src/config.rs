//! Configuration — read once from the environment, threaded through
//! constructors. No module reads env vars at call time.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Telegram Bot API token.
    pub bot_token: SecretString,
    /// Bot username, without `@` — used to build deep links.
    pub bot_username: String,
    /// Chat id of the recruitment group that invite links point into.
    pub group_chat_id: i64,
    /// Topic/thread id inside the managers' group where `/invite` is accepted.
    /// `None` accepts the command in any thread.
    pub commands_thread_id: Option<i64>,
    /// Path to the local database file.
    pub db_path: PathBuf,
}

impl BotConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bot_token = require("INTAKE_BOT_TOKEN")?;
        let bot_username = require("INTAKE_BOT_USERNAME")?;
        let group_chat_id = parse_i64(require("INTAKE_GROUP_CHAT_ID")?, "INTAKE_GROUP_CHAT_ID")?;

        let commands_thread_id = match std::env::var("INTAKE_COMMANDS_THREAD_ID") {
            Ok(v) => Some(parse_i64(v, "INTAKE_COMMANDS_THREAD_ID")?),
            Err(_) => None,
        };

        let db_path = std::env::var("INTAKE_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/intake-bot.db"));

        Ok(Self {
            bot_token: SecretString::from(bot_token),
            bot_username: bot_username.trim_start_matches('@').to_string(),
            group_chat_id,
            commands_thread_id,
            db_path,
        })
    }
}

fn require(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

fn parse_i64(value: String, key: &str) -> Result<i64, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("expected an integer, got {value:?}"),
    })
}
