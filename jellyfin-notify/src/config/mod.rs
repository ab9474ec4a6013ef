//! Environment-driven application configuration.
//!
//! All settings are read once at startup (after `.env` is loaded by `main`).
//! Required variables missing from the environment produce
//! [`Error::Configuration`](crate::Error::Configuration).

use std::collections::HashSet;
use std::time::Duration;

use crate::{Error, Result};

/// Default HTTP listener port.
const DEFAULT_PORT: u16 = 8080;

/// Default inter-send delay, sized to stay under ~30 messages/second.
const DEFAULT_SEND_INTERVAL_MS: u64 = 35;

/// Default number of additional broadcast attempts after a pipeline failure.
const DEFAULT_BROADCAST_MAX_RETRIES: u32 = 3;

/// Upper bound for `LOG_RETENTION_DAYS`.
pub const MAX_LOG_RETENTION_DAYS: i64 = 36_500;

/// Telegram Bot API settings.
#[derive(Debug, Clone)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub api_base: String,
}

/// Jellyfin server settings.
#[derive(Debug, Clone)]
pub struct JellyfinSettings {
    pub server_url: String,
    pub api_key: String,
}

/// Inbound webhook listener settings.
#[derive(Debug, Clone)]
pub struct WebhookSettings {
    /// Shared secret expected in `X-Webhook-Secret`; empty disables the check.
    pub secret: String,
    pub bind_address: String,
    pub port: u16,
}

/// Logging settings.
#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: String,
    pub log_dir: String,
    pub retention_days: i64,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: "./logs".to_string(),
            retention_days: 30,
        }
    }
}

/// Broadcast-time recipient selection switches.
///
/// Passed explicitly into recipient selection so that selection stays a pure
/// function of `(event, recipients, config)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionConfig {
    /// Send every notification to testers only.
    pub notify_only_testers: bool,
    /// Route synthetic (`test-` prefixed) events to testers only.
    pub enable_beta_features: bool,
    /// Tester allowlist.
    pub tester_ids: HashSet<i64>,
}

impl SelectionConfig {
    pub fn is_tester(&self, chat_id: i64) -> bool {
        self.tester_ids.contains(&chat_id)
    }
}

/// Delivery loop and retry wrapper tuning.
#[derive(Debug, Clone)]
pub struct BroadcastSettings {
    /// Fixed delay before each send.
    pub send_interval: Duration,
    /// Additional whole-broadcast attempts after a pipeline failure.
    pub max_retries: u32,
    /// Backoff unit; attempt `n` waits `n` units.
    pub backoff_unit: Duration,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self {
            send_interval: Duration::from_millis(DEFAULT_SEND_INTERVAL_MS),
            max_retries: DEFAULT_BROADCAST_MAX_RETRIES,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub telegram: TelegramSettings,
    pub jellyfin: JellyfinSettings,
    pub webhook: WebhookSettings,
    pub database_path: String,
    pub logging: LoggingSettings,
    pub selection: SelectionConfig,
    pub broadcast: BroadcastSettings,
    pub default_language: String,
}

impl AppConfig {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &str| get(key).ok_or_else(|| Error::config(format!("{key} is required")));

        let telegram = TelegramSettings {
            bot_token: required("TELEGRAM_BOT_TOKEN")?,
            api_base: get("TELEGRAM_API_BASE")
                .unwrap_or_else(|| "https://api.telegram.org".to_string()),
        };

        let jellyfin = JellyfinSettings {
            server_url: required("JELLYFIN_SERVER_URL")?
                .trim_end_matches('/')
                .to_string(),
            api_key: required("JELLYFIN_API_KEY")?,
        };

        let mut webhook = WebhookSettings {
            secret: get("WEBHOOK_SECRET").unwrap_or_default(),
            bind_address: get("API_BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: DEFAULT_PORT,
        };
        if let Some(port) = get("PORT") {
            webhook.port = port
                .parse()
                .map_err(|_| Error::config(format!("PORT must be a valid port number, got {port:?}")))?;
        }

        let mut logging = LoggingSettings::default();
        if let Some(level) = get("LOG_LEVEL") {
            logging.level = level.to_ascii_lowercase();
        }
        if let Some(dir) = get("LOG_DIR") {
            logging.log_dir = dir;
        }
        if let Some(days) = get("LOG_RETENTION_DAYS")
            && let Ok(parsed) = days.parse::<i64>()
            && parsed > 0
        {
            logging.retention_days = parsed.min(MAX_LOG_RETENTION_DAYS);
        }

        let selection = SelectionConfig {
            notify_only_testers: parse_bool(get("NOTIFY_ONLY_TESTERS").as_deref(), false),
            enable_beta_features: parse_bool(get("ENABLE_BETA_FEATURES").as_deref(), false),
            tester_ids: parse_id_list(get("TESTER_CHAT_IDS").as_deref().unwrap_or("")),
        };

        let mut broadcast = BroadcastSettings::default();
        if let Some(ms) = get("SEND_INTERVAL_MS")
            && let Ok(parsed) = ms.parse::<u64>()
        {
            broadcast.send_interval = Duration::from_millis(parsed);
        }
        if let Some(retries) = get("BROADCAST_MAX_RETRIES")
            && let Ok(parsed) = retries.parse::<u32>()
        {
            broadcast.max_retries = parsed;
        }

        Ok(Self {
            telegram,
            jellyfin,
            webhook,
            database_path: get("DATABASE_PATH").unwrap_or_else(|| "./bot.db".to_string()),
            logging,
            selection,
            broadcast,
            default_language: get("DEFAULT_LANGUAGE")
                .map(|l| crate::i18n::normalize_language(&l))
                .unwrap_or_else(|| crate::i18n::DEFAULT_LANGUAGE.to_string()),
        })
    }

    /// SQLite connection URL for the configured database path.
    pub fn database_url(&self) -> String {
        if self.database_path.starts_with("sqlite:") {
            self.database_path.clone()
        } else {
            format!("sqlite:{}?mode=rwc", self.database_path)
        }
    }
}

fn parse_bool(value: Option<&str>, default: bool) -> bool {
    match value.map(|v| v.to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "t" | "true" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "0" | "f" | "false" | "no" | "off") => false,
        _ => default,
    }
}

/// Parse a comma-separated list of chat IDs, skipping invalid entries.
fn parse_id_list(value: &str) -> HashSet<i64> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter_map(|part| part.parse::<i64>().ok())
        .collect()
}
