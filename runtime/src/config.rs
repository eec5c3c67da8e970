//! Process configuration read from the environment.

use crate::error::ConfigError;
use crate::notify::NotifyMode;
use crate::renderer::RenderOptions;
use crate::transport::telegram::DEFAULT_API_BASE;
use crate::transport::ChatId;
use std::time::Duration;

pub const DEFAULT_TARGET_URL: &str = "https://makerworld.com/en/3d-models";
pub const DEFAULT_BASE_URL: &str = "https://makerworld.com";
/// Top of every hour (sec min hour day month weekday).
pub const DEFAULT_SCHEDULE: &str = "0 0 * * * *";
const DEFAULT_SETTLE_MS: u64 = 5_000;
const DEFAULT_NAV_TIMEOUT_MS: u64 = 60_000;
const DEFAULT_THROTTLE_MS: u64 = 1_000;

/// Telegram credentials. Both are required for anything that talks to chat.
#[derive(Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: ChatId,
    pub api_base: String,
}

impl TelegramConfig {
    /// Token prefix safe to print.
    pub fn token_hint(&self) -> String {
        let prefix: String = self.bot_token.chars().take(10).collect();
        format!("{prefix}...")
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &self.token_hint())
            .field("chat_id", &self.chat_id)
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Everything except credentials.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub target_url: String,
    pub base_url: String,
    pub schedule: String,
    pub mode: NotifyMode,
    pub include_previews: bool,
    pub settle: Duration,
    pub nav_timeout: Duration,
    pub throttle: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            target_url: DEFAULT_TARGET_URL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            schedule: DEFAULT_SCHEDULE.to_string(),
            mode: NotifyMode::PerItem,
            include_previews: false,
            settle: Duration::from_millis(DEFAULT_SETTLE_MS),
            nav_timeout: Duration::from_millis(DEFAULT_NAV_TIMEOUT_MS),
            throttle: Duration::from_millis(DEFAULT_THROTTLE_MS),
        }
    }
}

impl WatchConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let mode = match read_string(&get, "MAKERWATCH_MODE") {
            Some(raw) => raw.parse::<NotifyMode>().map_err(|reason| ConfigError::Invalid {
                name: "MAKERWATCH_MODE",
                value: raw,
                reason,
            })?,
            None => defaults.mode,
        };

        Ok(Self {
            target_url: read_string(&get, "MAKERWATCH_TARGET_URL").unwrap_or(defaults.target_url),
            base_url: read_string(&get, "MAKERWATCH_BASE_URL").unwrap_or(defaults.base_url),
            schedule: read_string(&get, "MAKERWATCH_SCHEDULE").unwrap_or(defaults.schedule),
            mode,
            include_previews: read_bool(&get, "MAKERWATCH_PREVIEWS")?
                .unwrap_or(defaults.include_previews),
            settle: read_millis(&get, "MAKERWATCH_SETTLE_MS")?.unwrap_or(defaults.settle),
            nav_timeout: read_millis(&get, "MAKERWATCH_NAV_TIMEOUT_MS")?
                .unwrap_or(defaults.nav_timeout),
            throttle: read_millis(&get, "MAKERWATCH_THROTTLE_MS")?.unwrap_or(defaults.throttle),
        }
        .validated()?)
    }

    fn validated(self) -> Result<Self, ConfigError> {
        for (name, value) in [
            ("MAKERWATCH_TARGET_URL", &self.target_url),
            ("MAKERWATCH_BASE_URL", &self.base_url),
        ] {
            url::Url::parse(value).map_err(|e| ConfigError::Invalid {
                name,
                value: value.clone(),
                reason: e.to_string(),
            })?;
        }
        Ok(self)
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            nav_timeout: self.nav_timeout,
            settle: self.settle,
            ..RenderOptions::default()
        }
    }
}

impl TelegramConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bot_token =
            read_string(&get, "TG_BOT_TOKEN").ok_or(ConfigError::Missing("TG_BOT_TOKEN"))?;
        let chat_id = read_string(&get, "TG_CHAT_ID").ok_or(ConfigError::Missing("TG_CHAT_ID"))?;
        Ok(Self {
            bot_token,
            chat_id: ChatId::new(chat_id),
            api_base: read_string(&get, "MAKERWATCH_TELEGRAM_API")
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        })
    }
}

fn read_string(get: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    get(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn read_millis(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<Duration>, ConfigError> {
    read_string(get, name)
        .map(|raw| {
            raw.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| ConfigError::Invalid {
                    name,
                    value: raw,
                    reason: e.to_string(),
                })
        })
        .transpose()
}

fn read_bool(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<bool>, ConfigError> {
    read_string(get, name)
        .map(|raw| match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                name,
                value: raw,
                reason: "expected a boolean".into(),
            }),
        })
        .transpose()
}
