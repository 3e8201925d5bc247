//! Configuration and settings management
//!
//! Loads settings from environment variables and optional config files, and
//! defines transport constants.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Password accepted when `BOT_PASSWORD` is not set.
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";
/// Admin session length in minutes when `ADMIN_TIMEOUT` is not set.
pub const DEFAULT_ADMIN_TIMEOUT_MINUTES: u32 = 30;

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    #[serde(default)]
    pub telegram_token: String,

    /// Shared admin secret
    #[serde(default = "default_bot_password")]
    pub bot_password: String,

    /// Admin session length in minutes
    #[serde(default = "default_admin_timeout")]
    pub admin_timeout: u32,

    /// Root directory holding one folder per category
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,

    /// Catalog index file
    #[serde(default = "default_db_file")]
    pub db_file: PathBuf,
}

fn default_bot_password() -> String {
    DEFAULT_ADMIN_PASSWORD.to_string()
}

const fn default_admin_timeout() -> u32 {
    DEFAULT_ADMIN_TIMEOUT_MINUTES
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("storage")
}

fn default_db_file() -> PathBuf {
    PathBuf::from("plants.json")
}

/// Build the layered configuration source.
///
/// Files under `config/` are optional; environment variables win.
///
/// # Errors
///
/// Returns a `ConfigError` if a present source cannot be read.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Not checked into git
        .add_source(File::with_name("config/local").required(false))
        // Eg.. `APP__ADMIN_TIMEOUT=5 ./target/app`
        .add_source(Environment::with_prefix("APP").separator("__"))
        // UPPER_SNAKE_CASE is mapped to snake_case; empty values count as unset
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use herbarium_bot::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or no bot token is configured.
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_config(build_config()?)
    }

    /// Deserialize settings from an already built configuration.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if deserialization fails or no bot token is configured.
    pub fn from_config(source: Config) -> Result<Self, ConfigError> {
        let mut settings: Self = source.try_deserialize()?;

        // The original deployment used BOT_TOKEN
        if settings.telegram_token.is_empty() {
            if let Ok(val) = std::env::var("BOT_TOKEN") {
                if !val.is_empty() {
                    settings.telegram_token = val;
                }
            }
        }

        if settings.telegram_token.is_empty() {
            return Err(ConfigError::NotFound("telegram_token".to_string()));
        }

        Ok(settings)
    }
}

/// Maximum attempts for a Telegram API call before giving up.
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;
/// Initial backoff between Telegram API retries.
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Upper bound for the backoff between Telegram API retries.
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;
