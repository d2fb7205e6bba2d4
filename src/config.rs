//! Configuration and settings management
//!
//! Loads settings from environment variables and defines bot constants.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_token: String,

    /// Gemini API key; without it the bot only answers static commands
    pub gemini_api_key: Option<String>,

    /// OpenWeatherMap API key; without it the weather tool is degraded
    pub weather_api_key: Option<String>,
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(File::with_name("config/local").required(false))
            // Environment::default() auto-converts UPPER_SNAKE_CASE to snake_case;
            // ignore_empty treats empty env vars as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        let mut settings: Self = s.try_deserialize()?;

        // Fallback: check environment variables directly if config didn't pick them up
        if settings.gemini_api_key.is_none() {
            if let Ok(val) = std::env::var("GEMINI_API_KEY") {
                if !val.is_empty() {
                    settings.gemini_api_key = Some(val);
                }
            }
        }
        if settings.weather_api_key.is_none() {
            if let Ok(val) = std::env::var("WEATHER_API_KEY") {
                if !val.is_empty() {
                    settings.weather_api_key = Some(val);
                }
            }
        }

        Ok(settings)
    }
}

/// Gemini model used by the agent
pub const GEMINI_MODEL: &str = "gemini-2.5-flash";
/// Maximum iterations for the agent tool-calling loop
pub const AGENT_MAX_ITERATIONS: usize = 5;
/// Sampling temperature for agent completions
pub const AGENT_TEMPERATURE: f32 = 0.2;
/// Timeout for outbound HTTP calls (weather provider, LLM backend)
pub const HTTP_TIMEOUT_SECS: u64 = 60;
/// Telegram hard limit on message length
pub const TELEGRAM_MAX_MESSAGE_LEN: usize = 4096;
/// Timezone used by the /fecha command
pub const BOT_TIMEZONE: chrono_tz::Tz = chrono_tz::America::New_York;
