//! Gateway configuration: defaults, optional TOML file, then environment.
//!
//! Precedence: `ESTATE_*` environment (`ESTATE_OPENAI__CHAT_MODEL=gpt-4o`) >
//! file at `ESTATE_CONFIG` (default `config/estate.toml`) > built-in defaults.
//! API secrets also fall back to their conventional variable names.
//!
//! | Env fallback | Field |
//! |-----|-------|
//! | OPENAI_API_KEY | openai.api_key |
//! | ELEVENLABS_API_KEY | elevenlabs.api_key |
//! | TWILIO_ACCOUNT_SID | twilio.account_sid |
//! | TWILIO_AUTH_TOKEN | twilio.auth_token |

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::prompt::DEFAULT_PERSONA;

const DEFAULT_CONFIG_PATH: &str = "config/estate";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EstateConfig {
    pub server: ServerConfig,
    pub dataset: DatasetConfig,
    pub audio: AudioConfig,
    pub sessions: SessionConfig,
    pub assistant: AssistantConfig,
    pub openai: OpenAiConfig,
    pub elevenlabs: ElevenLabsConfig,
    pub twilio: TwilioConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Externally reachable base URL; clip playback URLs are built from it.
    pub public_base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            public_base_url: "http://localhost:8000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub path: String,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: "data/dubai_properties_500.csv".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub dir: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            dir: "data/audio".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Sessions untouched for this long are purged by the sweeper.
    pub idle_timeout_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 30 * 60,
            sweep_interval_secs: 60,
        }
    }
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Persona and every sentence the caller can hear from the engine itself.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub persona: String,
    pub welcome_text: String,
    pub retry_text: String,
    pub generation_apology_text: String,
    pub synthesis_apology_text: String,
    pub goodbye_text: String,
    /// Completed exchanges after which the call is ended. Unset: no limit.
    pub max_exchanges: Option<usize>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            persona: DEFAULT_PERSONA.to_string(),
            welcome_text:
                "Welcome to Dubai Real Estate assistant. Please ask your question after the beep."
                    .to_string(),
            retry_text: "Sorry, I couldn't understand that. Please try again.".to_string(),
            generation_apology_text:
                "Sorry, I could not come up with an answer just now. Please ask again.".to_string(),
            synthesis_apology_text: "Sorry, I could not generate the voice response.".to_string(),
            goodbye_text: "Thank you for calling Dubai Real Estate assistant. Goodbye.".to_string(),
            max_exchanges: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub api_key: String,
    pub chat_model: String,
    pub transcription_model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            chat_model: "gpt-4".to_string(),
            transcription_model: "whisper-1".to_string(),
            max_tokens: 400,
            temperature: 0.7,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ElevenLabsConfig {
    pub base_url: String,
    pub api_key: String,
    pub voice_id: String,
    pub stability: f32,
    pub similarity_boost: f32,
    pub timeout_secs: u64,
}

impl Default for ElevenLabsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.elevenlabs.io".to_string(),
            api_key: String::new(),
            // Rachel
            voice_id: "EXAVITQu4vr4xnSDxMaL".to_string(),
            stability: 0.75,
            similarity_boost: 0.75,
            timeout_secs: 30,
        }
    }
}

/// Recording download settings. Both credentials unset: anonymous fetch.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TwilioConfig {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            timeout_secs: 30,
        }
    }
}

impl TwilioConfig {
    pub fn basic_auth(&self) -> Option<(&str, &str)> {
        match (self.account_sid.as_deref(), self.auth_token.as_deref()) {
            (Some(sid), Some(token)) => Some((sid, token)),
            _ => None,
        }
    }
}

impl EstateConfig {
    /// Load from `ESTATE_CONFIG` (or `config/estate`) plus environment.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("ESTATE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Path::new(&path))
    }

    /// Load from a specific file (skipped when absent) plus environment.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let builder = config::Config::builder().add_source(
            config::File::from(path).required(false),
        );
        let built = builder
            .add_source(
                config::Environment::with_prefix("ESTATE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut cfg: EstateConfig = built.try_deserialize()?;
        cfg.apply_env_fallbacks();
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_fallbacks(&mut self) {
        if self.openai.api_key.trim().is_empty() {
            if let Some(key) = env_opt_string("OPENAI_API_KEY") {
                self.openai.api_key = key;
            }
        }
        if self.elevenlabs.api_key.trim().is_empty() {
            if let Some(key) = env_opt_string("ELEVENLABS_API_KEY") {
                self.elevenlabs.api_key = key;
            }
        }
        if self.twilio.account_sid.is_none() {
            self.twilio.account_sid = env_opt_string("TWILIO_ACCOUNT_SID");
        }
        if self.twilio.auth_token.is_none() {
            self.twilio.auth_token = env_opt_string("TWILIO_AUTH_TOKEN");
        }
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sessions.idle_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "sessions.idle_timeout_secs must be > 0".to_string(),
            ));
        }
        if self.sessions.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "sessions.sweep_interval_secs must be > 0".to_string(),
            ));
        }
        if self.openai.timeout_secs == 0
            || self.elevenlabs.timeout_secs == 0
            || self.twilio.timeout_secs == 0
        {
            return Err(ConfigError::Invalid("service timeouts must be > 0".to_string()));
        }
        if !self.server.public_base_url.starts_with("http") {
            return Err(ConfigError::Invalid(format!(
                "server.public_base_url must be an http(s) URL, got '{}'",
                self.server.public_base_url
            )));
        }
        if self.assistant.max_exchanges == Some(0) {
            return Err(ConfigError::Invalid(
                "assistant.max_exchanges must be > 0 when set".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_opt_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
