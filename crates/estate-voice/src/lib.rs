//! # estate-voice
//!
//! HTTP adapters behind the engine's collaborator traits:
//!
//! - [`HttpRecordingSource`]: downloads the caller's recording from the telephony provider.
//! - [`WhisperTranscriber`]: OpenAI-compatible `/audio/transcriptions`.
//! - [`ChatGenerator`]: OpenAI-compatible `/chat/completions`.
//! - [`ElevenLabsSynthesizer`]: ElevenLabs text-to-speech, MP3 out.
//!
//! Every adapter performs a single attempt; the engine applies its own timeouts
//! on top of the per-client ones configured here.

pub mod generate;
pub mod recording;
pub mod synthesize;
pub mod transcribe;

pub use generate::ChatGenerator;
pub use recording::HttpRecordingSource;
pub use synthesize::ElevenLabsSynthesizer;
pub use transcribe::WhisperTranscriber;

use estate_core::{EstateConfig, Services};
use std::time::Duration;

/// Longest slice of an upstream error body kept in error messages and logs.
const ERROR_BODY_LIMIT: usize = 300;

pub(crate) fn http_client(timeout_secs: u64) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
}

pub(crate) fn clip_body(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

/// Wire all four production adapters from configuration.
///
/// Missing API keys are not fatal: the gateway still answers calls, and the
/// affected step degrades into its spoken fallback.
pub fn services_from_config(cfg: &EstateConfig) -> reqwest::Result<Services> {
    if cfg.openai.api_key.trim().is_empty() {
        tracing::warn!("OpenAI API key not set (OPENAI_API_KEY); transcription and answers will fall back");
    }
    if cfg.elevenlabs.api_key.trim().is_empty() {
        tracing::warn!("ElevenLabs API key not set (ELEVENLABS_API_KEY); replies will not be voiced");
    }
    Ok(Services {
        recordings: Box::new(HttpRecordingSource::from_config(cfg)?),
        transcriber: Box::new(WhisperTranscriber::from_config(cfg)?),
        generator: Box::new(ChatGenerator::from_config(cfg)?),
        synthesizer: Box::new(ElevenLabsSynthesizer::from_config(cfg)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_error_bodies_are_clipped() {
        let body = "x".repeat(1000);
        let clipped = clip_body(&body);
        assert_eq!(clipped.len(), ERROR_BODY_LIMIT + 3);
        assert!(clipped.ends_with("..."));
        assert_eq!(clip_body("  short  "), "short");
    }

    #[test]
    fn services_build_without_keys() {
        assert!(services_from_config(&EstateConfig::default()).is_ok());
    }
}
