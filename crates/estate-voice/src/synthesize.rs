//! ElevenLabs text-to-speech.

use async_trait::async_trait;
use estate_core::{EstateConfig, SynthesisError, Synthesizer};
use serde::Serialize;

use crate::{clip_body, http_client};

#[derive(Debug, Clone)]
pub struct ElevenLabsSynthesizer {
    pub base_url: String,
    pub api_key: String,
    pub voice_id: String,
    pub stability: f32,
    pub similarity_boost: f32,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    voice_settings: VoiceSettings,
}

impl ElevenLabsSynthesizer {
    pub fn from_config(cfg: &EstateConfig) -> reqwest::Result<Self> {
        let e = &cfg.elevenlabs;
        Ok(Self {
            base_url: e.base_url.clone(),
            api_key: e.api_key.clone(),
            voice_id: e.voice_id.clone(),
            stability: e.stability,
            similarity_boost: e.similarity_boost,
            client: http_client(e.timeout_secs)?,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/text-to-speech/{}",
            self.base_url.trim_end_matches('/'),
            self.voice_id
        )
    }

    fn request<'a>(&self, text: &'a str) -> SpeechRequest<'a> {
        SpeechRequest {
            text,
            voice_settings: VoiceSettings {
                stability: self.stability,
                similarity_boost: self.similarity_boost,
            },
        }
    }
}

#[async_trait]
impl Synthesizer for ElevenLabsSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SynthesisError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SynthesisError::Request("nothing to synthesize".to_string()));
        }
        let res = self
            .client
            .post(self.endpoint())
            .header("xi-api-key", &self.api_key)
            .header(reqwest::header::ACCEPT, "audio/mpeg")
            .json(&self.request(text))
            .send()
            .await
            .map_err(|e| SynthesisError::Request(e.to_string()))?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(SynthesisError::Status(status.as_u16(), clip_body(&body)));
        }
        let bytes = res
            .bytes()
            .await
            .map_err(|e| SynthesisError::Request(e.to_string()))?;
        tracing::debug!(voice = %self.voice_id, bytes = bytes.len(), "speech synthesized");
        Ok(bytes.to_vec())
    }
}
