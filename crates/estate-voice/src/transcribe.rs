//! Speech-to-text over an OpenAI-compatible transcription API (Whisper).

use async_trait::async_trait;
use estate_core::{EstateConfig, TranscriptionError, Transcriber};
use serde::Deserialize;

use crate::{clip_body, http_client};

#[derive(Debug, Clone)]
pub struct WhisperTranscriber {
    /// Base URL without trailing slash (e.g. https://api.openai.com/v1).
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

impl WhisperTranscriber {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout_secs: u64,
    ) -> reqwest::Result<Self> {
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            client: http_client(timeout_secs)?,
        })
    }

    pub fn from_config(cfg: &EstateConfig) -> reqwest::Result<Self> {
        let o = &cfg.openai;
        Self::new(
            o.base_url.clone(),
            o.api_key.clone(),
            o.transcription_model.clone(),
            o.timeout_secs,
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/transcriptions", self.base_url.trim_end_matches('/'))
    }
}

fn parse_transcript(body: &str) -> Result<String, TranscriptionError> {
    let parsed: TranscriptionResponse =
        serde_json::from_str(body).map_err(|e| TranscriptionError::Request(e.to_string()))?;
    let text = parsed.text.trim();
    if text.is_empty() {
        return Err(TranscriptionError::Empty);
    }
    Ok(text.to_string())
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio: Vec<u8>) -> Result<String, TranscriptionError> {
        if audio.is_empty() {
            return Err(TranscriptionError::Empty);
        }
        let part = reqwest::multipart::Part::bytes(audio)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| TranscriptionError::Request(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone());
        let res = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TranscriptionError::Request(e.to_string()))?;
        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| TranscriptionError::Request(e.to_string()))?;
        if !status.is_success() {
            return Err(TranscriptionError::Status(status.as_u16(), clip_body(&body)));
        }
        parse_transcript(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_the_text_field() {
        let text = parse_transcript(r#"{"text":"  Do you have a villa in the Marina? "}"#).unwrap();
        assert_eq!(text, "Do you have a villa in the Marina?");
    }

    #[test]
    fn blank_or_missing_text_is_empty() {
        assert!(matches!(parse_transcript(r#"{"text":"   "}"#), Err(TranscriptionError::Empty)));
        assert!(matches!(parse_transcript("{}"), Err(TranscriptionError::Empty)));
    }

    #[test]
    fn garbage_body_is_a_request_error() {
        assert!(matches!(
            parse_transcript("<html>bad gateway</html>"),
            Err(TranscriptionError::Request(_))
        ));
    }

    #[test]
    fn endpoint_ignores_trailing_slash() {
        let t = WhisperTranscriber::new("https://api.openai.com/v1/", "k", "whisper-1", 5).unwrap();
        assert_eq!(t.endpoint(), "https://api.openai.com/v1/audio/transcriptions");
    }
}
