//! Recording download from the telephony provider.

use async_trait::async_trait;
use estate_core::{EstateConfig, RecordingSource, TranscriptionError};

use crate::{clip_body, http_client};

/// Fetches `<RecordingUrl>.wav`, with HTTP basic auth when account credentials are configured.
#[derive(Debug, Clone)]
pub struct HttpRecordingSource {
    auth: Option<(String, String)>,
    pub timeout_secs: u64,
    client: reqwest::Client,
}

impl HttpRecordingSource {
    pub fn new(auth: Option<(String, String)>, timeout_secs: u64) -> reqwest::Result<Self> {
        Ok(Self {
            auth,
            timeout_secs,
            client: http_client(timeout_secs)?,
        })
    }

    pub fn from_config(cfg: &EstateConfig) -> reqwest::Result<Self> {
        let auth = cfg
            .twilio
            .basic_auth()
            .map(|(sid, token)| (sid.to_string(), token.to_string()));
        Self::new(auth, cfg.twilio.timeout_secs)
    }
}

/// Recording references point at the media resource without an extension;
/// the WAV rendition is requested explicitly.
pub fn media_url(recording_url: &str) -> String {
    let url = recording_url.trim();
    let lower = url.to_ascii_lowercase();
    if lower.ends_with(".wav") || lower.ends_with(".mp3") {
        url.to_string()
    } else {
        format!("{url}.wav")
    }
}

#[async_trait]
impl RecordingSource for HttpRecordingSource {
    async fn fetch(&self, recording_url: &str) -> Result<Vec<u8>, TranscriptionError> {
        let url = media_url(recording_url);
        let mut req = self.client.get(&url);
        if let Some((sid, token)) = &self.auth {
            req = req.basic_auth(sid, Some(token));
        }
        let res = req
            .send()
            .await
            .map_err(|e| TranscriptionError::Fetch(e.to_string()))?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(TranscriptionError::Fetch(format!(
                "{} from {}: {}",
                status,
                url,
                clip_body(&body)
            )));
        }
        let bytes = res
            .bytes()
            .await
            .map_err(|e| TranscriptionError::Fetch(e.to_string()))?;
        tracing::debug!(url = %url, bytes = bytes.len(), "recording fetched");
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_wav_to_bare_references() {
        assert_eq!(
            media_url("https://api.twilio.com/2010-04-01/Accounts/AC1/Recordings/RE1"),
            "https://api.twilio.com/2010-04-01/Accounts/AC1/Recordings/RE1.wav"
        );
        assert_eq!(media_url(" https://r/RE2.wav "), "https://r/RE2.wav");
        assert_eq!(media_url("https://r/RE3.MP3"), "https://r/RE3.MP3");
    }

    #[test]
    fn credentials_come_from_twilio_section() {
        let mut cfg = EstateConfig::default();
        assert!(HttpRecordingSource::from_config(&cfg).unwrap().auth.is_none());
        cfg.twilio.account_sid = Some("AC1".into());
        cfg.twilio.auth_token = Some("tok".into());
        let src = HttpRecordingSource::from_config(&cfg).unwrap();
        assert_eq!(src.auth, Some(("AC1".to_string(), "tok".to_string())));
    }

    #[test]
    fn download_timeout_is_its_own_setting() {
        let mut cfg = EstateConfig::default();
        cfg.twilio.timeout_secs = 7;
        cfg.openai.timeout_secs = 45;
        assert_eq!(HttpRecordingSource::from_config(&cfg).unwrap().timeout_secs, 7);
    }
}
