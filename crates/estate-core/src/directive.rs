//! The engine's output contract to the telephony bridge.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a synthesized clip in the [`AudioStore`](crate::audio_store::AudioStore).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioHandle(String);

impl AudioHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AudioHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the bridge should do next.
///
/// Every variant except `Terminate` is followed by a record instruction
/// (see [`RecordSpec`]); `Terminate` speaks its text and hangs up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Directive {
    Prompt(String),
    PlayAudio(AudioHandle),
    Fallback(String),
    Terminate(String),
}

impl Directive {
    pub fn records_next_utterance(&self) -> bool {
        !matches!(self, Directive::Terminate(_))
    }

    /// Short tag for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Directive::Prompt(_) => "prompt",
            Directive::PlayAudio(_) => "play_audio",
            Directive::Fallback(_) => "fallback",
            Directive::Terminate(_) => "terminate",
        }
    }
}

/// Record instruction parameters. Fixed for the whole call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSpec {
    pub max_length_secs: u32,
    pub transcribe: bool,
    pub play_beep: bool,
}

impl RecordSpec {
    pub const STANDARD: RecordSpec = RecordSpec {
        max_length_secs: 10,
        transcribe: false,
        play_beep: true,
    };
}

impl Default for RecordSpec {
    fn default() -> Self {
        Self::STANDARD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_terminate_stops_recording() {
        assert!(Directive::Prompt("hi".into()).records_next_utterance());
        assert!(Directive::PlayAudio(AudioHandle::new("a")).records_next_utterance());
        assert!(Directive::Fallback("x".into()).records_next_utterance());
        assert!(!Directive::Terminate("bye".into()).records_next_utterance());
    }

    #[test]
    fn standard_record_spec() {
        let spec = RecordSpec::default();
        assert_eq!(spec.max_length_secs, 10);
        assert!(!spec.transcribe);
        assert!(spec.play_beep);
    }
}
