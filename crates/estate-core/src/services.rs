//! Collaborator contracts consumed by the engine.
//!
//! Each call is a single attempt. Implementations live in `estate-voice`;
//! tests use scripted fakes.

use async_trait::async_trait;

use crate::error::{GenerationError, SynthesisError, TranscriptionError};

/// Fetches the caller's recorded audio for a recording reference.
#[async_trait]
pub trait RecordingSource: Send + Sync {
    async fn fetch(&self, recording_url: &str) -> Result<Vec<u8>, TranscriptionError>;
}

/// Speech-to-text. An empty transcript is reported as `TranscriptionError::Empty`.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: Vec<u8>) -> Result<String, TranscriptionError>;
}

/// Prompt in, reply text out.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Text in, encoded audio (MP3) out.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SynthesisError>;
}

/// The four collaborators the engine drives, bundled for injection.
pub struct Services {
    pub recordings: Box<dyn RecordingSource>,
    pub transcriber: Box<dyn Transcriber>,
    pub generator: Box<dyn Generator>,
    pub synthesizer: Box<dyn Synthesizer>,
}
