//! Error types for the call session engine and its collaborators.
//!
//! Service failures are values, not panics: the engine turns each one into a
//! spoken fallback. Only dataset and config errors are fatal, and only at startup.

use thiserror::Error;

use crate::state::{CallEvent, CallState};

/// Recording fetch or speech-to-text failed. Covers the empty-transcript case.
#[derive(Error, Debug)]
pub enum TranscriptionError {
    #[error("recording fetch failed: {0}")]
    Fetch(String),

    #[error("transcription request failed: {0}")]
    Request(String),

    #[error("transcription API error {0}: {1}")]
    Status(u16, String),

    #[error("transcription was empty")]
    Empty,

    #[error("transcription timed out after {0}s")]
    Timeout(u64),
}

/// Text generation service unreachable, errored, or returned nothing usable.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Request(String),

    #[error("generation API error {0}: {1}")]
    Status(u16, String),

    #[error("generation response malformed: {0}")]
    Malformed(String),

    #[error("generation returned an empty reply")]
    Empty,

    #[error("generation timed out after {0}s")]
    Timeout(u64),
}

/// Speech synthesis failed, or the clip could not be stored for playback.
#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("synthesis request failed: {0}")]
    Request(String),

    #[error("synthesis API error {0}: {1}")]
    Status(u16, String),

    #[error("audio storage failed: {0}")]
    Storage(#[from] std::io::Error),

    #[error("synthesis timed out after {0}s")]
    Timeout(u64),
}

/// Property dataset could not be loaded.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("dataset IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("dataset CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("dataset is missing required column '{0}'")]
    MissingColumn(&'static str),
}

/// Configuration could not be built or failed validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Internal engine failures. Never reaches the webhook boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("no transition from {from:?} on {event:?}")]
    InvalidTransition { from: CallState, event: CallEvent },
}
