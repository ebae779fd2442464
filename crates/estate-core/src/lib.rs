//! estate-core: call session engine for the telephone real-estate assistant.
//!
//! A caller's webhook event is turned into the next telephony [`Directive`]:
//! the per-caller session is locked, advanced through the record -> transcribe
//! -> answer -> speak cycle, and its conversation memory updated. Speech and
//! generation services are injected through the traits in [`services`].

pub mod audio_store;
pub mod config;
pub mod dataset;
pub mod directive;
pub mod engine;
pub mod error;
pub mod prompt;
pub mod retrieval;
pub mod services;
pub mod session;
pub mod state;
pub mod store;

pub use audio_store::AudioStore;
pub use config::EstateConfig;
pub use dataset::{PropertyRecord, PropertyTable};
pub use directive::{AudioHandle, Directive, RecordSpec};
pub use engine::{CallEngine, EngineConfig, WebhookEvent};
pub use error::{
    ConfigError, DatasetError, EngineError, GenerationError, SynthesisError, TranscriptionError,
};
pub use services::{Generator, RecordingSource, Services, Synthesizer, Transcriber};
pub use session::{Session, Speaker, Turn};
pub use state::{CallEvent, CallState};
pub use store::{SessionHandle, SessionStore};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
