//! Call session engine: one webhook event in, one [`Directive`] out.
//!
//! The caller's session lock is held for the whole step (lookup, transcription,
//! generation, synthesis, bookkeeping), so concurrent deliveries for one caller
//! are applied one after the other and never interleave turn appends.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::audio_store::AudioStore;
use crate::config::EstateConfig;
use crate::dataset::PropertyTable;
use crate::directive::{AudioHandle, Directive};
use crate::error::{EngineError, GenerationError, SynthesisError, TranscriptionError};
use crate::prompt::assemble_prompt;
use crate::retrieval;
use crate::services::Services;
use crate::session::{Session, Turn};
use crate::state::{CallEvent, CallState};
use crate::store::SessionStore;

/// Parsed webhook: who is calling and, from the second event on, what they just said.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    pub caller_id: String,
    pub recording_url: Option<String>,
}

impl WebhookEvent {
    pub fn new(caller_id: impl Into<String>, recording_url: Option<String>) -> Self {
        Self {
            caller_id: caller_id.into(),
            recording_url,
        }
    }

    /// Recording reference, ignoring blank values.
    fn recording(&self) -> Option<&str> {
        self.recording_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Spoken texts, persona, limits and per-call timeouts.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub persona: String,
    pub welcome_text: String,
    pub retry_text: String,
    pub generation_apology_text: String,
    pub synthesis_apology_text: String,
    pub goodbye_text: String,
    pub max_exchanges: Option<usize>,
    /// Covers recording fetch and speech-to-text together: the download and
    /// transcription budgets added up.
    pub transcription_timeout: Duration,
    pub generation_timeout: Duration,
    pub synthesis_timeout: Duration,
}

impl EngineConfig {
    pub fn from_config(cfg: &EstateConfig) -> Self {
        let a = &cfg.assistant;
        Self {
            persona: a.persona.clone(),
            welcome_text: a.welcome_text.clone(),
            retry_text: a.retry_text.clone(),
            generation_apology_text: a.generation_apology_text.clone(),
            synthesis_apology_text: a.synthesis_apology_text.clone(),
            goodbye_text: a.goodbye_text.clone(),
            max_exchanges: a.max_exchanges,
            transcription_timeout: Duration::from_secs(
                cfg.twilio.timeout_secs + cfg.openai.timeout_secs,
            ),
            generation_timeout: Duration::from_secs(cfg.openai.timeout_secs),
            synthesis_timeout: Duration::from_secs(cfg.elevenlabs.timeout_secs),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_config(&EstateConfig::default())
    }
}

/// Process-owned context for the pipeline: sessions, dataset, clip store, collaborators.
pub struct CallEngine {
    config: EngineConfig,
    sessions: SessionStore,
    properties: Arc<PropertyTable>,
    audio: AudioStore,
    services: Services,
}

impl CallEngine {
    pub fn new(
        config: EngineConfig,
        properties: Arc<PropertyTable>,
        audio: AudioStore,
        services: Services,
    ) -> Self {
        Self {
            config,
            sessions: SessionStore::new(),
            properties,
            audio,
            services,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn audio(&self) -> &AudioStore {
        &self.audio
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Advance the caller's session by one webhook event. Never fails: every
    /// collaborator failure becomes a spoken fallback.
    pub async fn handle(&self, event: WebhookEvent) -> Directive {
        let handle = self.sessions.get_or_create(&event.caller_id);
        let mut session = handle.lock().await;
        session.touch();

        let directive = match event.recording() {
            None => {
                // A bare event starts a call, from any state.
                session.state = CallState::AwaitingFirstUtterance;
                session.begin_call();
                Directive::Prompt(self.config.welcome_text.clone())
            }
            Some(url) => match session.reply_for(url).cloned() {
                Some(d) => {
                    info!(caller = %event.caller_id, "duplicate recording delivery, replaying directive");
                    d
                }
                None => {
                    let d = match self.exchange(&mut session, url).await {
                        Ok(d) => d,
                        Err(e) => {
                            warn!(caller = %event.caller_id, error = %e, "state machine rejected step");
                            session.state = CallState::AwaitingFirstUtterance;
                            Directive::Fallback(self.config.retry_text.clone())
                        }
                    };
                    session.remember_reply(url, d.clone());
                    d
                }
            },
        };

        info!(
            caller = %event.caller_id,
            directive = directive.kind(),
            state = ?session.state,
            turns = session.turns().len(),
            "step complete"
        );
        directive
    }

    /// One record -> transcribe -> answer -> speak cycle.
    async fn exchange(&self, session: &mut Session, url: &str) -> Result<Directive, EngineError> {
        if matches!(
            session.state,
            CallState::AwaitingTranscription | CallState::AwaitingReply
        ) {
            warn!(caller = %session.caller_id(), state = ?session.state, "stale step state, resetting");
            session.state = CallState::AwaitingFirstUtterance;
        }

        if session.state.is_terminal() {
            advance(session, CallEvent::RecordingReceived)?;
            return Ok(Directive::Terminate(self.config.goodbye_text.clone()));
        }
        if let Some(max) = self.config.max_exchanges {
            if session.exchanges() >= max {
                advance(session, CallEvent::ExchangeLimitReached)?;
                info!(caller = %session.caller_id(), max, "exchange limit reached, ending call");
                return Ok(Directive::Terminate(self.config.goodbye_text.clone()));
            }
        }

        advance(session, CallEvent::RecordingReceived)?;
        let transcript = match self.transcribe(url).await {
            Ok(t) => t,
            Err(e) => {
                warn!(caller = %session.caller_id(), error = %e, "transcription failed");
                advance(session, CallEvent::TranscriptionFailed)?;
                return Ok(Directive::Fallback(self.config.retry_text.clone()));
            }
        };
        session.push_turn(Turn::user(transcript.as_str()));
        advance(session, CallEvent::Transcribed)?;

        let property_info = retrieval::lookup(&transcript, &self.properties);
        let prompt = assemble_prompt(
            &self.config.persona,
            session.turns(),
            &transcript,
            &property_info,
        );
        debug!(caller = %session.caller_id(), prompt_chars = prompt.len(), "prompt assembled");

        let answer = match self.generate(&prompt).await {
            Ok(a) => a,
            Err(e) => {
                warn!(caller = %session.caller_id(), error = %e, "generation failed");
                advance(session, CallEvent::GenerationFailed)?;
                return Ok(Directive::Fallback(self.config.generation_apology_text.clone()));
            }
        };
        session.push_turn(Turn::assistant(answer.as_str()));
        advance(session, CallEvent::Generated)?;

        match self.speak(&answer).await {
            Ok(handle) => {
                advance(session, CallEvent::SynthesisSucceeded)?;
                Ok(Directive::PlayAudio(handle))
            }
            Err(e) => {
                warn!(caller = %session.caller_id(), error = %e, "speech synthesis failed");
                advance(session, CallEvent::SynthesisFailed)?;
                Ok(Directive::Fallback(self.config.synthesis_apology_text.clone()))
            }
        }
    }

    async fn transcribe(&self, url: &str) -> Result<String, TranscriptionError> {
        let limit = self.config.transcription_timeout;
        let work = async {
            let audio = self.services.recordings.fetch(url).await?;
            let text = self.services.transcriber.transcribe(audio).await?;
            let text = text.trim();
            if text.is_empty() {
                return Err(TranscriptionError::Empty);
            }
            Ok(text.to_string())
        };
        bounded(limit, work)
            .await
            .unwrap_or(Err(TranscriptionError::Timeout(limit.as_secs())))
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let limit = self.config.generation_timeout;
        let reply = bounded(limit, self.services.generator.generate(prompt))
            .await
            .unwrap_or(Err(GenerationError::Timeout(limit.as_secs())))?;
        let reply = reply.trim();
        if reply.is_empty() {
            return Err(GenerationError::Empty);
        }
        Ok(reply.to_string())
    }

    async fn speak(&self, text: &str) -> Result<AudioHandle, SynthesisError> {
        let limit = self.config.synthesis_timeout;
        let audio = bounded(limit, self.services.synthesizer.synthesize(text))
            .await
            .unwrap_or(Err(SynthesisError::Timeout(limit.as_secs())))?;
        if audio.is_empty() {
            return Err(SynthesisError::Request("empty audio body".to_string()));
        }
        Ok(self.audio.save(&audio).await?)
    }
}

fn advance(session: &mut Session, event: CallEvent) -> Result<(), EngineError> {
    session.state = session.state.next(event)?;
    Ok(())
}

/// `None` when `limit` elapses first.
async fn bounded<F: Future>(limit: Duration, fut: F) -> Option<F::Output> {
    tokio::time::timeout(limit, fut).await.ok()
}
