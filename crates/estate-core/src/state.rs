//! Call session state machine.
//!
//! The machine is re-entered at `AwaitingFirstUtterance` after every completed
//! exchange; each recorded utterance is the trigger for the next cycle. Hang-up
//! is a telephony event and never reaches the engine, so `Terminated` is only
//! entered when an exchange limit is configured.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Where a caller's session is within one record/answer cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    #[default]
    AwaitingFirstUtterance,
    AwaitingTranscription,
    AwaitingReply,
    Terminated,
}

/// Inputs that drive the machine. Produced by the engine as a pipeline step advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallEvent {
    /// Webhook carried no recording reference (first contact or a bare re-prompt).
    NoRecording,
    /// Webhook carried a new recording reference.
    RecordingReceived,
    TranscriptionFailed,
    Transcribed,
    GenerationFailed,
    Generated,
    SynthesisSucceeded,
    SynthesisFailed,
    /// The configured exchange limit has been reached.
    ExchangeLimitReached,
}

impl CallState {
    /// Next state for `event`, or `InvalidTransition` when the pair is not in the table.
    pub fn next(self, event: CallEvent) -> Result<CallState, EngineError> {
        use CallEvent::*;
        use CallState::*;

        let next = match (self, event) {
            // A bare event always restarts the cycle, including after termination
            // (a new call from the same number).
            (_, NoRecording) => AwaitingFirstUtterance,

            (Terminated, RecordingReceived) => Terminated,
            (_, RecordingReceived) => AwaitingTranscription,

            (AwaitingFirstUtterance, ExchangeLimitReached) => Terminated,

            (AwaitingTranscription, TranscriptionFailed) => AwaitingFirstUtterance,
            (AwaitingTranscription, Transcribed) => AwaitingReply,

            (AwaitingReply, GenerationFailed) => AwaitingFirstUtterance,
            (AwaitingReply, Generated) => AwaitingReply,
            (AwaitingReply, SynthesisSucceeded) => AwaitingFirstUtterance,
            (AwaitingReply, SynthesisFailed) => AwaitingFirstUtterance,

            (from, event) => return Err(EngineError::InvalidTransition { from, event }),
        };
        Ok(next)
    }

    pub fn is_terminal(self) -> bool {
        self == CallState::Terminated
    }
}
