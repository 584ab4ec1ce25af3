//! Transcript events from streaming STT

use serde::{Deserialize, Serialize};

/// One transcript event emitted by the transcription collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEvent {
    /// Transcribed text
    pub text: String,

    /// Confidence score (0.0 - 1.0)
    pub confidence: f32,

    /// Settled result, no further revision expected
    pub is_final: bool,

    /// The speech segment is complete (end of utterance)
    pub speech_final: bool,
}

impl TranscriptEvent {
    /// Create an interim (provisional) event
    pub fn interim(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
            is_final: false,
            speech_final: false,
        }
    }

    /// Create a settled end-of-utterance event
    pub fn settled(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
            is_final: true,
            speech_final: true,
        }
    }

    /// Check if the transcript carries any text
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}
