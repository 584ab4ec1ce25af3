//! Real-time voice pipeline
//!
//! Everything between the carrier media stream and the caller hearing an
//! answer: streaming transcription, response generation, speech synthesis,
//! and the per-call orchestrator that wires them together.

pub mod generate;
pub mod orchestrator;
pub mod synth;
pub mod transcribe;

pub use generate::{ResponseGenerator, SentenceChunker};
pub use orchestrator::CallOrchestrator;
pub use synth::{SpeechSynthesizer, SynthesisEncoding};
pub use transcribe::{TranscriptionEngine, TranscriptionStream};

use thiserror::Error;

/// Pipeline errors
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
