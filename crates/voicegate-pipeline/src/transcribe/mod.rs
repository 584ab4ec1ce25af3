//! Streaming transcription
//!
//! One transcription stream per call: raw mu-law audio in, transcript
//! events out. Opening the stream happens before any other call setup so
//! a transcriber outage fails the call instead of producing a one-way
//! conversation from the start.

mod deepgram;

pub use deepgram::DeepgramEngine;

use async_trait::async_trait;
use tokio::sync::mpsc;

use voicegate_core::TranscriptEvent;

use crate::PipelineError;

/// An open per-call transcription stream
///
/// Audio goes in through `audio`; dropping that sender ends the stream
/// cleanly (the engine flushes and closes upstream). Transcript events
/// arrive on `events`; the channel closing mid-call means transcription
/// was lost and will not come back.
pub struct TranscriptionStream {
    pub audio: mpsc::Sender<Vec<u8>>,
    pub events: mpsc::Receiver<TranscriptEvent>,
}

/// Factory for per-call transcription streams
#[async_trait]
pub trait TranscriptionEngine: Send + Sync {
    /// Open a stream for one call
    ///
    /// Errors here are setup-fatal: the caller must abort the call.
    async fn open(&self, stream_sid: &str) -> Result<TranscriptionStream, PipelineError>;
}
