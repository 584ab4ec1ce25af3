//! Streaming speech synthesis

mod elevenlabs;

pub use elevenlabs::ElevenLabsSynthesizer;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::PipelineError;

/// Audio encoding a synthesizer produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisEncoding {
    /// Carrier-native mu-law at 8kHz, passthrough framing
    Mulaw8k,
    /// Signed 16-bit little-endian PCM at 16kHz, needs transcoding
    Linear16k,
}

/// Text to speech, streamed
///
/// `synthesize` pushes raw audio chunks onto the channel as they arrive
/// from the provider; chunk boundaries are arbitrary and carry no frame
/// alignment. A send error means the consumer hung up and is not a
/// synthesis failure.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn encoding(&self) -> SynthesisEncoding;

    async fn synthesize(
        &self,
        text: &str,
        audio: mpsc::Sender<Vec<u8>>,
    ) -> Result<(), PipelineError>;
}
