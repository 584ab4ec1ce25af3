//! ElevenLabs streaming synthesis

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::json;
use tokio::sync::mpsc;

use voicegate_config::SynthesisConfig;

use crate::synth::{SpeechSynthesizer, SynthesisEncoding};
use crate::PipelineError;

/// ElevenLabs HTTP streaming synthesizer
pub struct ElevenLabsSynthesizer {
    http: reqwest::Client,
    config: SynthesisConfig,
    encoding: SynthesisEncoding,
}

impl ElevenLabsSynthesizer {
    pub fn new(http: reqwest::Client, config: SynthesisConfig) -> Self {
        let encoding = match config.output_format.as_str() {
            "pcm_16000" => SynthesisEncoding::Linear16k,
            _ => SynthesisEncoding::Mulaw8k,
        };
        Self {
            http,
            config,
            encoding,
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    fn encoding(&self) -> SynthesisEncoding {
        self.encoding
    }

    async fn synthesize(
        &self,
        text: &str,
        audio: mpsc::Sender<Vec<u8>>,
    ) -> Result<(), PipelineError> {
        let url = format!(
            "{}/v1/text-to-speech/{}/stream?output_format={}",
            self.config.endpoint, self.config.voice_id, self.config.output_format
        );
        let body = json!({
            "text": text,
            "model_id": self.config.model_id,
            "voice_settings": {
                "stability": 0.5,
                "similarity_boost": 0.75
            }
        });

        let response = self
            .http
            .post(&url)
            .header("xi-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(PipelineError::Synthesis(format!(
                "provider returned {status}: {detail}"
            )));
        }

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if chunk.is_empty() {
                continue;
            }
            if audio.send(chunk.to_vec()).await.is_err() {
                // Consumer gone, the call ended or was interrupted.
                return Ok(());
            }
        }
        Ok(())
    }
}
