//! Streaming response generation

mod gemini;

pub use gemini::GeminiGenerator;

use async_trait::async_trait;
use regex::Regex;
use tokio::sync::mpsc;

use crate::PipelineError;

/// A completed generated reply
#[derive(Debug, Clone)]
pub struct GeneratedReply {
    /// Full reply text, also streamed out in sentence chunks
    pub text: String,
}

/// Streaming text generator
///
/// Sentence-sized chunks are pushed onto the channel as they complete so
/// synthesis can start before the full reply exists. The returned reply
/// carries the complete text for the conversation history.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        chunks: mpsc::Sender<String>,
    ) -> Result<GeneratedReply, PipelineError>;
}

/// Splits a token stream into sentences for incremental synthesis
///
/// A sentence ends at `.`, `!` or `?` followed by whitespace. Whatever is
/// left when the stream ends comes out of `finish`.
pub struct SentenceChunker {
    boundary: Regex,
    buffer: String,
}

impl SentenceChunker {
    pub fn new() -> Self {
        Self {
            boundary: Regex::new(r"[.!?]\s").unwrap(),
            buffer: String::new(),
        }
    }

    /// Feed a token, returning any sentences it completed
    pub fn push(&mut self, token: &str) -> Vec<String> {
        self.buffer.push_str(token);
        let mut sentences = Vec::new();
        while let Some(found) = self.boundary.find(&self.buffer) {
            let rest = self.buffer.split_off(found.end());
            let sentence = std::mem::replace(&mut self.buffer, rest);
            let sentence = sentence.trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
        }
        sentences
    }

    /// Flush the trailing partial sentence, if any
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        let rest = rest.trim();
        (!rest.is_empty()).then(|| rest.to_string())
    }
}

impl Default for SentenceChunker {
    fn default() -> Self {
        Self::new()
    }
}
