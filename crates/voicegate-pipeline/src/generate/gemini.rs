//! Gemini streaming generation over SSE

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;

use voicegate_config::LlmConfig;

use crate::generate::{GeneratedReply, ResponseGenerator, SentenceChunker};
use crate::PipelineError;

/// Gemini generateContent client, streaming via server-sent events
pub struct GeminiGenerator {
    http: reqwest::Client,
    config: LlmConfig,
}

impl GeminiGenerator {
    pub fn new(http: reqwest::Client, config: LlmConfig) -> Self {
        Self { http, config }
    }
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl ResponseGenerator for GeminiGenerator {
    async fn generate(
        &self,
        prompt: &str,
        chunks: mpsc::Sender<String>,
    ) -> Result<GeneratedReply, PipelineError> {
        let url = format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.config.endpoint, self.config.model
        );
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": self.config.temperature,
                "maxOutputTokens": self.config.max_output_tokens
            }
        });

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(PipelineError::Generation(format!(
                "provider returned {status}: {detail}"
            )));
        }

        let mut stream = response.bytes_stream();
        let mut chunker = SentenceChunker::new();
        let mut lines = SseLineBuffer::default();
        let mut full_text = String::new();

        while let Some(bytes) = stream.next().await {
            let bytes = bytes?;

            for line in lines.push(&bytes) {
                let Some(data) = line.trim().strip_prefix("data: ") else {
                    continue;
                };
                if data == "[DONE]" {
                    continue;
                }
                let Ok(chunk) = serde_json::from_str::<StreamChunk>(data) else {
                    tracing::debug!("Skipping malformed stream chunk");
                    continue;
                };
                for token in chunk
                    .candidates
                    .iter()
                    .filter_map(|c| c.content.as_ref())
                    .flat_map(|c| c.parts.iter())
                    .map(|p| p.text.as_str())
                {
                    full_text.push_str(token);
                    for sentence in chunker.push(token) {
                        if chunks.send(sentence).await.is_err() {
                            // Consumer stopped listening; finish the
                            // request so history still gets full text.
                            break;
                        }
                    }
                }
            }
        }

        if let Some(rest) = chunker.finish() {
            let _ = chunks.send(rest).await;
        }

        if full_text.trim().is_empty() {
            return Err(PipelineError::Generation("empty reply".to_string()));
        }
        Ok(GeneratedReply {
            text: full_text.trim().to_string(),
        })
    }
}

/// Newline-delimited line assembly over the raw SSE body
///
/// Network chunk boundaries can land inside a multi-byte character, so
/// splitting happens at the byte level and text is decoded only once a
/// full line is in hand. A trailing partial line stays buffered.
#[derive(Default)]
struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(newline) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_buffer_holds_partial_line() {
        let mut buffer = SseLineBuffer::default();

        assert!(buffer.push(b"data: {\"a\":").is_empty());
        let lines = buffer.push(b"1}\ndata: ");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].trim(), "data: {\"a\":1}");

        let lines = buffer.push(b"[DONE]\n");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].trim(), "data: [DONE]");
    }

    #[test]
    fn test_line_buffer_keeps_split_multibyte_char_intact() {
        let line = "data: caf\u{e9} ferm\u{e9}\n".as_bytes();
        // Split inside the two-byte sequence for the first 'é'.
        let (head, tail) = line.split_at(10);

        let mut buffer = SseLineBuffer::default();
        assert!(buffer.push(head).is_empty());
        let lines = buffer.push(tail);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].trim(), "data: caf\u{e9} ferm\u{e9}");
        assert!(!lines[0].contains('\u{fffd}'));
    }
}
