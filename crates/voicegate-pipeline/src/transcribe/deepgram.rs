//! Deepgram streaming transcription

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use voicegate_config::TranscriptionConfig;
use voicegate_core::TranscriptEvent;

use crate::transcribe::{TranscriptionEngine, TranscriptionStream};
use crate::PipelineError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CLOSE_STREAM: &str = r#"{"type":"CloseStream"}"#;
const FINAL_DRAIN: Duration = Duration::from_secs(2);

/// Deepgram live-transcription engine
pub struct DeepgramEngine {
    config: TranscriptionConfig,
}

impl DeepgramEngine {
    pub fn new(config: TranscriptionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TranscriptionEngine for DeepgramEngine {
    async fn open(&self, stream_sid: &str) -> Result<TranscriptionStream, PipelineError> {
        let ws = connect(&self.config).await?;
        tracing::info!(stream_sid, "Transcription stream opened");

        let (audio_tx, audio_rx) = mpsc::channel(256);
        let (event_tx, event_rx) = mpsc::channel(64);
        tokio::spawn(run_stream(
            self.config.clone(),
            ws,
            audio_rx,
            event_tx,
            stream_sid.to_string(),
        ));

        Ok(TranscriptionStream {
            audio: audio_tx,
            events: event_rx,
        })
    }
}

/// Listen URL with the carrier audio format and endpointing behavior pinned
/// in the query string
fn request_url(config: &TranscriptionConfig) -> String {
    format!(
        "{}?encoding=mulaw&sample_rate=8000&channels=1&model={}&language={}\
&punctuate=true&smart_format=true&interim_results=true&vad_events=true\
&endpointing={}&utterance_end_ms={}",
        config.endpoint, config.model, config.language, config.endpointing_ms, config.utterance_end_ms
    )
}

async fn connect(config: &TranscriptionConfig) -> Result<WsStream, PipelineError> {
    let mut request = request_url(config)
        .into_client_request()
        .map_err(|e| PipelineError::Transcription(format!("bad endpoint: {e}")))?;
    let auth = HeaderValue::from_str(&format!("Token {}", config.api_key))
        .map_err(|e| PipelineError::Transcription(format!("bad api key: {e}")))?;
    request.headers_mut().insert(AUTHORIZATION, auth);

    let handshake = connect_async(request);
    let (ws, _response) = tokio::time::timeout(
        Duration::from_secs(config.connect_timeout_secs),
        handshake,
    )
    .await
    .map_err(|_| PipelineError::Transcription("connect timed out".to_string()))??;
    Ok(ws)
}

/// Drive one call's transcription for its whole lifetime
///
/// Audio channel closing means the call ended: flush upstream, drain any
/// trailing finals, done. A dropped upstream socket mid-call is retried a
/// fixed number of times; past that the event channel closes and the call
/// continues without transcription.
async fn run_stream(
    config: TranscriptionConfig,
    mut ws: WsStream,
    mut audio_rx: mpsc::Receiver<Vec<u8>>,
    event_tx: mpsc::Sender<TranscriptEvent>,
    stream_sid: String,
) {
    let mut attempts_left = config.reconnect_attempts;
    let mut assembler = TranscriptAssembler::default();

    'conn: loop {
        let (mut sink, mut source) = ws.split();
        loop {
            tokio::select! {
                chunk = audio_rx.recv() => match chunk {
                    Some(bytes) => {
                        if sink.send(Message::Binary(bytes.into())).await.is_err() {
                            break;
                        }
                    }
                    None => {
                        let _ = sink.send(Message::Text(CLOSE_STREAM.into())).await;
                        drain_finals(&mut source, &event_tx, &mut assembler).await;
                        let _ = sink.close().await;
                        return;
                    }
                },
                message = source.next() => match message {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(event) = assembler.on_message(&text) {
                            if event_tx.send(event).await.is_err() {
                                return;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(stream_sid, error = %e, "Transcription socket error");
                        break;
                    }
                },
            }
        }

        while attempts_left > 0 {
            attempts_left -= 1;
            tokio::time::sleep(Duration::from_secs(config.reconnect_delay_secs)).await;
            match connect(&config).await {
                Ok(reconnected) => {
                    tracing::info!(stream_sid, "Transcription stream reconnected");
                    ws = reconnected;
                    continue 'conn;
                }
                Err(e) => {
                    tracing::warn!(stream_sid, attempts_left, error = %e, "Transcription reconnect failed");
                }
            }
        }

        tracing::error!(stream_sid, "Transcription lost for the rest of the call");
        return;
    }
}

/// Forward whatever finals arrive within the drain window after CloseStream
async fn drain_finals(
    source: &mut futures::stream::SplitStream<WsStream>,
    event_tx: &mpsc::Sender<TranscriptEvent>,
    assembler: &mut TranscriptAssembler,
) {
    let drain = async {
        while let Some(Ok(message)) = source.next().await {
            match message {
                Message::Text(text) => {
                    if let Some(event) = assembler.on_message(&text) {
                        if event_tx.send(event).await.is_err() {
                            return;
                        }
                    }
                }
                Message::Close(_) => return,
                _ => {}
            }
        }
    };
    let _ = tokio::time::timeout(FINAL_DRAIN, drain).await;
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum UpstreamMessage {
    Results {
        channel: ResultsChannel,
        #[serde(default)]
        is_final: bool,
        #[serde(default)]
        speech_final: bool,
    },
    UtteranceEnd {},
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct ResultsChannel {
    alternatives: Vec<Alternative>,
}

#[derive(Deserialize)]
struct Alternative {
    transcript: String,
    #[serde(default)]
    confidence: f32,
}

/// Reassembles upstream result messages into interim/settled events
///
/// Finalized segments accumulate until the provider marks the speech
/// segment complete; an utterance-end notification settles whatever text
/// is pending, covering the case where the caller trails off and no
/// speech-final result ever arrives.
#[derive(Default)]
struct TranscriptAssembler {
    settled_parts: Vec<String>,
    last_interim: String,
    confidence: f32,
}

impl TranscriptAssembler {
    fn on_message(&mut self, raw: &str) -> Option<TranscriptEvent> {
        match serde_json::from_str(raw) {
            Ok(UpstreamMessage::Results {
                channel,
                is_final,
                speech_final,
            }) => {
                let alternative = channel.alternatives.first()?;
                self.on_results(&alternative.transcript, alternative.confidence, is_final, speech_final)
            }
            Ok(UpstreamMessage::UtteranceEnd {}) => self.on_utterance_end(),
            Ok(UpstreamMessage::Other) => None,
            Err(e) => {
                tracing::debug!(error = %e, "Unrecognized transcription message");
                None
            }
        }
    }

    fn on_results(
        &mut self,
        text: &str,
        confidence: f32,
        is_final: bool,
        speech_final: bool,
    ) -> Option<TranscriptEvent> {
        if !is_final {
            if text.trim().is_empty() {
                return None;
            }
            self.last_interim = text.to_string();
            return Some(TranscriptEvent::interim(text, confidence));
        }

        if !text.trim().is_empty() {
            self.settled_parts.push(text.to_string());
            self.confidence = confidence;
        }
        if speech_final {
            return self.settle();
        }
        None
    }

    fn on_utterance_end(&mut self) -> Option<TranscriptEvent> {
        if self.settled_parts.is_empty() && !self.last_interim.trim().is_empty() {
            let text = std::mem::take(&mut self.last_interim);
            return Some(TranscriptEvent::settled(text, self.confidence));
        }
        self.settle()
    }

    fn settle(&mut self) -> Option<TranscriptEvent> {
        if self.settled_parts.is_empty() {
            return None;
        }
        let text = self.settled_parts.join(" ");
        self.settled_parts.clear();
        self.last_interim.clear();
        Some(TranscriptEvent::settled(text, self.confidence))
    }
}
