//! Outbound audio flow control
//!
//! Decouples "audio produced by synthesis" from "audio delivered to the
//! carrier": synthesis yields irregular chunks, the carrier wants a batch of
//! framed media messages followed by one completion mark per utterance. The
//! mark name carries a monotonically increasing sequence number so playback
//! completion can be correlated with the carrier's echo.

use std::collections::VecDeque;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tokio::sync::mpsc;

use crate::protocol::{MarkPayload, OutboundMedia, OutboundMessage};

/// Per-connection outbound audio queue with clear-on-interrupt semantics
pub struct AudioFlowController {
    stream_sid: String,
    pending: VecDeque<Vec<u8>>,
    sink: mpsc::UnboundedSender<OutboundMessage>,
    mark_seq: u64,
    /// Name of the last emitted mark, cleared when the carrier echoes it
    outstanding_mark: Option<String>,
}

impl AudioFlowController {
    pub fn new(stream_sid: impl Into<String>, sink: mpsc::UnboundedSender<OutboundMessage>) -> Self {
        Self {
            stream_sid: stream_sid.into(),
            pending: VecDeque::new(),
            sink,
            mark_seq: 0,
            outstanding_mark: None,
        }
    }

    /// Append one carrier-native frame to the pending queue
    pub fn enqueue(&mut self, frame: Vec<u8>) {
        self.pending.push_back(frame);
    }

    /// Drain the pending queue to the carrier in FIFO order
    ///
    /// Emits exactly one completion mark iff at least one frame was sent.
    /// Returns the mark name when one was emitted.
    pub fn flush(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }

        let mut frames_sent = 0usize;
        while let Some(frame) = self.pending.pop_front() {
            let message = OutboundMessage::Media {
                stream_sid: self.stream_sid.clone(),
                media: OutboundMedia {
                    payload: BASE64.encode(&frame),
                },
            };
            if self.sink.send(message).is_err() {
                // Connection is gone; the rest of the batch has nowhere to go.
                self.pending.clear();
                return None;
            }
            frames_sent += 1;
        }

        self.mark_seq += 1;
        let name = format!("response-end-{}", self.mark_seq);
        let _ = self.sink.send(OutboundMessage::Mark {
            stream_sid: self.stream_sid.clone(),
            mark: MarkPayload { name: name.clone() },
        });
        self.outstanding_mark = Some(name.clone());

        tracing::debug!(
            stream_sid = %self.stream_sid,
            frames = frames_sent,
            mark = %name,
            "Flushed outbound audio"
        );

        Some(name)
    }

    /// Empty the pending queue and stop client-side playback
    ///
    /// Sends the carrier `clear` signal when audio was queued or is still
    /// playing (mark not yet acknowledged); a truly idle clear is a no-op.
    /// Idempotent either way.
    pub fn clear(&mut self) {
        let mid_utterance = !self.pending.is_empty() || self.outstanding_mark.is_some();
        self.pending.clear();

        if mid_utterance {
            let _ = self.sink.send(OutboundMessage::Clear {
                stream_sid: self.stream_sid.clone(),
            });
            self.outstanding_mark = None;
            tracing::debug!(stream_sid = %self.stream_sid, "Cleared outbound audio");
        }
    }

    /// Record a playback-completion echo from the carrier
    pub fn acknowledge_mark(&mut self, name: &str) {
        if self.outstanding_mark.as_deref() == Some(name) {
            self.outstanding_mark = None;
        }
    }

    /// Audio is queued or delivered but not yet confirmed played
    pub fn is_speaking(&self) -> bool {
        !self.pending.is_empty() || self.outstanding_mark.is_some()
    }
}
