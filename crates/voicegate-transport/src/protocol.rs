//! Media Streams wire protocol
//!
//! Serde types for the framed JSON events the carrier exchanges over the
//! media WebSocket. Inbound: connected/start/media/mark/stop. Outbound:
//! media/mark/clear.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Inbound event from the carrier
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum CarrierMessage {
    /// Socket-level handshake, precedes `start`
    Connected,
    /// Stream metadata; carries the stream/call identifiers
    Start { start: StreamStart },
    /// One chunk of inbound caller audio
    Media { media: MediaPayload },
    /// Playback-completion acknowledgment for a previously sent mark
    Mark { mark: MarkPayload },
    /// The carrier is tearing the stream down
    Stop,
}

/// `start` event payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStart {
    pub stream_sid: String,
    pub call_sid: String,
    /// Free-form parameters set by the TwiML webhook (callerPhone travels here)
    #[serde(default)]
    pub custom_parameters: HashMap<String, String>,
}

impl StreamStart {
    /// Caller phone number smuggled through the TwiML custom parameters
    pub fn caller_phone(&self) -> Option<&str> {
        self.custom_parameters
            .get("callerPhone")
            .map(String::as_str)
            .filter(|phone| !phone.is_empty())
    }
}

/// `media` event payload
#[derive(Debug, Clone, Deserialize)]
pub struct MediaPayload {
    /// Base64-encoded mu-law audio
    pub payload: String,
}

/// `mark` payload, both directions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkPayload {
    pub name: String,
}

/// Outbound event to the carrier
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum OutboundMessage {
    /// One chunk of synthesized audio
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        media: OutboundMedia,
    },
    /// Completion marker; the carrier echoes it back once playback finishes
    Mark {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        mark: MarkPayload,
    },
    /// Discard any delivered-but-unplayed audio (barge-in)
    Clear {
        #[serde(rename = "streamSid")]
        stream_sid: String,
    },
}

/// Outbound media body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMedia {
    /// Base64-encoded mu-law audio
    pub payload: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start_event() {
        let json = r#"{
            "event": "start",
            "sequenceNumber": "1",
            "streamSid": "MZxxxx",
            "start": {
                "streamSid": "MZxxxx",
                "accountSid": "ACxxxx",
                "callSid": "CAxxxx",
                "tracks": ["inbound"],
                "customParameters": {"callSid": "CAxxxx", "callerPhone": "+447700900123"},
                "mediaFormat": {"encoding": "audio/x-mulaw", "sampleRate": 8000, "channels": 1}
            }
        }"#;

        let message: CarrierMessage = serde_json::from_str(json).unwrap();
        match message {
            CarrierMessage::Start { start } => {
                assert_eq!(start.stream_sid, "MZxxxx");
                assert_eq!(start.call_sid, "CAxxxx");
                assert_eq!(start.caller_phone(), Some("+447700900123"));
            }
            other => panic!("expected start, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_media_event() {
        let json = r#"{
            "event": "media",
            "streamSid": "MZxxxx",
            "media": {"track": "inbound", "chunk": "2", "timestamp": "40", "payload": "f39/"}
        }"#;

        let message: CarrierMessage = serde_json::from_str(json).unwrap();
        match message {
            CarrierMessage::Media { media } => assert_eq!(media.payload, "f39/"),
            other => panic!("expected media, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_stop_and_connected() {
        let stop: CarrierMessage =
            serde_json::from_str(r#"{"event": "stop", "streamSid": "MZxxxx"}"#).unwrap();
        assert!(matches!(stop, CarrierMessage::Stop));

        let connected: CarrierMessage =
            serde_json::from_str(r#"{"event": "connected", "protocol": "Call"}"#).unwrap();
        assert!(matches!(connected, CarrierMessage::Connected));
    }

    #[test]
    fn test_missing_caller_phone() {
        let json = r#"{
            "event": "start",
            "start": {"streamSid": "MZ1", "callSid": "CA1"}
        }"#;

        let message: CarrierMessage = serde_json::from_str(json).unwrap();
        match message {
            CarrierMessage::Start { start } => assert_eq!(start.caller_phone(), None),
            other => panic!("expected start, got {other:?}"),
        }
    }

    #[test]
    fn test_serialize_outbound_media() {
        let message = OutboundMessage::Media {
            stream_sid: "MZ1".to_string(),
            media: OutboundMedia {
                payload: "AAAA".to_string(),
            },
        };

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["event"], "media");
        assert_eq!(json["streamSid"], "MZ1");
        assert_eq!(json["media"]["payload"], "AAAA");
    }

    #[test]
    fn test_serialize_outbound_clear() {
        let message = OutboundMessage::Clear {
            stream_sid: "MZ1".to_string(),
        };

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["event"], "clear");
        assert_eq!(json["streamSid"], "MZ1");
    }
}
