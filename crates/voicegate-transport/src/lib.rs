//! Carrier transport layer
//!
//! Everything that touches the telephony media connection:
//! - mu-law codec and 16k->8k downsampling
//! - Media Streams wire protocol (serde types)
//! - Outbound audio flow control with mark sequencing
//! - Call-control REST client (terminate call by SID)

pub mod callcontrol;
pub mod codec;
pub mod flow;
pub mod protocol;

pub use callcontrol::{CallControl, TwilioCallControl};
pub use codec::{
    decode_mulaw, decode_mulaw_buf, downsample_16k_to_8k, encode_mulaw, encode_mulaw_buf,
    MulawFramer, FRAME_BYTES,
};
pub use flow::AudioFlowController;
pub use protocol::{CarrierMessage, MarkPayload, MediaPayload, OutboundMedia, OutboundMessage, StreamStart};

use thiserror::Error;

/// Transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Call control error: {0}")]
    CallControl(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
