//! Voice gateway server
//!
//! HTTP and WebSocket surface for the telephony carrier: the incoming-call
//! webhook that answers with stream instructions, the media stream socket,
//! and operational endpoints.

pub mod http;
pub mod state;
pub mod ws;

pub use http::create_router;
pub use state::AppState;

use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] voicegate_config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
