//! Outbound SMS delivery
//!
//! Follow-up texts after a call: a service trait the orchestrator depends
//! on, the Twilio-backed implementation, and the message templates.

pub mod service;
pub mod templates;

pub use service::{SmsDelivery, SmsService, TwilioSmsService};

use thiserror::Error;

/// SMS errors
#[derive(Error, Debug)]
pub enum SmsError {
    #[error("No sender configured: set a messaging service SID or a from number")]
    NoSender,

    #[error("Invalid recipient number: {0}")]
    InvalidRecipient(String),

    #[error("Carrier rejected the message: {0}")]
    Rejected(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
