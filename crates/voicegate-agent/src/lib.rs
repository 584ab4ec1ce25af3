//! Dialogue intelligence for the voice assistant
//!
//! The pieces that understand and produce language but do no audio work:
//! - Utterance classifier (slot extraction, consent, goodbye, filler)
//! - Country dictionary tolerant of nationalities and mishearings
//! - Prompt building, greeting and apology copy
//! - Visa requirements lookup client

pub mod countries;
pub mod intent;
pub mod knowledge;
pub mod prompt;

pub use intent::{ExtractedFacts, UtteranceClassifier};
pub use knowledge::{format_visa_response, HttpVisaLookup, VisaLookup, VisaRequirement};
pub use prompt::{build_system_prompt, APOLOGY_SMS_FAILED, APOLOGY_TURN_FAILED, GREETING};

use thiserror::Error;

/// Agent errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Visa lookup failed: {0}")]
    Lookup(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
