//! Configuration for the voicegate server
//!
//! Layered loading: serde defaults, then an optional TOML file, then
//! `VOICEGATE_*` environment variables.

pub mod settings;

pub use settings::{
    LlmConfig, ObservabilityConfig, PipelineConfig, ServerConfig, Settings, SynthesisConfig,
    TelephonyConfig, TranscriptionConfig, VisaApiConfig,
};

use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}
