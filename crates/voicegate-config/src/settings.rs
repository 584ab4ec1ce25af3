//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::ConfigError;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Telephony carrier credentials (Twilio-compatible)
    #[serde(default)]
    pub telephony: TelephonyConfig,

    /// Streaming speech-to-text configuration
    #[serde(default)]
    pub transcription: TranscriptionConfig,

    /// Streaming text-to-speech configuration
    #[serde(default)]
    pub synthesis: SynthesisConfig,

    /// Response generation (LLM) configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Visa knowledge lookup configuration
    #[serde(default)]
    pub visa_api: VisaApiConfig,

    /// Call pipeline tuning
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    /// Create default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from an optional TOML file plus `VOICEGATE_*` env vars
    ///
    /// Env vars use `__` as the section separator, e.g.
    /// `VOICEGATE_TELEPHONY__ACCOUNT_SID`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }

        let config = builder
            .add_source(Environment::with_prefix("VOICEGATE").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Validate settings
    ///
    /// Missing vendor credentials only warn: the pipeline degrades per
    /// collaborator instead of refusing to start.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let credential_checks = [
            ("telephony.account_sid", &self.telephony.account_sid),
            ("telephony.auth_token", &self.telephony.auth_token),
            ("transcription.api_key", &self.transcription.api_key),
            ("synthesis.api_key", &self.synthesis.api_key),
            ("llm.api_key", &self.llm.api_key),
        ];

        for (field, value) in credential_checks {
            if value.is_empty() {
                tracing::warn!("Missing credential: {} (related features disabled)", field);
            }
        }

        if self.pipeline.frame_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.frame_bytes".to_string(),
                message: "outbound frame size must be non-zero".to_string(),
            });
        }

        if self.transcription.reconnect_attempts > 10 {
            return Err(ConfigError::InvalidValue {
                field: "transcription.reconnect_attempts".to_string(),
                message: "reconnect attempts capped at 10".to_string(),
            });
        }

        Ok(())
    }
}

/// HTTP/WebSocket server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 3001 }
    }
}

/// Telephony carrier credentials
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TelephonyConfig {
    /// Account SID
    pub account_sid: String,
    /// Auth token
    pub auth_token: String,
    /// Outbound phone number (SMS sender fallback)
    pub phone_number: String,
    /// Messaging service SID (preferred SMS sender)
    #[serde(default)]
    pub messaging_service_sid: String,
    /// REST API base URL
    #[serde(default = "default_telephony_api_base")]
    pub api_base: String,
}

fn default_telephony_api_base() -> String {
    "https://api.twilio.com".to_string()
}

/// Streaming STT configuration (Deepgram-compatible)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// API key
    pub api_key: String,
    /// WebSocket endpoint
    pub endpoint: String,
    /// Model name
    pub model: String,
    /// Language code
    pub language: String,
    /// Silence that ends a speech segment (ms)
    pub endpointing_ms: u32,
    /// Silence that finalizes an utterance (ms)
    pub utterance_end_ms: u32,
    /// Connection handshake timeout (seconds)
    pub connect_timeout_secs: u64,
    /// Mid-call reconnection attempts before giving up
    pub reconnect_attempts: u32,
    /// Delay between reconnection attempts (seconds)
    pub reconnect_delay_secs: u64,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: "wss://api.deepgram.com/v1/listen".to_string(),
            model: "nova-2".to_string(),
            language: "en-GB".to_string(),
            endpointing_ms: 300,
            utterance_end_ms: 1000,
            connect_timeout_secs: 10,
            reconnect_attempts: 3,
            reconnect_delay_secs: 1,
        }
    }
}

/// Streaming TTS configuration (ElevenLabs-compatible)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// API key
    pub api_key: String,
    /// HTTP endpoint base
    pub endpoint: String,
    /// Voice ID
    pub voice_id: String,
    /// Model ID
    pub model_id: String,
    /// Output encoding: "ulaw_8000" (carrier-native) or "pcm_16000"
    pub output_format: String,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: "https://api.elevenlabs.io".to_string(),
            voice_id: "EXAVITQu4vr4xnSDxMaL".to_string(),
            model_id: "eleven_turbo_v2_5".to_string(),
            output_format: "ulaw_8000".to_string(),
        }
    }
}

/// Response generation configuration (Gemini-compatible)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API key
    pub api_key: String,
    /// HTTP endpoint base
    pub endpoint: String,
    /// Model name
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Output cap, kept short for voice
    pub max_output_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.0-flash".to_string(),
            temperature: 0.7,
            max_output_tokens: 150,
        }
    }
}

/// Visa requirements lookup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisaApiConfig {
    /// Bearer token
    pub api_key: String,
    /// HTTP endpoint
    pub endpoint: String,
}

impl Default for VisaApiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: "https://app.diasporaai.dev/api/v1/visa".to_string(),
        }
    }
}

/// Call pipeline tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Outbound mu-law frame size in bytes (160 = 20ms at 8kHz)
    pub frame_bytes: usize,
    /// Delay before tearing down a call after a goodbye (seconds)
    pub hangup_delay_secs: u64,
    /// Minimum interim transcript length that counts as barge-in
    pub barge_in_min_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame_bytes: 160,
            hangup_delay_secs: 4,
            barge_in_min_chars: 4,
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level filter
    pub log_level: String,
    /// Emit JSON-formatted logs
    pub log_json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}
