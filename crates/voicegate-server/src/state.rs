//! Application state
//!
//! Shared state across all handlers, including the production wiring of
//! the pipeline collaborators.

use std::sync::Arc;

use voicegate_agent::HttpVisaLookup;
use voicegate_config::Settings;
use voicegate_pipeline::synth::ElevenLabsSynthesizer;
use voicegate_pipeline::transcribe::DeepgramEngine;
use voicegate_pipeline::{generate::GeminiGenerator, CallOrchestrator};
use voicegate_session::SessionRegistry;
use voicegate_sms::TwilioSmsService;
use voicegate_transport::TwilioCallControl;

/// Application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration
    pub settings: Arc<Settings>,
    /// Active call sessions
    pub registry: Arc<SessionRegistry>,
    /// Per-call pipeline driver
    pub orchestrator: Arc<CallOrchestrator>,
}

impl AppState {
    /// Wire up the production collaborators
    pub fn new(settings: Settings) -> Self {
        let settings = Arc::new(settings);
        let registry = Arc::new(SessionRegistry::new());
        let http = reqwest::Client::new();

        let orchestrator = Arc::new(CallOrchestrator::new(
            settings.clone(),
            registry.clone(),
            Arc::new(DeepgramEngine::new(settings.transcription.clone())),
            Arc::new(ElevenLabsSynthesizer::new(
                http.clone(),
                settings.synthesis.clone(),
            )),
            Arc::new(GeminiGenerator::new(http.clone(), settings.llm.clone())),
            Arc::new(HttpVisaLookup::new(
                http.clone(),
                settings.visa_api.endpoint.clone(),
                settings.visa_api.api_key.clone(),
            )),
            Arc::new(TwilioSmsService::new(
                http,
                settings.telephony.api_base.clone(),
                settings.telephony.account_sid.clone(),
                settings.telephony.auth_token.clone(),
                (!settings.telephony.messaging_service_sid.is_empty())
                    .then(|| settings.telephony.messaging_service_sid.clone()),
                (!settings.telephony.phone_number.is_empty())
                    .then(|| settings.telephony.phone_number.clone()),
            )),
            Arc::new(TwilioCallControl::new(
                settings.telephony.api_base.clone(),
                settings.telephony.account_sid.clone(),
                settings.telephony.auth_token.clone(),
            )),
        ));

        Self {
            settings,
            registry,
            orchestrator,
        }
    }
}
