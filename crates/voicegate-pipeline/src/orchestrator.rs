//! Per-call orchestration
//!
//! Drives one media stream from `start` to teardown: inbound audio is fed
//! to the transcriber, settled transcripts trigger a respond cycle
//! (classify, generate, synthesize, deliver), and interim transcripts can
//! barge in on playback. The call moves through AwaitingStart ->
//! Streaming <-> Responding -> Ending, with Responding overlapping
//! Streaming because the respond cycle runs as its own task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use voicegate_agent::{
    build_system_prompt, format_visa_response, ExtractedFacts, UtteranceClassifier, VisaLookup,
    APOLOGY_SMS_FAILED, APOLOGY_TURN_FAILED, GREETING,
};
use voicegate_config::Settings;
use voicegate_core::{TranscriptEvent, TurnRole};
use voicegate_session::{CallSession, ContextUpdate, SessionRegistry};
use voicegate_sms::{templates, SmsService};
use voicegate_transport::{
    downsample_16k_to_8k, encode_mulaw, AudioFlowController, CallControl, CarrierMessage,
    MulawFramer, OutboundMessage,
};

use crate::generate::ResponseGenerator;
use crate::synth::{SpeechSynthesizer, SynthesisEncoding};
use crate::transcribe::TranscriptionEngine;
use crate::PipelineError;

/// Wires a media stream connection to the pipeline collaborators
///
/// One orchestrator serves the whole process; each connection gets its own
/// `run_call` invocation and per-call state.
pub struct CallOrchestrator {
    settings: Arc<Settings>,
    registry: Arc<SessionRegistry>,
    transcription: Arc<dyn TranscriptionEngine>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    generator: Arc<dyn ResponseGenerator>,
    visa: Arc<dyn VisaLookup>,
    sms: Arc<dyn SmsService>,
    call_control: Arc<dyn CallControl>,
    classifier: UtteranceClassifier,
}

/// Per-call state shared between the event loop and spawned cycles
struct CallRuntime {
    settings: Arc<Settings>,
    session: Arc<CallSession>,
    flow: Mutex<AudioFlowController>,
    /// Playback was barged in on; suppresses delivery from the running cycle
    interrupted: AtomicBool,
    /// Spoken summary of the last successful visa lookup, reused for SMS
    visa_summary: Mutex<Option<String>>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    generator: Arc<dyn ResponseGenerator>,
    visa: Arc<dyn VisaLookup>,
    sms: Arc<dyn SmsService>,
    call_control: Arc<dyn CallControl>,
}

impl CallOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        settings: Arc<Settings>,
        registry: Arc<SessionRegistry>,
        transcription: Arc<dyn TranscriptionEngine>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        generator: Arc<dyn ResponseGenerator>,
        visa: Arc<dyn VisaLookup>,
        sms: Arc<dyn SmsService>,
        call_control: Arc<dyn CallControl>,
    ) -> Self {
        Self {
            settings,
            registry,
            transcription,
            synthesizer,
            generator,
            visa,
            sms,
            call_control,
            classifier: UtteranceClassifier::new(),
        }
    }

    /// Drive one call from its carrier message stream
    ///
    /// Returns once the stream stops or the socket closes. An error before
    /// the session exists is setup-fatal; the server closes the socket and
    /// no greeting is played.
    pub async fn run_call(
        &self,
        mut inbound: mpsc::Receiver<CarrierMessage>,
        sink: mpsc::UnboundedSender<OutboundMessage>,
    ) -> Result<(), PipelineError> {
        // AwaitingStart: nothing is real until the start event arrives.
        let start = loop {
            match inbound.recv().await {
                Some(CarrierMessage::Start { start }) => break start,
                Some(CarrierMessage::Stop) | None => return Ok(()),
                Some(_) => {}
            }
        };

        // The transcriber connects before the session exists: a call we
        // cannot hear is not answered.
        let mut stt = self.transcription.open(&start.stream_sid).await?;

        let session = self.registry.create(
            start.call_sid.clone(),
            start.stream_sid.clone(),
            start.caller_phone().map(String::from),
        );
        let runtime = Arc::new(CallRuntime {
            settings: self.settings.clone(),
            session: session.clone(),
            flow: Mutex::new(AudioFlowController::new(start.stream_sid.clone(), sink)),
            interrupted: AtomicBool::new(false),
            visa_summary: Mutex::new(None),
            synthesizer: self.synthesizer.clone(),
            generator: self.generator.clone(),
            visa: self.visa.clone(),
            sms: self.sms.clone(),
            call_control: self.call_control.clone(),
        });

        // The greeting is a respond cycle like any other so barge-in and
        // the busy guard apply from the first word.
        if runtime.session.try_begin_response() {
            let greeting_runtime = runtime.clone();
            tokio::spawn(async move {
                greeting_runtime.speak(GREETING).await;
                greeting_runtime
                    .session
                    .push_turn(TurnRole::Assistant, GREETING);
                greeting_runtime.session.end_response();
            });
        }

        let mut transcription_alive = true;
        loop {
            tokio::select! {
                message = inbound.recv() => match message {
                    Some(CarrierMessage::Media { media }) => {
                        match BASE64.decode(media.payload.as_bytes()) {
                            // A full audio channel drops the frame rather
                            // than stalling the carrier socket.
                            Ok(audio) => { let _ = stt.audio.try_send(audio); }
                            Err(e) => {
                                tracing::debug!(stream_sid = %session.stream_sid, error = %e, "Undecodable media payload");
                            }
                        }
                    }
                    Some(CarrierMessage::Mark { mark }) => {
                        runtime.flow.lock().acknowledge_mark(&mark.name);
                    }
                    Some(CarrierMessage::Stop) | None => break,
                    Some(CarrierMessage::Start { .. }) | Some(CarrierMessage::Connected) => {}
                },
                event = stt.events.recv(), if transcription_alive => match event {
                    Some(event) => self.on_transcript(&runtime, event),
                    None => {
                        tracing::warn!(
                            stream_sid = %session.stream_sid,
                            "Transcription gone, continuing one-way"
                        );
                        transcription_alive = false;
                    }
                },
            }
        }

        drop(stt);
        self.registry.remove(&session.stream_sid);
        Ok(())
    }

    fn on_transcript(&self, runtime: &Arc<CallRuntime>, event: TranscriptEvent) {
        let min_chars = self.settings.pipeline.barge_in_min_chars;

        if !event.speech_final {
            // Interim: only interesting as a barge-in signal.
            if self.classifier.is_substantive(&event.text, min_chars) {
                let mut flow = runtime.flow.lock();
                if flow.is_speaking() {
                    tracing::info!(
                        stream_sid = %runtime.session.stream_sid,
                        text = %event.text,
                        "Barge-in, clearing playback"
                    );
                    flow.clear();
                    runtime.interrupted.store(true, Ordering::Release);
                }
            }
            return;
        }

        if !self.classifier.is_substantive(&event.text, min_chars) {
            tracing::debug!(
                stream_sid = %runtime.session.stream_sid,
                text = %event.text,
                "Ignoring non-substantive utterance"
            );
            return;
        }
        if runtime.session.end_requested() {
            return;
        }

        if !runtime.session.try_begin_response() {
            tracing::info!(
                stream_sid = %runtime.session.stream_sid,
                text = %event.text,
                "Respond cycle busy, dropping settled transcript"
            );
            return;
        }
        runtime.interrupted.store(false, Ordering::Release);

        let facts = self.classifier.classify(&event.text);
        let cycle = runtime.clone();
        tokio::spawn(async move {
            cycle.respond(event.text, facts).await;
        });
    }
}

impl CallRuntime {
    /// One full respond cycle for a settled caller utterance
    ///
    /// The busy claim is held on entry and released at the end, whatever
    /// happens in between. Generation or synthesis failure degrades to a
    /// fixed apology; the call keeps going.
    async fn respond(self: Arc<Self>, utterance: String, facts: ExtractedFacts) {
        // Whatever the assistant was still saying belongs to the previous
        // turn; the caller has moved on.
        self.flow.lock().clear();

        self.session.push_turn(TurnRole::Caller, &utterance);
        self.session.merge_context(&ContextUpdate {
            passport: facts.passport.clone(),
            destination: facts.destination.clone(),
            residence: facts.residence.clone(),
        });
        if facts.wants_sms {
            self.session.record_sms_consent();
        }
        if facts.goodbye {
            self.session.request_end();
        }

        let mut notes: Vec<String> = Vec::new();

        if let Some((from, to)) = self.session.try_claim_lookup() {
            match self.visa.check(&from, &to).await {
                Ok(requirement) => {
                    let summary = format_visa_response(&requirement);
                    notes.push(summary.clone());
                    *self.visa_summary.lock() = Some(summary);
                }
                Err(e) => {
                    tracing::warn!(
                        stream_sid = %self.session.stream_sid,
                        from, to, error = %e,
                        "Visa lookup failed"
                    );
                    notes.push(
                        "The visa requirements service is unavailable right now; \
say so and offer to check again in a moment."
                            .to_string(),
                    );
                }
            }
        }

        let follow_up = self.maybe_send_follow_up(&mut notes);

        if facts.goodbye {
            notes.push("The caller is saying goodbye; give a short warm sign-off.".to_string());
        }

        let note = (!notes.is_empty()).then(|| notes.join("\n"));
        let prompt = build_system_prompt(
            &self.session.history(),
            &self.session.trip_context(),
            note.as_deref(),
        );

        let (chunk_tx, mut chunk_rx) = mpsc::channel(8);
        let generator = self.generator.clone();
        let generation =
            tokio::spawn(async move { generator.generate(&prompt, chunk_tx).await });

        let mut spoke = false;
        let mut synthesis_failed = false;
        while let Some(sentence) = chunk_rx.recv().await {
            match synthesize_frames(self.synthesizer.clone(), sentence, self.frame_bytes()).await {
                Ok(frames) => {
                    if self.deliver(frames) {
                        spoke = true;
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        stream_sid = %self.session.stream_sid,
                        error = %e,
                        "Synthesis failed mid-reply"
                    );
                    synthesis_failed = true;
                    break;
                }
            }
        }
        // Unblocks the generator if we bailed out early.
        drop(chunk_rx);

        let reply = match generation.await {
            Ok(Ok(reply)) => Some(reply),
            Ok(Err(e)) => {
                tracing::warn!(
                    stream_sid = %self.session.stream_sid,
                    error = %e,
                    "Generation failed"
                );
                None
            }
            Err(e) => {
                tracing::error!(
                    stream_sid = %self.session.stream_sid,
                    error = %e,
                    "Generation task aborted"
                );
                None
            }
        };

        match reply {
            Some(reply) => {
                self.session.push_turn(TurnRole::Assistant, &reply.text);
                if synthesis_failed && !spoke {
                    self.speak(APOLOGY_TURN_FAILED).await;
                }
            }
            None => {
                self.speak(APOLOGY_TURN_FAILED).await;
                self.session
                    .push_turn(TurnRole::Assistant, APOLOGY_TURN_FAILED);
            }
        }

        // The send ran alongside generation; a failure apology waits until
        // the reply has finished playing so it never splices into it.
        if let Some(delivery) = follow_up {
            if delivery.await.ok() == Some(false) {
                self.speak(APOLOGY_SMS_FAILED).await;
                self.session
                    .push_turn(TurnRole::Assistant, APOLOGY_SMS_FAILED);
            }
        }

        if self.session.end_requested() {
            self.hangup_later();
        }
        self.session.end_response();
    }

    /// Fire the one allowed follow-up text when consent and a number exist
    ///
    /// The send claim happens before anything is awaited, so re-detected
    /// consent on later turns can never produce a second message. Returns
    /// the delivery handle (true = sent) for the cycle to check after the
    /// reply goes out.
    fn maybe_send_follow_up(
        self: &Arc<Self>,
        notes: &mut Vec<String>,
    ) -> Option<tokio::task::JoinHandle<bool>> {
        if !self.session.sms_consented() {
            return None;
        }
        let Some(phone) = self.session.caller_phone.clone() else {
            if self.session.try_claim_sms_send() {
                notes.push(
                    "The caller asked for a text but no number is on file; \
point them to the website instead."
                        .to_string(),
                );
            }
            return None;
        };
        if !self.session.try_claim_sms_send() {
            return None;
        }

        notes.push("A follow-up text is on its way to the caller; let them know.".to_string());

        let runtime = self.clone();
        Some(tokio::spawn(async move {
            let body = templates::follow_up(runtime.visa_summary.lock().as_deref());
            match runtime.sms.send(&phone, &body).await {
                Ok(delivery) => {
                    tracing::info!(
                        stream_sid = %runtime.session.stream_sid,
                        message_sid = %delivery.message_sid,
                        "Follow-up SMS sent"
                    );
                    true
                }
                Err(e) => {
                    tracing::warn!(
                        stream_sid = %runtime.session.stream_sid,
                        error = %e,
                        "Follow-up SMS failed"
                    );
                    false
                }
            }
        }))
    }

    fn frame_bytes(&self) -> usize {
        self.settings.pipeline.frame_bytes
    }

    /// Synthesize and deliver one utterance
    async fn speak(&self, text: &str) {
        match synthesize_frames(self.synthesizer.clone(), text.to_string(), self.frame_bytes()).await
        {
            Ok(frames) => {
                self.deliver(frames);
            }
            Err(e) => {
                tracing::warn!(
                    stream_sid = %self.session.stream_sid,
                    error = %e,
                    "Synthesis failed"
                );
            }
        }
    }

    /// Push frames to the carrier unless playback was barged in on
    fn deliver(&self, frames: Vec<Vec<u8>>) -> bool {
        if frames.is_empty() || self.interrupted.load(Ordering::Acquire) {
            return false;
        }
        let mut flow = self.flow.lock();
        for frame in frames {
            flow.enqueue(frame);
        }
        flow.flush().is_some()
    }

    /// Hang the call up after the goodbye has had time to play out
    fn hangup_later(self: &Arc<Self>) {
        let runtime = self.clone();
        let delay = Duration::from_secs(runtime.settings.pipeline.hangup_delay_secs);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = runtime.call_control.complete(&runtime.session.call_sid).await {
                tracing::warn!(
                    call_sid = %runtime.session.call_sid,
                    error = %e,
                    "Hangup request failed"
                );
            }
        });
    }
}

/// Run one synthesis request to completion, returning carrier-ready frames
async fn synthesize_frames(
    synthesizer: Arc<dyn SpeechSynthesizer>,
    text: String,
    frame_bytes: usize,
) -> Result<Vec<Vec<u8>>, PipelineError> {
    let encoding = synthesizer.encoding();
    let (audio_tx, mut audio_rx) = mpsc::channel(64);
    let producer = tokio::spawn(async move { synthesizer.synthesize(&text, audio_tx).await });

    let mut encoder = FrameEncoder::new(encoding, frame_bytes);
    let mut frames = Vec::new();
    while let Some(chunk) = audio_rx.recv().await {
        frames.append(&mut encoder.push(&chunk));
    }
    producer
        .await
        .map_err(|e| PipelineError::Synthesis(format!("synthesis task aborted: {e}")))??;
    frames.extend(encoder.finish());
    Ok(frames)
}

/// Turns provider audio chunks into carrier-native mu-law frames
///
/// Chunk boundaries are arbitrary: a 16-bit sample or a 16kHz sample pair
/// can straddle two chunks, so one byte and one sample of carry state
/// persist between pushes.
struct FrameEncoder {
    encoding: SynthesisEncoding,
    framer: MulawFramer,
    carry_byte: Option<u8>,
    carry_sample: Option<i16>,
}

impl FrameEncoder {
    fn new(encoding: SynthesisEncoding, frame_bytes: usize) -> Self {
        Self {
            encoding,
            framer: MulawFramer::with_frame_size(frame_bytes),
            carry_byte: None,
            carry_sample: None,
        }
    }

    fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        match self.encoding {
            SynthesisEncoding::Mulaw8k => self.framer.push(chunk),
            SynthesisEncoding::Linear16k => {
                let mut data = Vec::with_capacity(chunk.len() + 1);
                if let Some(byte) = self.carry_byte.take() {
                    data.push(byte);
                }
                data.extend_from_slice(chunk);
                if data.len() % 2 == 1 {
                    self.carry_byte = data.pop();
                }

                let mut samples: Vec<i16> = data
                    .chunks_exact(2)
                    .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                if let Some(sample) = self.carry_sample.take() {
                    samples.insert(0, sample);
                }
                if samples.len() % 2 == 1 {
                    self.carry_sample = samples.pop();
                }

                let mulaw: Vec<u8> = downsample_16k_to_8k(&samples)
                    .into_iter()
                    .map(encode_mulaw)
                    .collect();
                self.framer.push(&mulaw)
            }
        }
    }

    fn finish(&mut self) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        if let Some(sample) = self.carry_sample.take() {
            frames.append(&mut self.framer.push(&[encode_mulaw(sample)]));
        }
        if let Some(rest) = self.framer.finish() {
            frames.push(rest);
        }
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    use voicegate_agent::{AgentError, VisaRequirement};
    use voicegate_sms::{SmsDelivery, SmsError};
    use voicegate_transport::{StreamStart, TransportError, FRAME_BYTES};

    use crate::generate::GeneratedReply;
    use crate::transcribe::TranscriptionStream;

    struct MockTranscription {
        stream: Mutex<Option<TranscriptionStream>>,
        fail_open: bool,
    }

    impl MockTranscription {
        /// Returns the engine plus the test-side handles: feed transcript
        /// events in, observe forwarded audio out.
        fn new() -> (Arc<Self>, mpsc::Sender<TranscriptEvent>, mpsc::Receiver<Vec<u8>>) {
            let (audio_tx, audio_rx) = mpsc::channel(256);
            let (event_tx, event_rx) = mpsc::channel(64);
            let engine = Arc::new(Self {
                stream: Mutex::new(Some(TranscriptionStream {
                    audio: audio_tx,
                    events: event_rx,
                })),
                fail_open: false,
            });
            (engine, event_tx, audio_rx)
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                stream: Mutex::new(None),
                fail_open: true,
            })
        }
    }

    #[async_trait]
    impl TranscriptionEngine for MockTranscription {
        async fn open(&self, _stream_sid: &str) -> Result<TranscriptionStream, PipelineError> {
            if self.fail_open {
                return Err(PipelineError::Transcription("connect refused".to_string()));
            }
            self.stream
                .lock()
                .take()
                .ok_or_else(|| PipelineError::Transcription("already opened".to_string()))
        }
    }

    struct MockSynthesizer;

    #[async_trait]
    impl SpeechSynthesizer for MockSynthesizer {
        fn encoding(&self) -> SynthesisEncoding {
            SynthesisEncoding::Mulaw8k
        }

        async fn synthesize(
            &self,
            _text: &str,
            audio: mpsc::Sender<Vec<u8>>,
        ) -> Result<(), PipelineError> {
            let _ = audio.send(vec![0xFF; FRAME_BYTES * 2]).await;
            Ok(())
        }
    }

    struct MockGenerator {
        calls: AtomicUsize,
        gate: Option<Arc<Notify>>,
        fail: bool,
    }

    impl MockGenerator {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                gate: None,
                fail: false,
            })
        }

        fn gated(gate: Arc<Notify>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                gate: Some(gate),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                gate: None,
                fail: true,
            })
        }
    }

    #[async_trait]
    impl ResponseGenerator for MockGenerator {
        async fn generate(
            &self,
            _prompt: &str,
            chunks: mpsc::Sender<String>,
        ) -> Result<GeneratedReply, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail {
                return Err(PipelineError::Generation("model unavailable".to_string()));
            }
            let _ = chunks.send("Happy to help.".to_string()).await;
            Ok(GeneratedReply {
                text: "Happy to help.".to_string(),
            })
        }
    }

    #[derive(Default)]
    struct MockVisa {
        lookups: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl VisaLookup for MockVisa {
        async fn check(&self, from: &str, to: &str) -> Result<VisaRequirement, AgentError> {
            self.lookups.lock().push((from.to_string(), to.to_string()));
            Ok(VisaRequirement {
                from: from.to_string(),
                to: to.to_string(),
                visa_required: false,
                visa_type: None,
                evisa_available: false,
                visa_on_arrival: false,
                visa_free_days: Some(90),
                passport_validity_months: None,
                yellow_fever_certificate: false,
            })
        }
    }

    #[derive(Default)]
    struct MockSms {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    impl MockSms {
        fn failing() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                fail: true,
            })
        }
    }

    #[async_trait]
    impl SmsService for MockSms {
        async fn send(&self, to: &str, body: &str) -> Result<SmsDelivery, SmsError> {
            if self.fail {
                return Err(SmsError::Rejected("undeliverable".to_string()));
            }
            self.sent.lock().push((to.to_string(), body.to_string()));
            Ok(SmsDelivery {
                message_sid: "SM1".to_string(),
            })
        }
    }

    #[derive(Default)]
    struct MockCallControl {
        completed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CallControl for MockCallControl {
        async fn complete(&self, call_sid: &str) -> Result<(), TransportError> {
            self.completed.lock().push(call_sid.to_string());
            Ok(())
        }
    }

    struct Harness {
        registry: Arc<SessionRegistry>,
        visa: Arc<MockVisa>,
        sms: Arc<MockSms>,
        call_control: Arc<MockCallControl>,
        generator: Arc<MockGenerator>,
        events: mpsc::Sender<TranscriptEvent>,
        inbound: mpsc::Sender<CarrierMessage>,
        outbound: mpsc::UnboundedReceiver<OutboundMessage>,
        call: tokio::task::JoinHandle<Result<(), PipelineError>>,
    }

    fn start_message(caller_phone: Option<&str>) -> CarrierMessage {
        let mut custom_parameters = HashMap::new();
        if let Some(phone) = caller_phone {
            custom_parameters.insert("callerPhone".to_string(), phone.to_string());
        }
        CarrierMessage::Start {
            start: StreamStart {
                stream_sid: "MZ1".to_string(),
                call_sid: "CA1".to_string(),
                custom_parameters,
            },
        }
    }

    async fn harness_with(generator: Arc<MockGenerator>, caller_phone: Option<&str>) -> Harness {
        harness_with_sms(generator, caller_phone, Arc::new(MockSms::default())).await
    }

    async fn harness_with_sms(
        generator: Arc<MockGenerator>,
        caller_phone: Option<&str>,
        sms: Arc<MockSms>,
    ) -> Harness {
        let registry = Arc::new(SessionRegistry::new());
        let (transcription, events, _audio) = MockTranscription::new();
        let visa = Arc::new(MockVisa::default());
        let call_control = Arc::new(MockCallControl::default());

        let orchestrator = Arc::new(CallOrchestrator::new(
            Arc::new(Settings::default()),
            registry.clone(),
            transcription,
            Arc::new(MockSynthesizer),
            generator.clone(),
            visa.clone(),
            sms.clone(),
            call_control.clone(),
        ));

        let (inbound_tx, inbound_rx) = mpsc::channel(64);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let call = tokio::spawn({
            let orchestrator = orchestrator.clone();
            async move { orchestrator.run_call(inbound_rx, outbound_tx).await }
        });

        inbound_tx.send(CarrierMessage::Connected).await.unwrap();
        inbound_tx.send(start_message(caller_phone)).await.unwrap();

        Harness {
            registry,
            visa,
            sms,
            call_control,
            generator,
            events,
            inbound: inbound_tx,
            outbound: outbound_rx,
            call,
        }
    }

    /// Poll until the session exists and is idle (no respond cycle running)
    async fn settle(harness: &Harness) {
        loop {
            tokio::time::sleep(Duration::from_millis(10)).await;
            match harness.registry.get("MZ1") {
                Some(session) if !session.is_busy() => return,
                _ => {}
            }
        }
    }

    fn drain(outbound: &mut mpsc::UnboundedReceiver<OutboundMessage>) -> Vec<OutboundMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = outbound.try_recv() {
            messages.push(message);
        }
        messages
    }

    #[tokio::test(start_paused = true)]
    async fn test_greeting_plays_on_start() {
        let mut harness = harness_with(MockGenerator::new(), None).await;
        settle(&harness).await;

        let messages = drain(&mut harness.outbound);
        assert!(messages
            .iter()
            .any(|m| matches!(m, OutboundMessage::Media { .. })));
        assert!(messages
            .iter()
            .any(|m| matches!(m, OutboundMessage::Mark { .. })));

        let session = harness.registry.get("MZ1").unwrap();
        assert_eq!(session.turn_count(), 1);

        harness.inbound.send(CarrierMessage::Stop).await.unwrap();
        harness.call.await.unwrap().unwrap();
        assert_eq!(harness.registry.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_setup_fails_without_transcription() {
        let registry = Arc::new(SessionRegistry::new());
        let orchestrator = CallOrchestrator::new(
            Arc::new(Settings::default()),
            registry.clone(),
            MockTranscription::failing(),
            Arc::new(MockSynthesizer),
            MockGenerator::new(),
            Arc::new(MockVisa::default()),
            Arc::new(MockSms::default()),
            Arc::new(MockCallControl::default()),
        );

        let (inbound_tx, inbound_rx) = mpsc::channel(8);
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
        inbound_tx.send(start_message(None)).await.unwrap();

        let result = orchestrator.run_call(inbound_rx, outbound_tx).await;
        assert!(result.is_err());
        // No session, no greeting.
        assert_eq!(registry.count(), 0);
        assert!(outbound_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_settled_transcript_drives_full_turn() {
        let mut harness = harness_with(MockGenerator::new(), Some("+447700900123")).await;
        settle(&harness).await;
        drain(&mut harness.outbound);

        harness
            .events
            .send(TranscriptEvent::settled(
                "I'm Ghanaian travelling to Zanzibar, please text me the details",
                0.95,
            ))
            .await
            .unwrap();
        settle(&harness).await;

        // Visa lookup fired once with both extracted codes.
        assert_eq!(
            harness.visa.lookups.lock().clone(),
            vec![("GH".to_string(), "TZ".to_string())]
        );

        // Reply audio went out.
        let messages = drain(&mut harness.outbound);
        assert!(messages
            .iter()
            .any(|m| matches!(m, OutboundMessage::Media { .. })));

        // Caller turn and assistant turn joined the greeting in history.
        let session = harness.registry.get("MZ1").unwrap();
        let history = session.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[1].role, TurnRole::Caller);
        assert_eq!(history[2].text, "Happy to help.");

        // Consent plus caller number produced exactly one text.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let sent = harness.sms.sent.lock().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "+447700900123");

        // Re-stated consent on a later turn does not send again.
        harness
            .events
            .send(TranscriptEvent::settled("yes please send me the text", 0.9))
            .await
            .unwrap();
        settle(&harness).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(harness.sms.sent.lock().len(), 1);

        harness.inbound.send(CarrierMessage::Stop).await.unwrap();
        harness.call.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sms_failure_apology_plays_after_reply() {
        let mut harness =
            harness_with_sms(MockGenerator::new(), Some("+447700900123"), MockSms::failing())
                .await;
        settle(&harness).await;
        drain(&mut harness.outbound);

        harness
            .events
            .send(TranscriptEvent::settled("yes please text me the details", 0.9))
            .await
            .unwrap();
        settle(&harness).await;

        // The apology is its own utterance after the reply: two marks, in
        // order, with the reply's first.
        let marks: Vec<String> = drain(&mut harness.outbound)
            .into_iter()
            .filter_map(|m| match m {
                OutboundMessage::Mark { mark, .. } => Some(mark.name),
                _ => None,
            })
            .collect();
        assert_eq!(marks, vec!["response-end-2", "response-end-3"]);

        // Both the reply and the apology made it into history, reply first.
        let session = harness.registry.get("MZ1").unwrap();
        let history = session.history();
        assert_eq!(history[2].text, "Happy to help.");
        assert_eq!(history[3].text, APOLOGY_SMS_FAILED);
        assert!(harness.sms.sent.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_settled_while_busy_is_dropped() {
        let gate = Arc::new(Notify::new());
        let harness = harness_with(MockGenerator::gated(gate.clone()), None).await;
        settle(&harness).await;

        harness
            .events
            .send(TranscriptEvent::settled("first question here", 0.9))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Second settled transcript while the first cycle is generating.
        harness
            .events
            .send(TranscriptEvent::settled("second question here", 0.9))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        gate.notify_waiters();
        settle(&harness).await;

        assert_eq!(harness.generator.calls.load(Ordering::SeqCst), 1);
        let session = harness.registry.get("MZ1").unwrap();
        let caller_turns: Vec<_> = session
            .history()
            .into_iter()
            .filter(|t| t.role == TurnRole::Caller)
            .collect();
        assert_eq!(caller_turns.len(), 1);
        assert_eq!(caller_turns[0].text, "first question here");
    }

    #[tokio::test(start_paused = true)]
    async fn test_interim_barges_in_on_playback() {
        let mut harness = harness_with(MockGenerator::new(), None).await;
        settle(&harness).await;
        drain(&mut harness.outbound);

        // Greeting mark is unacknowledged, so the assistant counts as
        // speaking and a substantive interim clears playback.
        harness
            .events
            .send(TranscriptEvent::interim("wait, hold on a moment", 0.5))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let messages = drain(&mut harness.outbound);
        assert!(messages
            .iter()
            .any(|m| matches!(m, OutboundMessage::Clear { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_filler_interim_does_not_barge_in() {
        let mut harness = harness_with(MockGenerator::new(), None).await;
        settle(&harness).await;
        drain(&mut harness.outbound);

        harness
            .events
            .send(TranscriptEvent::interim("ummm", 0.3))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(drain(&mut harness.outbound).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_goodbye_hangs_up_after_delay() {
        let harness = harness_with(MockGenerator::new(), None).await;
        settle(&harness).await;

        harness
            .events
            .send(TranscriptEvent::settled("that's all, goodbye", 0.9))
            .await
            .unwrap();
        settle(&harness).await;
        assert!(harness.call_control.completed.lock().is_empty());

        // Teardown is delayed so the goodbye can play out.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(harness.call_control.completed.lock().clone(), vec!["CA1"]);

        // Settled transcripts after the goodbye are ignored.
        harness
            .events
            .send(TranscriptEvent::settled("one more thing", 0.9))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(harness.generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_generation_failure_speaks_apology() {
        let harness = harness_with(MockGenerator::failing(), None).await;
        settle(&harness).await;

        harness
            .events
            .send(TranscriptEvent::settled("tell me about visas", 0.9))
            .await
            .unwrap();
        settle(&harness).await;

        let session = harness.registry.get("MZ1").unwrap();
        let history = session.history();
        assert_eq!(history.last().unwrap().text, APOLOGY_TURN_FAILED);
    }

    #[test]
    fn test_frame_encoder_mulaw_passthrough() {
        let mut encoder = FrameEncoder::new(SynthesisEncoding::Mulaw8k, FRAME_BYTES);
        let frames = encoder.push(&vec![0xFF; FRAME_BYTES + 10]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), FRAME_BYTES);

        let rest = encoder.finish();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].len(), 10);
    }

    #[test]
    fn test_frame_encoder_pcm_transcodes_and_carries() {
        let mut encoder = FrameEncoder::new(SynthesisEncoding::Linear16k, FRAME_BYTES);

        // 4 bytes = two 16k samples = one 8k sample.
        let pcm: Vec<u8> = [0i16, 0, 1000, 1000]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();

        // Split at an odd byte offset so both carries are exercised.
        let mut frames = encoder.push(&pcm[..3]);
        frames.extend(encoder.push(&pcm[3..]));
        assert!(frames.is_empty());

        let rest = encoder.finish();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].len(), 2);
        // Silence encodes to the mu-law zero byte.
        assert_eq!(rest[0][0], encode_mulaw(0));
        assert_eq!(rest[0][1], encode_mulaw(1000));
    }
}
