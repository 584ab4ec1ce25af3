//! Call session state

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use voicegate_core::{Turn, TurnRole};

use crate::context::{ContextUpdate, TripContext};

/// Mutable state for one active call
///
/// Owned by the orchestrator task driving the call's connection. Interior
/// mutability lets the respond cycle and the event loop share the session
/// without handing out `&mut`.
pub struct CallSession {
    /// Carrier call identifier
    pub call_sid: String,
    /// Media stream identifier (registry key)
    pub stream_sid: String,
    /// Caller phone from TwiML custom parameters, enables SMS
    pub caller_phone: Option<String>,
    /// Session creation time
    pub started_at: DateTime<Utc>,

    history: RwLock<Vec<Turn>>,
    trip: RwLock<TripContext>,
    busy: AtomicBool,
    sms_consented: AtomicBool,
    sms_sent: AtomicBool,
    end_requested: AtomicBool,
}

impl CallSession {
    pub fn new(
        call_sid: impl Into<String>,
        stream_sid: impl Into<String>,
        caller_phone: Option<String>,
    ) -> Self {
        Self {
            call_sid: call_sid.into(),
            stream_sid: stream_sid.into(),
            caller_phone,
            started_at: Utc::now(),
            history: RwLock::new(Vec::new()),
            trip: RwLock::new(TripContext::default()),
            busy: AtomicBool::new(false),
            sms_consented: AtomicBool::new(false),
            sms_sent: AtomicBool::new(false),
            end_requested: AtomicBool::new(false),
        }
    }

    /// Append a turn to the conversation history
    pub fn push_turn(&self, role: TurnRole, text: impl Into<String>) {
        let turn = Turn::new(role, text);
        tracing::info!(
            stream_sid = %self.stream_sid,
            role = ?turn.role,
            text = %truncate(&turn.text, 100),
            "Turn recorded"
        );
        self.history.write().push(turn);
    }

    /// Snapshot of the conversation so far
    pub fn history(&self) -> Vec<Turn> {
        self.history.read().clone()
    }

    pub fn turn_count(&self) -> usize {
        self.history.read().len()
    }

    /// Try to claim the respond cycle; false if one is already running
    ///
    /// Compare-and-swap so two settled transcripts racing for the same
    /// session cannot both start generating.
    pub fn try_begin_response(&self) -> bool {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Release the respond cycle claim
    pub fn end_response(&self) {
        self.busy.store(false, Ordering::Release);
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Merge this turn's extracted facts into the trip context
    pub fn merge_context(&self, update: &ContextUpdate) {
        if update.is_empty() {
            return;
        }
        let mut trip = self.trip.write();
        trip.merge(update);
        tracing::debug!(stream_sid = %self.stream_sid, trip = ?*trip, "Trip context updated");
    }

    /// Snapshot of the accumulated trip context
    pub fn trip_context(&self) -> TripContext {
        self.trip.read().clone()
    }

    /// Claim the visa lookup for the current fact-set; false if not ready
    /// or already fired
    pub fn try_claim_lookup(&self) -> Option<(String, String)> {
        let mut trip = self.trip.write();
        if !trip.ready_for_lookup() {
            return None;
        }
        trip.mark_lookup_done();
        Some((trip.passport.clone()?, trip.destination.clone()?))
    }

    /// Record SMS consent (idempotent)
    pub fn record_sms_consent(&self) {
        self.sms_consented.store(true, Ordering::Release);
    }

    pub fn sms_consented(&self) -> bool {
        self.sms_consented.load(Ordering::Acquire)
    }

    /// Claim the one SMS delivery attempt this call is allowed
    ///
    /// Returns true exactly once no matter how many times consent is
    /// re-detected.
    pub fn try_claim_sms_send(&self) -> bool {
        self.sms_sent
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Mark that the dialogue reached a terminal intent
    pub fn request_end(&self) {
        self.end_requested.store(true, Ordering::Release);
    }

    pub fn end_requested(&self) -> bool {
        self.end_requested.load(Ordering::Acquire)
    }

    /// Seconds since the session was created
    pub fn duration_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
