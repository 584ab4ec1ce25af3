//! In-memory session registry keyed by stream SID

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::session::CallSession;

/// Registry of active call sessions
///
/// Exactly one session exists per live stream SID. `get` on an unknown id
/// returns None; callers treat that as "message arrived after teardown" and
/// drop it silently.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<CallSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a session for a starting stream
    pub fn create(
        &self,
        call_sid: impl Into<String>,
        stream_sid: impl Into<String>,
        caller_phone: Option<String>,
    ) -> Arc<CallSession> {
        let session = Arc::new(CallSession::new(call_sid, stream_sid, caller_phone));
        tracing::info!(
            call_sid = %session.call_sid,
            stream_sid = %session.stream_sid,
            "Session created"
        );
        self.sessions
            .write()
            .insert(session.stream_sid.clone(), session.clone());
        session
    }

    /// Look up a session by stream SID
    pub fn get(&self, stream_sid: &str) -> Option<Arc<CallSession>> {
        self.sessions.read().get(stream_sid).cloned()
    }

    /// Remove a session at teardown
    pub fn remove(&self, stream_sid: &str) {
        if let Some(session) = self.sessions.write().remove(stream_sid) {
            tracing::info!(
                call_sid = %session.call_sid,
                stream_sid,
                duration_secs = session.duration_secs(),
                turns = session.turn_count(),
                "Session ended"
            );
        }
    }

    /// Number of active sessions
    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Stream SIDs of all active sessions
    pub fn stream_sids(&self) -> Vec<String> {
        self.sessions.read().keys().cloned().collect()
    }
}
