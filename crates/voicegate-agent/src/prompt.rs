//! Prompt assembly and fixed voice copy
//!
//! Everything the assistant says that is not model output lives here, so
//! the voice stays consistent and the orchestrator never hardcodes copy.

use voicegate_core::{format_history, Turn};
use voicegate_session::TripContext;

/// Opening line, played as soon as the media stream starts
pub const GREETING: &str = "Hi, thanks for calling! I can check visa requirements \
for your trip. Just tell me where you're travelling to and what passport you hold.";

/// Spoken when a respond cycle fails mid-call
pub const APOLOGY_TURN_FAILED: &str =
    "I'm sorry, I'm having a bit of trouble understanding. Could you repeat that?";

/// Spoken when the follow-up text could not be sent
pub const APOLOGY_SMS_FAILED: &str = "I couldn't send that text just now, \
I'm sorry. Everything we discussed is also on our website.";

const PERSONA: &str = "You are a friendly travel assistant on a phone call, \
helping callers understand visa requirements for international trips. \
You speak naturally and briefly, at most two short sentences per reply, \
because your words are read aloud. Never use markdown, lists or emoji. \
If you don't know a requirement, say so and offer to text a link with details. \
Ask for the caller's passport country and destination if you don't have them yet.";

/// Build the full prompt for one respond cycle
///
/// Persona, then whatever structured facts we already hold, then any
/// per-turn notes (visa lookup results, delivery status), then the
/// conversation so far. The latest caller utterance is already the last
/// history entry when this is called.
pub fn build_system_prompt(history: &[Turn], trip: &TripContext, notes: Option<&str>) -> String {
    let mut prompt = String::from(PERSONA);

    let mut known = Vec::new();
    if let Some(passport) = &trip.passport {
        known.push(format!("passport country {passport}"));
    }
    if let Some(destination) = &trip.destination {
        known.push(format!("destination {destination}"));
    }
    if let Some(residence) = &trip.residence {
        known.push(format!("currently living in {residence}"));
    }
    if !known.is_empty() {
        prompt.push_str("\n\nKnown about this caller: ");
        prompt.push_str(&known.join(", "));
        prompt.push('.');
    }

    if let Some(note) = notes {
        prompt.push_str("\n\nNotes for this reply, trust these over your own knowledge:\n");
        prompt.push_str(note);
    }

    if !history.is_empty() {
        prompt.push_str("\n\nConversation so far:\n");
        prompt.push_str(&format_history(history));
    }
    prompt.push_str("\n\nYour next reply:");
    prompt
}
