//! Core types for the voicegate call pipeline
//!
//! This crate provides foundational types used across all other crates:
//! - Conversation turns and history formatting
//! - Transcript events from streaming STT

pub mod conversation;
pub mod transcript;

pub use conversation::{format_history, Turn, TurnRole};
pub use transcript::TranscriptEvent;
