//! Per-call session state
//!
//! An in-memory registry keyed by stream SID. Each session is owned by the
//! one orchestrator task driving its connection; the registry itself is the
//! only cross-call shared resource.

pub mod context;
pub mod registry;
pub mod session;

pub use context::{ContextUpdate, TripContext};
pub use registry::SessionRegistry;
pub use session::CallSession;
