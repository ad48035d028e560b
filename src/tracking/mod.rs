//! Walk session tracking
//!
//! This module turns a stream of position fixes into a walk:
//! - Fix filtering and incremental distance accumulation
//! - The foreground session lifecycle (permission, clock, fixes, summary)
//! - Background continuation against a persisted session record
//! - Explicit hand-off of session ownership between the two
//!
//! Exactly one context owns a `WalkSessionState` at any time. The foreground
//! gives it up with [`WalkSession::hand_off`] and gets it back with
//! [`WalkSession::resume`]; the background side takes it with
//! [`BackgroundReconciler::claim`] and returns it with
//! [`BackgroundReconciler::release`].

mod background;
mod controller;
mod filter;
mod state;
mod summary;

pub use background::{BackgroundReconciler, SessionUpdateHandler, LOCATION_TASK_NAME, WALK_SESSION_KEY};
pub use controller::{SessionPhase, SessionStatus, WalkSession};
pub use filter::{FilterConfig, FixOutcome};
pub use state::{Path, WalkSessionState};
pub use summary::WalkSummary;
