//! Perch Playback - state reconciliation and command dispatch
//!
//! This crate owns the canonical [`PlaybackSnapshot`] and the two components
//! that read and mutate it:
//!
//! - [`ReconciliationEngine`] converges the two sources of playback truth
//!   (local scripting-bridge probe and remote Web API) into one snapshot,
//!   using a bounded-retry protocol: the remote API reflects state with
//!   material lag right after a locally issued command, so disagreeing
//!   identities are retried with linearly increasing backoff before the
//!   engine gives up and publishes a null context.
//! - [`CommandDispatcher`] translates user intents into ordered calls against
//!   both collaborators with optimistic local mutation, undo registration,
//!   and failure surfacing through the notification sink.
//!
//! The snapshot is single-writer: only this crate mutates it, and every
//! mutation executes under the engine's lock before an event is broadcast.

#![forbid(unsafe_code)]

mod dispatcher;
mod engine;
mod snapshot;
mod undo;

pub use dispatcher::CommandDispatcher;
pub use engine::{EngineConfig, PlaybackEvent, ReconciliationEngine};
pub use snapshot::{PlaybackSnapshot, SavedState};
pub use undo::{LibraryCommand, UndoStack};
