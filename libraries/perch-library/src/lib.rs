//! Perch Library - incremental library synchronization
//!
//! Fetches the user's playlists, saved albums, and playback queue from the
//! remote API into recency-sorted in-memory collections. Recency comes from a
//! locally persisted last-modified map ([`ModifiedDatesStore`]): the remote
//! API has no "last played" signal, so Perch records one itself whenever a
//! context is played or mutated. Writes are staged in memory and committed in
//! one batch when the popover closes.

#![forbid(unsafe_code)]

mod dates;
mod error;
mod queue;
mod sort;
mod sync;

pub use dates::{ModifiedDatesStore, RecencyKind};
pub use error::{LibraryError, Result};
pub use queue::{resolve_image_source, QueueImageSource};
pub use sort::sort_by_recency;
pub use sync::{liked_songs_playlist, LibrarySyncEngine};
