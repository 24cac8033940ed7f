//! Perch Index - search-index synchronization
//!
//! Keeps an external full-text search sink in lockstep with the remote
//! library through a locally persisted document store. Playlists and albums
//! become entity documents; their contents become item documents with parent
//! linkage. A playlist whose remote snapshot id is unchanged since the last
//! successful sync is skipped wholesale; albums carry no change token and are
//! always re-synced. Every cycle ends with a sweep that deletes orphaned
//! (no surviving parent) and unobserved documents.

#![forbid(unsafe_code)]

mod error;
mod store;
mod sync;

pub use error::{IndexError, Result};
pub use store::{DocumentStore, ItemRow};
pub use sync::{IndexSettings, IndexSummary, SearchIndexSync};
