//! Perch Core
//!
//! Shared data model, capability traits, and error taxonomy for Perch, a
//! menu-bar companion for the Spotify desktop player.
//!
//! Perch mirrors playback state from two disjoint sources of truth: the
//! scripting-bridge interface of the locally running player process and the
//! remote Web API. This crate defines the contracts the engine crates consume:
//!
//! - **Capability traits**: [`LocalPlayerProbe`], [`RemoteLibraryClient`],
//!   [`NotificationSink`], [`SearchSink`], [`RecencyLedger`]
//! - **Domain types**: [`ResourceId`], [`PlaybackContext`], [`Playlist`],
//!   [`SavedAlbum`], [`QueueItem`], [`Device`], ...
//! - **Error taxonomy**: [`RemoteError`], [`ProbeError`]
//!
//! The presentation layer, OS chrome, and the Web API wire format are out of
//! scope; the traits here are the seams they plug into.

#![forbid(unsafe_code)]

pub mod error;
pub mod ids;
pub mod traits;
pub mod types;

pub use error::{ProbeError, RemoteError};
pub use ids::{is_saved_tracks_uri, saved_tracks_uri, IdCategory, ResourceId};
pub use traits::{
    LocalPlayerProbe, NotificationSink, RecencyLedger, RemoteLibraryClient, RemoteResult,
    SearchSink,
};
pub use types::{
    Alert, AlbumRef, ArtistRef, CatalogTrack, ContextType, CurrentPlayback, Device,
    DocumentKind, ItemDescriptor, Page, PlayState, PlaybackContext, Playlist, QueueEpisode,
    QueueItem, QueueTrack, RemoteItem, RepeatMode, SavedAlbum, SearchDocument, ShowRef,
    UserProfile,
};
