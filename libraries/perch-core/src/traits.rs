//! Capability traits consumed by the engine crates.
//!
//! The presentation layer and the transports behind these traits are external
//! collaborators; the core only depends on the contracts below. Engines take
//! them as `Arc<dyn ...>` so tests can substitute hand-rolled mocks.

use crate::error::{ProbeError, RemoteError};
use crate::types::{
    Alert, CatalogTrack, CurrentPlayback, Device, DocumentKind, ItemDescriptor, Page, PlayState,
    Playlist, QueueItem, RepeatMode, SavedAlbum, SearchDocument, UserProfile,
};
use async_trait::async_trait;

/// Result alias for remote client calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// The scripting-bridge interface to the locally running player process.
///
/// Getters are synchronous and return `None` when the player is unreachable;
/// the engine degrades the dependent snapshot fields instead of failing.
pub trait LocalPlayerProbe: Send + Sync {
    fn current_item(&self) -> Option<ItemDescriptor>;
    /// Playback position in seconds.
    fn position(&self) -> Option<f64>;
    /// Sound volume, 0-100.
    fn volume(&self) -> Option<i64>;
    fn is_shuffling(&self) -> Option<bool>;
    fn play_state(&self) -> Option<PlayState>;

    fn play_pause(&self) -> Result<(), ProbeError>;
    fn next_track(&self) -> Result<(), ProbeError>;
    fn previous_track(&self) -> Result<(), ProbeError>;
    fn set_position(&self, seconds: f64) -> Result<(), ProbeError>;
    fn set_volume(&self, volume: i64) -> Result<(), ProbeError>;
    fn set_shuffle(&self, shuffle: bool) -> Result<(), ProbeError>;
    /// Play a specific item, optionally inside a context (playlist/album URI).
    fn play_item(&self, uri: &str, context_uri: Option<&str>) -> Result<(), ProbeError>;
}

/// The remote Web API, already typed and authenticated.
///
/// Token refresh is owned upstream; this trait only reports
/// [`RemoteError::AuthExpired`] when recovery is impossible mid-call.
#[async_trait]
pub trait RemoteLibraryClient: Send + Sync {
    /// The currently-playing context, or `None` when nothing is playing or
    /// playback is private.
    async fn current_playback(&self) -> RemoteResult<Option<CurrentPlayback>>;
    async fn available_devices(&self) -> RemoteResult<Vec<Device>>;
    async fn queue(&self) -> RemoteResult<Vec<QueueItem>>;
    async fn current_user(&self) -> RemoteResult<UserProfile>;

    async fn playlists_page(&self, limit: usize, offset: usize) -> RemoteResult<Page<Playlist>>;
    async fn saved_albums_page(
        &self,
        limit: usize,
        offset: usize,
    ) -> RemoteResult<Page<SavedAlbum>>;
    async fn saved_tracks_page(
        &self,
        limit: usize,
        offset: usize,
    ) -> RemoteResult<Page<CatalogTrack>>;
    async fn playlist_items_page(
        &self,
        playlist_uri: &str,
        limit: usize,
        offset: usize,
    ) -> RemoteResult<Page<CatalogTrack>>;
    async fn album_tracks_page(
        &self,
        album_uri: &str,
        limit: usize,
        offset: usize,
    ) -> RemoteResult<Page<CatalogTrack>>;

    async fn save_tracks(&self, uris: &[String]) -> RemoteResult<()>;
    async fn remove_saved_tracks(&self, uris: &[String]) -> RemoteResult<()>;
    /// For each URI, whether it is in the user's saved tracks.
    async fn saved_tracks_contains(&self, uris: &[String]) -> RemoteResult<Vec<bool>>;

    async fn add_to_playlist(&self, playlist_uri: &str, uris: &[String]) -> RemoteResult<()>;
    async fn remove_from_playlist(&self, playlist_uri: &str, uris: &[String]) -> RemoteResult<()>;
    async fn follow_playlist(&self, playlist_uri: &str) -> RemoteResult<()>;
    async fn unfollow_playlist(&self, playlist_uri: &str) -> RemoteResult<()>;

    async fn set_repeat(&self, mode: RepeatMode) -> RemoteResult<()>;
    /// Start playback of a context (playlist/album URI), activating a device
    /// first if none is active. Reports [`RemoteError::NoActiveDevice`] when
    /// no device can be activated.
    async fn play_context(&self, context_uri: &str) -> RemoteResult<()>;
    async fn transfer_playback(&self, device_id: &str, play: bool) -> RemoteResult<()>;
}

/// Sink for user-facing notifications, consumed by the presentation layer.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, alert: Alert);
}

/// The external full-text search index.
#[async_trait]
pub trait SearchSink: Send + Sync {
    async fn index_documents(&self, documents: &[SearchDocument]) -> Result<(), String>;
    async fn delete_documents(&self, uris: &[String]) -> Result<(), String>;
    /// Remove every document of one kind.
    async fn delete_domain(&self, kind: DocumentKind) -> Result<(), String>;
    async fn delete_all(&self) -> Result<(), String>;
}

/// Staged last-modified timestamps for recency sorting.
///
/// The library crate owns the durable map; the command dispatcher only
/// touches it through this trait so the single-writer rule holds.
pub trait RecencyLedger: Send + Sync {
    /// Record that a playlist was played or had an item added to it.
    fn touch_playlist(&self, uri: &str);
    /// Record that an album was played.
    fn touch_album(&self, uri: &str);
}
