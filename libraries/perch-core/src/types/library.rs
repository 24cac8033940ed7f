//! Library entities (playlists, saved albums) and search-index documents.

use serde::{Deserialize, Serialize};

/// A playlist in the user's library.
///
/// The synthetic "Liked Songs" pseudo-playlist is represented as a `Playlist`
/// with [`snapshot_id`](Self::snapshot_id) `None` and a saved-tracks URI; it
/// is always present at index 0 of the playlist collection when a user
/// profile is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    /// Stable URI, the primary key within the playlist collection.
    pub uri: String,
    pub name: String,
    /// Opaque remote change token; bumped whenever playlist membership
    /// changes. `None` for the synthetic saved-tracks playlist.
    pub snapshot_id: Option<String>,
    pub owner_id: Option<String>,
    pub item_count: usize,
    pub image_url: Option<String>,
    pub description: Option<String>,
}

/// A saved album in the user's library. Albums carry no remote change token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedAlbum {
    /// Stable URI, the primary key within the album collection.
    pub uri: String,
    pub name: String,
    pub artist_name: Option<String>,
    pub image_url: Option<String>,
}

/// A track or episode fetched for content-level indexing (playlist items,
/// album tracks, saved tracks).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogTrack {
    pub uri: Option<String>,
    pub name: String,
    pub album_uri: Option<String>,
    pub album_name: Option<String>,
    pub artist_name: Option<String>,
    /// Local files are skipped by the indexer.
    pub is_local: bool,
}

/// The kind of an indexable entity. Doubles as the search sink's domain
/// identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Playlist,
    Album,
    PlaylistItem,
    AlbumTrack,
}

impl DocumentKind {
    /// The domain identifier string used in the search sink and the local
    /// document store.
    pub fn domain(self) -> &'static str {
        match self {
            DocumentKind::Playlist => "playlist",
            DocumentKind::Album => "album",
            DocumentKind::PlaylistItem => "playlist_item",
            DocumentKind::AlbumTrack => "album_track",
        }
    }
}

/// A document handed to the search sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchDocument {
    /// Stable URI, also the sink-side unique identifier.
    pub uri: String,
    pub kind: DocumentKind,
    pub title: String,
    pub subtitle: Option<String>,
    /// Path or URL of a thumbnail, if one is cached.
    pub thumbnail: Option<String>,
}
