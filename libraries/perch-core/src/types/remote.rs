//! Types reported by the remote Web API.

use crate::ids::ResourceId;
use crate::types::player::RepeatMode;
use serde::{Deserialize, Serialize};

/// One page of a paginated fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total number of items across all pages.
    pub total: usize,
    pub offset: usize,
}

/// An output device known to the remote API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// `None` for devices the API refuses to address.
    pub id: Option<String>,
    pub name: String,
    pub is_active: bool,
    /// Restricted devices cannot receive playback transfers.
    pub is_restricted: bool,
}

impl Device {
    /// Whether this device may appear in the snapshot's device set.
    pub fn is_usable(&self) -> bool {
        self.id.is_some() && !self.is_restricted
    }
}

/// The kind of container the current item is playing from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextType {
    Playlist,
    Album,
    Artist,
    Show,
    Ad,
    Unknown,
}

/// The playback container reported by the remote API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackContext {
    pub context_type: ContextType,
    pub uri: String,
}

/// A lightweight reference to an album, carried by queue/current items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumRef {
    pub uri: String,
    pub name: String,
    pub has_images: bool,
    pub image_url: Option<String>,
}

/// A lightweight reference to an artist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistRef {
    pub uri: Option<String>,
    pub name: String,
    pub has_images: bool,
    pub image_url: Option<String>,
}

/// A lightweight reference to a show (podcast).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowRef {
    pub uri: String,
    pub name: String,
    pub image_url: Option<String>,
}

/// The item inside a currently-playing response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteItem {
    pub id: Option<ResourceId>,
    pub name: String,
    pub duration_secs: Option<f64>,
}

/// The currently-playing context fetched from the remote API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentPlayback {
    pub item: Option<RemoteItem>,
    pub context: Option<PlaybackContext>,
    pub repeat: RepeatMode,
    pub shuffled: bool,
    pub is_playing: bool,
    /// Whether the remote reports the item as an advertisement. Ad identities
    /// cannot be compared across sources.
    pub is_ad: bool,
}

/// A track in the playback queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueTrack {
    pub uri: Option<String>,
    pub name: String,
    pub album: Option<AlbumRef>,
    pub artists: Vec<ArtistRef>,
}

/// An episode in the playback queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEpisode {
    pub uri: Option<String>,
    pub name: String,
    pub has_images: bool,
    pub image_url: Option<String>,
    pub show: Option<ShowRef>,
}

/// One entry of the playback queue. The queue is replaced wholesale on every
/// successful fetch; entries are never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueItem {
    Track(QueueTrack),
    Episode(QueueEpisode),
}

impl QueueItem {
    pub fn uri(&self) -> Option<&str> {
        match self {
            QueueItem::Track(track) => track.uri.as_deref(),
            QueueItem::Episode(episode) => episode.uri.as_deref(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            QueueItem::Track(track) => &track.name,
            QueueItem::Episode(episode) => &episode.name,
        }
    }
}

/// The signed-in user's profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub display_name: Option<String>,
}
