//! Stable resource identifiers.
//!
//! Every entity Perch tracks (track, episode, album, artist, playlist, show)
//! is addressed by a URI of the form `spotify:{category}:{id}`. The one
//! exception is the synthetic "Liked Songs" pseudo-playlist, whose URI is
//! `spotify:user:{user_id}:collection` and which never exists upstream.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The category component of a resource URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdCategory {
    Track,
    Episode,
    Album,
    Artist,
    Playlist,
    Show,
    User,
    /// Advertisements carry identifiers that cannot be compared across
    /// sources; they only ever match by category.
    Ad,
    Unknown,
}

impl IdCategory {
    /// The URI path segment for this category.
    pub fn as_str(self) -> &'static str {
        match self {
            IdCategory::Track => "track",
            IdCategory::Episode => "episode",
            IdCategory::Album => "album",
            IdCategory::Artist => "artist",
            IdCategory::Playlist => "playlist",
            IdCategory::Show => "show",
            IdCategory::User => "user",
            IdCategory::Ad => "ad",
            IdCategory::Unknown => "unknown",
        }
    }

    fn from_segment(segment: &str) -> Self {
        match segment {
            "track" => IdCategory::Track,
            "episode" => IdCategory::Episode,
            "album" => IdCategory::Album,
            "artist" => IdCategory::Artist,
            "playlist" => IdCategory::Playlist,
            "show" => IdCategory::Show,
            "user" => IdCategory::User,
            "ad" => IdCategory::Ad,
            _ => IdCategory::Unknown,
        }
    }
}

impl fmt::Display for IdCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed resource identifier: category plus opaque id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    pub category: IdCategory,
    pub id: String,
}

impl ResourceId {
    pub fn new(category: IdCategory, id: impl Into<String>) -> Self {
        Self {
            category,
            id: id.into(),
        }
    }

    /// Parse a `spotify:{category}:{id}` URI. Returns `None` for URIs that
    /// don't carry exactly three segments with the expected scheme.
    pub fn from_uri(uri: &str) -> Option<Self> {
        let mut parts = uri.split(':');
        if parts.next()? != "spotify" {
            return None;
        }
        let category = IdCategory::from_segment(parts.next()?);
        let id = parts.next()?;
        if id.is_empty() || parts.next().is_some() {
            return None;
        }
        Some(Self::new(category, id))
    }

    /// The canonical URI for this identifier.
    pub fn uri(&self) -> String {
        format!("spotify:{}:{}", self.category, self.id)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "spotify:{}:{}", self.category, self.id)
    }
}

/// The URI of the synthetic "Liked Songs" pseudo-playlist for a user.
pub fn saved_tracks_uri(user_id: &str) -> String {
    format!("spotify:user:{user_id}:collection")
}

/// Whether a URI names the synthetic "Liked Songs" pseudo-playlist.
///
/// Such playlists have no upstream snapshot id and must be excluded from
/// mutation paths that require one.
pub fn is_saved_tracks_uri(uri: &str) -> bool {
    uri.starts_with("spotify:user:") && uri.ends_with(":collection")
}
