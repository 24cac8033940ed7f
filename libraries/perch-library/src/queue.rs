//! Artwork resolution for queue entries.
//!
//! A queue entry has no single artwork field; the image comes from an ordered
//! fallback chain. The chain is an explicit resolver list so the order stays
//! visible: tracks try album art then first-artist art; episodes try their
//! own art then the show's.

use perch_core::{QueueEpisode, QueueItem, QueueTrack, ResourceId};

/// A resolved artwork source for one queue entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueImageSource {
    /// The identifier the image is cached under.
    pub id: ResourceId,
    pub url: String,
}

/// Resolve the artwork source for a queue entry, trying each resolver in
/// order and returning the first hit.
pub fn resolve_image_source(item: &QueueItem) -> Option<QueueImageSource> {
    match item {
        QueueItem::Track(track) => {
            let resolvers: [fn(&QueueTrack) -> Option<QueueImageSource>; 2] =
                [track_album_art, track_artist_art];
            resolvers.iter().find_map(|resolve| resolve(track))
        }
        QueueItem::Episode(episode) => {
            let resolvers: [fn(&QueueEpisode) -> Option<QueueImageSource>; 2] =
                [episode_own_art, episode_show_art];
            resolvers.iter().find_map(|resolve| resolve(episode))
        }
    }
}

fn track_album_art(track: &QueueTrack) -> Option<QueueImageSource> {
    let album = track.album.as_ref()?;
    if !album.has_images {
        return None;
    }
    Some(QueueImageSource {
        id: ResourceId::from_uri(&album.uri)?,
        url: album.image_url.clone()?,
    })
}

fn track_artist_art(track: &QueueTrack) -> Option<QueueImageSource> {
    track.artists.iter().find_map(|artist| {
        if !artist.has_images {
            return None;
        }
        Some(QueueImageSource {
            id: ResourceId::from_uri(artist.uri.as_deref()?)?,
            url: artist.image_url.clone()?,
        })
    })
}

fn episode_own_art(episode: &QueueEpisode) -> Option<QueueImageSource> {
    if !episode.has_images {
        return None;
    }
    Some(QueueImageSource {
        id: ResourceId::from_uri(episode.uri.as_deref()?)?,
        url: episode.image_url.clone()?,
    })
}

fn episode_show_art(episode: &QueueEpisode) -> Option<QueueImageSource> {
    let show = episode.show.as_ref()?;
    Some(QueueImageSource {
        id: ResourceId::from_uri(&show.uri)?,
        url: show.image_url.clone()?,
    })
}
