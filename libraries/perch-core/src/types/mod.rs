mod library;
mod player;
mod remote;

pub use library::{CatalogTrack, DocumentKind, Playlist, SavedAlbum, SearchDocument};
pub use player::{ItemDescriptor, PlayState, RepeatMode};
pub use remote::{
    AlbumRef, ArtistRef, ContextType, CurrentPlayback, Device, Page, PlaybackContext,
    QueueEpisode, QueueItem, QueueTrack, RemoteItem, ShowRef, UserProfile,
};

use serde::{Deserialize, Serialize};

/// A structured user-facing notification: title plus optional detail message.
///
/// Command failures and confirmations are converted to alerts at the call
/// site that issued them and handed to the [`NotificationSink`]; they never
/// propagate as errors past the dispatcher.
///
/// [`NotificationSink`]: crate::traits::NotificationSink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub title: String,
    pub message: String,
}

impl Alert {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }
}
