//! Types reported by the local player probe.

use crate::ids::ResourceId;
use serde::{Deserialize, Serialize};

/// Play/pause state of the local player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayState {
    Playing,
    Paused,
    Stopped,
}

/// Repeat mode of the playback context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    Off,
    /// Repeat the current track.
    Track,
    /// Repeat the whole context (playlist/album).
    Context,
}

impl RepeatMode {
    /// The next mode in the cycle a repeat-button press moves through:
    /// off, context, track, off.
    pub fn cycled(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::Context,
            RepeatMode::Context => RepeatMode::Track,
            RepeatMode::Track => RepeatMode::Off,
        }
    }
}

/// The item the local player reports as current.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDescriptor {
    /// Parsed identifier; `None` for local files and other items without a
    /// canonical URI.
    pub id: Option<ResourceId>,
    pub name: String,
    pub duration_secs: Option<f64>,
    /// Local files cannot be saved or added to playlists.
    pub is_local: bool,
    pub artwork_url: Option<String>,
}
