//! The canonical playback snapshot.

use perch_core::{Device, ItemDescriptor, PlayState, PlaybackContext, RepeatMode};
use serde::{Deserialize, Serialize};

/// Whether the current track is in the user's saved tracks.
///
/// Reset to `Unknown` whenever the current item's identity changes, until the
/// remote check lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SavedState {
    Unknown,
    Saved,
    NotSaved,
}

/// One coherent view of "what is playing right now", merged from the local
/// probe and the remote API.
///
/// Rebuilt field-by-field on every convergence cycle by the engine; never
/// partially mutated outside it. Fields dependent on an unreachable
/// collaborator are `None` rather than stale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    pub item: Option<ItemDescriptor>,
    pub play_state: PlayState,
    pub shuffled: bool,
    pub repeat: RepeatMode,
    /// Position in seconds, `None` while the probe is unreachable.
    pub position_secs: Option<f64>,
    pub duration_secs: Option<f64>,
    /// Sound volume 0-100, `None` while the probe is unreachable.
    pub volume: Option<i64>,
    /// The playback container confirmed by convergence; `None` after retry
    /// exhaustion (graceful degradation).
    pub context: Option<PlaybackContext>,
    pub saved: SavedState,
    /// Usable output devices (null-id and restricted devices filtered out).
    pub devices: Vec<Device>,
}

impl Default for PlaybackSnapshot {
    fn default() -> Self {
        Self {
            item: None,
            play_state: PlayState::Stopped,
            shuffled: false,
            repeat: RepeatMode::Off,
            position_secs: None,
            duration_secs: None,
            volume: None,
            context: None,
            saved: SavedState::Unknown,
            devices: Vec::new(),
        }
    }
}

impl PlaybackSnapshot {
    /// The active output device, if any.
    pub fn active_device(&self) -> Option<&Device> {
        self.devices.iter().find(|device| device.is_active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_snapshot_is_empty() {
        let snapshot = PlaybackSnapshot::default();
        assert!(snapshot.item.is_none());
        assert_eq!(snapshot.play_state, PlayState::Stopped);
        assert_eq!(snapshot.saved, SavedState::Unknown);
        assert!(snapshot.context.is_none());
        assert!(snapshot.active_device().is_none());
    }
}
