//! User-intent command dispatch.
//!
//! Translates intents from the presentation layer into ordered calls against
//! the probe and the remote client, with optimistic snapshot mutation, undo
//! registration, recency touches, and failure surfacing through the
//! notification sink.

use crate::engine::ReconciliationEngine;
use crate::snapshot::SavedState;
use crate::undo::{LibraryCommand, UndoStack};
use perch_core::{
    is_saved_tracks_uri, Alert, IdCategory, LocalPlayerProbe, NotificationSink, PlayState,
    ProbeError, RecencyLedger, RemoteError, RemoteLibraryClient,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Seek step applied when skipping within an episode.
const EPISODE_SEEK_STEP_SECS: f64 = 15.0;

/// How long after a "previous track" command before re-reading state; the
/// player needs a beat to settle on the new item.
const PREVIOUS_TRACK_SETTLE: Duration = Duration::from_millis(500);

/// Dispatches user commands against the probe and the remote client.
///
/// Library mutations go through [`execute`](Self::execute) so that every one
/// of them registers its inverse for undo before the network call is issued.
pub struct CommandDispatcher {
    engine: Arc<ReconciliationEngine>,
    probe: Arc<dyn LocalPlayerProbe>,
    remote: Arc<dyn RemoteLibraryClient>,
    notifier: Arc<dyn NotificationSink>,
    recency: Arc<dyn RecencyLedger>,
    undo: Mutex<UndoStack>,
}

impl CommandDispatcher {
    pub fn new(
        engine: Arc<ReconciliationEngine>,
        probe: Arc<dyn LocalPlayerProbe>,
        remote: Arc<dyn RemoteLibraryClient>,
        notifier: Arc<dyn NotificationSink>,
        recency: Arc<dyn RecencyLedger>,
    ) -> Self {
        Self {
            engine,
            probe,
            remote,
            notifier,
            recency,
            undo: Mutex::new(UndoStack::new()),
        }
    }

    // ----- library mutations (undoable) -----

    /// Toggle whether the current track is in the user's saved tracks.
    pub async fn toggle_save_current(&self) {
        let (id, saved) = {
            let snapshot = self.engine.snapshot();
            let id = snapshot.item.as_ref().and_then(|item| item.id.clone());
            (id, snapshot.saved)
        };
        let Some(id) = id else {
            self.notifier.notify(Alert::new(
                "Missing Data",
                "The current item has no catalog identity.",
            ));
            return;
        };
        if id.category != IdCategory::Track {
            self.notifier.notify(Alert::new(
                "Not a Track",
                "Only tracks can be added to Liked Songs.",
            ));
            return;
        }

        let command = if saved == SavedState::Saved {
            LibraryCommand::RemoveSavedTrack(id)
        } else {
            LibraryCommand::SaveTrack(id)
        };
        // Optimistic flip; the periodic saved-state check corrects drift.
        self.engine.mutate(|snapshot| {
            snapshot.saved = if saved == SavedState::Saved {
                SavedState::NotSaved
            } else {
                SavedState::Saved
            };
        });
        self.execute(command).await;
    }

    /// Add the current item to a playlist. Items without a catalog identity
    /// and non-tracks destined for Liked Songs are rejected locally, before
    /// any network traffic.
    pub async fn add_current_to_playlist(&self, playlist_uri: &str) {
        let item = self.engine.snapshot().item;
        let Some(id) = item.as_ref().and_then(|item| item.id.clone()) else {
            let is_local = item.as_ref().is_some_and(|item| item.is_local);
            let message = if is_local {
                "Local tracks cannot be added to playlists."
            } else {
                "The current item has no catalog identity."
            };
            self.notifier.notify(Alert::new("Missing Data", message));
            return;
        };

        if is_saved_tracks_uri(playlist_uri) {
            if id.category != IdCategory::Track {
                self.notifier.notify(Alert::new(
                    "Not a Track",
                    "Only tracks can be added to Liked Songs.",
                ));
                return;
            }
            self.execute(LibraryCommand::SaveTrack(id)).await;
            return;
        }

        self.recency.touch_playlist(playlist_uri);
        self.execute(LibraryCommand::AddToPlaylist {
            playlist_uri: playlist_uri.to_owned(),
            item: id,
        })
        .await;
    }

    /// Remove the current item from a playlist.
    pub async fn remove_current_from_playlist(&self, playlist_uri: &str) {
        let Some(id) = self
            .engine
            .snapshot()
            .item
            .as_ref()
            .and_then(|item| item.id.clone())
        else {
            self.notifier.notify(Alert::new(
                "Missing Data",
                "The current item has no catalog identity.",
            ));
            return;
        };

        if is_saved_tracks_uri(playlist_uri) {
            self.execute(LibraryCommand::RemoveSavedTrack(id)).await;
            return;
        }
        self.execute(LibraryCommand::RemoveFromPlaylist {
            playlist_uri: playlist_uri.to_owned(),
            item: id,
        })
        .await;
    }

    pub async fn follow_playlist(&self, playlist_uri: &str) {
        self.execute(LibraryCommand::FollowPlaylist(playlist_uri.to_owned()))
            .await;
    }

    pub async fn unfollow_playlist(&self, playlist_uri: &str) {
        self.execute(LibraryCommand::UnfollowPlaylist(playlist_uri.to_owned()))
            .await;
    }

    /// Register the command's inverse for undo, then issue it.
    async fn execute(&self, command: LibraryCommand) {
        self.undo.lock().unwrap().record(&command);
        self.issue(command).await;
    }

    /// Undo the most recent library mutation.
    pub async fn undo(&self) {
        let command = self.undo.lock().unwrap().pop_undo();
        if let Some(command) = command {
            self.issue(command).await;
        }
    }

    /// Redo the most recently undone library mutation.
    pub async fn redo(&self) {
        let command = self.undo.lock().unwrap().pop_redo();
        if let Some(command) = command {
            self.issue(command).await;
        }
    }

    pub fn can_undo(&self) -> bool {
        self.undo.lock().unwrap().can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.undo.lock().unwrap().can_redo()
    }

    /// Issue a library command against the remote client. Shared by the
    /// forward path and undo/redo so all three surface failures identically.
    async fn issue(&self, command: LibraryCommand) {
        debug!(?command, "issuing library command");
        let result = match &command {
            LibraryCommand::SaveTrack(id) => self.remote.save_tracks(&[id.uri()]).await,
            LibraryCommand::RemoveSavedTrack(id) => {
                self.remote.remove_saved_tracks(&[id.uri()]).await
            }
            LibraryCommand::AddToPlaylist { playlist_uri, item } => {
                self.remote.add_to_playlist(playlist_uri, &[item.uri()]).await
            }
            LibraryCommand::RemoveFromPlaylist { playlist_uri, item } => {
                self.remote
                    .remove_from_playlist(playlist_uri, &[item.uri()])
                    .await
            }
            LibraryCommand::FollowPlaylist(uri) => self.remote.follow_playlist(uri).await,
            LibraryCommand::UnfollowPlaylist(uri) => self.remote.unfollow_playlist(uri).await,
        };
        if let Err(err) = result {
            self.surface("Couldn't Update Library", err);
        }
    }

    // ----- context playback -----

    /// Start playback of a playlist, touching its recency first so it sorts
    /// to the top immediately.
    pub async fn play_playlist(&self, playlist_uri: &str) {
        self.recency.touch_playlist(playlist_uri);
        self.play_context(playlist_uri).await;
    }

    /// Start playback of a saved album, touching its recency first.
    pub async fn play_album(&self, album_uri: &str) {
        self.recency.touch_album(album_uri);
        self.play_context(album_uri).await;
    }

    async fn play_context(&self, context_uri: &str) {
        match self.remote.play_context(context_uri).await {
            Ok(()) => {
                self.engine.update_player_state().await;
            }
            Err(RemoteError::NoActiveDevice) => {
                self.notifier.notify(Alert::new(
                    "No Active Device",
                    "Open the player on one of your devices and try again.",
                ));
            }
            Err(err) => self.surface("Couldn't Start Playback", err),
        }
    }

    /// Play one entry of the playback queue inside the current context.
    pub async fn play_queue_item(&self, uri: Option<&str>) {
        let Some(uri) = uri else {
            self.notifier.notify(Alert::new(
                "Missing Data",
                "This queue entry has no playable identity.",
            ));
            return;
        };
        let context_uri = self
            .engine
            .snapshot()
            .context
            .map(|context| context.uri);
        if let Err(err) = self.probe.play_item(uri, context_uri.as_deref()) {
            self.surface_probe("Couldn't Play Item", err);
            return;
        }
        self.engine.update_player_state().await;
    }

    pub async fn transfer_playback(&self, device_id: &str, play: bool) {
        if let Err(err) = self.remote.transfer_playback(device_id, play).await {
            self.surface("Couldn't Transfer Playback", err);
            return;
        }
        self.engine.update_player_state().await;
    }

    // ----- transport controls -----

    pub async fn play_pause(&self) {
        self.engine.mutate(|snapshot| {
            snapshot.play_state = match snapshot.play_state {
                PlayState::Playing => PlayState::Paused,
                _ => PlayState::Playing,
            };
        });
        if let Err(err) = self.probe.play_pause() {
            self.surface_probe("Couldn't Play or Pause", err);
        }
    }

    /// Skip forward: next track for tracks, +15 s (clamped to the duration)
    /// for episodes.
    pub async fn next_or_seek_forward(&self) {
        if self.current_is_episode() {
            self.seek_relative(EPISODE_SEEK_STEP_SECS);
            return;
        }
        if let Err(err) = self.probe.next_track() {
            self.surface_probe("Couldn't Skip to Next Track", err);
        }
    }

    /// Skip backward: previous track for tracks, -15 s (clamped to zero) for
    /// episodes.
    pub async fn previous_or_seek_backward(&self) {
        if self.current_is_episode() {
            self.seek_relative(-EPISODE_SEEK_STEP_SECS);
            return;
        }
        if let Err(err) = self.probe.previous_track() {
            self.surface_probe("Couldn't Skip to Previous Track", err);
            return;
        }
        // The player reports the old item for a moment after "previous";
        // re-read once it has settled.
        let engine = Arc::clone(&self.engine);
        tokio::spawn(async move {
            sleep(PREVIOUS_TRACK_SETTLE).await;
            engine.update_player_state().await;
        });
    }

    fn current_is_episode(&self) -> bool {
        self.engine
            .snapshot()
            .item
            .as_ref()
            .and_then(|item| item.id.as_ref().map(|id| id.category))
            == Some(IdCategory::Episode)
    }

    fn seek_relative(&self, delta_secs: f64) {
        let snapshot = self.engine.snapshot();
        let Some(position) = snapshot.position_secs else {
            return;
        };
        let mut target = position + delta_secs;
        if let Some(duration) = snapshot.duration_secs {
            target = target.min(duration);
        }
        target = target.max(0.0);
        self.seek_to(target);
    }

    /// Seek to an absolute position (seconds).
    pub fn seek_to(&self, seconds: f64) {
        self.engine.mark_position_adjusted();
        self.engine.mutate(|snapshot| {
            snapshot.position_secs = Some(seconds);
        });
        if let Err(err) = self.probe.set_position(seconds) {
            self.surface_probe("Couldn't Seek", err);
        }
    }

    /// Set the sound volume (0-100).
    pub fn set_volume(&self, volume: i64) {
        let volume = volume.clamp(0, 100);
        self.engine.mark_volume_adjusted();
        self.engine.mutate(|snapshot| {
            snapshot.volume = Some(volume);
        });
        if let Err(err) = self.probe.set_volume(volume) {
            self.surface_probe("Couldn't Set Volume", err);
        }
    }

    /// Advance the repeat mode one step in the off -> context -> track cycle.
    pub async fn cycle_repeat(&self) {
        let next = self.engine.snapshot().repeat.cycled();
        self.engine.mutate(|snapshot| {
            snapshot.repeat = next;
        });
        if let Err(err) = self.remote.set_repeat(next).await {
            self.surface("Couldn't Set Repeat Mode", err);
        }
    }

    pub async fn toggle_shuffle(&self) {
        let next = !self.engine.snapshot().shuffled;
        self.engine.mutate(|snapshot| {
            snapshot.shuffled = next;
        });
        if let Err(err) = self.probe.set_shuffle(next) {
            self.surface_probe("Couldn't Toggle Shuffle", err);
        }
    }

    // ----- failure surfacing -----

    fn surface(&self, title: &str, err: RemoteError) {
        if err.is_auth_expired() {
            // The auth layer handles re-entry; no alert for expiry.
            self.engine.handle_auth_expired();
            return;
        }
        warn!(error = %err, "{title}");
        self.notifier.notify(Alert::new(title, err.to_string()));
    }

    fn surface_probe(&self, title: &str, err: ProbeError) {
        warn!(error = %err, "{title}");
        self.notifier.notify(Alert::new(title, err.to_string()));
    }
}
