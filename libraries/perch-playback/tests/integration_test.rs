//! Integration tests for the reconciliation engine and the command
//! dispatcher, using hand-rolled mocks for the probe, the remote client, and
//! the notification sink. The tokio clock is paused so the retry backoffs run
//! instantly while staying measurable.

use perch_core::{
    Alert, CatalogTrack, ContextType, CurrentPlayback, Device, IdCategory, ItemDescriptor,
    LocalPlayerProbe, NotificationSink, Page, PlayState, PlaybackContext, Playlist, ProbeError,
    QueueItem, RecencyLedger, RemoteError, RemoteItem, RemoteLibraryClient, RemoteResult,
    RepeatMode, ResourceId, SavedAlbum, UserProfile,
};
use perch_playback::{
    CommandDispatcher, EngineConfig, PlaybackEvent, ReconciliationEngine, SavedState,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

fn track_id(id: &str) -> ResourceId {
    ResourceId {
        category: IdCategory::Track,
        id: id.to_owned(),
    }
}

fn episode_id(id: &str) -> ResourceId {
    ResourceId {
        category: IdCategory::Episode,
        id: id.to_owned(),
    }
}

fn item(id: Option<ResourceId>, name: &str) -> ItemDescriptor {
    ItemDescriptor {
        id,
        name: name.to_owned(),
        duration_secs: Some(180.0),
        is_local: false,
        artwork_url: None,
    }
}

fn playback(id: Option<ResourceId>, context_uri: &str) -> CurrentPlayback {
    CurrentPlayback {
        item: id.clone().map(|id| RemoteItem {
            id: Some(id),
            name: "item".to_owned(),
            duration_secs: Some(180.0),
        }),
        context: Some(PlaybackContext {
            context_type: ContextType::Playlist,
            uri: context_uri.to_owned(),
        }),
        repeat: RepeatMode::Off,
        shuffled: false,
        is_playing: true,
        is_ad: false,
    }
}

#[derive(Default)]
struct ProbeState {
    item: Option<ItemDescriptor>,
    position: Option<f64>,
    /// Readings are consumed front-to-back; the last one repeats.
    volumes: VecDeque<i64>,
    shuffling: Option<bool>,
    play_state: Option<PlayState>,
}

#[derive(Default)]
struct MockProbe {
    state: Mutex<ProbeState>,
    commands: Mutex<Vec<String>>,
}

impl MockProbe {
    fn with_track(id: &str) -> Self {
        let probe = Self::default();
        {
            let mut state = probe.state.lock().unwrap();
            state.item = Some(item(Some(track_id(id)), "track"));
            state.position = Some(10.0);
            state.volumes = VecDeque::from([50]);
            state.shuffling = Some(false);
            state.play_state = Some(PlayState::Playing);
        }
        probe
    }

    fn set_volumes(&self, volumes: &[i64]) {
        self.state.lock().unwrap().volumes = volumes.iter().copied().collect();
    }

    fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    fn record(&self, command: &str) -> Result<(), ProbeError> {
        self.commands.lock().unwrap().push(command.to_owned());
        Ok(())
    }
}

impl LocalPlayerProbe for MockProbe {
    fn current_item(&self) -> Option<ItemDescriptor> {
        self.state.lock().unwrap().item.clone()
    }

    fn position(&self) -> Option<f64> {
        self.state.lock().unwrap().position
    }

    fn volume(&self) -> Option<i64> {
        let mut state = self.state.lock().unwrap();
        if state.volumes.len() > 1 {
            state.volumes.pop_front()
        } else {
            state.volumes.front().copied()
        }
    }

    fn is_shuffling(&self) -> Option<bool> {
        self.state.lock().unwrap().shuffling
    }

    fn play_state(&self) -> Option<PlayState> {
        self.state.lock().unwrap().play_state
    }

    fn play_pause(&self) -> Result<(), ProbeError> {
        self.record("play_pause")
    }

    fn next_track(&self) -> Result<(), ProbeError> {
        self.record("next_track")
    }

    fn previous_track(&self) -> Result<(), ProbeError> {
        self.record("previous_track")
    }

    fn set_position(&self, seconds: f64) -> Result<(), ProbeError> {
        self.record(&format!("set_position {seconds}"))
    }

    fn set_volume(&self, volume: i64) -> Result<(), ProbeError> {
        self.record(&format!("set_volume {volume}"))
    }

    fn set_shuffle(&self, shuffle: bool) -> Result<(), ProbeError> {
        self.record(&format!("set_shuffle {shuffle}"))
    }

    fn play_item(&self, uri: &str, context_uri: Option<&str>) -> Result<(), ProbeError> {
        self.record(&format!("play_item {uri} {context_uri:?}"))
    }
}

#[derive(Default)]
struct MockRemote {
    /// Playback responses consumed front-to-back; the last one repeats.
    playbacks: Mutex<VecDeque<Option<CurrentPlayback>>>,
    playback_calls: Mutex<usize>,
    devices: Mutex<Vec<Device>>,
    saved_contains: Mutex<Vec<bool>>,
    no_active_device: Mutex<bool>,
    calls: Mutex<Vec<String>>,
}

impl MockRemote {
    fn with_playback(playback: Option<CurrentPlayback>) -> Self {
        let remote = Self::default();
        remote.playbacks.lock().unwrap().push_back(playback);
        remote
    }

    fn push_playback(&self, playback: Option<CurrentPlayback>) {
        self.playbacks.lock().unwrap().push_back(playback);
    }

    fn playback_calls(&self) -> usize {
        *self.playback_calls.lock().unwrap()
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &str) -> RemoteResult<()> {
        self.calls.lock().unwrap().push(call.to_owned());
        Ok(())
    }
}

#[async_trait::async_trait]
impl RemoteLibraryClient for MockRemote {
    async fn current_playback(&self) -> RemoteResult<Option<CurrentPlayback>> {
        *self.playback_calls.lock().unwrap() += 1;
        let mut playbacks = self.playbacks.lock().unwrap();
        if playbacks.len() > 1 {
            Ok(playbacks.pop_front().unwrap_or(None))
        } else {
            Ok(playbacks.front().cloned().unwrap_or(None))
        }
    }

    async fn available_devices(&self) -> RemoteResult<Vec<Device>> {
        Ok(self.devices.lock().unwrap().clone())
    }

    async fn queue(&self) -> RemoteResult<Vec<QueueItem>> {
        Ok(Vec::new())
    }

    async fn current_user(&self) -> RemoteResult<UserProfile> {
        Ok(UserProfile {
            id: "user".to_owned(),
            display_name: None,
        })
    }

    async fn playlists_page(&self, _limit: usize, offset: usize) -> RemoteResult<Page<Playlist>> {
        Ok(Page {
            items: Vec::new(),
            total: 0,
            offset,
        })
    }

    async fn saved_albums_page(
        &self,
        _limit: usize,
        offset: usize,
    ) -> RemoteResult<Page<SavedAlbum>> {
        Ok(Page {
            items: Vec::new(),
            total: 0,
            offset,
        })
    }

    async fn saved_tracks_page(
        &self,
        _limit: usize,
        offset: usize,
    ) -> RemoteResult<Page<CatalogTrack>> {
        Ok(Page {
            items: Vec::new(),
            total: 0,
            offset,
        })
    }

    async fn playlist_items_page(
        &self,
        _playlist_uri: &str,
        _limit: usize,
        offset: usize,
    ) -> RemoteResult<Page<CatalogTrack>> {
        Ok(Page {
            items: Vec::new(),
            total: 0,
            offset,
        })
    }

    async fn album_tracks_page(
        &self,
        _album_uri: &str,
        _limit: usize,
        offset: usize,
    ) -> RemoteResult<Page<CatalogTrack>> {
        Ok(Page {
            items: Vec::new(),
            total: 0,
            offset,
        })
    }

    async fn save_tracks(&self, uris: &[String]) -> RemoteResult<()> {
        self.record(&format!("save_tracks {}", uris.join(",")))
    }

    async fn remove_saved_tracks(&self, uris: &[String]) -> RemoteResult<()> {
        self.record(&format!("remove_saved_tracks {}", uris.join(",")))
    }

    async fn saved_tracks_contains(&self, uris: &[String]) -> RemoteResult<Vec<bool>> {
        let contains = self.saved_contains.lock().unwrap().clone();
        if contains.is_empty() {
            Ok(vec![false; uris.len()])
        } else {
            Ok(contains)
        }
    }

    async fn add_to_playlist(&self, playlist_uri: &str, uris: &[String]) -> RemoteResult<()> {
        self.record(&format!("add_to_playlist {playlist_uri} {}", uris.join(",")))
    }

    async fn remove_from_playlist(&self, playlist_uri: &str, uris: &[String]) -> RemoteResult<()> {
        self.record(&format!(
            "remove_from_playlist {playlist_uri} {}",
            uris.join(",")
        ))
    }

    async fn follow_playlist(&self, playlist_uri: &str) -> RemoteResult<()> {
        self.record(&format!("follow_playlist {playlist_uri}"))
    }

    async fn unfollow_playlist(&self, playlist_uri: &str) -> RemoteResult<()> {
        self.record(&format!("unfollow_playlist {playlist_uri}"))
    }

    async fn set_repeat(&self, mode: RepeatMode) -> RemoteResult<()> {
        self.record(&format!("set_repeat {mode:?}"))
    }

    async fn play_context(&self, context_uri: &str) -> RemoteResult<()> {
        if *self.no_active_device.lock().unwrap() {
            return Err(RemoteError::NoActiveDevice);
        }
        self.record(&format!("play_context {context_uri}"))
    }

    async fn transfer_playback(&self, device_id: &str, play: bool) -> RemoteResult<()> {
        self.record(&format!("transfer_playback {device_id} {play}"))
    }
}

#[derive(Default)]
struct MockNotifier {
    alerts: Mutex<Vec<Alert>>,
}

impl MockNotifier {
    fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }
}

impl NotificationSink for MockNotifier {
    fn notify(&self, alert: Alert) {
        self.alerts.lock().unwrap().push(alert);
    }
}

#[derive(Default)]
struct MockRecency {
    touches: Mutex<Vec<String>>,
}

impl RecencyLedger for MockRecency {
    fn touch_playlist(&self, uri: &str) {
        self.touches.lock().unwrap().push(format!("playlist {uri}"));
    }

    fn touch_album(&self, uri: &str) {
        self.touches.lock().unwrap().push(format!("album {uri}"));
    }
}

struct Fixture {
    probe: Arc<MockProbe>,
    remote: Arc<MockRemote>,
    notifier: Arc<MockNotifier>,
    recency: Arc<MockRecency>,
    engine: Arc<ReconciliationEngine>,
}

impl Fixture {
    fn new(probe: MockProbe, remote: MockRemote) -> Self {
        let probe = Arc::new(probe);
        let remote = Arc::new(remote);
        let notifier = Arc::new(MockNotifier::default());
        let engine = Arc::new(ReconciliationEngine::new(
            Arc::clone(&probe) as Arc<dyn LocalPlayerProbe>,
            Arc::clone(&remote) as Arc<dyn RemoteLibraryClient>,
            Arc::clone(&notifier) as Arc<dyn NotificationSink>,
            EngineConfig::default(),
        ));
        Self {
            probe,
            remote,
            notifier,
            recency: Arc::new(MockRecency::default()),
            engine,
        }
    }

    fn dispatcher(&self) -> CommandDispatcher {
        CommandDispatcher::new(
            Arc::clone(&self.engine),
            Arc::clone(&self.probe) as Arc<dyn LocalPlayerProbe>,
            Arc::clone(&self.remote) as Arc<dyn RemoteLibraryClient>,
            Arc::clone(&self.notifier) as Arc<dyn NotificationSink>,
            Arc::clone(&self.recency) as Arc<dyn RecencyLedger>,
        )
    }
}

// ----- convergence -----

#[tokio::test(start_paused = true)]
async fn agreeing_sources_converge_on_first_attempt() {
    let fx = Fixture::new(
        MockProbe::with_track("t1"),
        MockRemote::with_playback(Some(playback(Some(track_id("t1")), "spotify:playlist:p1"))),
    );

    let snapshot = fx.engine.converge().await;

    assert_eq!(fx.remote.playback_calls(), 1);
    assert_eq!(
        snapshot.context.map(|c| c.uri),
        Some("spotify:playlist:p1".to_owned())
    );
}

#[tokio::test(start_paused = true)]
async fn stale_remote_is_retried_with_backoff() {
    let remote = MockRemote::with_playback(Some(playback(
        Some(track_id("old")),
        "spotify:playlist:stale",
    )));
    remote.push_playback(Some(playback(Some(track_id("t1")), "spotify:playlist:p1")));
    let fx = Fixture::new(MockProbe::with_track("t1"), remote);

    let started = Instant::now();
    let snapshot = fx.engine.converge().await;
    let elapsed = started.elapsed();

    assert_eq!(fx.remote.playback_calls(), 2);
    assert_eq!(
        snapshot.context.map(|c| c.uri),
        Some("spotify:playlist:p1".to_owned())
    );
    // One 0.4 s backoff plus two grace periods.
    assert!(elapsed >= Duration::from_millis(400), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(1), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn permanent_disagreement_gives_up_with_null_context() {
    let fx = Fixture::new(
        MockProbe::with_track("private"),
        MockRemote::with_playback(Some(playback(
            Some(track_id("visible")),
            "spotify:playlist:p1",
        ))),
    );
    let mut events = fx.engine.subscribe();

    let snapshot = fx.engine.converge().await;

    assert_eq!(fx.remote.playback_calls(), 5);
    assert!(snapshot.context.is_none());
    let mut gave_up = false;
    while let Ok(event) = events.try_recv() {
        if event == PlaybackEvent::ContextSyncGaveUp {
            gave_up = true;
        }
    }
    assert!(gave_up);
    assert!(fx.notifier.alerts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn concurrent_convergences_coalesce_onto_one_fetch() {
    let fx = Fixture::new(
        MockProbe::with_track("t1"),
        MockRemote::with_playback(Some(playback(Some(track_id("t1")), "spotify:playlist:p1"))),
    );

    let (first, second) = tokio::join!(fx.engine.converge(), fx.engine.converge());

    assert_eq!(fx.remote.playback_calls(), 1);
    assert_eq!(first.context, second.context);
}

#[tokio::test(start_paused = true)]
async fn matching_advertisements_are_accepted() {
    let probe = MockProbe::with_track("x");
    probe.state.lock().unwrap().item = Some(item(
        Some(ResourceId {
            category: IdCategory::Ad,
            id: "ad-local".to_owned(),
        }),
        "Advertisement",
    ));
    let mut remote_playback = playback(Some(track_id("ad-remote")), "spotify:playlist:p1");
    remote_playback.is_ad = true;
    let fx = Fixture::new(probe, MockRemote::with_playback(Some(remote_playback)));

    let snapshot = fx.engine.converge().await;

    assert_eq!(fx.remote.playback_calls(), 1);
    assert!(snapshot.context.is_some());
}

// ----- periodic refresh -----

#[tokio::test(start_paused = true)]
async fn small_volume_and_position_drift_is_ignored() {
    let fx = Fixture::new(
        MockProbe::with_track("t1"),
        MockRemote::with_playback(Some(playback(Some(track_id("t1")), "spotify:playlist:p1"))),
    );
    fx.engine.tick().await;
    assert_eq!(fx.engine.snapshot().volume, Some(50));
    assert_eq!(fx.engine.snapshot().position_secs, Some(10.0));

    // One unit of volume and half a second of position: below the dead band.
    fx.probe.set_volumes(&[51]);
    fx.probe.state.lock().unwrap().position = Some(10.5);
    fx.engine.tick().await;
    assert_eq!(fx.engine.snapshot().volume, Some(50));
    assert_eq!(fx.engine.snapshot().position_secs, Some(10.0));

    // Past the dead band: applied.
    fx.probe.set_volumes(&[53]);
    fx.probe.state.lock().unwrap().position = Some(13.0);
    fx.engine.tick().await;
    assert_eq!(fx.engine.snapshot().volume, Some(53));
    assert_eq!(fx.engine.snapshot().position_secs, Some(13.0));
}

#[tokio::test(start_paused = true)]
async fn spurious_zero_volume_is_reread() {
    let fx = Fixture::new(
        MockProbe::with_track("t1"),
        MockRemote::with_playback(Some(playback(Some(track_id("t1")), "spotify:playlist:p1"))),
    );
    fx.probe.set_volumes(&[0, 0, 45]);

    fx.engine.tick().await;

    assert_eq!(fx.engine.snapshot().volume, Some(45));
}

#[tokio::test(start_paused = true)]
async fn persistent_zero_volume_is_accepted() {
    let fx = Fixture::new(
        MockProbe::with_track("t1"),
        MockRemote::with_playback(Some(playback(Some(track_id("t1")), "spotify:playlist:p1"))),
    );
    fx.probe.set_volumes(&[0]);

    fx.engine.tick().await;

    assert_eq!(fx.engine.snapshot().volume, Some(0));
}

#[tokio::test(start_paused = true)]
async fn manual_volume_adjustment_holds_off_periodic_updates() {
    let fx = Fixture::new(
        MockProbe::with_track("t1"),
        MockRemote::with_playback(Some(playback(Some(track_id("t1")), "spotify:playlist:p1"))),
    );
    let dispatcher = fx.dispatcher();

    dispatcher.set_volume(80);
    assert_eq!(fx.engine.snapshot().volume, Some(80));

    // The probe still reports the old reading; within the hold window the
    // periodic refresh must not clobber the user's adjustment.
    fx.probe.set_volumes(&[50]);
    fx.engine.tick().await;
    assert_eq!(fx.engine.snapshot().volume, Some(80));

    tokio::time::advance(Duration::from_secs(4)).await;
    fx.engine.tick().await;
    assert_eq!(fx.engine.snapshot().volume, Some(50));
}

#[tokio::test(start_paused = true)]
async fn item_change_resets_saved_state() {
    let remote =
        MockRemote::with_playback(Some(playback(Some(track_id("t1")), "spotify:playlist:p1")));
    *remote.saved_contains.lock().unwrap() = vec![true];
    let fx = Fixture::new(MockProbe::with_track("t1"), remote);

    fx.engine.update_player_state().await;
    assert_eq!(fx.engine.snapshot().saved, SavedState::Saved);

    let mut events = fx.engine.subscribe();
    fx.probe.state.lock().unwrap().item = Some(item(Some(track_id("t2")), "next"));
    fx.remote
        .push_playback(Some(playback(Some(track_id("t2")), "spotify:playlist:p1")));
    *fx.remote.saved_contains.lock().unwrap() = vec![false];

    fx.engine.update_player_state().await;

    assert_eq!(fx.engine.snapshot().saved, SavedState::NotSaved);
    let mut item_changed = false;
    while let Ok(event) = events.try_recv() {
        if let PlaybackEvent::ItemChanged { current, .. } = event {
            item_changed = current == Some(track_id("t2"));
        }
    }
    assert!(item_changed);
}

#[tokio::test(start_paused = true)]
async fn unusable_devices_are_filtered_out() {
    let remote =
        MockRemote::with_playback(Some(playback(Some(track_id("t1")), "spotify:playlist:p1")));
    *remote.devices.lock().unwrap() = vec![
        Device {
            id: Some("d1".to_owned()),
            name: "Desk".to_owned(),
            is_active: true,
            is_restricted: false,
        },
        Device {
            id: None,
            name: "Ghost".to_owned(),
            is_active: false,
            is_restricted: false,
        },
        Device {
            id: Some("d3".to_owned()),
            name: "TV".to_owned(),
            is_active: false,
            is_restricted: true,
        },
    ];
    let fx = Fixture::new(MockProbe::with_track("t1"), remote);

    let snapshot = fx.engine.update_player_state().await;

    assert_eq!(snapshot.devices.len(), 1);
    assert_eq!(snapshot.active_device().map(|d| d.name.as_str()), Some("Desk"));
}

// ----- dispatcher -----

#[tokio::test(start_paused = true)]
async fn toggle_save_undo_redo_round_trip() {
    let fx = Fixture::new(
        MockProbe::with_track("t1"),
        MockRemote::with_playback(Some(playback(Some(track_id("t1")), "spotify:playlist:p1"))),
    );
    fx.engine.update_player_state().await;
    let dispatcher = fx.dispatcher();

    dispatcher.toggle_save_current().await;
    dispatcher.undo().await;
    dispatcher.redo().await;

    assert_eq!(
        fx.remote.calls(),
        vec![
            "save_tracks spotify:track:t1",
            "remove_saved_tracks spotify:track:t1",
            "save_tracks spotify:track:t1",
        ]
    );
    assert!(dispatcher.can_undo());
    assert!(!dispatcher.can_redo());
}

#[tokio::test(start_paused = true)]
async fn adding_episode_to_liked_songs_is_rejected_locally() {
    let probe = MockProbe::with_track("x");
    probe.state.lock().unwrap().item = Some(item(Some(episode_id("e1")), "episode"));
    let fx = Fixture::new(
        probe,
        MockRemote::with_playback(Some(playback(Some(episode_id("e1")), "spotify:show:s1"))),
    );
    let dispatcher = fx.dispatcher();

    dispatcher
        .add_current_to_playlist("spotify:user:me:collection")
        .await;

    assert!(fx.remote.calls().is_empty());
    assert_eq!(fx.notifier.alerts().len(), 1);
    assert_eq!(fx.notifier.alerts()[0].title, "Not a Track");
    assert!(!dispatcher.can_undo());
}

#[tokio::test(start_paused = true)]
async fn adding_track_to_liked_songs_routes_to_saved_tracks() {
    let fx = Fixture::new(
        MockProbe::with_track("t1"),
        MockRemote::with_playback(Some(playback(Some(track_id("t1")), "spotify:playlist:p1"))),
    );
    fx.engine.update_player_state().await;
    let dispatcher = fx.dispatcher();

    dispatcher
        .add_current_to_playlist("spotify:user:me:collection")
        .await;

    assert_eq!(fx.remote.calls(), vec!["save_tracks spotify:track:t1"]);
}

#[tokio::test(start_paused = true)]
async fn local_track_cannot_be_added_to_playlists() {
    let probe = MockProbe::with_track("x");
    {
        let mut state = probe.state.lock().unwrap();
        let mut local = item(None, "bootleg");
        local.is_local = true;
        state.item = Some(local);
    }
    let fx = Fixture::new(probe, MockRemote::default());
    let dispatcher = fx.dispatcher();

    dispatcher
        .add_current_to_playlist("spotify:playlist:p1")
        .await;

    assert!(fx.remote.calls().is_empty());
    assert_eq!(fx.notifier.alerts().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn episode_skip_seeks_and_clamps() {
    let probe = MockProbe::with_track("x");
    {
        let mut state = probe.state.lock().unwrap();
        let mut episode = item(Some(episode_id("e1")), "episode");
        episode.duration_secs = Some(100.0);
        state.item = Some(episode);
        state.position = Some(95.0);
    }
    let fx = Fixture::new(
        probe,
        MockRemote::with_playback(Some(playback(Some(episode_id("e1")), "spotify:show:s1"))),
    );
    fx.engine.update_player_state().await;
    let dispatcher = fx.dispatcher();

    // 95 + 15 clamps to the 100 s duration.
    dispatcher.next_or_seek_forward().await;
    assert_eq!(fx.probe.commands(), vec!["set_position 100"]);
    assert_eq!(fx.engine.snapshot().position_secs, Some(100.0));

    // 5 - 15 clamps to zero.
    fx.probe.state.lock().unwrap().position = Some(5.0);
    fx.engine.update_player_state().await;
    dispatcher.previous_or_seek_backward().await;
    assert_eq!(
        fx.probe.commands(),
        vec!["set_position 100", "set_position 0"]
    );
}

#[tokio::test(start_paused = true)]
async fn playing_playlist_without_device_alerts_and_touches_recency() {
    let remote = MockRemote::default();
    *remote.no_active_device.lock().unwrap() = true;
    let fx = Fixture::new(MockProbe::with_track("t1"), remote);
    let dispatcher = fx.dispatcher();

    dispatcher.play_playlist("spotify:playlist:p1").await;

    assert_eq!(fx.notifier.alerts().len(), 1);
    assert_eq!(fx.notifier.alerts()[0].title, "No Active Device");
    assert_eq!(
        fx.recency.touches.lock().unwrap().clone(),
        vec!["playlist spotify:playlist:p1"]
    );
}

#[tokio::test(start_paused = true)]
async fn cycle_repeat_is_optimistic_and_forwarded() {
    let fx = Fixture::new(
        MockProbe::with_track("t1"),
        MockRemote::with_playback(Some(playback(Some(track_id("t1")), "spotify:playlist:p1"))),
    );
    let dispatcher = fx.dispatcher();

    dispatcher.cycle_repeat().await;

    assert_eq!(fx.engine.snapshot().repeat, RepeatMode::Context);
    assert_eq!(fx.remote.calls(), vec!["set_repeat Context"]);
}

#[tokio::test(start_paused = true)]
async fn queue_entry_without_uri_is_rejected() {
    let fx = Fixture::new(MockProbe::with_track("t1"), MockRemote::default());
    let dispatcher = fx.dispatcher();

    dispatcher.play_queue_item(None).await;

    assert!(fx.probe.commands().is_empty());
    assert_eq!(fx.notifier.alerts()[0].title, "Missing Data");
}
