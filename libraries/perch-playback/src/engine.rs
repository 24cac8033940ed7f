//! Playback-state reconciliation engine.
//!
//! Owns the canonical [`PlaybackSnapshot`] and runs the context-sync protocol
//! between the local player probe and the remote Web API. The two sources are
//! asynchronously-updating replicas with no shared transaction: right after a
//! locally issued command (e.g. skip) the remote API still reports the
//! previous playback for a few hundred milliseconds, so identity disagreement
//! is expected and retried with linearly increasing backoff. Permanent
//! disagreement (e.g. private-session playback invisible to the API) must not
//! wedge the caller, so after a bounded number of attempts the engine gives
//! up and publishes a null context.

use crate::snapshot::{PlaybackSnapshot, SavedState};
use perch_core::{
    Alert, CurrentPlayback, IdCategory, LocalPlayerProbe, NotificationSink, PlayState,
    RemoteError, RemoteLibraryClient, ResourceId,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, trace, warn};

/// Tunables for the convergence protocol and the periodic refresh path.
///
/// The retry step (0.4 s x attempt) and the cap of 5 attempts are tuned
/// against observed remote API lag; treat them as tunable, not load-bearing.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Wait before each remote currently-playing fetch, letting the remote
    /// catch up to a just-issued local command.
    pub grace_period: Duration,
    /// Disagreement backoff is `retry_step * attempt`.
    pub retry_step: Duration,
    /// Attempts before giving up and publishing a null context.
    pub max_attempts: u32,
    /// How long a manual volume/position adjustment suppresses periodic
    /// updates of that field.
    pub manual_hold: Duration,
    /// Minimum volume delta (units) the periodic path will apply.
    pub volume_deadband: i64,
    /// Minimum position delta (seconds) the periodic path will apply.
    pub position_deadband_secs: f64,
    /// A volume reading of exactly zero right after a track change can be
    /// spurious; re-read up to this many times before trusting it.
    pub zero_volume_rereads: u32,
    pub zero_volume_gap: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_millis(100),
            retry_step: Duration::from_millis(400),
            max_attempts: 5,
            manual_hold: Duration::from_secs(3),
            volume_deadband: 2,
            position_deadband_secs: 1.0,
            zero_volume_rereads: 3,
            zero_volume_gap: Duration::from_millis(100),
        }
    }
}

/// Events broadcast by the engine after snapshot mutations.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    /// The snapshot changed in some way.
    SnapshotUpdated,
    /// The current item's identity changed.
    ItemChanged {
        previous: Option<ResourceId>,
        current: Option<ResourceId>,
    },
    /// The current item's artwork URL changed.
    ArtworkUrlChanged,
    /// Convergence exhausted its retries; the context is now null.
    ContextSyncGaveUp,
}

#[derive(Debug)]
enum ConvergenceOutcome {
    /// Both sources agree (or both report an ad); context accepted.
    Accepted(Option<CurrentPlayback>),
    /// Retries exhausted with the sources still disagreeing.
    GaveUp,
    Failed(RemoteError),
}

struct EngineInner {
    snapshot: PlaybackSnapshot,
    syncing: bool,
    previous_artwork_url: Option<String>,
    last_volume_adjust: Option<Instant>,
    last_position_adjust: Option<Instant>,
    checking_saved: bool,
    fetching_devices: bool,
}

/// Converges the local probe and the remote API into one snapshot.
///
/// Single-writer: every snapshot mutation happens under this engine's lock.
/// Concurrent [`converge`](Self::converge) calls are coalesced onto the
/// in-flight convergence instead of racing a second remote fetch.
pub struct ReconciliationEngine {
    probe: Arc<dyn LocalPlayerProbe>,
    remote: Arc<dyn RemoteLibraryClient>,
    notifier: Arc<dyn NotificationSink>,
    config: EngineConfig,
    inner: Mutex<EngineInner>,
    /// Generation counter bumped when an in-flight convergence completes;
    /// coalesced callers wait on it.
    converged: watch::Sender<u64>,
    events: broadcast::Sender<PlaybackEvent>,
}

impl ReconciliationEngine {
    pub fn new(
        probe: Arc<dyn LocalPlayerProbe>,
        remote: Arc<dyn RemoteLibraryClient>,
        notifier: Arc<dyn NotificationSink>,
        config: EngineConfig,
    ) -> Self {
        let (converged, _) = watch::channel(0);
        let (events, _) = broadcast::channel(64);
        Self {
            probe,
            remote,
            notifier,
            config,
            inner: Mutex::new(EngineInner {
                snapshot: PlaybackSnapshot::default(),
                syncing: false,
                previous_artwork_url: None,
                last_volume_adjust: None,
                last_position_adjust: None,
                checking_saved: false,
                fetching_devices: false,
            }),
            converged,
            events,
        }
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.inner.lock().unwrap().snapshot.clone()
    }

    /// Subscribe to snapshot change events.
    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    /// Full refresh triggered by a user action or a player-state change
    /// notification: devices, probe-local fields, saved state, and a
    /// convergence cycle.
    pub async fn update_player_state(&self) -> PlaybackSnapshot {
        self.update(false).await
    }

    /// Periodic (timer) refresh. Identical to
    /// [`update_player_state`](Self::update_player_state) except that errors
    /// are never alerted (one alert per user action, not one per tick) and
    /// position updates honor the manual-scrub hold.
    pub async fn tick(&self) -> PlaybackSnapshot {
        self.update(true).await
    }

    /// Spawn the 2-second player-state refresh loop. Cancelled by aborting
    /// or dropping the returned handle (session teardown).
    pub fn run_periodic(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                engine.tick().await;
                sleep(interval).await;
            }
        })
    }

    async fn update(&self, from_timer: bool) -> PlaybackSnapshot {
        trace!(from_timer, "updating player state");

        self.refresh_devices().await;
        self.refresh_local_identity();
        self.refresh_sound_volume().await;
        self.refresh_position(from_timer);
        self.check_current_saved().await;
        self.converge_inner(from_timer).await
    }

    /// Run (or join) a convergence cycle and return the resulting snapshot.
    ///
    /// At most one remote currently-playing fetch is in flight; concurrent
    /// callers are deferred onto its result.
    pub async fn converge(&self) -> PlaybackSnapshot {
        self.converge_inner(false).await
    }

    async fn converge_inner(&self, from_timer: bool) -> PlaybackSnapshot {
        // Subscribe before checking the flag so a completion between the
        // check and the wait is never missed.
        let mut done = self.converged.subscribe();
        let already_syncing = {
            let mut inner = self.inner.lock().unwrap();
            if inner.syncing {
                true
            } else {
                inner.syncing = true;
                false
            }
        };
        if already_syncing {
            trace!("convergence already in flight, coalescing");
            let _ = done.changed().await;
            return self.snapshot();
        }

        let outcome = self.run_convergence().await;
        let snapshot = self.apply_outcome(outcome, from_timer);

        self.inner.lock().unwrap().syncing = false;
        self.converged.send_modify(|generation| *generation += 1);
        let _ = self.events.send(PlaybackEvent::SnapshotUpdated);
        snapshot
    }

    async fn run_convergence(&self) -> ConvergenceOutcome {
        for attempt in 1..=self.config.max_attempts {
            // The remote API reflects state with material lag right after a
            // locally issued command; an immediate fetch reads stale data.
            sleep(self.config.grace_period).await;

            let playback = match self.remote.current_playback().await {
                Ok(playback) => playback,
                Err(err) => return ConvergenceOutcome::Failed(err),
            };

            let local_id = self.probe.current_item().and_then(|item| item.id);
            let remote_id = playback
                .as_ref()
                .and_then(|p| p.item.as_ref())
                .and_then(|item| item.id.clone());

            let identities_match = match (&remote_id, &local_id) {
                (Some(remote), Some(local)) => remote == local,
                // Neither source reports an identity: nothing is playing, or
                // a local file (no catalog id) on both sides.
                (None, None) => true,
                _ => false,
            };

            // Ad identities cannot be compared; accept when both sources
            // report an advertisement.
            let both_ads = playback.as_ref().is_some_and(|p| p.is_ad)
                && local_id
                    .as_ref()
                    .is_some_and(|id| id.category == IdCategory::Ad);

            if identities_match || both_ads {
                trace!(attempt, "sources agree, accepting context");
                return ConvergenceOutcome::Accepted(playback);
            }

            let delay = self.config.retry_step * attempt;
            warn!(
                attempt,
                ?remote_id,
                ?local_id,
                delay_ms = delay.as_millis() as u64,
                "sources disagree on current item"
            );
            if attempt < self.config.max_attempts {
                sleep(delay).await;
            }
        }
        ConvergenceOutcome::GaveUp
    }

    fn apply_outcome(&self, outcome: ConvergenceOutcome, from_timer: bool) -> PlaybackSnapshot {
        match outcome {
            ConvergenceOutcome::Accepted(playback) => {
                let mut inner = self.inner.lock().unwrap();
                match playback {
                    Some(playback) => {
                        inner.snapshot.context = playback.context;
                        inner.snapshot.repeat = playback.repeat;
                    }
                    None => inner.snapshot.context = None,
                }
                inner.snapshot.clone()
            }
            ConvergenceOutcome::GaveUp => {
                debug!("convergence retries exhausted, publishing null context");
                let snapshot = {
                    let mut inner = self.inner.lock().unwrap();
                    inner.snapshot.context = None;
                    inner.snapshot.clone()
                };
                let _ = self.events.send(PlaybackEvent::ContextSyncGaveUp);
                snapshot
            }
            ConvergenceOutcome::Failed(err) => {
                if err.is_auth_expired() {
                    return self.handle_auth_expired();
                }
                warn!(error = %err, "couldn't get currently playing context");
                if !from_timer {
                    self.notifier.notify(Alert::new(
                        "Couldn't Retrieve Playback State",
                        err.to_string(),
                    ));
                }
                let mut inner = self.inner.lock().unwrap();
                inner.snapshot.context = None;
                inner.snapshot.clone()
            }
        }
    }

    /// Refresh the available-device set. Suppressed while a fetch is already
    /// in flight; failures are logged, never alerted.
    async fn refresh_devices(&self) {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.fetching_devices {
                return;
            }
            inner.fetching_devices = true;
        }

        let result = self.remote.available_devices().await;

        let mut inner = self.inner.lock().unwrap();
        inner.fetching_devices = false;
        match result {
            Ok(devices) => {
                inner.snapshot.devices = devices
                    .into_iter()
                    .filter(|device| device.is_usable())
                    .collect();
            }
            Err(err) => {
                drop(inner);
                if err.is_auth_expired() {
                    self.handle_auth_expired();
                } else {
                    debug!(error = %err, "couldn't retrieve available devices");
                }
            }
        }
    }

    /// Re-read the probe's identity, play state, shuffle, and artwork URL.
    fn refresh_local_identity(&self) {
        let item = self.probe.current_item();
        let play_state = self.probe.play_state();
        let shuffling = self.probe.is_shuffling();

        let mut events = Vec::new();
        {
            let mut inner = self.inner.lock().unwrap();

            let previous_id = inner.snapshot.item.as_ref().and_then(|i| i.id.clone());
            let current_id = item.as_ref().and_then(|i| i.id.clone());
            if previous_id != current_id {
                // The saved flag refers to the previous item; unknown until
                // the remote check lands.
                inner.snapshot.saved = SavedState::Unknown;
                events.push(PlaybackEvent::ItemChanged {
                    previous: previous_id,
                    current: current_id,
                });
            }

            let artwork_url = item.as_ref().and_then(|i| i.artwork_url.clone());
            if artwork_url != inner.snapshot.item.as_ref().and_then(|i| i.artwork_url.clone())
                && inner.previous_artwork_url != artwork_url
            {
                events.push(PlaybackEvent::ArtworkUrlChanged);
            }
            inner.previous_artwork_url = artwork_url;

            if let Some(item) = &item {
                inner.snapshot.duration_secs = item.duration_secs;
            }
            inner.snapshot.item = item;
            if let Some(play_state) = play_state {
                inner.snapshot.play_state = play_state;
            } else {
                inner.snapshot.play_state = PlayState::Stopped;
            }
            if let Some(shuffling) = shuffling {
                inner.snapshot.shuffled = shuffling;
            }
        }
        for event in events {
            let _ = self.events.send(event);
        }
    }

    /// Refresh the sound volume with dead-band filtering and the
    /// spurious-zero re-read loop.
    async fn refresh_sound_volume(&self) {
        let Some(mut volume) = self.probe.volume() else {
            // Probe unreachable: mark the dependent field unknown.
            self.inner.lock().unwrap().snapshot.volume = None;
            return;
        };

        // The probe can report a spurious zero immediately after a track
        // change; re-read before trusting it.
        let mut rereads = 0;
        while volume == 0 && rereads < self.config.zero_volume_rereads {
            rereads += 1;
            trace!(rereads, "re-reading zero volume");
            sleep(self.config.zero_volume_gap).await;
            match self.probe.volume() {
                Some(next) => volume = next,
                None => {
                    self.inner.lock().unwrap().snapshot.volume = None;
                    return;
                }
            }
        }

        let mut inner = self.inner.lock().unwrap();
        if let Some(adjusted) = inner.last_volume_adjust {
            if adjusted.elapsed() < self.config.manual_hold {
                trace!("volume was manually adjusted recently, skipping");
                return;
            }
        }
        match inner.snapshot.volume {
            Some(current) if (volume - current).abs() < self.config.volume_deadband => {}
            _ => {
                trace!(volume, "updating sound volume");
                inner.snapshot.volume = Some(volume);
            }
        }
    }

    /// Refresh the playback position. When triggered by the periodic timer,
    /// a recent manual scrub suppresses the update.
    fn refresh_position(&self, from_timer: bool) {
        let Some(position) = self.probe.position() else {
            self.inner.lock().unwrap().snapshot.position_secs = None;
            return;
        };

        let mut inner = self.inner.lock().unwrap();
        if from_timer {
            if let Some(adjusted) = inner.last_position_adjust {
                if adjusted.elapsed() < self.config.manual_hold {
                    trace!("position was manually adjusted recently, skipping");
                    return;
                }
            }
        }
        match inner.snapshot.position_secs {
            Some(current) if (position - current).abs() <= self.config.position_deadband_secs => {}
            _ => inner.snapshot.position_secs = Some(position),
        }
    }

    /// Check whether the current track is in the user's saved tracks.
    /// Suppressed while a check is already in flight; only tracks can be
    /// saved, everything else reports `NotSaved`.
    async fn check_current_saved(&self) {
        let uri = {
            let mut inner = self.inner.lock().unwrap();
            if inner.checking_saved {
                return;
            }
            let id = inner.snapshot.item.as_ref().and_then(|item| item.id.clone());
            match id {
                Some(id) if id.category == IdCategory::Track => {
                    inner.checking_saved = true;
                    id.uri()
                }
                _ => {
                    inner.snapshot.saved = SavedState::NotSaved;
                    return;
                }
            }
        };

        let result = self.remote.saved_tracks_contains(&[uri]).await;

        let mut inner = self.inner.lock().unwrap();
        inner.checking_saved = false;
        match result {
            Ok(results) => {
                if let Some(saved) = results.first() {
                    inner.snapshot.saved = if *saved {
                        SavedState::Saved
                    } else {
                        SavedState::NotSaved
                    };
                }
            }
            Err(err) => {
                drop(inner);
                if err.is_auth_expired() {
                    self.handle_auth_expired();
                } else {
                    debug!(error = %err, "couldn't check saved state");
                }
            }
        }
    }

    /// Full local-state reset after the upstream auth layer reports an
    /// expired session.
    pub fn handle_auth_expired(&self) -> PlaybackSnapshot {
        debug!("auth expired, resetting playback snapshot");
        let snapshot = {
            let mut inner = self.inner.lock().unwrap();
            inner.snapshot = PlaybackSnapshot::default();
            inner.previous_artwork_url = None;
            inner.last_volume_adjust = None;
            inner.last_position_adjust = None;
            inner.snapshot.clone()
        };
        let _ = self.events.send(PlaybackEvent::SnapshotUpdated);
        snapshot
    }

    /// Record a manual volume adjustment; suppresses periodic volume updates
    /// for the configured hold.
    pub fn mark_volume_adjusted(&self) {
        self.inner.lock().unwrap().last_volume_adjust = Some(Instant::now());
    }

    /// Record a manual scrub; suppresses timer-driven position updates for
    /// the configured hold.
    pub fn mark_position_adjusted(&self) {
        self.inner.lock().unwrap().last_position_adjust = Some(Instant::now());
    }

    /// Apply an optimistic mutation from the command dispatcher. Crate-local
    /// so the single-writer rule holds.
    pub(crate) fn mutate(&self, apply: impl FnOnce(&mut PlaybackSnapshot)) {
        {
            let mut inner = self.inner.lock().unwrap();
            apply(&mut inner.snapshot);
        }
        let _ = self.events.send(PlaybackEvent::SnapshotUpdated);
    }
}
