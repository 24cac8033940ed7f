//! The library synchronization engine.

use crate::dates::{ModifiedDatesStore, RecencyKind};
use crate::queue::resolve_image_source;
use crate::sort::sort_by_recency;
use perch_artwork::ImageCache;
use perch_core::{
    is_saved_tracks_uri, saved_tracks_uri, Alert, IdCategory, NotificationSink, Playlist,
    QueueItem, RemoteLibraryClient, RemoteResult, ResourceId, SavedAlbum, UserProfile,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

const PAGE_LIMIT: usize = 50;

/// An empty queue result is retried this many times, with increasing delays.
const QUEUE_RETRIES: u32 = 2;
const QUEUE_RETRY_STEP: Duration = Duration::from_millis(500);

/// Construct the synthetic "Liked Songs" pseudo-playlist for a user.
///
/// It never exists upstream: no snapshot id, and mutation paths route it to
/// the saved-tracks endpoints. The item count is a placeholder.
pub fn liked_songs_playlist(user: &UserProfile) -> Playlist {
    Playlist {
        uri: saved_tracks_uri(&user.id),
        name: "Liked Songs".to_owned(),
        snapshot_id: None,
        owner_id: Some(user.id.clone()),
        item_count: 0,
        image_url: None,
        description: None,
    }
}

#[derive(Default)]
struct LibraryState {
    user: Option<UserProfile>,
    playlists: Vec<Playlist>,
    saved_albums: Vec<SavedAlbum>,
    queue: Vec<QueueItem>,
    did_retrieve_playlists: bool,
    did_retrieve_albums: bool,
    fetching_queue: bool,
}

/// Owns the in-memory playlist/album/queue collections and keeps them in
/// sync with the remote library.
///
/// Collections are replaced wholesale per refresh; a failed refresh leaves
/// the previous list untouched and surfaces one alert, never one per page.
pub struct LibrarySyncEngine {
    remote: Arc<dyn RemoteLibraryClient>,
    notifier: Arc<dyn NotificationSink>,
    dates: Arc<ModifiedDatesStore>,
    images: Arc<ImageCache>,
    state: Mutex<LibraryState>,
}

impl LibrarySyncEngine {
    pub fn new(
        remote: Arc<dyn RemoteLibraryClient>,
        notifier: Arc<dyn NotificationSink>,
        dates: Arc<ModifiedDatesStore>,
        images: Arc<ImageCache>,
    ) -> Self {
        Self {
            remote,
            notifier,
            dates,
            images,
            state: Mutex::new(LibraryState::default()),
        }
    }

    // ----- accessors -----

    pub fn user(&self) -> Option<UserProfile> {
        self.state.lock().unwrap().user.clone()
    }

    /// The full recency-sorted playlist collection, Liked Songs first.
    pub fn playlists(&self) -> Vec<Playlist> {
        self.state.lock().unwrap().playlists.clone()
    }

    /// The playlist collection under the "only show my playlists" filter:
    /// excludes every playlist owned by a different user; playlists without
    /// owner information are kept. Ordering is unchanged.
    pub fn visible_playlists(&self, only_mine: bool) -> Vec<Playlist> {
        let state = self.state.lock().unwrap();
        if !only_mine {
            return state.playlists.clone();
        }
        let user_id = state.user.as_ref().map(|user| user.id.clone());
        state
            .playlists
            .iter()
            .filter(|playlist| match &playlist.owner_id {
                Some(owner) => Some(owner) == user_id.as_ref(),
                None => true,
            })
            .cloned()
            .collect()
    }

    pub fn saved_albums(&self) -> Vec<SavedAlbum> {
        self.state.lock().unwrap().saved_albums.clone()
    }

    pub fn queue(&self) -> Vec<QueueItem> {
        self.state.lock().unwrap().queue.clone()
    }

    // ----- refresh -----

    /// Fetch the signed-in user's profile. Required before the synthetic
    /// Liked Songs playlist can be constructed.
    pub async fn refresh_user(&self) {
        match self.remote.current_user().await {
            Ok(user) => {
                info!(user = %user.id, "retrieved user profile");
                self.state.lock().unwrap().user = Some(user);
            }
            Err(err) if err.is_auth_expired() => self.handle_auth_expired().await,
            Err(err) => warn!(error = %err, "couldn't retrieve user profile"),
        }
    }

    /// Full paginated playlist refresh: fetch, recency-sort, prepend Liked
    /// Songs, replace the collection, and warm the cover cache.
    pub async fn refresh_playlists(&self) {
        let fetched = match self.fetch_all_playlists().await {
            Ok(fetched) => fetched,
            Err(err) => {
                self.surface_refresh_failure("Couldn't Retrieve Playlists", err).await;
                return;
            }
        };
        debug!(count = fetched.len(), "retrieved playlists");

        let mut playlists = fetched;
        sort_by_recency(&mut playlists, |playlist| {
            self.dates.modified_at(RecencyKind::Playlist, &playlist.uri)
        });
        if let Some(user) = self.user() {
            playlists.insert(0, liked_songs_playlist(&user));
        }

        let covers: Vec<(ResourceId, String)> = playlists
            .iter()
            .filter_map(|playlist| {
                let id = ResourceId::from_uri(&playlist.uri)?;
                Some((id, playlist.image_url.clone()?))
            })
            .collect();

        let uris: Vec<String> = playlists.iter().map(|playlist| playlist.uri.clone()).collect();
        {
            let mut state = self.state.lock().unwrap();
            state.playlists = playlists;
            state.did_retrieve_playlists = true;
        }

        futures::future::join_all(
            covers
                .iter()
                .map(|(id, url)| self.images.ensure_library_image(id, url)),
        )
        .await;

        if let Err(err) = self.dates.retain(RecencyKind::Playlist, &uris).await {
            warn!(error = %err, "couldn't prune playlist dates");
        }
        self.maybe_prune_images().await;
    }

    /// Full paginated saved-album refresh, mirroring
    /// [`refresh_playlists`](Self::refresh_playlists).
    pub async fn refresh_albums(&self) {
        let fetched = match self.fetch_all_albums().await {
            Ok(fetched) => fetched,
            Err(err) => {
                self.surface_refresh_failure("Couldn't Retrieve Albums", err).await;
                return;
            }
        };
        debug!(count = fetched.len(), "retrieved saved albums");

        let mut albums = fetched;
        sort_by_recency(&mut albums, |album| {
            self.dates.modified_at(RecencyKind::Album, &album.uri)
        });

        let covers: Vec<(ResourceId, String)> = albums
            .iter()
            .filter_map(|album| {
                let id = ResourceId::from_uri(&album.uri)?;
                Some((id, album.image_url.clone()?))
            })
            .collect();

        let uris: Vec<String> = albums.iter().map(|album| album.uri.clone()).collect();
        {
            let mut state = self.state.lock().unwrap();
            state.saved_albums = albums;
            state.did_retrieve_albums = true;
        }

        futures::future::join_all(
            covers
                .iter()
                .map(|(id, url)| self.images.ensure_library_image(id, url)),
        )
        .await;

        if let Err(err) = self.dates.retain(RecencyKind::Album, &uris).await {
            warn!(error = %err, "couldn't prune album dates");
        }
        self.maybe_prune_images().await;
    }

    /// Re-sort both collections in place using the current (staged +
    /// committed) dates. Called after a recency touch so the new order shows
    /// immediately, before any commit.
    pub fn resort(&self) {
        let mut state = self.state.lock().unwrap();
        let liked = if state
            .playlists
            .first()
            .is_some_and(|playlist| is_saved_tracks_uri(&playlist.uri))
        {
            Some(state.playlists.remove(0))
        } else {
            None
        };
        sort_by_recency(&mut state.playlists, |playlist| {
            self.dates.modified_at(RecencyKind::Playlist, &playlist.uri)
        });
        if let Some(liked) = liked {
            state.playlists.insert(0, liked);
        }
        sort_by_recency(&mut state.saved_albums, |album| {
            self.dates.modified_at(RecencyKind::Album, &album.uri)
        });
    }

    /// Fetch the playback queue, replacing it wholesale on success. A fetch
    /// already in flight suppresses the new request. An empty queue right
    /// after a command is often stale, so an empty result is retried twice
    /// with increasing delays and only the final result is published.
    /// Failures are logged, never alerted.
    pub async fn retrieve_queue(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if state.fetching_queue {
                return;
            }
            state.fetching_queue = true;
        }

        let mut result = self.remote.queue().await;
        for attempt in 1..=QUEUE_RETRIES {
            match &result {
                Ok(items) if items.is_empty() => {
                    debug!(attempt, "queue came back empty, retrying");
                    sleep(QUEUE_RETRY_STEP * attempt).await;
                    result = self.remote.queue().await;
                }
                _ => break,
            }
        }

        self.state.lock().unwrap().fetching_queue = false;
        match result {
            Ok(items) => {
                debug!(count = items.len(), "retrieved queue");
                self.state.lock().unwrap().queue = items.clone();
                self.retrieve_queue_images(&items).await;
            }
            Err(err) if err.is_auth_expired() => self.handle_auth_expired().await,
            Err(err) => warn!(error = %err, "couldn't retrieve queue"),
        }
    }

    /// Warm artwork for queue entries. Album covers already held by the
    /// library tier are reused; everything else goes to the ephemeral queue
    /// tier.
    async fn retrieve_queue_images(&self, items: &[QueueItem]) {
        let saved_albums: HashSet<String> = self
            .state
            .lock()
            .unwrap()
            .saved_albums
            .iter()
            .map(|album| album.uri.clone())
            .collect();

        let sources: Vec<_> = items.iter().filter_map(resolve_image_source).collect();
        futures::future::join_all(sources.iter().map(|source| async {
            if source.id.category == IdCategory::Album && saved_albums.contains(&source.id.uri()) {
                self.images.ensure_library_image(&source.id, &source.url).await;
            } else {
                let _ = self.images.queue_image(&source.id, &source.url).await;
            }
        }))
        .await;
    }

    /// Commit staged recency touches. Persistence failures are logged and
    /// the session continues on the in-memory map.
    pub async fn commit_dates(&self) {
        if let Err(err) = self.dates.commit().await {
            warn!(error = %err, "couldn't commit modified dates");
        }
    }

    /// Drop all local library state. Triggered by the upstream auth layer's
    /// expiry signal.
    pub async fn handle_auth_expired(&self) {
        info!("auth expired, clearing library state");
        {
            let mut state = self.state.lock().unwrap();
            *state = LibraryState::default();
        }
        if let Err(err) = self.dates.clear().await {
            warn!(error = %err, "couldn't clear modified dates");
        }
        self.images.clear();
    }

    // ----- internals -----

    /// Sweep on-disk covers not referenced by the current library, once both
    /// collections have been retrieved at least once this session. The cache
    /// itself rate-limits the sweep.
    async fn maybe_prune_images(&self) {
        let ids: HashSet<ResourceId> = {
            let state = self.state.lock().unwrap();
            if !(state.did_retrieve_playlists && state.did_retrieve_albums) {
                return;
            }
            state
                .playlists
                .iter()
                .map(|playlist| playlist.uri.as_str())
                .chain(state.saved_albums.iter().map(|album| album.uri.as_str()))
                .filter_map(ResourceId::from_uri)
                .collect()
        };
        self.images.prune_unused(&ids).await;
    }

    async fn fetch_all_playlists(&self) -> RemoteResult<Vec<Playlist>> {
        let first = self.remote.playlists_page(PAGE_LIMIT, 0).await?;
        let total = first.total;
        let mut items = first.items;
        if total > PAGE_LIMIT {
            let pages = futures::future::try_join_all(
                (PAGE_LIMIT..total)
                    .step_by(PAGE_LIMIT)
                    .map(|offset| self.remote.playlists_page(PAGE_LIMIT, offset)),
            )
            .await?;
            for page in pages {
                items.extend(page.items);
            }
        }
        Ok(items)
    }

    async fn fetch_all_albums(&self) -> RemoteResult<Vec<SavedAlbum>> {
        let first = self.remote.saved_albums_page(PAGE_LIMIT, 0).await?;
        let total = first.total;
        let mut items = first.items;
        if total > PAGE_LIMIT {
            let pages = futures::future::try_join_all(
                (PAGE_LIMIT..total)
                    .step_by(PAGE_LIMIT)
                    .map(|offset| self.remote.saved_albums_page(PAGE_LIMIT, offset)),
            )
            .await?;
            for page in pages {
                items.extend(page.items);
            }
        }
        Ok(items)
    }

    async fn surface_refresh_failure(&self, title: &str, err: perch_core::RemoteError) {
        if err.is_auth_expired() {
            self.handle_auth_expired().await;
            return;
        }
        warn!(error = %err, "{title}");
        self.notifier.notify(Alert::new(title, err.to_string()));
    }
}
