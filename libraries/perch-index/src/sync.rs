//! The index synchronization protocol.

use crate::error::{IndexError, Result};
use crate::store::DocumentStore;
use perch_artwork::ImageCache;
use perch_core::{
    is_saved_tracks_uri, CatalogTrack, DocumentKind, Playlist, RemoteLibraryClient, ResourceId,
    SavedAlbum, SearchDocument, SearchSink,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};

const PAGE_LIMIT: usize = 50;

/// Which document categories are indexed into the search sink. Local rows
/// are maintained regardless (they carry linkage and snapshot ids); settings
/// only gate sink emission and content fetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSettings {
    pub playlists: bool,
    pub albums: bool,
    pub playlist_items: bool,
    pub album_tracks: bool,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            playlists: true,
            albums: true,
            playlist_items: true,
            album_tracks: true,
        }
    }
}

/// Per-phase progress weights, renormalized over the enabled phases.
struct PhaseWeights {
    playlists: f64,
    albums: f64,
    playlist_items: f64,
    album_tracks: f64,
}

impl PhaseWeights {
    fn new(settings: &IndexSettings) -> Self {
        let raw = [
            (settings.playlists, 0.1),
            (settings.albums, 0.1),
            (settings.playlist_items, 0.4),
            (settings.album_tracks, 0.4),
        ];
        let total: f64 = raw
            .iter()
            .filter(|(enabled, _)| *enabled)
            .map(|(_, weight)| weight)
            .sum();
        let normalize = |enabled: bool, weight: f64| {
            if enabled && total > 0.0 {
                weight / total
            } else {
                0.0
            }
        };
        Self {
            playlists: normalize(settings.playlists, 0.1),
            albums: normalize(settings.albums, 0.1),
            playlist_items: normalize(settings.playlist_items, 0.4),
            album_tracks: normalize(settings.album_tracks, 0.4),
        }
    }
}

/// What one index cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSummary {
    pub playlists: usize,
    pub albums: usize,
    pub playlist_items: usize,
    pub album_tracks: usize,
    /// Playlists skipped because their snapshot id was unchanged.
    pub skipped_playlists: usize,
    pub deleted: usize,
}

/// Keeps the search sink and the document store in lockstep with the remote
/// library.
pub struct SearchIndexSync {
    remote: Arc<dyn RemoteLibraryClient>,
    store: Arc<DocumentStore>,
    sink: Arc<dyn SearchSink>,
    images: Arc<ImageCache>,
    settings: Mutex<IndexSettings>,
    progress: watch::Sender<f64>,
    last_index: Mutex<Option<Instant>>,
    reindex_interval: Duration,
}

impl SearchIndexSync {
    pub fn new(
        remote: Arc<dyn RemoteLibraryClient>,
        store: Arc<DocumentStore>,
        sink: Arc<dyn SearchSink>,
        images: Arc<ImageCache>,
        reindex_interval: Duration,
    ) -> Self {
        let (progress, _) = watch::channel(0.0);
        Self {
            remote,
            store,
            sink,
            images,
            settings: Mutex::new(IndexSettings::default()),
            progress,
            last_index: Mutex::new(None),
            reindex_interval,
        }
    }

    /// Entity thumbnails reference the cached cover on disk, not the remote
    /// URL, so the search surface renders without a network round trip.
    fn entity_thumbnail(&self, uri: &str) -> Option<String> {
        let id = ResourceId::from_uri(uri)?;
        Some(self.images.disk_path(&id).to_string_lossy().into_owned())
    }

    /// Observe the current cycle's progress fraction in `[0, 1]`.
    pub fn subscribe_progress(&self) -> watch::Receiver<f64> {
        self.progress.subscribe()
    }

    pub fn settings(&self) -> IndexSettings {
        *self.settings.lock().unwrap()
    }

    /// Apply new settings. Categories that were just disabled have their
    /// documents removed from the sink; local rows are kept so a later
    /// re-enable still benefits from snapshot skipping.
    pub async fn update_settings(&self, new: IndexSettings) -> Result<()> {
        let old = {
            let mut settings = self.settings.lock().unwrap();
            std::mem::replace(&mut *settings, new)
        };
        let transitions = [
            (old.playlists, new.playlists, DocumentKind::Playlist),
            (old.albums, new.albums, DocumentKind::Album),
            (old.playlist_items, new.playlist_items, DocumentKind::PlaylistItem),
            (old.album_tracks, new.album_tracks, DocumentKind::AlbumTrack),
        ];
        for (was, now, kind) in transitions {
            if was && !now {
                debug!(kind = kind.domain(), "removing disabled domain from sink");
                self.sink
                    .delete_domain(kind)
                    .await
                    .map_err(IndexError::Sink)?;
            }
        }
        Ok(())
    }

    /// Run an index cycle unless one completed within the reindex interval.
    pub async fn index_if_needed(
        &self,
        playlists: &[Playlist],
        albums: &[SavedAlbum],
    ) -> Result<Option<IndexSummary>> {
        {
            let mut last_index = self.last_index.lock().unwrap();
            if let Some(at) = *last_index {
                if at.elapsed() < self.reindex_interval {
                    return Ok(None);
                }
            }
            *last_index = Some(Instant::now());
        }
        self.index(playlists, albums).await.map(Some)
    }

    /// One full index cycle over the collections the library engine fetched.
    ///
    /// Entity phases run first (upsert + stale-row deletion), then both
    /// content phases concurrently, then the orphan/unobserved sweep. The
    /// sweep never runs before both content phases have finished.
    pub async fn index(
        &self,
        playlists: &[Playlist],
        albums: &[SavedAlbum],
    ) -> Result<IndexSummary> {
        let settings = self.settings();
        let weights = PhaseWeights::new(&settings);
        let _ = self.progress.send(0.0);
        let mut summary = IndexSummary::default();

        // Snapshot ids as of the previous successful sync, read before any
        // row is touched this cycle.
        let mut previous_snapshots: HashMap<String, Option<String>> = HashMap::new();
        for playlist in playlists {
            previous_snapshots.insert(
                playlist.uri.clone(),
                self.store.snapshot_id(&playlist.uri).await?,
            );
        }

        summary.playlists = self.sync_playlist_entities(playlists, &settings).await?;
        self.advance(weights.playlists);

        summary.albums = self.sync_album_entities(albums, &settings).await?;
        self.advance(weights.albums);

        let observed = Mutex::new(HashSet::new());
        let (items, tracks) = tokio::join!(
            self.sync_playlist_items(playlists, &settings, &weights, &observed, &previous_snapshots),
            self.sync_album_tracks(albums, &settings, &weights, &observed),
        );
        let (playlist_items, skipped_playlists) = items?;
        summary.playlist_items = playlist_items;
        summary.skipped_playlists = skipped_playlists;
        summary.album_tracks = tracks?;

        summary.deleted += self.sweep_items(&observed.into_inner().unwrap()).await?;
        let _ = self.progress.send(1.0);

        info!(
            playlists = summary.playlists,
            albums = summary.albums,
            playlist_items = summary.playlist_items,
            album_tracks = summary.album_tracks,
            skipped = summary.skipped_playlists,
            deleted = summary.deleted,
            "index cycle complete"
        );
        Ok(summary)
    }

    /// Forget everything, sink included. Used on sign-out.
    pub async fn clear(&self) -> Result<()> {
        self.store.delete_all().await?;
        self.sink.delete_all().await.map_err(IndexError::Sink)?;
        *self.last_index.lock().unwrap() = None;
        let _ = self.progress.send(0.0);
        Ok(())
    }

    // ----- phases -----

    async fn sync_playlist_entities(
        &self,
        playlists: &[Playlist],
        settings: &IndexSettings,
    ) -> Result<usize> {
        let mut documents = Vec::with_capacity(playlists.len());
        for playlist in playlists {
            let document = playlist_document(playlist, self.entity_thumbnail(&playlist.uri));
            self.store.upsert_entity(&document).await?;
            documents.push(document);
        }
        if settings.playlists && !documents.is_empty() {
            self.sink
                .index_documents(&documents)
                .await
                .map_err(IndexError::Sink)?;
        }

        let fresh: HashSet<&str> = playlists.iter().map(|p| p.uri.as_str()).collect();
        let stale: Vec<String> = self
            .store
            .uris_of_kind(DocumentKind::Playlist)
            .await?
            .into_iter()
            .filter(|uri| !fresh.contains(uri.as_str()))
            .collect();
        for uri in &stale {
            // Items of a deleted playlist lose their linkage and fall to the
            // end-of-cycle sweep.
            self.store.detach_playlist(uri).await?;
        }
        self.delete_documents(&stale).await?;
        Ok(documents.len())
    }

    async fn sync_album_entities(
        &self,
        albums: &[SavedAlbum],
        settings: &IndexSettings,
    ) -> Result<usize> {
        let mut documents = Vec::with_capacity(albums.len());
        for album in albums {
            let document = album_document(album, self.entity_thumbnail(&album.uri));
            self.store.upsert_entity(&document).await?;
            documents.push(document);
        }
        if settings.albums && !documents.is_empty() {
            self.sink
                .index_documents(&documents)
                .await
                .map_err(IndexError::Sink)?;
        }

        let fresh: HashSet<&str> = albums.iter().map(|a| a.uri.as_str()).collect();
        let stale: Vec<String> = self
            .store
            .uris_of_kind(DocumentKind::Album)
            .await?
            .into_iter()
            .filter(|uri| !fresh.contains(uri.as_str()))
            .collect();
        for uri in &stale {
            self.store.detach_album(uri).await?;
        }
        self.delete_documents(&stale).await?;
        Ok(documents.len())
    }

    /// Content sync for playlists. A playlist whose snapshot id matches the
    /// one recorded at the last successful sync is skipped; its existing item
    /// URIs still count as observed so the sweep leaves them alone.
    async fn sync_playlist_items(
        &self,
        playlists: &[Playlist],
        settings: &IndexSettings,
        weights: &PhaseWeights,
        observed: &Mutex<HashSet<String>>,
        previous_snapshots: &HashMap<String, Option<String>>,
    ) -> Result<(usize, usize)> {
        if !settings.playlist_items {
            // Disabled phase: its existing documents are not sweep candidates.
            for playlist in playlists {
                let existing = self.store.item_uris_for_playlist(&playlist.uri).await?;
                observed.lock().unwrap().extend(existing);
            }
            return Ok((0, 0));
        }

        let step = if playlists.is_empty() {
            0.0
        } else {
            weights.playlist_items / playlists.len() as f64
        };
        let mut indexed = 0;
        let mut skipped = 0;
        for playlist in playlists {
            let unchanged = playlist.snapshot_id.is_some()
                && previous_snapshots.get(&playlist.uri)
                    == Some(&playlist.snapshot_id);
            if unchanged {
                debug!(uri = %playlist.uri, "snapshot unchanged, skipping items");
                let existing = self.store.item_uris_for_playlist(&playlist.uri).await?;
                observed.lock().unwrap().extend(existing);
                skipped += 1;
            } else {
                let items = self.fetch_playlist_items(&playlist.uri).await?;
                self.store.detach_playlist(&playlist.uri).await?;

                let mut documents = Vec::new();
                for item in &items {
                    let Some(document) = item_document(item, DocumentKind::PlaylistItem) else {
                        continue;
                    };
                    self.store
                        .upsert_playlist_item(&document, &playlist.uri)
                        .await?;
                    observed.lock().unwrap().insert(document.uri.clone());
                    documents.push(document);
                }
                indexed += documents.len();
                if !documents.is_empty() {
                    self.sink
                        .index_documents(&documents)
                        .await
                        .map_err(IndexError::Sink)?;
                }
                self.store
                    .set_snapshot_id(&playlist.uri, playlist.snapshot_id.as_deref())
                    .await?;
            }
            self.advance(step);
        }
        Ok((indexed, skipped))
    }

    /// Content sync for albums. Albums carry no change token upstream, so
    /// they are always fully re-synced.
    async fn sync_album_tracks(
        &self,
        albums: &[SavedAlbum],
        settings: &IndexSettings,
        weights: &PhaseWeights,
        observed: &Mutex<HashSet<String>>,
    ) -> Result<usize> {
        if !settings.album_tracks {
            let rows = self.store.item_rows().await?;
            let mut observed = observed.lock().unwrap();
            for row in rows {
                if row.album_uri.is_some() {
                    observed.insert(row.uri);
                }
            }
            return Ok(0);
        }

        let step = if albums.is_empty() {
            0.0
        } else {
            weights.album_tracks / albums.len() as f64
        };
        let mut indexed = 0;
        for album in albums {
            let tracks = self.fetch_album_tracks(&album.uri).await?;
            self.store.detach_album(&album.uri).await?;

            let mut documents = Vec::new();
            for track in &tracks {
                let Some(document) = item_document(track, DocumentKind::AlbumTrack) else {
                    continue;
                };
                self.store.upsert_album_track(&document, &album.uri).await?;
                observed.lock().unwrap().insert(document.uri.clone());
                documents.push(document);
            }
            indexed += documents.len();
            if !documents.is_empty() {
                self.sink
                    .index_documents(&documents)
                    .await
                    .map_err(IndexError::Sink)?;
            }
            self.advance(step);
        }
        Ok(indexed)
    }

    /// Delete item documents that ended the cycle orphaned (no surviving
    /// parent linkage) or unobserved. Either condition alone is enough.
    async fn sweep_items(&self, observed: &HashSet<String>) -> Result<usize> {
        let doomed: Vec<String> = self
            .store
            .item_rows()
            .await?
            .into_iter()
            .filter(|row| row.is_orphaned() || !observed.contains(&row.uri))
            .map(|row| row.uri)
            .collect();
        if !doomed.is_empty() {
            debug!(count = doomed.len(), "sweeping dead item documents");
            self.delete_documents(&doomed).await?;
        }
        Ok(doomed.len())
    }

    // ----- helpers -----

    async fn delete_documents(&self, uris: &[String]) -> Result<()> {
        if uris.is_empty() {
            return Ok(());
        }
        self.store.delete_uris(uris).await?;
        self.sink
            .delete_documents(uris)
            .await
            .map_err(IndexError::Sink)?;
        Ok(())
    }

    async fn fetch_playlist_items(&self, playlist_uri: &str) -> Result<Vec<CatalogTrack>> {
        let mut items = Vec::new();
        let mut offset = 0;
        loop {
            // The synthetic Liked Songs playlist has no upstream items
            // endpoint; its contents are the saved tracks.
            let page = if is_saved_tracks_uri(playlist_uri) {
                self.remote.saved_tracks_page(PAGE_LIMIT, offset).await?
            } else {
                self.remote
                    .playlist_items_page(playlist_uri, PAGE_LIMIT, offset)
                    .await?
            };
            let fetched = page.items.len();
            items.extend(page.items);
            offset += PAGE_LIMIT;
            if offset >= page.total || fetched == 0 {
                break;
            }
        }
        Ok(items)
    }

    async fn fetch_album_tracks(&self, album_uri: &str) -> Result<Vec<CatalogTrack>> {
        let mut tracks = Vec::new();
        let mut offset = 0;
        loop {
            let page = self
                .remote
                .album_tracks_page(album_uri, PAGE_LIMIT, offset)
                .await?;
            let fetched = page.items.len();
            tracks.extend(page.items);
            offset += PAGE_LIMIT;
            if offset >= page.total || fetched == 0 {
                break;
            }
        }
        Ok(tracks)
    }

    fn advance(&self, delta: f64) {
        if delta <= 0.0 {
            return;
        }
        self.progress.send_modify(|progress| {
            *progress = (*progress + delta).min(1.0);
        });
    }
}

fn playlist_document(playlist: &Playlist, thumbnail: Option<String>) -> SearchDocument {
    SearchDocument {
        uri: playlist.uri.clone(),
        kind: DocumentKind::Playlist,
        title: playlist.name.clone(),
        subtitle: playlist.description.clone(),
        thumbnail,
    }
}

fn album_document(album: &SavedAlbum, thumbnail: Option<String>) -> SearchDocument {
    SearchDocument {
        uri: album.uri.clone(),
        kind: DocumentKind::Album,
        title: album.name.clone(),
        subtitle: album.artist_name.clone(),
        thumbnail,
    }
}

/// Local files and items without a catalog URI cannot be indexed.
fn item_document(item: &CatalogTrack, kind: DocumentKind) -> Option<SearchDocument> {
    if item.is_local {
        return None;
    }
    Some(SearchDocument {
        uri: item.uri.clone()?,
        kind,
        title: item.name.clone(),
        subtitle: item.artist_name.clone().or_else(|| item.album_name.clone()),
        thumbnail: None,
    })
}
