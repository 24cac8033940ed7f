//! The two-tier artwork cache.

use crate::error::{ArtworkError, Result};
use crate::fetcher::ImageFetcher;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, RgbaImage};
use perch_core::{IdCategory, ResourceId};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Cache layout and eviction tunables.
#[derive(Debug, Clone)]
pub struct ImageCacheConfig {
    /// Root of the on-disk tree; one subdirectory per category.
    pub root: PathBuf,
    /// Square edge for playlist covers.
    pub playlist_size: u32,
    /// Square edge for album covers.
    pub album_size: u32,
    /// Square edge for ephemeral queue artwork.
    pub queue_size: u32,
    /// Queue-tier entry cap; exceeding it trims by recency.
    pub queue_capacity: usize,
    /// Minimum gap between unused-image sweeps.
    pub prune_interval: Duration,
    /// Minimum gap between queue-tier trims.
    pub trim_interval: Duration,
}

impl ImageCacheConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            playlist_size: 30,
            album_size: 64,
            queue_size: 40,
            queue_capacity: 50,
            prune_interval: Duration::from_secs(60 * 60),
            trim_interval: Duration::from_secs(15 * 60),
        }
    }
}

struct QueueEntry {
    image: Arc<RgbaImage>,
    last_accessed: Instant,
}

enum FetchRole {
    /// This caller performs the download.
    Fetcher(watch::Sender<bool>),
    /// Another caller is already downloading the same identifier.
    Waiter(watch::Receiver<bool>),
}

/// Content-addressed artwork cache.
///
/// Library images (playlists, albums) are durable: disk is the authoritative
/// tier, memory is read-through. Queue images are in-memory only, capped at
/// [`ImageCacheConfig::queue_capacity`] entries and trimmed least-recently-
/// accessed first. Concurrent requests for one identifier share a single
/// download.
pub struct ImageCache {
    config: ImageCacheConfig,
    fetcher: Arc<dyn ImageFetcher>,
    memory: Mutex<HashMap<ResourceId, Arc<RgbaImage>>>,
    queue: Mutex<HashMap<ResourceId, QueueEntry>>,
    in_flight: Mutex<HashMap<ResourceId, watch::Receiver<bool>>>,
    last_prune: Mutex<Option<Instant>>,
    last_trim: Mutex<Option<Instant>>,
}

impl ImageCache {
    pub fn new(config: ImageCacheConfig, fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self {
            config,
            fetcher,
            memory: Mutex::new(HashMap::new()),
            queue: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            last_prune: Mutex::new(None),
            last_trim: Mutex::new(None),
        }
    }

    /// Where a library image for `id` lives on disk.
    pub fn disk_path(&self, id: &ResourceId) -> PathBuf {
        self.config
            .root
            .join(id.category.as_str())
            .join(format!("{}.png", id.id))
    }

    fn edge_for(&self, category: IdCategory) -> u32 {
        match category {
            IdCategory::Playlist => self.config.playlist_size,
            _ => self.config.album_size,
        }
    }

    /// Read path for library images: memory, then disk, then (when a URL is
    /// known) download-and-populate-both. Never re-fetches an identifier
    /// either tier already holds.
    pub async fn library_image(
        &self,
        id: &ResourceId,
        url: Option<&str>,
    ) -> Option<Arc<RgbaImage>> {
        if let Some(image) = self.memory.lock().unwrap().get(id).cloned() {
            return Some(image);
        }

        match self.load_from_disk(id).await {
            Ok(Some(image)) => {
                self.memory.lock().unwrap().insert(id.clone(), Arc::clone(&image));
                return Some(image);
            }
            Ok(None) => {}
            Err(err) => warn!(uri = %id.uri(), error = %err, "couldn't read cached image"),
        }

        let url = url?;
        match self.download_library_image(id, url).await {
            Ok(image) => image,
            Err(err) => {
                debug!(uri = %id.uri(), error = %err, "library image fetch failed");
                None
            }
        }
    }

    /// Populate both library tiers for `id` if neither holds it yet.
    pub async fn ensure_library_image(&self, id: &ResourceId, url: &str) {
        let _ = self.library_image(id, Some(url)).await;
    }

    async fn download_library_image(
        &self,
        id: &ResourceId,
        url: &str,
    ) -> Result<Option<Arc<RgbaImage>>> {
        match self.begin_fetch(id) {
            FetchRole::Waiter(mut done) => {
                if !*done.borrow() {
                    let _ = done.changed().await;
                }
                Ok(self.memory.lock().unwrap().get(id).cloned())
            }
            FetchRole::Fetcher(done) => {
                let result = self.fetch_resize_store(id, url).await;
                self.finish_fetch(id, done);
                result.map(Some)
            }
        }
    }

    async fn fetch_resize_store(&self, id: &ResourceId, url: &str) -> Result<Arc<RgbaImage>> {
        let bytes = self
            .fetcher
            .fetch(url)
            .await
            .map_err(ArtworkError::Fetch)?;
        let edge = self.edge_for(id.category);
        let path = self.disk_path(id);
        let image = task::spawn_blocking(move || -> Result<RgbaImage> {
            let image = decode_square(&bytes, edge)?;
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            DynamicImage::ImageRgba8(image.clone()).save_with_format(&path, ImageFormat::Png)?;
            Ok(image)
        })
        .await??;

        let image = Arc::new(image);
        self.memory.lock().unwrap().insert(id.clone(), Arc::clone(&image));
        trace!(uri = %id.uri(), "cached library image");
        Ok(image)
    }

    async fn load_from_disk(&self, id: &ResourceId) -> Result<Option<Arc<RgbaImage>>> {
        let path = self.disk_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let image = task::spawn_blocking(move || -> Result<RgbaImage> {
            Ok(image::open(&path)?.to_rgba8())
        })
        .await??;
        Ok(Some(Arc::new(image)))
    }

    /// Queue-tier read path: memory hit refreshes recency; a miss downloads,
    /// inserts, and may trigger a trim. Queue images never touch disk.
    pub async fn queue_image(&self, id: &ResourceId, url: &str) -> Option<Arc<RgbaImage>> {
        if let Some(image) = self.touch_queue_image(id) {
            return Some(image);
        }

        match self.begin_fetch(id) {
            FetchRole::Waiter(mut done) => {
                if !*done.borrow() {
                    let _ = done.changed().await;
                }
                self.touch_queue_image(id)
            }
            FetchRole::Fetcher(done) => {
                let result = self.fetch_queue_image(id, url).await;
                self.finish_fetch(id, done);
                match result {
                    Ok(image) => {
                        self.trim_queue_images();
                        Some(image)
                    }
                    Err(err) => {
                        debug!(uri = %id.uri(), error = %err, "queue image fetch failed");
                        None
                    }
                }
            }
        }
    }

    /// Refresh the recency of a queue entry, returning it if present.
    pub fn touch_queue_image(&self, id: &ResourceId) -> Option<Arc<RgbaImage>> {
        let mut queue = self.queue.lock().unwrap();
        let entry = queue.get_mut(id)?;
        entry.last_accessed = Instant::now();
        Some(Arc::clone(&entry.image))
    }

    async fn fetch_queue_image(&self, id: &ResourceId, url: &str) -> Result<Arc<RgbaImage>> {
        let bytes = self
            .fetcher
            .fetch(url)
            .await
            .map_err(ArtworkError::Fetch)?;
        let edge = self.config.queue_size;
        let image =
            task::spawn_blocking(move || decode_square(&bytes, edge)).await??;
        let image = Arc::new(image);
        self.queue.lock().unwrap().insert(
            id.clone(),
            QueueEntry {
                image: Arc::clone(&image),
                last_accessed: Instant::now(),
            },
        );
        Ok(image)
    }

    /// Trim the queue tier down to its cap, removing the least-recently
    /// accessed entries first. Rate-limited; an over-cap table is tolerated
    /// between trims.
    pub fn trim_queue_images(&self) {
        {
            let mut queue = self.queue.lock().unwrap();
            if queue.len() <= self.config.queue_capacity {
                return;
            }
            let mut last_trim = self.last_trim.lock().unwrap();
            if let Some(at) = *last_trim {
                if at.elapsed() < self.config.trim_interval {
                    return;
                }
            }
            *last_trim = Some(Instant::now());

            let excess = queue.len() - self.config.queue_capacity;
            let mut by_recency: Vec<(ResourceId, Instant)> = queue
                .iter()
                .map(|(id, entry)| (id.clone(), entry.last_accessed))
                .collect();
            by_recency.sort_by_key(|(_, accessed)| *accessed);
            for (id, _) in by_recency.into_iter().take(excess) {
                queue.remove(&id);
            }
            debug!(removed = excess, "trimmed queue images");
        }
    }

    /// Delete on-disk library images whose identifier is no longer in the
    /// current playlist/album set. Rate-limited; an empty keep set is a
    /// sentinel for "library not yet known" and skips the sweep entirely.
    pub async fn prune_unused(&self, keep: &HashSet<ResourceId>) {
        if keep.is_empty() {
            return;
        }
        {
            let mut last_prune = self.last_prune.lock().unwrap();
            if let Some(at) = *last_prune {
                if at.elapsed() < self.config.prune_interval {
                    return;
                }
            }
            *last_prune = Some(Instant::now());
        }

        self.memory.lock().unwrap().retain(|id, _| keep.contains(id));

        let root = self.config.root.clone();
        let keep = keep.clone();
        let swept = task::spawn_blocking(move || {
            let mut removed = 0usize;
            for category in [IdCategory::Playlist, IdCategory::Album] {
                removed += prune_category_dir(&root.join(category.as_str()), category, &keep);
            }
            removed
        })
        .await;
        match swept {
            Ok(removed) if removed > 0 => debug!(removed, "pruned unused library images"),
            Ok(_) => {}
            Err(err) => warn!(error = %err, "image prune task failed"),
        }
    }

    /// Drop every cached image, both tiers, and the on-disk tree. Used on
    /// sign-out.
    pub fn clear(&self) {
        self.memory.lock().unwrap().clear();
        self.queue.lock().unwrap().clear();
        *self.last_prune.lock().unwrap() = None;
        *self.last_trim.lock().unwrap() = None;
        if let Err(err) = std::fs::remove_dir_all(&self.config.root) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(error = %err, "couldn't clear image directory");
            }
        }
    }

    /// Number of entries currently in the queue tier.
    pub fn queue_len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    fn begin_fetch(&self, id: &ResourceId) -> FetchRole {
        let mut in_flight = self.in_flight.lock().unwrap();
        if let Some(done) = in_flight.get(id) {
            FetchRole::Waiter(done.clone())
        } else {
            let (tx, rx) = watch::channel(false);
            in_flight.insert(id.clone(), rx);
            FetchRole::Fetcher(tx)
        }
    }

    fn finish_fetch(&self, id: &ResourceId, done: watch::Sender<bool>) {
        self.in_flight.lock().unwrap().remove(id);
        let _ = done.send(true);
    }
}

/// Decode, center-crop to a square, and resize to `edge`.
fn decode_square(bytes: &[u8], edge: u32) -> Result<RgbaImage> {
    let mut image = image::load_from_memory(bytes)?;
    let (width, height) = (image.width(), image.height());
    let side = width.min(height);
    if side > 0 && width != height {
        let x = (width - side) / 2;
        let y = (height - side) / 2;
        image = image.crop_imm(x, y, side, side);
    }
    Ok(image.resize_exact(edge, edge, FilterType::Triangle).to_rgba8())
}

fn prune_category_dir(
    dir: &Path,
    category: IdCategory,
    keep: &HashSet<ResourceId>,
) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        let id = ResourceId {
            category,
            id: stem.to_owned(),
        };
        if !keep.contains(&id) && std::fs::remove_file(&path).is_ok() {
            removed += 1;
        }
    }
    removed
}
