//! Persisted last-modified dates for recency sorting.

use crate::error::{LibraryError, Result};
use chrono::{DateTime, Utc};
use perch_core::RecencyLedger;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, info};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS modified_dates (
    kind        TEXT NOT NULL,
    uri         TEXT NOT NULL,
    modified_at TEXT NOT NULL,
    PRIMARY KEY (kind, uri)
);
";

/// Which collection a last-modified date belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecencyKind {
    Playlist,
    Album,
}

impl RecencyKind {
    fn as_str(self) -> &'static str {
        match self {
            RecencyKind::Playlist => "playlist",
            RecencyKind::Album => "album",
        }
    }

    fn from_str(kind: &str) -> Option<Self> {
        match kind {
            "playlist" => Some(RecencyKind::Playlist),
            "album" => Some(RecencyKind::Album),
            _ => None,
        }
    }
}

/// Durable URI -> last-modified map with a staged in-memory overlay.
///
/// Touches land in the staged map so re-sorts see them immediately; they are
/// written to SQLite in one batch by [`commit`](Self::commit) when the
/// popover closes, so rapid sequential plays don't thrash the disk
/// mid-session. Reads prefer staged over committed values.
pub struct ModifiedDatesStore {
    pool: SqlitePool,
    committed: Mutex<HashMap<(RecencyKind, String), DateTime<Utc>>>,
    staged: Mutex<HashMap<(RecencyKind, String), DateTime<Utc>>>,
}

impl ModifiedDatesStore {
    /// Open (or create) the store at a SQLite URL and load the committed map.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await?;
        sqlx::query(SCHEMA).execute(&pool).await?;

        let rows = sqlx::query("SELECT kind, uri, modified_at FROM modified_dates")
            .fetch_all(&pool)
            .await?;
        let mut committed = HashMap::new();
        for row in rows {
            let kind: String = row.get("kind");
            let uri: String = row.get("uri");
            let modified_at: String = row.get("modified_at");
            let Some(kind) = RecencyKind::from_str(&kind) else {
                continue;
            };
            let modified_at = DateTime::parse_from_rfc3339(&modified_at)
                .map_err(|err| LibraryError::Timestamp(err.to_string()))?
                .with_timezone(&Utc);
            committed.insert((kind, uri), modified_at);
        }
        info!(entries = committed.len(), "loaded modified-date map");

        Ok(Self {
            pool,
            committed: Mutex::new(committed),
            staged: Mutex::new(HashMap::new()),
        })
    }

    /// The effective last-modified date for a URI: staged value if present,
    /// otherwise the committed one.
    pub fn modified_at(&self, kind: RecencyKind, uri: &str) -> Option<DateTime<Utc>> {
        let key = (kind, uri.to_owned());
        if let Some(at) = self.staged.lock().unwrap().get(&key) {
            return Some(*at);
        }
        self.committed.lock().unwrap().get(&key).copied()
    }

    /// Stage a touch at the current time.
    pub fn touch(&self, kind: RecencyKind, uri: &str) {
        self.staged
            .lock()
            .unwrap()
            .insert((kind, uri.to_owned()), Utc::now());
    }

    /// Number of touches waiting to be committed.
    pub fn staged_len(&self) -> usize {
        self.staged.lock().unwrap().len()
    }

    /// Write all staged touches to SQLite in one batch and fold them into the
    /// committed map. Called when the library view is dismissed.
    pub async fn commit(&self) -> Result<()> {
        let staged: Vec<((RecencyKind, String), DateTime<Utc>)> = {
            let mut staged = self.staged.lock().unwrap();
            staged.drain().collect()
        };
        if staged.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for ((kind, uri), modified_at) in &staged {
            sqlx::query(
                "INSERT INTO modified_dates (kind, uri, modified_at) VALUES (?, ?, ?)
                 ON CONFLICT (kind, uri) DO UPDATE SET modified_at = excluded.modified_at",
            )
            .bind(kind.as_str())
            .bind(uri)
            .bind(modified_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        let mut committed = self.committed.lock().unwrap();
        let written = staged.len();
        for (key, modified_at) in staged {
            committed.insert(key, modified_at);
        }
        debug!(written, "committed modified dates");
        Ok(())
    }

    /// Drop entries for URIs that no longer exist in the library.
    pub async fn retain(&self, kind: RecencyKind, keep: &[String]) -> Result<()> {
        let keep: std::collections::HashSet<&str> = keep.iter().map(String::as_str).collect();
        let stale: Vec<String> = {
            let committed = self.committed.lock().unwrap();
            committed
                .keys()
                .filter(|(k, uri)| *k == kind && !keep.contains(uri.as_str()))
                .map(|(_, uri)| uri.clone())
                .collect()
        };
        if stale.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for uri in &stale {
            sqlx::query("DELETE FROM modified_dates WHERE kind = ? AND uri = ?")
                .bind(kind.as_str())
                .bind(uri)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        let mut committed = self.committed.lock().unwrap();
        let mut staged = self.staged.lock().unwrap();
        for uri in stale {
            committed.remove(&(kind, uri.clone()));
            staged.remove(&(kind, uri));
        }
        Ok(())
    }

    /// Discard everything, durable rows included. Used on sign-out.
    pub async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM modified_dates")
            .execute(&self.pool)
            .await?;
        self.committed.lock().unwrap().clear();
        self.staged.lock().unwrap().clear();
        Ok(())
    }
}

impl RecencyLedger for ModifiedDatesStore {
    fn touch_playlist(&self, uri: &str) {
        self.touch(RecencyKind::Playlist, uri);
    }

    fn touch_album(&self, uri: &str) {
        self.touch(RecencyKind::Album, uri);
    }
}
