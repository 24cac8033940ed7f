//! The locally persisted document store.
//!
//! One row per indexable entity, keyed by URI. Item rows (playlist items,
//! album tracks) carry parent linkage in the `playlist_uri`/`album_uri`
//! columns; a track that is both a playlist item and an album track is one
//! row with both links set. Playlist rows additionally carry the snapshot id
//! recorded at the last successful content sync.

use crate::error::Result;
use perch_core::{DocumentKind, SearchDocument};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::info;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS documents (
    uri          TEXT PRIMARY KEY,
    kind         TEXT NOT NULL,
    title        TEXT NOT NULL,
    subtitle     TEXT,
    thumbnail    TEXT,
    playlist_uri TEXT,
    album_uri    TEXT,
    snapshot_id  TEXT
);
CREATE INDEX IF NOT EXISTS idx_documents_kind ON documents (kind);
CREATE INDEX IF NOT EXISTS idx_documents_playlist ON documents (playlist_uri);
CREATE INDEX IF NOT EXISTS idx_documents_album ON documents (album_uri);
";

/// An item row's linkage view, used by the end-of-cycle sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRow {
    pub uri: String,
    pub playlist_uri: Option<String>,
    pub album_uri: Option<String>,
}

impl ItemRow {
    /// An item with neither parent linkage is orphaned.
    pub fn is_orphaned(&self) -> bool {
        self.playlist_uri.is_none() && self.album_uri.is_none()
    }
}

pub struct DocumentStore {
    pool: SqlitePool,
}

impl DocumentStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await?;
        sqlx::query(SCHEMA).execute(&pool).await?;
        info!(url, "opened document store");
        Ok(Self { pool })
    }

    /// Upsert an entity document (playlist or album). The stored snapshot id
    /// is preserved across upserts; it only moves via
    /// [`set_snapshot_id`](Self::set_snapshot_id) after a successful content
    /// sync.
    pub async fn upsert_entity(&self, document: &SearchDocument) -> Result<()> {
        sqlx::query(
            "INSERT INTO documents (uri, kind, title, subtitle, thumbnail)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (uri) DO UPDATE SET
                 kind = excluded.kind,
                 title = excluded.title,
                 subtitle = excluded.subtitle,
                 thumbnail = excluded.thumbnail",
        )
        .bind(&document.uri)
        .bind(document.kind.domain())
        .bind(&document.title)
        .bind(&document.subtitle)
        .bind(&document.thumbnail)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Upsert an item document with playlist linkage, leaving any album
    /// linkage on the same row intact.
    pub async fn upsert_playlist_item(
        &self,
        document: &SearchDocument,
        playlist_uri: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO documents (uri, kind, title, subtitle, thumbnail, playlist_uri)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT (uri) DO UPDATE SET
                 title = excluded.title,
                 subtitle = excluded.subtitle,
                 playlist_uri = excluded.playlist_uri",
        )
        .bind(&document.uri)
        .bind(document.kind.domain())
        .bind(&document.title)
        .bind(&document.subtitle)
        .bind(&document.thumbnail)
        .bind(playlist_uri)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Upsert an item document with album linkage, leaving any playlist
    /// linkage on the same row intact.
    pub async fn upsert_album_track(
        &self,
        document: &SearchDocument,
        album_uri: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO documents (uri, kind, title, subtitle, thumbnail, album_uri)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT (uri) DO UPDATE SET
                 title = excluded.title,
                 subtitle = excluded.subtitle,
                 album_uri = excluded.album_uri",
        )
        .bind(&document.uri)
        .bind(document.kind.domain())
        .bind(&document.title)
        .bind(&document.subtitle)
        .bind(&document.thumbnail)
        .bind(album_uri)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Clear playlist linkage from every item of a playlist. Run before
    /// re-syncing its contents so removed items end the cycle orphaned.
    pub async fn detach_playlist(&self, playlist_uri: &str) -> Result<()> {
        sqlx::query("UPDATE documents SET playlist_uri = NULL WHERE playlist_uri = ?")
            .bind(playlist_uri)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Clear album linkage from every track of an album.
    pub async fn detach_album(&self, album_uri: &str) -> Result<()> {
        sqlx::query("UPDATE documents SET album_uri = NULL WHERE album_uri = ?")
            .bind(album_uri)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// The snapshot id recorded at the last successful content sync of a
    /// playlist.
    pub async fn snapshot_id(&self, uri: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT snapshot_id FROM documents WHERE uri = ?")
            .bind(uri)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.and_then(|row| row.get::<Option<String>, _>("snapshot_id")))
    }

    pub async fn set_snapshot_id(&self, uri: &str, snapshot_id: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE documents SET snapshot_id = ? WHERE uri = ?")
            .bind(snapshot_id)
            .bind(uri)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn uris_of_kind(&self, kind: DocumentKind) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT uri FROM documents WHERE kind = ?")
            .bind(kind.domain())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|row| row.get("uri")).collect())
    }

    /// URIs of the item documents currently linked to a playlist.
    pub async fn item_uris_for_playlist(&self, playlist_uri: &str) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT uri FROM documents WHERE playlist_uri = ?")
            .bind(playlist_uri)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|row| row.get("uri")).collect())
    }

    /// All item rows (playlist items and album tracks) with their linkage.
    pub async fn item_rows(&self) -> Result<Vec<ItemRow>> {
        let rows = sqlx::query(
            "SELECT uri, playlist_uri, album_uri FROM documents
             WHERE kind IN ('playlist_item', 'album_track')",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| ItemRow {
                uri: row.get("uri"),
                playlist_uri: row.get("playlist_uri"),
                album_uri: row.get("album_uri"),
            })
            .collect())
    }

    pub async fn delete_uris(&self, uris: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for uri in uris {
            sqlx::query("DELETE FROM documents WHERE uri = ?")
                .bind(uri)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn delete_all(&self) -> Result<()> {
        sqlx::query("DELETE FROM documents")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(uri: &str, kind: DocumentKind, title: &str) -> SearchDocument {
        SearchDocument {
            uri: uri.to_owned(),
            kind,
            title: title.to_owned(),
            subtitle: None,
            thumbnail: None,
        }
    }

    async fn store() -> DocumentStore {
        DocumentStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn entity_upsert_preserves_snapshot_id() {
        let store = store().await;
        let playlist = doc("spotify:playlist:p1", DocumentKind::Playlist, "Mix");
        store.upsert_entity(&playlist).await.unwrap();
        store
            .set_snapshot_id("spotify:playlist:p1", Some("snap-1"))
            .await
            .unwrap();

        // A later metadata refresh must not clear the recorded snapshot.
        store.upsert_entity(&playlist).await.unwrap();

        let snapshot = store.snapshot_id("spotify:playlist:p1").await.unwrap();
        assert_eq!(snapshot.as_deref(), Some("snap-1"));
    }

    #[tokio::test]
    async fn item_linked_to_playlist_and_album_is_one_row() {
        let store = store().await;
        let track = doc("spotify:track:t1", DocumentKind::PlaylistItem, "Song");
        store
            .upsert_playlist_item(&track, "spotify:playlist:p1")
            .await
            .unwrap();
        store
            .upsert_album_track(&track, "spotify:album:a1")
            .await
            .unwrap();

        let rows = store.item_rows().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].playlist_uri.as_deref(), Some("spotify:playlist:p1"));
        assert_eq!(rows[0].album_uri.as_deref(), Some("spotify:album:a1"));
        assert!(!rows[0].is_orphaned());
    }

    #[tokio::test]
    async fn detaching_both_parents_orphans_the_item() {
        let store = store().await;
        let track = doc("spotify:track:t1", DocumentKind::PlaylistItem, "Song");
        store
            .upsert_playlist_item(&track, "spotify:playlist:p1")
            .await
            .unwrap();
        store
            .upsert_album_track(&track, "spotify:album:a1")
            .await
            .unwrap();

        store.detach_playlist("spotify:playlist:p1").await.unwrap();
        let rows = store.item_rows().await.unwrap();
        assert!(!rows[0].is_orphaned());

        store.detach_album("spotify:album:a1").await.unwrap();
        let rows = store.item_rows().await.unwrap();
        assert!(rows[0].is_orphaned());
    }
}
