//! Cache of encoded thumbnail bitmaps.

use exn::ResultExt;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::db::{CacheKind, Store};
use crate::error::{ErrorKind, Result};
use crate::identity::{self, FileIdentity};
use crate::models::{ThumbnailRow, ValidationRow};

/// Pixel size of a rendered thumbnail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// A stored thumbnail together with the identity it was rendered from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailRecord {
    pub identity: FileIdentity,
    /// Encoded image bytes, format chosen by the renderer.
    pub image: Vec<u8>,
    pub dimensions: Option<Dimensions>,
}

#[derive(Debug, Clone)]
pub struct ThumbnailCache {
    store: Store,
}

impl ThumbnailCache {
    /// Provider name under which this cache is registered.
    pub const NAME: &'static str = "thumbnails";

    pub fn new(store: Store) -> Result<Self> {
        if store.kind() != CacheKind::Thumbnails {
            exn::bail!(ErrorKind::WrongStoreKind(store.kind().as_str()));
        }
        Ok(Self { store })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub async fn exists(&self, path: impl AsRef<Path>) -> Result<bool> {
        sqlx::query_scalar(include_str!("../queries/thumbnails/exists.sql"))
            .bind(identity::key(path)?)
            .fetch_one(self.store.pool())
            .await
            .or_raise(|| ErrorKind::Database)
    }

    /// Stored image bytes for `path`, whether or not they are up to date.
    pub async fn find(&self, path: impl AsRef<Path>) -> Result<Option<Vec<u8>>> {
        sqlx::query_scalar(include_str!("../queries/thumbnails/get_image.sql"))
            .bind(identity::key(path)?)
            .fetch_optional(self.store.pool())
            .await
            .or_raise(|| ErrorKind::Database)
    }

    /// Full stored record for `path`, whether or not it is up to date.
    pub async fn find_record(&self, path: impl AsRef<Path>) -> Result<Option<ThumbnailRecord>> {
        let row: Option<ThumbnailRow> = sqlx::query_as(include_str!("../queries/thumbnails/get.sql"))
            .bind(identity::key(path)?)
            .fetch_optional(self.store.pool())
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(ThumbnailRecord::try_from).transpose()
    }

    pub async fn insert(&self, identity: &FileIdentity, image: &[u8]) -> Result<()> {
        self.upsert(ThumbnailRow::new(identity, image, None)?).await
    }

    pub async fn insert_sized(&self, identity: &FileIdentity, image: &[u8], dimensions: Dimensions) -> Result<()> {
        self.upsert(ThumbnailRow::new(identity, image, Some(dimensions))?).await
    }

    /// Rows with an unchanged timestamp and length are left as they are.
    async fn upsert(&self, row: ThumbnailRow) -> Result<()> {
        let _guard = self.store.write_lock().await;
        sqlx::query(include_str!("../queries/thumbnails/upsert.sql"))
            .bind(&row.path)
            .bind(row.last_modified)
            .bind(row.file_length)
            .bind(row.image)
            .bind(row.width)
            .bind(row.height)
            .execute(self.store.pool())
            .await
            .or_raise(|| ErrorKind::Database)?;
        tracing::debug!(path = %row.path, "Cached thumbnail");
        Ok(())
    }

    /// Whether a thumbnail exists that is at least as new as `identity`.
    ///
    /// A record is out of date when its timestamp is older than the file's,
    /// or when both lengths are known and differ.
    pub async fn has_up_to_date(&self, identity: &FileIdentity) -> Result<bool> {
        let row: Option<ValidationRow> = sqlx::query_as(include_str!("../queries/thumbnails/get_validation.sql"))
            .bind(identity.key()?)
            .fetch_optional(self.store.pool())
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(row.is_some_and(|row| row.is_up_to_date(identity)))
    }

    pub async fn delete(&self, path: impl AsRef<Path>) -> Result<bool> {
        let key = identity::key(path)?;
        let _guard = self.store.write_lock().await;
        let deleted = sqlx::query(include_str!("../queries/thumbnails/delete.sql"))
            .bind(&key)
            .execute(self.store.pool())
            .await
            .or_raise(|| ErrorKind::Database)?
            .rows_affected();
        Ok(deleted > 0)
    }

    /// Re-key the record for `from` without touching its image.
    ///
    /// Returns `false` when `from` has nothing cached. A record already
    /// stored for `to` is replaced.
    pub async fn rename(&self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<bool> {
        let (from, to) = (identity::key(from)?, identity::key(to)?);
        let renamed = self
            .store
            .rename_key(
                include_str!("../queries/thumbnails/delete.sql"),
                include_str!("../queries/thumbnails/rename.sql"),
                &from,
                &to,
            )
            .await?;
        tracing::debug!(from = %from, to = %to, renamed, "Renamed thumbnail record");
        Ok(renamed)
    }

    pub async fn list_keys(&self) -> Result<BTreeSet<PathBuf>> {
        let keys: Vec<String> = sqlx::query_scalar(include_str!("../queries/thumbnails/list_keys.sql"))
            .fetch_all(self.store.pool())
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(keys.into_iter().map(PathBuf::from).collect())
    }

    pub async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(include_str!("../queries/thumbnails/count.sql"))
            .fetch_one(self.store.pool())
            .await
            .or_raise(|| ErrorKind::Database)?;
        u64::try_from(count).or_raise(|| ErrorKind::InvalidData("record count"))
    }

    /// Reclaim space left behind by deleted and replaced images.
    pub async fn compact(&self) -> Result<()> {
        self.store.compact().await?;
        tracing::info!("Compacted thumbnail cache");
        Ok(())
    }

    pub async fn clear(&self) -> Result<u64> {
        let _guard = self.store.write_lock().await;
        let cleared = sqlx::query(include_str!("../queries/thumbnails/clear.sql"))
            .execute(self.store.pool())
            .await
            .or_raise(|| ErrorKind::Database)?
            .rows_affected();
        tracing::info!(cleared, "Cleared thumbnail cache");
        Ok(cleared)
    }
}
