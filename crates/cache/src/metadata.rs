//! Cache of decoded EXIF tag sets.

use exn::ResultExt;
use pixtag_exif::ExifTagSet;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::db::{CacheKind, Store};
use crate::document;
use crate::error::{ErrorKind, Result};
use crate::identity::{self, FileIdentity};
use crate::lookup::Lookup;
use crate::models::MetadataRow;

/// Decoded tag sets keyed by file path, stored as JSON documents.
#[derive(Debug, Clone)]
pub struct MetadataCache {
    store: Store,
}

impl MetadataCache {
    /// Provider name under which this cache is registered.
    pub const NAME: &'static str = "metadata";

    pub fn new(store: Store) -> Result<Self> {
        if store.kind() != CacheKind::Metadata {
            exn::bail!(ErrorKind::WrongStoreKind(store.kind().as_str()));
        }
        Ok(Self { store })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Read the tags cached for `identity`.
    ///
    /// The stored timestamp is compared before the document is parsed, so a
    /// stale record never costs a deserialization. An unreadable document is
    /// deleted and reported as a [`Lookup::Miss`].
    pub async fn get(&self, identity: &FileIdentity) -> Result<Lookup<ExifTagSet>> {
        let key = identity.key()?;
        let row: Option<MetadataRow> = sqlx::query_as(include_str!("../queries/metadata/get.sql"))
            .bind(&key)
            .fetch_optional(self.store.pool())
            .await
            .or_raise(|| ErrorKind::Database)?;
        let Some(row) = row else {
            tracing::debug!(path = %key, "Metadata cache miss");
            return Ok(Lookup::Miss);
        };
        if row.last_modified != identity.last_modified() {
            tracing::debug!(path = %key, stored = row.last_modified, current = identity.last_modified(), "Metadata is stale");
            return Ok(Lookup::Stale);
        }
        match document::deserialize(&row.payload) {
            Ok(tags) => Ok(Lookup::Hit(tags)),
            Err(err) => {
                tracing::warn!(path = %key, error = ?err, "Purging unreadable metadata document");
                self.purge(&key, &row.payload).await?;
                Ok(Lookup::Miss)
            },
        }
    }

    /// Delete a record only if it still holds `payload`, so a concurrent
    /// rewrite of the same path survives.
    async fn purge(&self, key: &str, payload: &str) -> Result<()> {
        let _guard = self.store.write_lock().await;
        sqlx::query(include_str!("../queries/metadata/purge.sql"))
            .bind(key)
            .bind(payload)
            .execute(self.store.pool())
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Store `tags` for `identity`.
    ///
    /// The stored document always carries the identity's timestamp. Writing
    /// again with an unchanged timestamp leaves the existing record alone.
    pub async fn put(&self, identity: &FileIdentity, tags: &ExifTagSet) -> Result<()> {
        let key = identity.key()?;
        let payload = if tags.last_modified == identity.last_modified() {
            document::serialize(tags)?
        } else {
            let mut tags = tags.clone();
            tags.last_modified = identity.last_modified();
            document::serialize(&tags)?
        };
        let _guard = self.store.write_lock().await;
        sqlx::query(include_str!("../queries/metadata/upsert.sql"))
            .bind(&key)
            .bind(identity.last_modified())
            .bind(payload)
            .execute(self.store.pool())
            .await
            .or_raise(|| ErrorKind::Database)?;
        tracing::debug!(path = %key, "Cached metadata");
        Ok(())
    }

    /// Whether the record for `identity` exists and matches its timestamp.
    pub async fn has_up_to_date(&self, identity: &FileIdentity) -> Result<bool> {
        let stored: Option<i64> = sqlx::query_scalar(include_str!("../queries/metadata/get_last_modified.sql"))
            .bind(identity.key()?)
            .fetch_optional(self.store.pool())
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(stored == Some(identity.last_modified()))
    }

    /// Delete the record for `path`. Returns whether one existed.
    pub async fn delete(&self, path: impl AsRef<Path>) -> Result<bool> {
        let key = identity::key(path)?;
        let _guard = self.store.write_lock().await;
        let deleted = sqlx::query(include_str!("../queries/metadata/delete.sql"))
            .bind(&key)
            .execute(self.store.pool())
            .await
            .or_raise(|| ErrorKind::Database)?
            .rows_affected();
        Ok(deleted > 0)
    }

    /// Move the record for `from` (payload and timestamp) to `to`.
    ///
    /// Returns `false` when `from` has nothing cached. A record already
    /// stored for `to` is replaced.
    pub async fn rename(&self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<bool> {
        let (from, to) = (identity::key(from)?, identity::key(to)?);
        let renamed = self
            .store
            .rename_key(
                include_str!("../queries/metadata/delete.sql"),
                include_str!("../queries/metadata/rename.sql"),
                &from,
                &to,
            )
            .await?;
        tracing::debug!(from = %from, to = %to, renamed, "Renamed metadata record");
        Ok(renamed)
    }

    pub async fn list_keys(&self) -> Result<BTreeSet<PathBuf>> {
        let keys: Vec<String> = sqlx::query_scalar(include_str!("../queries/metadata/list_keys.sql"))
            .fetch_all(self.store.pool())
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(keys.into_iter().map(PathBuf::from).collect())
    }

    pub async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(include_str!("../queries/metadata/count.sql"))
            .fetch_one(self.store.pool())
            .await
            .or_raise(|| ErrorKind::Database)?;
        u64::try_from(count).or_raise(|| ErrorKind::InvalidData("record count"))
    }

    /// Delete every record. Returns how many were removed.
    pub async fn clear(&self) -> Result<u64> {
        let _guard = self.store.write_lock().await;
        let cleared = sqlx::query(include_str!("../queries/metadata/clear.sql"))
            .execute(self.store.pool())
            .await
            .or_raise(|| ErrorKind::Database)?
            .rows_affected();
        tracing::info!(cleared, "Cleared metadata cache");
        Ok(cleared)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pixtag_exif::{ByteOrder, ExifTag, Ifd, ValueType};
    use rstest::rstest;

    async fn cache() -> MetadataCache {
        MetadataCache::new(Store::connect_in_memory(CacheKind::Metadata).await.unwrap()).unwrap()
    }

    fn identity(path: &str, last_modified: i64) -> FileIdentity {
        FileIdentity::new(path, last_modified).unwrap()
    }

    fn tags() -> ExifTagSet {
        ExifTagSet::new(0).with_tag(ExifTag {
            tag_id: 0x010f,
            value_type: ValueType::Ascii,
            value_count: 6,
            value_offset: 146,
            raw_value: b"Canon\0".to_vec(),
            string_value: "Canon".to_string(),
            byte_order: ByteOrder::LittleEndian,
            name: "Make".to_string(),
            ifd: Ifd::Exif,
        })
    }

    #[tokio::test]
    async fn test_rejects_thumbnail_store() {
        let store = Store::connect_in_memory(CacheKind::Thumbnails).await.unwrap();
        let err = MetadataCache::new(store).unwrap_err();
        assert!(matches!(&*err, ErrorKind::WrongStoreKind("thumbnails")));
    }

    #[tokio::test]
    async fn test_get_miss() {
        let cache = cache().await;
        assert_eq!(cache.get(&identity("/photos/a.jpg", 1)).await.unwrap(), Lookup::Miss);
    }

    #[tokio::test]
    async fn test_put_sets_document_timestamp() {
        let cache = cache().await;
        let id = identity("/photos/a.jpg", 1_000);
        cache.put(&id, &tags()).await.unwrap();
        let cached = cache.get(&id).await.unwrap().hit().unwrap();
        assert_eq!(cached.last_modified, 1_000);
        assert_eq!(cached.exif, tags().exif);
    }

    #[tokio::test]
    async fn test_stale_after_modification() {
        let cache = cache().await;
        cache.put(&identity("/photos/a.jpg", 1_000), &tags()).await.unwrap();
        let newer = identity("/photos/a.jpg", 2_000);
        assert_eq!(cache.get(&newer).await.unwrap(), Lookup::Stale);
        assert!(!cache.has_up_to_date(&newer).await.unwrap());
        cache.put(&newer, &tags()).await.unwrap();
        assert!(cache.get(&newer).await.unwrap().is_hit());
        assert!(cache.has_up_to_date(&newer).await.unwrap());
        assert_eq!(cache.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_identical_put_is_noop() {
        let cache = cache().await;
        let id = identity("/photos/a.jpg", 1_000);
        cache.put(&id, &tags()).await.unwrap();
        // Same timestamp, different tags: the first write stands.
        cache.put(&id, &ExifTagSet::new(0)).await.unwrap();
        let keys = cache.list_keys().await.unwrap();
        assert_eq!(keys.into_iter().collect::<Vec<_>>(), vec![PathBuf::from("/photos/a.jpg")]);
        assert_eq!(cache.get(&id).await.unwrap().hit().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_document_is_purged() {
        let cache = cache().await;
        sqlx::query("INSERT INTO metadata (path, last_modified, payload) VALUES (?, ?, ?)")
            .bind("/photos/a.jpg")
            .bind(1_000_i64)
            .bind("{ definitely not a document")
            .execute(cache.store().pool())
            .await
            .unwrap();
        let id = identity("/photos/a.jpg", 1_000);
        assert_eq!(cache.get(&id).await.unwrap(), Lookup::Miss);
        assert_eq!(cache.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rename_moves_record() {
        let cache = cache().await;
        cache.put(&identity("/photos/a.jpg", 1_000), &tags()).await.unwrap();
        assert!(cache.rename("/photos/a.jpg", "/archive/a.jpg").await.unwrap());
        assert_eq!(cache.get(&identity("/photos/a.jpg", 1_000)).await.unwrap(), Lookup::Miss);
        let moved = cache.get(&identity("/archive/a.jpg", 1_000)).await.unwrap().hit().unwrap();
        assert_eq!(moved.exif, tags().exif);
    }

    #[tokio::test]
    async fn test_rename_replaces_target() {
        let cache = cache().await;
        cache.put(&identity("/photos/a.jpg", 1_000), &tags()).await.unwrap();
        cache.put(&identity("/photos/b.jpg", 5_000), &ExifTagSet::new(0)).await.unwrap();
        assert!(cache.rename("/photos/a.jpg", "/photos/b.jpg").await.unwrap());
        assert_eq!(cache.count().await.unwrap(), 1);
        assert!(cache.has_up_to_date(&identity("/photos/b.jpg", 1_000)).await.unwrap());
    }

    #[tokio::test]
    async fn test_rename_missing_source() {
        let cache = cache().await;
        cache.put(&identity("/photos/b.jpg", 5_000), &tags()).await.unwrap();
        assert!(!cache.rename("/photos/a.jpg", "/photos/b.jpg").await.unwrap());
        // The would-be target is untouched.
        assert!(cache.has_up_to_date(&identity("/photos/b.jpg", 5_000)).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete() {
        let cache = cache().await;
        cache.put(&identity("/photos/a.jpg", 1_000), &tags()).await.unwrap();
        assert!(cache.delete("/photos/a.jpg").await.unwrap());
        assert!(!cache.delete("/photos/a.jpg").await.unwrap());
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(25)]
    #[tokio::test]
    async fn test_clear_reports_count(#[case] records: i64) {
        let cache = cache().await;
        for n in 0..records {
            cache.put(&identity(&format!("/photos/{n}.jpg"), n), &tags()).await.unwrap();
        }
        assert_eq!(cache.clear().await.unwrap(), u64::try_from(records).unwrap());
        assert!(cache.list_keys().await.unwrap().is_empty());
    }
}
