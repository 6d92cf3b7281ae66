use std::sync::Arc;

use crate::db::{CacheDirectoryProvider, CacheKind, Store, StoreOptions};
use crate::error::Result;
use crate::metadata::MetadataCache;
use crate::provider::ProviderRegistry;
use crate::thumbnail::ThumbnailCache;

/// Both caches, opened once at startup and passed to whoever needs them.
#[derive(Debug, Clone)]
pub struct CacheContext {
    metadata: MetadataCache,
    thumbnails: ThumbnailCache,
    providers: ProviderRegistry,
}

impl CacheContext {
    /// Open (or create) both stores in the directories handed out by `directories`.
    pub async fn open(directories: &dyn CacheDirectoryProvider, options: &StoreOptions) -> Result<Self> {
        let metadata = Store::open(directories.cache_directory(MetadataCache::NAME)?, CacheKind::Metadata, options).await?;
        let thumbnails =
            Store::open(directories.cache_directory(ThumbnailCache::NAME)?, CacheKind::Thumbnails, options).await?;
        Self::from_stores(metadata, thumbnails)
    }

    pub async fn in_memory() -> Result<Self> {
        Self::from_stores(
            Store::connect_in_memory(CacheKind::Metadata).await?,
            Store::connect_in_memory(CacheKind::Thumbnails).await?,
        )
    }

    fn from_stores(metadata: Store, thumbnails: Store) -> Result<Self> {
        let metadata = MetadataCache::new(metadata)?;
        let thumbnails = ThumbnailCache::new(thumbnails)?;
        let mut providers = ProviderRegistry::new();
        providers.register(Arc::new(metadata.clone())).register(Arc::new(thumbnails.clone()));
        Ok(Self { metadata, thumbnails, providers })
    }

    pub fn metadata(&self) -> &MetadataCache {
        &self.metadata
    }

    pub fn thumbnails(&self) -> &ThumbnailCache {
        &self.thumbnails
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// Vacuum both stores.
    pub async fn compact(&self) -> Result<()> {
        self.metadata.store().compact().await?;
        self.thumbnails.compact().await
    }

    pub async fn close(&self) {
        self.metadata.store().close().await;
        self.thumbnails.store().close().await;
    }
}
