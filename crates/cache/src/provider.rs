//! Uniform maintenance surface over every cache kind.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::Result;
use crate::metadata::MetadataCache;
use crate::thumbnail::ThumbnailCache;

/// Capability shared by all caches, independent of what they store.
#[async_trait]
pub trait CacheProvider: Send + Sync {
    /// Stable name of the cache, e.g. `"thumbnails"`.
    fn name(&self) -> &str;

    /// Remove every record and return how many were removed.
    async fn clear(&self) -> Result<u64>;
}

pub type ProviderHandle = Arc<dyn CacheProvider + Send + Sync>;

#[async_trait]
impl CacheProvider for MetadataCache {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn clear(&self) -> Result<u64> {
        MetadataCache::clear(self).await
    }
}

#[async_trait]
impl CacheProvider for ThumbnailCache {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn clear(&self) -> Result<u64> {
        ThumbnailCache::clear(self).await
    }
}

/// Every cache known to the application, registered once at startup.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, ProviderHandle>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` under its own name, replacing any provider of the same name.
    pub fn register(&mut self, provider: ProviderHandle) -> &mut Self {
        self.providers.insert(provider.name().to_string(), provider);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ProviderHandle> {
        self.providers.get(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Clear every registered cache in name order.
    ///
    /// Stops at the first failure; caches cleared before it stay cleared.
    pub async fn clear_all(&self) -> Result<Vec<(String, u64)>> {
        let mut cleared = Vec::with_capacity(self.providers.len());
        for (name, provider) in &self.providers {
            cleared.push((name.clone(), provider.clear().await?));
        }
        Ok(cleared)
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
