//! Read-through population jobs for the two caches.

use async_trait::async_trait;
use exn::ResultExt;
use pixtag_cache::{Dimensions, FileIdentity, Lookup, MetadataCache, ThumbnailCache};
use pixtag_exif::ExifTagSet;
use std::path::Path;
use std::sync::Arc;

use crate::error::{ErrorKind, Result};
use crate::job::Job;

/// Reads EXIF metadata out of an image file.
#[async_trait]
pub trait MetadataDecoder: Send + Sync {
    async fn decode(&self, path: &Path) -> Result<ExifTagSet>;
}

/// A freshly rendered thumbnail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// Encoded image bytes.
    pub image: Vec<u8>,
    pub dimensions: Option<Dimensions>,
}

/// Produces a thumbnail for an image file.
#[async_trait]
pub trait ThumbnailRenderer: Send + Sync {
    async fn render(&self, path: &Path) -> Result<Rendered>;
}

#[derive(Clone)]
pub struct MetadataJob {
    cache: MetadataCache,
    decoder: Arc<dyn MetadataDecoder>,
}

impl MetadataJob {
    pub fn new(cache: MetadataCache, decoder: Arc<dyn MetadataDecoder>) -> Self {
        Self { cache, decoder }
    }

    /// Tags for the file at `path`, decoding and caching them when the cache
    /// has nothing current.
    pub async fn fetch(&self, path: &Path) -> Result<ExifTagSet> {
        let identity = FileIdentity::from_path(path).await.or_raise(|| ErrorKind::Io)?;
        if let Lookup::Hit(tags) = self.cache.get(&identity).await.or_raise(|| ErrorKind::Cache)? {
            return Ok(tags);
        }
        let mut tags = self.decoder.decode(identity.path()).await.or_raise(|| ErrorKind::Generate)?;
        self.cache.put(&identity, &tags).await.or_raise(|| ErrorKind::Cache)?;
        tags.last_modified = identity.last_modified();
        Ok(tags)
    }
}

#[async_trait]
impl Job for MetadataJob {
    async fn run(&self, path: &Path) -> Result<()> {
        self.fetch(path).await.map(|_| ())
    }
}

#[derive(Clone)]
pub struct ThumbnailJob {
    cache: ThumbnailCache,
    renderer: Arc<dyn ThumbnailRenderer>,
}

impl ThumbnailJob {
    pub fn new(cache: ThumbnailCache, renderer: Arc<dyn ThumbnailRenderer>) -> Self {
        Self { cache, renderer }
    }

    /// Thumbnail bytes for the file at `path`, rendering and caching them
    /// when the cached thumbnail is missing or out of date.
    pub async fn fetch(&self, path: &Path) -> Result<Vec<u8>> {
        let identity = FileIdentity::from_path(path).await.or_raise(|| ErrorKind::Io)?;
        if self.cache.has_up_to_date(&identity).await.or_raise(|| ErrorKind::Cache)?
            && let Some(image) = self.cache.find(identity.path()).await.or_raise(|| ErrorKind::Cache)?
        {
            return Ok(image);
        }
        let rendered = self.renderer.render(identity.path()).await.or_raise(|| ErrorKind::Generate)?;
        let inserted = match rendered.dimensions {
            Some(dimensions) => self.cache.insert_sized(&identity, &rendered.image, dimensions).await,
            None => self.cache.insert(&identity, &rendered.image).await,
        };
        inserted.or_raise(|| ErrorKind::Cache)?;
        Ok(rendered.image)
    }
}

#[async_trait]
impl Job for ThumbnailJob {
    async fn run(&self, path: &Path) -> Result<()> {
        self.fetch(path).await.map(|_| ())
    }
}
