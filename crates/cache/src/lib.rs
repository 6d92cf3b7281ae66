//! SQLite caches for artifacts derived from image files.
//!
//! Decoding EXIF metadata and rendering thumbnails are both expensive, so the
//! results are kept in local stores keyed by file path. The caches are never
//! the source of truth; deleting a store only costs a rebuild.
//!
//! # Architecture
//! - **Stores**: one SQLite file per [`CacheKind`], opened through [`Store`].
//!   Reads run concurrently on a pool, writes are serialized per store.
//! - **Identity**: every record remembers the modification time (and for
//!   thumbnails, the length) of the file it was derived from. A lookup with a
//!   different [`FileIdentity`] reports the record as stale instead of
//!   returning it.
//! - **Caches**: [`MetadataCache`] stores [`ExifTagSet`](pixtag_exif::ExifTagSet)s
//!   as JSON documents (see [`document`]); [`ThumbnailCache`] stores encoded
//!   image bytes.
//! - **Providers**: both caches implement [`CacheProvider`] so maintenance
//!   code can clear them without knowing what they hold.

mod context;
mod db;
pub mod document;
pub mod error;
mod identity;
mod lookup;
mod metadata;
mod models;
mod provider;
mod thumbnail;

pub use crate::context::CacheContext;
pub use crate::db::{CacheDirectoryProvider, CacheKind, RootDirectory, Store, StoreOptions};
pub use crate::identity::{FileIdentity, normalize};
pub use crate::lookup::Lookup;
pub use crate::metadata::MetadataCache;
pub use crate::provider::{CacheProvider, ProviderHandle, ProviderRegistry};
pub use crate::thumbnail::{Dimensions, ThumbnailCache, ThumbnailRecord};
