//! Cache Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Not-found and out-of-date are *not* errors here: lookups return a
//! [`Lookup`](crate::Lookup) and renames of unknown keys return `false`.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A cache error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The store file or its directory could not be created or opened. The
    /// cache instance is unusable.
    #[display("cache store unavailable: {}", _0.display())]
    StorageUnavailable(#[error(not(source))] PathBuf),
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    /// A store was handed to a cache of the other kind.
    #[display("store holds {_0} records")]
    WrongStoreKind(#[error(not(source))] &'static str),
    /// Path is not absolute, contains null bytes, or escapes the root.
    #[display("invalid path: {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
    /// A stored metadata document could not be (de)serialized.
    #[display("invalid metadata document")]
    Serialization,
    /// A column value could not be converted to or from the model.
    #[display("invalid cache data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
    #[display("I/O error")]
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Busy/locked databases show up as generic database errors.
        matches!(self, Self::Database | Self::Io)
    }
}
