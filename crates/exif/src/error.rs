//! EXIF Model Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};

/// A model error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for model conversions.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A TIFF byte order marker was neither `II` nor `MM`.
    #[display("unknown byte order marker: {_0:#06x}")]
    UnknownByteOrder(#[error(not(source))] u16),
    /// A tag group name could not be recognised.
    #[display("unknown IFD: {_0}")]
    UnknownIfd(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Conversions are pure; the input is either valid or it isn't.
        false
    }
}
