//! Fetch Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

use crate::scheduler::SchedulerState;

/// A fetch error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for fetch operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The scheduler is not taking work in its current state.
    #[display("scheduler is not accepting work ({_0})")]
    NotAccepting(#[error(not(source))] SchedulerState),
    /// `start()` was called outside of a Tokio runtime.
    #[display("no Tokio runtime available")]
    NoRuntime,
    /// Reading from or writing to a cache failed.
    #[display("cache error")]
    Cache,
    /// The external decoder or renderer failed to produce an artifact.
    #[display("could not generate artifact")]
    Generate,
    #[display("I/O error")]
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Cache | Self::Io)
    }
}
