//! Background population of the metadata and thumbnail caches.
//!
//! A [`Scheduler`] fans work out to one Tokio task per file and reports each
//! success through a completion callback. What a task actually does is a
//! [`Job`]; [`MetadataJob`] and [`ThumbnailJob`] read through their cache and
//! only call the external decoder or renderer when nothing usable is cached.

pub mod error;
mod job;
mod populate;
mod scheduler;

pub use crate::job::{FnJob, Job, job_fn};
pub use crate::populate::{MetadataDecoder, MetadataJob, Rendered, ThumbnailJob, ThumbnailRenderer};
pub use crate::scheduler::{CompletionCallback, Scheduler, SchedulerOptions, SchedulerState, ShutdownReport};
