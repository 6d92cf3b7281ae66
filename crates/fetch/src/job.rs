use async_trait::async_trait;
use std::future::Future;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Unit of work run by the [`Scheduler`](crate::Scheduler), once per submitted file.
#[async_trait]
pub trait Job: Send + Sync + 'static {
    async fn run(&self, path: &Path) -> Result<()>;
}

/// A [`Job`] backed by an async closure. Built with [`job_fn`].
pub struct FnJob<F>(F);

/// Wrap an async closure taking the file path as a [`Job`].
pub fn job_fn<F, Fut>(f: F) -> FnJob<F>
where
    F: Fn(PathBuf) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    FnJob(f)
}

#[async_trait]
impl<F, Fut> Job for FnJob<F>
where
    F: Fn(PathBuf) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn run(&self, path: &Path) -> Result<()> {
        (self.0)(path.to_path_buf()).await
    }
}
