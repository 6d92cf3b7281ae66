//! Per-file task fan-out with a bounded shutdown.

use derive_more::Display;
use exn::ResultExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{Semaphore, watch};
use tokio::task::{JoinError, JoinSet};

use crate::error::{ErrorKind, Result};
use crate::job::Job;

/// Invoked once for every file whose job succeeded.
pub type CompletionCallback = Arc<dyn Fn(&Path) + Send + Sync>;

/// Lifecycle of a [`Scheduler`]. Only ever moves forward.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Created, not yet started.
    #[display("idle")]
    Idle,
    /// Taking submissions.
    #[display("accepting")]
    Accepting,
    /// Shutting down: no new submissions, waiting for in-flight work.
    #[display("draining")]
    Draining,
    #[display("stopped")]
    Stopped,
}

#[derive(Debug, Clone, Default)]
pub struct SchedulerOptions {
    /// Upper bound on jobs running at the same time; `None` is unbounded.
    /// Values above [`Semaphore::MAX_PERMITS`] are clamped to it.
    ///
    /// Submitting never waits on this limit. Tasks over the limit are
    /// spawned anyway and wait for a slot.
    pub max_in_flight: Option<usize>,
}

/// What happened to every file submitted over the scheduler's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub succeeded: u64,
    /// Jobs that returned an error or panicked.
    pub failed: u64,
    /// Jobs aborted because the shutdown grace period ran out.
    pub cancelled: u64,
}
impl ShutdownReport {
    pub fn total(&self) -> u64 {
        self.succeeded + self.failed + self.cancelled
    }
}

#[derive(Default)]
struct Counters {
    succeeded: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
}
impl Counters {
    fn report(&self) -> ShutdownReport {
        ShutdownReport {
            succeeded: self.succeeded.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            cancelled: self.cancelled.load(Ordering::SeqCst),
        }
    }

    /// Account for a task that ended without reaching its own bookkeeping.
    fn record(&self, result: std::result::Result<(), JoinError>) {
        let Err(err) = result else {
            return;
        };
        if err.is_cancelled() {
            self.cancelled.fetch_add(1, Ordering::SeqCst);
        } else {
            tracing::error!(error = %err, "Fetch task panicked");
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

struct Inner {
    state: SchedulerState,
    runtime: Option<Handle>,
    tasks: JoinSet<()>,
}

struct Shared {
    inner: Mutex<Inner>,
    counters: Counters,
    stopped: watch::Sender<Option<ShutdownReport>>,
}
impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Nothing panics while holding the lock; recover rather than propagate poisoning.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Runs a [`Job`] for every submitted file, one Tokio task each.
///
/// Failures are isolated: an error or panic in one job is logged and counted,
/// and never affects other jobs or the submitter. The completion callback is
/// only called for jobs that succeeded.
pub struct Scheduler {
    job: Arc<dyn Job>,
    on_complete: CompletionCallback,
    limit: Option<Arc<Semaphore>>,
    shared: Arc<Shared>,
}

impl Scheduler {
    pub fn new(job: impl Job, on_complete: impl Fn(&Path) + Send + Sync + 'static, options: SchedulerOptions) -> Self {
        let (stopped, _) = watch::channel(None);
        Self {
            job: Arc::new(job),
            on_complete: Arc::new(on_complete),
            limit: options
                .max_in_flight
                .map(|permits| Arc::new(Semaphore::new(permits.min(Semaphore::MAX_PERMITS)))),
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner { state: SchedulerState::Idle, runtime: None, tasks: JoinSet::new() }),
                counters: Counters::default(),
                stopped,
            }),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.shared.lock().state
    }

    /// Start accepting work on the current Tokio runtime.
    ///
    /// Starting an already started scheduler does nothing; a scheduler that
    /// has begun shutting down cannot be restarted.
    pub fn start(&self) -> Result<()> {
        let mut inner = self.shared.lock();
        match inner.state {
            SchedulerState::Idle => {},
            SchedulerState::Accepting => return Ok(()),
            state => exn::bail!(ErrorKind::NotAccepting(state)),
        }
        inner.runtime = Some(Handle::try_current().or_raise(|| ErrorKind::NoRuntime)?);
        inner.state = SchedulerState::Accepting;
        tracing::debug!("Scheduler accepting work");
        Ok(())
    }

    /// Queue `path` for processing. Never waits for the job to run.
    pub fn submit(&self, path: impl Into<PathBuf>) -> Result<()> {
        let mut inner = self.shared.lock();
        let Inner { state, runtime, tasks } = &mut *inner;
        let (SchedulerState::Accepting, Some(runtime)) = (*state, runtime.as_ref()) else {
            exn::bail!(ErrorKind::NotAccepting(*state));
        };
        // Keep the set from growing with every finished task.
        while let Some(result) = tasks.try_join_next() {
            self.shared.counters.record(result);
        }
        let path = path.into();
        let job = Arc::clone(&self.job);
        let on_complete = Arc::clone(&self.on_complete);
        let limit = self.limit.clone();
        let shared = Arc::clone(&self.shared);
        tasks.spawn_on(
            async move {
                let _permit = match limit {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };
                match job.run(&path).await {
                    Ok(()) => {
                        on_complete(&path);
                        shared.counters.succeeded.fetch_add(1, Ordering::SeqCst);
                        tracing::debug!(path = %path.display(), "Fetched");
                    },
                    Err(err) => {
                        tracing::warn!(path = %path.display(), error = ?err, "Fetch failed");
                        shared.counters.failed.fetch_add(1, Ordering::SeqCst);
                    },
                }
            },
            runtime,
        );
        Ok(())
    }

    /// Stop accepting work and wait up to `grace` for in-flight jobs.
    ///
    /// Jobs still running when `grace` elapses are aborted and reported as
    /// cancelled. Every call, concurrent or repeated, returns the same report.
    /// Callable from any thread, inside a Tokio runtime or not.
    pub async fn shutdown(&self, grace: Duration) -> ShutdownReport {
        let mut stopped = self.shared.stopped.subscribe();
        {
            let mut inner = self.shared.lock();
            match (inner.state, inner.runtime.clone()) {
                (SchedulerState::Accepting, Some(runtime)) => {
                    inner.state = SchedulerState::Draining;
                    let tasks = std::mem::take(&mut inner.tasks);
                    // Drained in its own task so that dropping this future halfway
                    // through can't leave the scheduler stuck in `Draining`.
                    runtime.spawn(drain(Arc::clone(&self.shared), tasks, grace));
                },
                (SchedulerState::Idle | SchedulerState::Accepting, _) => {
                    // Never started, so nothing was ever spawned.
                    inner.state = SchedulerState::Stopped;
                    let report = self.shared.counters.report();
                    tracing::debug!("Scheduler stopped before starting");
                    self.shared.stopped.send_replace(Some(report));
                    return report;
                },
                (SchedulerState::Draining | SchedulerState::Stopped, _) => {},
            }
        }
        match stopped.wait_for(Option::is_some).await {
            Ok(report) => (*report).unwrap_or_default(),
            Err(_) => self.shared.counters.report(),
        }
    }
}

async fn drain(shared: Arc<Shared>, mut tasks: JoinSet<()>, grace: Duration) {
    tracing::info!(in_flight = tasks.len(), grace = ?grace, "Draining fetch tasks");
    let drained = tokio::time::timeout(grace, join_all(&shared, &mut tasks)).await;
    if drained.is_err() {
        tracing::warn!(remaining = tasks.len(), "Grace period elapsed, aborting fetch tasks");
        tasks.abort_all();
        join_all(&shared, &mut tasks).await;
    }
    let report = shared.counters.report();
    shared.lock().state = SchedulerState::Stopped;
    tracing::info!(
        succeeded = report.succeeded,
        failed = report.failed,
        cancelled = report.cancelled,
        "Scheduler stopped"
    );
    shared.stopped.send_replace(Some(report));
}

async fn join_all(shared: &Shared, tasks: &mut JoinSet<()>) {
    while let Some(result) = tasks.join_next().await {
        shared.counters.record(result);
    }
}
