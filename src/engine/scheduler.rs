//! Outstanding-work accounting for the shared worker pool
//!
//! Tasks run on a `rayon` pool that many parses may share, so the pool
//! itself cannot say when one parse has gone quiet. The [`Scheduler`]
//! counts the tasks a parse has queued but not yet finished; the caller
//! learns about the 1 -> 0 transition from [`leave`](Scheduler::leave)
//! and runs its idle hook then.
//!
//! Whoever runs the idle hook holds a unit of work of its own while doing
//! so, which keeps a second idle transition from overlapping the first.

use rayon::ThreadPool;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Build the worker pool described by `num_threads` and `prefix`
pub(crate) fn build_pool(
    num_threads: Option<usize>,
    prefix: &str,
) -> Result<ThreadPool, rayon::ThreadPoolBuildError> {
    let prefix = prefix.to_string();
    let mut builder =
        rayon::ThreadPoolBuilder::new().thread_name(move |i| format!("{}-{}", prefix, i));
    if let Some(n) = num_threads {
        builder = builder.num_threads(n);
    }
    builder.build()
}

/// Per-parse task counter over a shared pool
pub(crate) struct Scheduler {
    pool: Arc<ThreadPool>,
    outstanding: AtomicUsize,
    executed: AtomicU64,
}

impl Scheduler {
    pub fn new(pool: Arc<ThreadPool>) -> Self {
        Self {
            pool,
            outstanding: AtomicUsize::new(0),
            executed: AtomicU64::new(0),
        }
    }

    /// Queue a job on the pool
    ///
    /// The job must end by calling [`leave`](Self::leave); this call has
    /// already counted it.
    pub fn submit<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.enter();
        self.pool.spawn(job);
    }

    /// Count one more unit of outstanding work
    #[inline]
    pub fn enter(&self) {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
    }

    /// Finish one unit of work
    ///
    /// Returns `true` when it was the last one outstanding.
    ///
    /// # Panics
    /// Panics if nothing was outstanding.
    pub fn leave(&self) -> bool {
        let previous = self.outstanding.fetch_sub(1, Ordering::AcqRel);
        assert!(previous > 0, "scheduler counter underflow");
        previous == 1
    }

    /// Record a finished task
    #[inline]
    pub fn task_finished(&self) {
        self.executed.fetch_add(1, Ordering::Relaxed);
    }

    /// Tasks finished so far
    pub fn tasks_run(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }
}
