// ABOUTME: Single-flight job primitives: per-key state machine and registry.
// ABOUTME: First caller becomes the executor; everyone else shares the result.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tokio::sync::watch;

use super::BuildError;

/// One unit of deduplicated, cacheable work.
///
/// State machine: `Pending → Running → Done(Ok | Err)`. The result is written
/// exactly once, before the completion signal fires, and is immutable from
/// then on; any reader that has observed the signal may read it without
/// further synchronization.
pub struct Job<T> {
    result: OnceLock<Result<T, BuildError>>,
    done: watch::Sender<bool>,
}

impl<T: Clone> Job<T> {
    pub fn new() -> Self {
        let (done, _) = watch::channel(false);
        Self {
            result: OnceLock::new(),
            done,
        }
    }

    /// Record the outcome and fire the completion signal.
    ///
    /// Later calls are ignored; a job completes once.
    pub fn complete(&self, result: Result<T, BuildError>) {
        if self.result.set(result).is_ok() {
            self.done.send_replace(true);
        }
    }

    pub fn is_done(&self) -> bool {
        *self.done.borrow()
    }

    /// Non-blocking read: `Some` once the completion signal has fired.
    pub fn try_result(&self) -> Option<Result<T, BuildError>> {
        if self.is_done() {
            self.result.get().cloned()
        } else {
            None
        }
    }

    /// Suspend until the job completes, then read the cached outcome.
    pub async fn wait(&self) -> Result<T, BuildError> {
        let mut rx = self.done.subscribe();
        while !*rx.borrow_and_update() {
            // The sender lives inside self, so this only yields while the
            // signal is still pending.
            let _ = rx.changed().await;
        }
        self.result
            .get()
            .cloned()
            .ok_or_else(|| BuildError::Internal("job signaled completion without a result".into()))?
    }
}

impl<T: Clone> Default for Job<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-key registry of jobs with atomic get-or-create.
///
/// Instance-scoped: one registry per render (template-level jobs) or per
/// builder (single-flight execution), never process-global.
pub struct JobRegistry<K, T> {
    jobs: Mutex<HashMap<K, Arc<Job<T>>>>,
}

impl<K, T> JobRegistry<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Look up or create the job for `key`.
    ///
    /// The boolean is true for exactly one caller per key: that caller is the
    /// sole executor and must eventually `complete` the job.
    pub fn get_or_create(&self, key: K) -> (Arc<Job<T>>, bool) {
        let mut jobs = self.jobs.lock();
        match jobs.get(&key) {
            Some(job) => (job.clone(), false),
            None => {
                let job = Arc::new(Job::new());
                jobs.insert(key, job.clone());
                (job, true)
            }
        }
    }

    /// Lazy-task form: the first caller for `key` spawns a background task
    /// that runs `make()` to completion; all callers share the job handle.
    pub fn get_or_spawn<F, Fut>(&self, key: K, make: F) -> Arc<Job<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, BuildError>> + Send + 'static,
        T: Send + Sync + 'static,
    {
        let (job, created) = self.get_or_create(key);
        if created {
            let fut = make();
            let handle = job.clone();
            tokio::spawn(async move {
                // Run the worker on its own task so a panic still completes
                // the job instead of leaving waiters blocked forever.
                let result = match tokio::spawn(fut).await {
                    Ok(result) => result,
                    Err(e) => Err(BuildError::Internal(format!("job worker panicked: {}", e))),
                };
                handle.complete(result);
            });
        }
        job
    }

    /// Snapshot of all registered jobs.
    pub fn entries(&self) -> Vec<(K, Arc<Job<T>>)> {
        self.jobs
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }
}

impl<K, T> Default for JobRegistry<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
