//! Registry of live managed processes keyed by job ID.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, info};

use super::error::ProcessError;
use super::managed::{ManagedProcess, ProcessInfo, ProcessState};

/// Shared registry of managed processes.
///
/// Cloning is cheap; all clones see the same set of processes. At most one live
/// process exists per job ID. A process leaves the pool when its supervising loop
/// ends, whether it exited or was terminated.
#[derive(Clone, Default)]
pub struct ProcessPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    entries: Mutex<HashMap<String, Arc<ManagedProcess>>>,
    /// Number of supervising loops still running.
    active: watch::Sender<usize>,
}

impl Default for PoolInner {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            active: watch::channel(0).0,
        }
    }
}

/// Held by a supervising loop for as long as it runs.
///
/// Dropping it removes the process from the pool and releases the pool's wait group.
pub(crate) struct PoolGuard {
    inner: Arc<PoolInner>,
    process: Arc<ManagedProcess>,
}

impl Drop for PoolGuard {
    fn drop(&mut self) {
        self.process.abandon();

        {
            let mut entries = lock(&self.inner.entries);
            let job_id = self.process.job_id();
            if entries
                .get(job_id)
                .is_some_and(|current| Arc::ptr_eq(current, &self.process))
            {
                entries.remove(job_id);
            }
        }

        self.inner.active.send_modify(|n| *n = n.saturating_sub(1));
        debug!("Process for job {} left the pool", self.process.job_id());
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ProcessPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a process started by `start` under `job_id`.
    ///
    /// The duplicate check, the start and the insertion happen under one lock, so two
    /// concurrent registrations for the same ID can never both succeed.
    pub(crate) fn register<T>(
        &self,
        job_id: &str,
        start: impl FnOnce() -> Result<(Arc<ManagedProcess>, T), ProcessError>,
    ) -> Result<(Arc<ManagedProcess>, T, PoolGuard), ProcessError> {
        let mut entries = lock(&self.inner.entries);

        if entries.contains_key(job_id) {
            return Err(ProcessError::AlreadyRunning(job_id.to_string()));
        }

        let (process, extra) = start()?;
        entries.insert(job_id.to_string(), Arc::clone(&process));
        self.inner.active.send_modify(|n| *n += 1);

        let guard = PoolGuard {
            inner: Arc::clone(&self.inner),
            process: Arc::clone(&process),
        };

        Ok((process, extra, guard))
    }

    pub fn get(&self, job_id: &str) -> Option<Arc<ManagedProcess>> {
        lock(&self.inner.entries).get(job_id).cloned()
    }

    pub fn contains(&self, job_id: &str) -> bool {
        lock(&self.inner.entries).contains_key(job_id)
    }

    pub fn len(&self) -> usize {
        lock(&self.inner.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of supervising loops that have not finished yet.
    pub fn active(&self) -> usize {
        *self.inner.active.borrow()
    }

    /// Snapshots of all registered processes, oldest first.
    pub fn list(&self) -> Vec<ProcessInfo> {
        let mut infos: Vec<ProcessInfo> = lock(&self.inner.entries)
            .values()
            .map(|p| p.info())
            .collect();
        infos.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.job_id.cmp(&b.job_id))
        });
        infos
    }

    /// Requests termination of one process. Returns `false` if no such job is registered.
    pub fn terminate(&self, job_id: &str) -> bool {
        match self.get(job_id) {
            Some(process) => {
                process.terminate();
                true
            }
            None => false,
        }
    }

    /// Terminates a process and waits for its loop to end.
    pub async fn stop(&self, job_id: &str) -> Option<ProcessState> {
        let process = self.get(job_id)?;
        Some(process.stop().await)
    }

    /// Requests termination of every registered process. Returns how many were signalled.
    ///
    /// Safe to call repeatedly; processes that are already gone are simply skipped.
    pub fn terminate_all(&self) -> usize {
        let processes: Vec<Arc<ManagedProcess>> =
            lock(&self.inner.entries).values().cloned().collect();

        if !processes.is_empty() {
            info!("Terminating {} managed process(es)", processes.len());
        }

        for process in &processes {
            process.terminate();
        }
        processes.len()
    }

    /// Waits until every supervising loop started through this pool has ended.
    pub async fn wait(&self) {
        let mut rx = self.inner.active.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}
