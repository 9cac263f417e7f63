//! Waiting for a job's first media segment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use walkdir::WalkDir;

use super::error::ReadinessError;

const SEGMENT_EXTENSION: &str = "ts";
const PLAYLIST_EXTENSION: &str = "m3u8";

/// Polls a job directory until a `.ts` segment shows up anywhere beneath it.
#[derive(Debug, Clone)]
pub struct ReadinessMonitor {
    dir: PathBuf,
    poll_interval: Duration,
    timeout: Option<Duration>,
}

impl ReadinessMonitor {
    /// Creates a monitor polling every second with no timeout.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            poll_interval: Duration::from_secs(1),
            timeout: None,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Sets the timeout. `None` or a zero duration waits forever.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    /// Starts polling on a background task bound to `cancel`.
    pub fn spawn(self, cancel: CancellationToken) -> ReadinessHandle {
        let task = tokio::spawn(self.poll(cancel));
        ReadinessHandle { task: Some(task) }
    }

    async fn poll(self, cancel: CancellationToken) -> Result<PathBuf, ReadinessError> {
        let started = Instant::now();
        let deadline = self.timeout.map(|t| started + t);

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!("Waiting for first segment in {}", self.dir.display());

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!("Readiness wait for {} cancelled", self.dir.display());
                    return Err(ReadinessError::Cancelled);
                }

                _ = sleep_until(deadline) => {
                    return Err(ReadinessError::Timeout {
                        waited_secs: started.elapsed().as_secs(),
                    });
                }

                _ = ticker.tick() => {
                    let dir = self.dir.clone();
                    let found = tokio::task::spawn_blocking(move || find_segment(&dir))
                        .await
                        .map_err(|e| ReadinessError::Scan(e.to_string()))??;

                    if let Some(segment) = found {
                        debug!(
                            "First segment {} ready after {:?}",
                            segment.display(),
                            started.elapsed()
                        );
                        return Ok(segment);
                    }
                }
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Returns the first segment found beneath `dir`, if any.
///
/// A missing directory is not an error; the engine may not have created it yet.
/// Entries that vanish mid-walk are skipped since the engine rotates segments.
pub fn find_segment(dir: &Path) -> Result<Option<PathBuf>, ReadinessError> {
    if !dir.exists() {
        return Ok(None);
    }

    for entry in WalkDir::new(dir).min_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(ReadinessError::Scan(e.to_string())),
            Err(e) => {
                trace!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        if entry.file_type().is_file()
            && entry.path().extension().is_some_and(|ext| ext == SEGMENT_EXTENSION)
        {
            return Ok(Some(entry.into_path()));
        }
    }

    Ok(None)
}

/// Deletes segments and playlists left beneath `dir` by an earlier run of the same job.
///
/// Returns the number of files removed and one message per file that could not be.
pub fn remove_stale_media(dir: &Path) -> (usize, Vec<String>) {
    let mut removed = 0;
    let mut failures = Vec::new();

    if !dir.exists() {
        return (removed, failures);
    }

    for entry in WalkDir::new(dir).min_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                failures.push(format!("failed to scan {}: {}", dir.display(), e));
                continue;
            }
        };

        let is_media = entry.path().extension().is_some_and(|ext| {
            ext == SEGMENT_EXTENSION || ext == PLAYLIST_EXTENSION
        });
        if !entry.file_type().is_file() || !is_media {
            continue;
        }

        match std::fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => failures.push(format!(
                "failed to remove stale {}: {}",
                entry.path().display(),
                e
            )),
        }
    }

    (removed, failures)
}

/// Handle to a running readiness poll. Dropping it stops the poll.
pub struct ReadinessHandle {
    task: Option<JoinHandle<Result<PathBuf, ReadinessError>>>,
}

impl ReadinessHandle {
    /// Waits for the outcome: the first segment's path, a timeout or a cancellation.
    pub async fn wait(mut self) -> Result<PathBuf, ReadinessError> {
        let Some(task) = self.task.take() else {
            return Err(ReadinessError::Cancelled);
        };

        match task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(ReadinessError::Cancelled),
            Err(e) => Err(ReadinessError::Scan(e.to_string())),
        }
    }
}

impl Drop for ReadinessHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
