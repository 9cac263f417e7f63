//! Transcode orchestrator implementation.
//!
//! Turns a [`JobRequest`] into a running engine process:
//! - Validates and normalizes the request into a [`Job`]
//! - Prepares the per-variant output directories and the master manifest
//! - Spawns one restart-enabled [`ManagedProcess`] for the job
//! - Blocks until the first segment exists, then hands back the master manifest

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::config::TranscoderConfig;
use super::engine::build_command;
use super::error::OrchestratorError;
use super::job::{Job, JobRequest};
use super::manifest::{master_playlist, render};
use super::readiness::{remove_stale_media, ReadinessMonitor};
use crate::metrics::{JOBS_STARTED, READINESS_WAIT};
use crate::process::{
    ManagedProcess, ProcessError, ProcessInfo, ProcessPool, ProcessSpec, ProcessState,
};
use crate::variant::{AudioCodec, VideoCodec};

/// A job whose first segment is on disk.
#[derive(Debug, Clone, Serialize)]
pub struct StartedJob {
    pub id: String,
    /// Master manifest with absolute variant URIs.
    pub master_playlist: String,
    /// Public URL of the master manifest written to disk.
    pub playlist_url: String,
    pub output_dir: PathBuf,
    pub variants: Vec<String>,
    /// Non-fatal problems hit while preparing the job.
    pub warnings: Vec<String>,
}

/// Status of a running job.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub id: String,
    pub source: String,
    pub variants: Vec<String>,
    pub video_codec: VideoCodec,
    pub audio_codec: AudioCodec,
    pub output_dir: PathBuf,
    pub playlist_url: String,
    pub created_at: DateTime<Utc>,
    pub process: ProcessInfo,
}

/// Starts, tracks and stops transcode jobs.
pub struct TranscodeOrchestrator {
    config: TranscoderConfig,
    pool: ProcessPool,
    jobs: Mutex<HashMap<String, Arc<Job>>>,
}

impl TranscodeOrchestrator {
    pub fn new(config: TranscoderConfig, pool: ProcessPool) -> Self {
        Self {
            config,
            pool,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &TranscoderConfig {
        &self.config
    }

    pub fn pool(&self) -> &ProcessPool {
        &self.pool
    }

    /// Starts a job and waits until it is ready to be served.
    pub async fn start(&self, request: JobRequest) -> Result<StartedJob, OrchestratorError> {
        let result = self.start_job(request).await;

        let label = match &result {
            Ok(_) => "ready",
            Err(e) => e.result_label(),
        };
        JOBS_STARTED.with_label_values(&[label]).inc();

        result
    }

    async fn start_job(&self, request: JobRequest) -> Result<StartedJob, OrchestratorError> {
        let job = Job::from_request(request, &self.config)?;

        if self.pool.contains(&job.id) {
            return Err(OrchestratorError::JobAlreadyRunning(job.id));
        }

        info!(
            "Starting job {} from {} with variants {:?} ({}/{})",
            job.id,
            job.source,
            job.variant_names(),
            job.video_codec,
            job.audio_codec
        );

        let public = master_playlist(&job, |rel| self.config.public_path(&job.id, rel));
        let master = render(&public).map_err(OrchestratorError::Manifest)?;

        let mut warnings = Vec::new();
        self.prepare_directories(&job, &mut warnings).await;
        self.write_master(&job, &mut warnings).await;

        let command = build_command(&job, &self.config);
        debug!("Engine command for job {}: {}", job.id, command.template);

        let job_id = job.id.clone();
        let spec = ProcessSpec::new(&job.id, command.template)
            .with_restart(true)
            .with_env(command.env)
            .on_exit(move |e| warn!("Engine for job {} failed: {}", job_id, e));

        let process = ManagedProcess::spawn(&self.pool, spec).map_err(|e| match e {
            ProcessError::AlreadyRunning(id) => OrchestratorError::JobAlreadyRunning(id),
            other => OrchestratorError::Process(other),
        })?;

        let job = Arc::new(job);
        self.jobs().insert(job.id.clone(), Arc::clone(&job));

        let waited = Instant::now();
        let readiness = ReadinessMonitor::new(&job.output_dir)
            .with_poll_interval(Duration::from_millis(self.config.readiness_poll_interval_ms))
            .with_timeout(Some(Duration::from_secs(self.config.readiness_timeout_secs)))
            .spawn(process.child_token());

        match readiness.wait().await {
            Ok(segment) => {
                READINESS_WAIT.observe(waited.elapsed().as_secs_f64());
                info!(
                    "Job {} ready after {:?} (first segment {})",
                    job.id,
                    waited.elapsed(),
                    segment.display()
                );
            }
            Err(e) => {
                warn!("Job {} never became ready: {}", job.id, e);
                process.stop().await;
                self.forget(&job);
                return Err(e.into());
            }
        }

        Ok(StartedJob {
            id: job.id.clone(),
            master_playlist: master,
            playlist_url: self.playlist_url(&job.id),
            output_dir: job.output_dir.clone(),
            variants: job.variant_names().into_iter().map(String::from).collect(),
            warnings,
        })
    }

    /// Stops a running job and waits for its process to exit.
    pub async fn stop(&self, id: &str) -> Result<ProcessState, OrchestratorError> {
        let job = self.jobs().get(id).cloned();
        let state = self
            .pool
            .stop(id)
            .await
            .ok_or_else(|| OrchestratorError::JobNotFound(id.to_string()))?;

        if let Some(job) = job {
            self.forget(&job);
        }
        info!("Stopped job {}", id);
        Ok(state)
    }

    pub fn status(&self, id: &str) -> Option<JobStatus> {
        let process = self.pool.get(id)?;
        let job = self.jobs().get(id).cloned()?;
        Some(self.job_status(&job, process.info()))
    }

    /// All running jobs, oldest first.
    pub fn list(&self) -> Vec<JobStatus> {
        let processes = self.pool.list();
        let mut jobs = self.jobs();
        jobs.retain(|id, _| processes.iter().any(|p| &p.job_id == id));

        processes
            .into_iter()
            .filter_map(|info| {
                let job = jobs.get(&info.job_id).cloned()?;
                Some(self.job_status(&job, info))
            })
            .collect()
    }

    /// Terminates every job, waits for all processes to exit and optionally removes the
    /// output directory.
    pub async fn shutdown(&self) {
        let count = self.pool.terminate_all();
        info!("Shutting down transcoder ({} running job(s))", count);

        self.pool.wait().await;
        self.jobs().clear();

        if self.config.remove_output_on_shutdown {
            match tokio::fs::remove_dir_all(&self.config.output_dir).await {
                Ok(()) => info!(
                    "Removed output directory {}",
                    self.config.output_dir.display()
                ),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(
                    "Failed to remove output directory {}: {}",
                    self.config.output_dir.display(),
                    e
                ),
            }
        }
    }

    fn playlist_url(&self, id: &str) -> String {
        self.config.public_path(id, &self.config.master_filename)
    }

    fn job_status(&self, job: &Job, process: ProcessInfo) -> JobStatus {
        JobStatus {
            id: job.id.clone(),
            source: job.source.clone(),
            variants: job.variant_names().into_iter().map(String::from).collect(),
            video_codec: job.video_codec,
            audio_codec: job.audio_codec,
            output_dir: job.output_dir.clone(),
            playlist_url: self.playlist_url(&job.id),
            created_at: job.created_at,
            process,
        }
    }

    /// Drops `job`'s entry unless a newer job has already taken its ID.
    fn forget(&self, job: &Arc<Job>) {
        let mut jobs = self.jobs();
        if jobs
            .get(&job.id)
            .is_some_and(|current| Arc::ptr_eq(current, job))
        {
            jobs.remove(&job.id);
        }
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<String, Arc<Job>>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clears media left by an earlier run of the same job ID, then creates the
    /// variant directories. Readiness must only ever see segments from this run.
    async fn prepare_directories(&self, job: &Job, warnings: &mut Vec<String>) {
        let dir = job.output_dir.clone();
        match tokio::task::spawn_blocking(move || remove_stale_media(&dir)).await {
            Ok((removed, failures)) => {
                if removed > 0 {
                    info!("Removed {} stale file(s) for job {}", removed, job.id);
                }
                for failure in failures {
                    warn!("Job {}: {}", job.id, failure);
                    warnings.push(failure);
                }
            }
            Err(e) => {
                warn!("Stale media cleanup for job {} failed: {}", job.id, e);
                warnings.push(format!("stale media cleanup failed: {}", e));
            }
        }

        for variant in &job.variants {
            let dir = job.variant_dir(variant);
            if let Err(e) = tokio::fs::create_dir_all(&dir).await {
                warn!("Failed to create {}: {}", dir.display(), e);
                warnings.push(format!("failed to create {}: {}", dir.display(), e));
            }
        }
    }

    async fn write_master(&self, job: &Job, warnings: &mut Vec<String>) {
        let path = job.output_dir.join(&self.config.master_filename);
        let playlist = master_playlist(job, |rel| rel.to_string());

        let result = match render(&playlist) {
            Ok(text) => tokio::fs::write(&path, text).await,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            warn!("Failed to write master playlist {}: {}", path.display(), e);
            warnings.push(format!(
                "failed to write master playlist {}: {}",
                path.display(),
                e
            ));
        }
    }
}
