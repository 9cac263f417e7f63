//! HLS transcode jobs.
//!
//! The orchestrator validates a request, lays out the job directory, writes the
//! master manifest, runs the engine under a [`crate::process::ManagedProcess`] and
//! waits for the first segment before reporting the job as started.

mod config;
mod engine;
mod error;
mod job;
mod manifest;
mod orchestrator;
mod readiness;

pub use config::TranscoderConfig;
pub use engine::{build_command, EngineCommand, OUTPUT_VAR, SOURCE_VAR};
pub use error::{OrchestratorError, ReadinessError};
pub use job::{validate_job_id, validate_source, variant_playlist, Job, JobRequest};
pub use manifest::{master_playlist, render};
pub use orchestrator::{JobStatus, StartedJob, TranscodeOrchestrator};
pub use readiness::{find_segment, remove_stale_media, ReadinessHandle, ReadinessMonitor};
