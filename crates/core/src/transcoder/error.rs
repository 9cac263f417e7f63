//! Error types for the transcoder module.

use thiserror::Error;

use crate::process::ProcessError;

/// Errors from waiting on a job's first segment.
#[derive(Debug, Error)]
pub enum ReadinessError {
    /// No segment appeared within the configured timeout.
    #[error("no segment produced after {waited_secs} seconds")]
    Timeout { waited_secs: u64 },

    /// The wait was cancelled, usually because the job was stopped.
    #[error("readiness wait cancelled")]
    Cancelled,

    /// The job directory could not be scanned.
    #[error("failed to scan output directory: {0}")]
    Scan(String),
}

/// Errors that can occur while starting or managing transcode jobs.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("invalid job id '{id}': {reason}")]
    InvalidJobId { id: String, reason: String },

    #[error("invalid source: {reason}")]
    InvalidSource { reason: String },

    #[error("job {0} is already running")]
    JobAlreadyRunning(String),

    #[error("job {0} not found")]
    JobNotFound(String),

    #[error("failed to start engine: {0}")]
    Process(#[from] ProcessError),

    #[error("stream not ready: {0}")]
    Readiness(#[from] ReadinessError),

    #[error("failed to render master playlist: {0}")]
    Manifest(#[source] std::io::Error),
}

impl OrchestratorError {
    pub fn invalid_id(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidJobId {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_source(reason: impl Into<String>) -> Self {
        Self::InvalidSource {
            reason: reason.into(),
        }
    }

    /// Short label used for the jobs-started metric.
    pub fn result_label(&self) -> &'static str {
        match self {
            Self::InvalidJobId { .. } | Self::InvalidSource { .. } => "invalid",
            Self::JobAlreadyRunning(_) => "duplicate",
            Self::JobNotFound(_) => "not_found",
            Self::Process(_) => "spawn_failed",
            Self::Readiness(ReadinessError::Timeout { .. }) => "timeout",
            Self::Readiness(ReadinessError::Cancelled) => "cancelled",
            Self::Readiness(ReadinessError::Scan(_)) => "scan_failed",
            Self::Manifest(_) => "manifest_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OrchestratorError::invalid_id("../x", "must be a single path segment");
        assert_eq!(
            err.to_string(),
            "invalid job id '../x': must be a single path segment"
        );

        let err: OrchestratorError = ReadinessError::Timeout { waited_secs: 5 }.into();
        assert_eq!(
            err.to_string(),
            "stream not ready: no segment produced after 5 seconds"
        );
    }

    #[test]
    fn test_already_running_process_error_converts() {
        let err: OrchestratorError = ProcessError::AlreadyRunning("abc".to_string()).into();
        assert!(matches!(err, OrchestratorError::Process(_)));
        assert_eq!(err.result_label(), "spawn_failed");
    }
}
