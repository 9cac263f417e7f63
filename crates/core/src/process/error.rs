//! Error types for managed processes.

use thiserror::Error;

/// Errors produced while starting or supervising an external process.
///
/// Start errors (`InvalidCommand`, `EmptyCommand`, `SpawnFailed`, `AlreadyRunning`) are
/// returned synchronously from [`super::ManagedProcess::spawn`]. Runtime errors
/// (`ExitedWithCode`, `KilledBySignal`, `UnexpectedCleanExit`, `Wait`) only ever reach the
/// exit callback.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The command template could not be split into words.
    #[error("invalid command: {reason}")]
    InvalidCommand { reason: String },

    /// The command template expanded to nothing.
    #[error("command is empty")]
    EmptyCommand,

    /// The OS refused to start the program.
    #[error("failed to spawn {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A live process is already registered under this job ID.
    #[error("a process is already running for job {0}")]
    AlreadyRunning(String),

    /// The process exited with a non-zero status.
    #[error("command exited with code {code}")]
    ExitedWithCode { code: i32 },

    /// The process was killed by a signal it did not receive from us.
    #[error("command killed by signal {signal}")]
    KilledBySignal { signal: i32 },

    /// The process exited with status 0 although it is expected to run forever.
    #[error("command exited with code 0")]
    UnexpectedCleanExit,

    /// Waiting on the child failed.
    #[error("failed to wait for process: {0}")]
    Wait(#[source] std::io::Error),

    /// Signalling the process group failed.
    #[cfg(unix)]
    #[error("failed to signal process group: {0}")]
    Signal(#[from] nix::errno::Errno),
}

impl ProcessError {
    /// Whether the error happened before the process ever ran.
    pub fn is_start_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidCommand { .. }
                | Self::EmptyCommand
                | Self::SpawnFailed { .. }
                | Self::AlreadyRunning(_)
        )
    }

    /// Short label used for metrics and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InvalidCommand { .. } | Self::EmptyCommand => "invalid_command",
            Self::SpawnFailed { .. } => "spawn_failed",
            Self::AlreadyRunning(_) => "already_running",
            Self::ExitedWithCode { .. } => "exit_code",
            Self::KilledBySignal { .. } => "signal",
            Self::UnexpectedCleanExit => "unexpected_clean_exit",
            Self::Wait(_) => "wait_failed",
            #[cfg(unix)]
            Self::Signal(_) => "signal_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            ProcessError::ExitedWithCode { code: 1 }.to_string(),
            "command exited with code 1"
        );
        assert_eq!(
            ProcessError::UnexpectedCleanExit.to_string(),
            "command exited with code 0"
        );
        assert_eq!(
            ProcessError::AlreadyRunning("abc".to_string()).to_string(),
            "a process is already running for job abc"
        );
    }

    #[test]
    fn test_start_error_classification() {
        assert!(ProcessError::EmptyCommand.is_start_error());
        assert!(ProcessError::AlreadyRunning("x".to_string()).is_start_error());
        assert!(!ProcessError::UnexpectedCleanExit.is_start_error());
        assert!(!ProcessError::ExitedWithCode { code: 2 }.is_start_error());
    }
}
