//! Supervised external processes.
//!
//! A [`ManagedProcess`] runs one command line in its own process group, optionally
//! restarting it after unexpected exits. A [`ProcessPool`] tracks every live
//! process by job ID and can tear them all down on shutdown.

mod command;
mod error;
mod managed;
mod pool;

pub use command::{expand, CommandLine, Environment};
pub use error::ProcessError;
pub use managed::{
    ManagedProcess, OnExit, ProcessInfo, ProcessSpec, ProcessState, KILL_GRACE, RESTART_PAUSE,
};
pub use pool::ProcessPool;
