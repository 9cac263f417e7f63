//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Managed processes (spawns, exits, restarts)
//! - Transcode jobs (start results, readiness wait)

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Managed Processes
// =============================================================================

/// OS processes spawned, including restarts.
pub static PROCESS_SPAWNS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "hlsproxy_process_spawns_total",
        "Total engine processes spawned",
    )
    .unwrap()
});

/// Process exits by reason.
pub static PROCESS_EXITS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("hlsproxy_process_exits_total", "Total engine process exits"),
        &["reason"], // "clean", "exit_code", "signal", "unexpected_clean_exit", "terminated", ...
    )
    .unwrap()
});

/// Restarts performed after the restart pause.
pub static PROCESS_RESTARTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "hlsproxy_process_restarts_total",
        "Total engine process restarts",
    )
    .unwrap()
});

// =============================================================================
// Transcode Jobs
// =============================================================================

/// Job start attempts by result.
pub static JOBS_STARTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("hlsproxy_jobs_started_total", "Total job start attempts"),
        &["result"], // "ready", "invalid", "duplicate", "spawn_failed", "timeout", "cancelled"
    )
    .unwrap()
});

/// Time from engine start to the first segment on disk.
pub static READINESS_WAIT: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "hlsproxy_readiness_wait_seconds",
            "Time until the first segment of a job is written",
        )
        .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0]),
    )
    .unwrap()
});

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Processes
        Box::new(PROCESS_SPAWNS.clone()),
        Box::new(PROCESS_EXITS.clone()),
        Box::new(PROCESS_RESTARTS.clone()),
        // Jobs
        Box::new(JOBS_STARTED.clone()),
        Box::new(READINESS_WAIT.clone()),
    ]
}
