//! Supervision of a single external process.

use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::command::{CommandLine, Environment};
use super::error::ProcessError;
use super::pool::{PoolGuard, ProcessPool};
use crate::metrics::{PROCESS_EXITS, PROCESS_RESTARTS, PROCESS_SPAWNS};

/// Pause between an unexpected exit and the next spawn attempt.
pub const RESTART_PAUSE: Duration = Duration::from_secs(5);

/// How long a terminated process may take to honour SIGINT before the group is killed.
pub const KILL_GRACE: Duration = Duration::from_secs(10);

/// Callback invoked with every runtime failure of a managed process.
pub type OnExit = Arc<dyn Fn(&ProcessError) + Send + Sync>;

/// Lifecycle state of a managed process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    /// An OS process is alive.
    Running,
    /// The process exited and a respawn is scheduled.
    RestartPending,
    /// The process exited and will not be restarted.
    Exited,
    /// The process was stopped on request.
    Terminated,
}

impl ProcessState {
    /// Whether the supervising loop has ended.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Exited | Self::Terminated)
    }
}

/// Everything needed to start a managed process.
pub struct ProcessSpec {
    pub job_id: String,
    pub command: String,
    pub restart: bool,
    pub env: Environment,
    pub on_exit: Option<OnExit>,
}

impl ProcessSpec {
    /// Creates a spec that runs `command` once, with no overrides and no callback.
    pub fn new(job_id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            command: command.into(),
            restart: false,
            env: Environment::new(),
            on_exit: None,
        }
    }

    /// Restart the process after every exit until it is terminated.
    pub fn with_restart(mut self, restart: bool) -> Self {
        self.restart = restart;
        self
    }

    /// Sets the environment overrides.
    pub fn with_env(mut self, env: Environment) -> Self {
        self.env = env;
        self
    }

    /// Sets the exit callback.
    pub fn on_exit(mut self, on_exit: impl Fn(&ProcessError) + Send + Sync + 'static) -> Self {
        self.on_exit = Some(Arc::new(on_exit));
        self
    }
}

/// Snapshot of a managed process for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessInfo {
    pub job_id: String,
    pub pid: Option<u32>,
    pub state: ProcessState,
    pub spawn_count: u64,
    pub restart: bool,
    pub started_at: DateTime<Utc>,
    pub command: String,
}

/// An external process supervised by a background task.
///
/// The task keeps at most one OS process alive at a time. It restarts the process
/// after [`RESTART_PAUSE`] when restart is enabled, and tears the whole process
/// group down when [`ManagedProcess::terminate`] is called.
pub struct ManagedProcess {
    job_id: String,
    command: CommandLine,
    restart: bool,
    started_at: DateTime<Utc>,
    terminate: CancellationToken,
    pid: AtomicU32,
    spawn_count: AtomicU64,
    state: watch::Sender<ProcessState>,
}

enum Supervised {
    Exited(Option<ProcessError>),
    Terminated,
}

impl ManagedProcess {
    /// Starts the process and registers it with `pool`.
    ///
    /// Command parsing and the first spawn happen before this returns, so those
    /// failures surface here and the process is never registered. Later failures are
    /// only reported through the exit callback.
    pub fn spawn(pool: &ProcessPool, spec: ProcessSpec) -> Result<Arc<Self>, ProcessError> {
        let ProcessSpec {
            job_id,
            command,
            restart,
            env,
            on_exit,
        } = spec;

        let command = CommandLine::resolve(&command, &env)?;
        let on_exit: OnExit = on_exit.unwrap_or_else(|| Arc::new(|_: &ProcessError| {}));

        let (process, child, guard) = pool.register(&job_id, || {
            let child = spawn_child(&command, &env)?;
            let process = Arc::new(Self {
                job_id: job_id.clone(),
                command: command.clone(),
                restart,
                started_at: Utc::now(),
                terminate: CancellationToken::new(),
                pid: AtomicU32::new(0),
                spawn_count: AtomicU64::new(0),
                state: watch::channel(ProcessState::Running).0,
            });
            process.mark_running(&child);
            Ok((process, child))
        })?;

        info!(
            "Started process for job {} (pid {:?}): {}",
            process.job_id,
            process.pid(),
            process.command.display()
        );

        tokio::spawn(Arc::clone(&process).run(child, env, on_exit, guard));

        Ok(process)
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn command(&self) -> &CommandLine {
        &self.command
    }

    pub fn restart_enabled(&self) -> bool {
        self.restart
    }

    /// PID of the live OS process, if any.
    pub fn pid(&self) -> Option<u32> {
        match self.pid.load(Ordering::SeqCst) {
            0 => None,
            pid => Some(pid),
        }
    }

    /// Number of OS processes spawned so far, including the first one.
    pub fn spawn_count(&self) -> u64 {
        self.spawn_count.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> ProcessState {
        *self.state.borrow()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Requests termination. Idempotent and non-blocking.
    pub fn terminate(&self) {
        if !self.terminate.is_cancelled() {
            debug!("Termination requested for job {}", self.job_id);
        }
        self.terminate.cancel();
    }

    pub fn is_terminating(&self) -> bool {
        self.terminate.is_cancelled()
    }

    /// A token cancelled together with this process's termination signal.
    pub fn child_token(&self) -> CancellationToken {
        self.terminate.child_token()
    }

    /// Waits until the supervising loop has ended and returns the final state.
    pub async fn wait(&self) -> ProcessState {
        let mut rx = self.state.subscribe();
        let state = match rx.wait_for(ProcessState::is_final).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        };
        state
    }

    /// Terminates the process and waits for the supervising loop to finish.
    pub async fn stop(&self) -> ProcessState {
        self.terminate();
        self.wait().await
    }

    pub fn info(&self) -> ProcessInfo {
        ProcessInfo {
            job_id: self.job_id.clone(),
            pid: self.pid(),
            state: self.state(),
            spawn_count: self.spawn_count(),
            restart: self.restart,
            started_at: self.started_at,
            command: self.command.display(),
        }
    }

    /// Marks the loop as ended if it stopped without reaching a final state.
    pub(super) fn abandon(&self) {
        self.pid.store(0, Ordering::SeqCst);
        self.state.send_if_modified(|state| {
            if state.is_final() {
                false
            } else {
                *state = ProcessState::Exited;
                true
            }
        });
    }

    fn mark_running(&self, child: &Child) {
        self.pid.store(child.id().unwrap_or(0), Ordering::SeqCst);
        self.spawn_count.fetch_add(1, Ordering::SeqCst);
        self.state.send_replace(ProcessState::Running);
        PROCESS_SPAWNS.inc();
    }

    fn finish(&self, state: ProcessState) {
        self.pid.store(0, Ordering::SeqCst);
        self.state.send_replace(state);
    }

    async fn run(
        self: Arc<Self>,
        first: Child,
        env: Environment,
        on_exit: OnExit,
        _guard: PoolGuard,
    ) {
        let mut next = Some(first);

        loop {
            let child = match next.take() {
                Some(child) => child,
                None => match spawn_child(&self.command, &env) {
                    Ok(child) => {
                        self.mark_running(&child);
                        info!(
                            "Restarted process for job {} (pid {:?}, spawn #{})",
                            self.job_id,
                            self.pid(),
                            self.spawn_count()
                        );
                        child
                    }
                    Err(e) => {
                        warn!("Failed to restart process for job {}: {}", self.job_id, e);
                        PROCESS_EXITS.with_label_values(&[e.reason()]).inc();
                        on_exit(&e);
                        if self.pause_before_restart().await {
                            continue;
                        }
                        self.finish(ProcessState::Terminated);
                        return;
                    }
                },
            };

            match self.supervise(child).await {
                Supervised::Terminated => {
                    PROCESS_EXITS.with_label_values(&["terminated"]).inc();
                    info!("Process for job {} terminated", self.job_id);
                    self.finish(ProcessState::Terminated);
                    return;
                }
                Supervised::Exited(error) => {
                    self.pid.store(0, Ordering::SeqCst);

                    match &error {
                        Some(e) => {
                            warn!("Process for job {} exited: {}", self.job_id, e);
                            PROCESS_EXITS.with_label_values(&[e.reason()]).inc();
                            on_exit(e);
                        }
                        None => {
                            info!("Process for job {} exited cleanly", self.job_id);
                            PROCESS_EXITS.with_label_values(&["clean"]).inc();
                        }
                    }

                    if !self.restart {
                        self.finish(ProcessState::Exited);
                        return;
                    }

                    if !self.pause_before_restart().await {
                        info!(
                            "Process for job {} terminated while waiting to restart",
                            self.job_id
                        );
                        self.finish(ProcessState::Terminated);
                        return;
                    }
                }
            }
        }
    }

    /// Waits [`RESTART_PAUSE`]. Returns `false` when termination arrives first.
    async fn pause_before_restart(&self) -> bool {
        self.state.send_replace(ProcessState::RestartPending);

        tokio::select! {
            _ = tokio::time::sleep(RESTART_PAUSE) => {
                PROCESS_RESTARTS.inc();
                true
            }
            _ = self.terminate.cancelled() => false,
        }
    }

    async fn supervise(&self, mut child: Child) -> Supervised {
        let status = tokio::select! {
            status = child.wait() => Some(status),
            _ = self.terminate.cancelled() => None,
        };

        match status {
            Some(Ok(status)) => Supervised::Exited(exit_error(status, self.restart)),
            Some(Err(e)) => Supervised::Exited(Some(ProcessError::Wait(e))),
            None => {
                self.kill_group(&mut child).await;
                Supervised::Terminated
            }
        }
    }

    /// Interrupts the process group, waits for the leader, then sweeps stragglers.
    async fn kill_group(&self, child: &mut Child) {
        let Some(pid) = child.id() else {
            let _ = child.wait().await;
            return;
        };

        info!("Interrupting process group {} for job {}", pid, self.job_id);
        if let Err(e) = signal_group(pid, GroupSignal::Interrupt) {
            warn!("Failed to interrupt process group {}: {}", pid, e);
        }

        if tokio::time::timeout(KILL_GRACE, child.wait()).await.is_err() {
            warn!(
                "Process group {} ignored SIGINT for {:?}, killing",
                pid, KILL_GRACE
            );
            if let Err(e) = signal_group(pid, GroupSignal::Kill) {
                warn!("Failed to kill process group {}: {}", pid, e);
            }
            let _ = child.start_kill();
            let _ = child.wait().await;
        }

        // Children that ignore SIGINT (e.g. backgrounded by a shell) outlive the leader.
        if let Err(e) = signal_group(pid, GroupSignal::Kill) {
            debug!("Sweeping process group {} failed: {}", pid, e);
        }
    }
}

fn spawn_child(command: &CommandLine, env: &Environment) -> Result<Child, ProcessError> {
    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args)
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    #[cfg(unix)]
    cmd.process_group(0);

    cmd.spawn().map_err(|source| ProcessError::SpawnFailed {
        program: command.program.clone(),
        source,
    })
}

/// Maps an exit status to the error reported through the exit callback.
///
/// A zero exit is only an error for restart-enabled processes, which are expected
/// to run until terminated.
fn exit_error(status: ExitStatus, restart: bool) -> Option<ProcessError> {
    match status.code() {
        Some(0) if restart => Some(ProcessError::UnexpectedCleanExit),
        Some(0) => None,
        Some(code) => Some(ProcessError::ExitedWithCode { code }),
        None => {
            #[cfg(unix)]
            {
                use std::os::unix::process::ExitStatusExt;
                if let Some(signal) = status.signal() {
                    return Some(ProcessError::KilledBySignal { signal });
                }
            }
            Some(ProcessError::ExitedWithCode { code: -1 })
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum GroupSignal {
    Interrupt,
    Kill,
}

/// Signals the whole process group led by `pid`. A group that no longer exists is not an error.
#[cfg(unix)]
fn signal_group(pid: u32, signal: GroupSignal) -> Result<(), ProcessError> {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let signal = match signal {
        GroupSignal::Interrupt => Signal::SIGINT,
        GroupSignal::Kill => Signal::SIGKILL,
    };

    match killpg(Pid::from_raw(pid as i32), signal) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(not(unix))]
fn signal_group(_pid: u32, _signal: GroupSignal) -> Result<(), ProcessError> {
    Ok(())
}
