//! Owned handle for one spawned process under test.
//!
//! A [`ProcessHandle`] tracks the lifecycle of a single child process:
//!
//! ```text
//! Spawned -> Running -> SignaledForTermination -> Reaped
//! ```
//!
//! Every blocking wait takes an explicit timeout. A handle that is dropped
//! before reaching [`LifecycleState::Reaped`] kills and reaps its child, so
//! no code path can leave an orphan behind.
//!
//! Captured output is drained by background readers from the moment the
//! child starts, so a child that writes more than a pipe buffer never
//! blocks, and collecting output is bounded even when a descendant keeps
//! the pipes open.

use log::{debug, error, warn};
use std::fmt;
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use wait_timeout::ChildExt;

/// Bound on the reap performed when a live handle is dropped.
const FORCED_REAP_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle of a process under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// The child was created; liveness has not been confirmed yet.
    Spawned,
    /// The child was confirmed alive after the grace period.
    Running,
    /// A termination signal was delivered.
    SignaledForTermination,
    /// The exit status was collected. Terminal.
    Reaped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Spawned => "spawned",
            Self::Running => "running",
            Self::SignaledForTermination => "signaled for termination",
            Self::Reaped => "reaped",
        };
        f.write_str(text)
    }
}

/// Signals the harness can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Polite termination request (`SIGTERM` on Unix).
    Terminate,
    /// Forced termination (`SIGKILL` on Unix).
    Kill,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terminate => f.write_str("SIGTERM"),
            Self::Kill => f.write_str("SIGKILL"),
        }
    }
}

/// What to do with the child's standard output and error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Pipe both streams and drain them in the background.
    Capture,
    /// Send both streams to the null device.
    Discard,
}

/// Failures while driving a process through its lifecycle.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The program could not be started.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        /// Program that was started.
        program: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The process exited before the harness signalled it.
    #[error("process {pid} exited on its own with {status} before it was signalled")]
    ExitedEarly {
        /// Process id.
        pid: u32,
        /// Exit status that was collected.
        status: ExitStatus,
    },

    /// A signal could not be delivered.
    #[error("failed to deliver {signal} to process {pid} (state: {state}): {source}")]
    Signal {
        /// Process id.
        pid: u32,
        /// Signal that was attempted.
        signal: Signal,
        /// State at the time of the attempt.
        state: LifecycleState,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The process was not reaped within the allotted time.
    #[error("process {pid} was not reaped within {timeout:?} (state: {state})")]
    ReapTimeout {
        /// Process id.
        pid: u32,
        /// Wait bound that expired.
        timeout: Duration,
        /// State when the wait gave up.
        state: LifecycleState,
    },

    /// Waiting on the process failed at the OS level.
    #[error("waiting on process {pid} failed (state: {state}): {source}")]
    Wait {
        /// Process id.
        pid: u32,
        /// State at the time of the wait.
        state: LifecycleState,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// An operation was attempted from a state that does not allow it.
    #[error("process {pid} cannot move from {from} to {to}")]
    InvalidTransition {
        /// Process id.
        pid: u32,
        /// Current state.
        from: LifecycleState,
        /// Requested state.
        to: LifecycleState,
    },

    /// The overall deadline expired before the check completed.
    #[error("process {pid} exceeded the overall timeout of {timeout:?} (state: {state})")]
    DeadlineExceeded {
        /// Process id.
        pid: u32,
        /// Overall bound that expired.
        timeout: Duration,
        /// State when the deadline expired.
        state: LifecycleState,
    },
}

/// One spawned OS process, owned exclusively by its creator.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    program: String,
    state: LifecycleState,
    status: Option<ExitStatus>,
    output: Option<CapturedOutput>,
}

impl ProcessHandle {
    /// Spawn `program` with `args`. The child's stdin is always null.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Spawn`] if the program cannot be started or
    /// its output readers cannot be created.
    pub fn spawn(program: &str, args: &[&str], output: OutputMode) -> Result<Self, ProcessError> {
        let mut cmd = Command::new(program);
        cmd.args(args).stdin(Stdio::null());
        match output {
            OutputMode::Capture => cmd.stdout(Stdio::piped()).stderr(Stdio::piped()),
            OutputMode::Discard => cmd.stdout(Stdio::null()).stderr(Stdio::null()),
        };

        let child = cmd.spawn().map_err(|source| ProcessError::Spawn {
            program: program.to_owned(),
            source,
        })?;
        debug!("spawned {program} {args:?} as pid {}", child.id());

        let mut handle = Self {
            child,
            program: program.to_owned(),
            state: LifecycleState::Spawned,
            status: None,
            output: None,
        };
        if output == OutputMode::Capture {
            // On failure the handle is dropped, which kills and reaps the child.
            let captured =
                CapturedOutput::start(&mut handle.child).map_err(|source| ProcessError::Spawn {
                    program: program.to_owned(),
                    source,
                })?;
            handle.output = Some(captured);
        }
        Ok(handle)
    }

    /// OS process id.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Exit status, once reaped.
    #[must_use]
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.status
    }

    /// Confirm the child is still alive, moving `Spawned` to `Running`.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::ExitedEarly`] (after reaping) if the child has
    /// already exited, or [`ProcessError::InvalidTransition`] if the handle is
    /// not in the `Spawned` state.
    pub fn confirm_running(&mut self) -> Result<(), ProcessError> {
        self.require_state(LifecycleState::Spawned, LifecycleState::Running)?;
        self.fail_if_exited()?;
        self.state = LifecycleState::Running;
        Ok(())
    }

    /// Deliver `signal` to the child.
    ///
    /// [`Signal::Terminate`] moves the handle to `SignaledForTermination`.
    /// A child that has already exited is reaped and reported as
    /// [`ProcessError::ExitedEarly`] rather than signalled.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Signal`] if delivery fails, or
    /// [`ProcessError::InvalidTransition`] if the child is already reaped.
    pub fn signal(&mut self, signal: Signal) -> Result<(), ProcessError> {
        if self.state == LifecycleState::Reaped {
            return Err(ProcessError::InvalidTransition {
                pid: self.id(),
                from: self.state,
                to: LifecycleState::SignaledForTermination,
            });
        }
        if self.state != LifecycleState::SignaledForTermination {
            self.fail_if_exited()?;
        }

        self.deliver(signal).map_err(|source| ProcessError::Signal {
            pid: self.id(),
            signal,
            state: self.state,
            source,
        })?;
        debug!("sent {signal} to pid {}", self.id());
        self.state = LifecycleState::SignaledForTermination;
        Ok(())
    }

    /// Block until the child is reaped or `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::ReapTimeout`] if the child is still running
    /// when the timeout expires, or [`ProcessError::Wait`] on OS failure.
    pub fn wait(&mut self, timeout: Duration) -> Result<ExitStatus, ProcessError> {
        if let Some(status) = self.status {
            return Ok(status);
        }

        let waited = self
            .child
            .wait_timeout(timeout)
            .map_err(|source| ProcessError::Wait {
                pid: self.id(),
                state: self.state,
                source,
            })?;

        match waited {
            Some(status) => Ok(self.mark_reaped(status)),
            None => Err(ProcessError::ReapTimeout {
                pid: self.id(),
                timeout,
                state: self.state,
            }),
        }
    }

    /// Kill the child if it is still running, then reap it.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::ReapTimeout`] if even a forced kill does not
    /// let the child be reaped within `timeout`.
    pub fn kill_and_reap(&mut self, timeout: Duration) -> Result<ExitStatus, ProcessError> {
        if let Some(status) = self.status {
            return Ok(status);
        }
        if let Err(err) = self.child.kill() {
            // The child may have exited between checks; the wait below settles it.
            debug!("kill for pid {} reported: {err}", self.id());
        }
        self.wait(timeout)
    }

    /// Collect what the child wrote to its captured streams.
    ///
    /// Standard output comes first, followed by standard error. Waits at
    /// most `timeout` for both streams to reach end of file; if a
    /// descendant still holds a pipe open by then, whatever was read so
    /// far is returned. Streams that were not captured contribute nothing,
    /// and a second call returns an empty string.
    pub fn take_output(&mut self, timeout: Duration) -> String {
        match self.output.take() {
            Some(mut captured) => captured.collect(timeout, self.child.id()),
            None => String::new(),
        }
    }

    fn require_state(
        &self,
        expected: LifecycleState,
        to: LifecycleState,
    ) -> Result<(), ProcessError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(ProcessError::InvalidTransition {
                pid: self.id(),
                from: self.state,
                to,
            })
        }
    }

    fn fail_if_exited(&mut self) -> Result<(), ProcessError> {
        let polled = self.child.try_wait().map_err(|source| ProcessError::Wait {
            pid: self.id(),
            state: self.state,
            source,
        })?;
        match polled {
            Some(status) => {
                let status = self.mark_reaped(status);
                Err(ProcessError::ExitedEarly {
                    pid: self.id(),
                    status,
                })
            }
            None => Ok(()),
        }
    }

    fn mark_reaped(&mut self, status: ExitStatus) -> ExitStatus {
        debug!("reaped pid {} ({}) with {status}", self.id(), self.program);
        self.status = Some(status);
        self.state = LifecycleState::Reaped;
        status
    }

    #[cfg(unix)]
    fn deliver(&mut self, signal: Signal) -> std::io::Result<()> {
        match signal {
            Signal::Kill => self.child.kill(),
            Signal::Terminate => {
                let pid = libc::pid_t::try_from(self.child.id())
                    .map_err(|e| std::io::Error::other(format!("pid out of range: {e}")))?;
                // SAFETY: `pid` names our own child and we have not reaped it.
                // If it already exited it is a zombie, which keeps the pid
                // reserved, so the signal cannot reach an unrelated process.
                let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
                if rc == 0 {
                    Ok(())
                } else {
                    Err(std::io::Error::last_os_error())
                }
            }
        }
    }

    #[cfg(not(unix))]
    fn deliver(&mut self, _signal: Signal) -> std::io::Result<()> {
        self.child.kill()
    }
}

/// Background readers draining a child's piped stdout and stderr.
#[derive(Debug)]
struct CapturedOutput {
    stdout: Arc<Mutex<Vec<u8>>>,
    stderr: Arc<Mutex<Vec<u8>>>,
    finished: mpsc::Receiver<()>,
    pending: usize,
}

impl CapturedOutput {
    fn start(child: &mut Child) -> std::io::Result<Self> {
        let (done, finished) = mpsc::channel();
        let stdout = Arc::new(Mutex::new(Vec::new()));
        let stderr = Arc::new(Mutex::new(Vec::new()));
        let mut pending = 0;

        if let Some(pipe) = child.stdout.take() {
            spawn_reader("stdout", pipe, Arc::clone(&stdout), done.clone())?;
            pending += 1;
        }
        if let Some(pipe) = child.stderr.take() {
            spawn_reader("stderr", pipe, Arc::clone(&stderr), done)?;
            pending += 1;
        }

        Ok(Self {
            stdout,
            stderr,
            finished,
            pending,
        })
    }

    fn collect(&mut self, timeout: Duration, pid: u32) -> String {
        let deadline = Instant::now() + timeout;
        while self.pending > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.finished.recv_timeout(remaining) {
                Ok(()) => self.pending -= 1,
                Err(RecvTimeoutError::Timeout) => {
                    debug!(
                        "output of pid {pid} still open after {timeout:?}; using what was read"
                    );
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let mut bytes = snapshot(&self.stdout);
        bytes.extend(snapshot(&self.stderr));
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

/// Read `pipe` to end of file on its own thread, appending to `sink`.
///
/// A reader abandoned by [`CapturedOutput::collect`] exits once the last
/// process holding the write end closes it.
fn spawn_reader(
    stream: &'static str,
    mut pipe: impl Read + Send + 'static,
    sink: Arc<Mutex<Vec<u8>>>,
    done: mpsc::Sender<()>,
) -> std::io::Result<()> {
    std::thread::Builder::new()
        .name(format!("netrain-{stream}"))
        .spawn(move || {
            let mut chunk = [0_u8; 8192];
            loop {
                match pipe.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => sink
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .extend_from_slice(&chunk[..n]),
                    Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {}
                    Err(err) => {
                        debug!("reading child {stream} failed: {err}");
                        break;
                    }
                }
            }
            if done.send(()).is_err() {
                // The output was already collected; nobody is waiting.
            }
        })?;
    Ok(())
}

fn snapshot(buffer: &Mutex<Vec<u8>>) -> Vec<u8> {
    buffer.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        if self.state == LifecycleState::Reaped {
            return;
        }
        warn!(
            "process {} ({}) still {} at release; killing it",
            self.id(),
            self.program,
            self.state
        );
        if let Err(err) = self.kill_and_reap(FORCED_REAP_TIMEOUT) {
            error!("could not reap process {}: {err}", self.id());
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use rstest::rstest;

    fn sh(script: &str, output: OutputMode) -> ProcessHandle {
        ProcessHandle::spawn("/bin/sh", &["-c", script], output).expect("sh should spawn")
    }

    fn is_alive(pid: u32) -> bool {
        let pid = libc::pid_t::try_from(pid).expect("pid fits");
        // SAFETY: signal 0 only checks for existence.
        unsafe { libc::kill(pid, 0) == 0 }
    }

    #[test]
    fn full_lifecycle_reaches_reaped() {
        let mut handle = sh("exec sleep 30", OutputMode::Discard);
        assert_eq!(handle.state(), LifecycleState::Spawned);

        std::thread::sleep(Duration::from_millis(100));
        handle.confirm_running().expect("still running");
        assert_eq!(handle.state(), LifecycleState::Running);

        handle.signal(Signal::Terminate).expect("signal delivered");
        assert_eq!(handle.state(), LifecycleState::SignaledForTermination);

        let status = handle.wait(Duration::from_secs(1)).expect("reaped");
        assert!(!status.success());
        assert_eq!(handle.state(), LifecycleState::Reaped);
    }

    #[test]
    fn early_exit_is_reported_and_reaped() {
        let mut handle = sh("exit 3", OutputMode::Discard);
        std::thread::sleep(Duration::from_millis(200));

        let err = handle.confirm_running().expect_err("process already exited");
        assert!(matches!(err, ProcessError::ExitedEarly { .. }));
        assert_eq!(handle.state(), LifecycleState::Reaped);
        assert_eq!(handle.exit_status().and_then(|s| s.code()), Some(3));
    }

    #[test]
    fn wait_times_out_for_ignored_sigterm() {
        let mut handle = sh("trap '' TERM; exec sleep 30", OutputMode::Discard);
        std::thread::sleep(Duration::from_millis(100));
        handle.confirm_running().expect("running");
        handle.signal(Signal::Terminate).expect("signal delivered");

        let err = handle
            .wait(Duration::from_millis(200))
            .expect_err("SIGTERM is ignored");
        assert!(matches!(
            err,
            ProcessError::ReapTimeout {
                state: LifecycleState::SignaledForTermination,
                ..
            }
        ));

        let pid = handle.id();
        handle
            .kill_and_reap(Duration::from_secs(1))
            .expect("SIGKILL cannot be ignored");
        assert!(!is_alive(pid));
    }

    #[test]
    fn terminate_after_exit_reports_early_exit_instead_of_signalling() {
        let mut handle = sh("exit 0", OutputMode::Discard);
        std::thread::sleep(Duration::from_millis(200));

        let err = handle
            .signal(Signal::Terminate)
            .expect_err("exited child is not signalled");
        assert!(matches!(err, ProcessError::ExitedEarly { .. }));
        assert_eq!(handle.state(), LifecycleState::Reaped);
    }

    #[test]
    fn drop_kills_and_reaps_live_child() {
        let handle = sh("exec sleep 30", OutputMode::Discard);
        let pid = handle.id();
        drop(handle);
        assert!(!is_alive(pid), "child should be gone after drop");
    }

    #[rstest]
    #[case::stdout_only("echo out", "out\n")]
    #[case::both_streams("echo out; echo err >&2", "out\nerr\n")]
    fn take_output_concatenates_streams(#[case] script: &str, #[case] expected: &str) {
        let mut handle = sh(script, OutputMode::Capture);
        handle.wait(Duration::from_secs(5)).expect("script exits");
        assert_eq!(handle.take_output(Duration::from_secs(5)), expected);
    }

    #[test]
    fn output_beyond_pipe_buffer_does_not_block_exit() {
        let mut handle = sh(
            "head -c 200000 /dev/zero | tr '\\0' x; echo; echo done",
            OutputMode::Capture,
        );

        handle
            .wait(Duration::from_secs(5))
            .expect("writer is drained while running");
        let output = handle.take_output(Duration::from_secs(5));
        assert_eq!(output.len(), 200_000 + "\ndone\n".len());
        assert!(output.ends_with("done\n"));
    }

    #[test]
    fn take_output_is_bounded_when_descendant_holds_pipe() {
        let mut handle = sh("echo started; sleep 5 & exit 0", OutputMode::Capture);
        handle.wait(Duration::from_secs(2)).expect("shell exits");

        let started = std::time::Instant::now();
        let output = handle.take_output(Duration::from_millis(300));
        assert_eq!(output, "started\n");
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn output_is_taken_once() {
        let mut handle = sh("echo once", OutputMode::Capture);
        handle.wait(Duration::from_secs(5)).expect("script exits");
        assert_eq!(handle.take_output(Duration::from_secs(5)), "once\n");
        assert_eq!(handle.take_output(Duration::from_secs(5)), "");
    }

    #[test]
    fn spawn_failure_names_program() {
        let err = ProcessHandle::spawn("/nonexistent/netrain", &["--demo"], OutputMode::Discard)
            .expect_err("missing binary");
        assert!(err.to_string().contains("/nonexistent/netrain"));
    }

    #[test]
    fn confirm_running_twice_is_invalid() {
        let mut handle = sh("exec sleep 30", OutputMode::Discard);
        handle.confirm_running().expect("running");
        let err = handle.confirm_running().expect_err("already running");
        assert!(matches!(err, ProcessError::InvalidTransition { .. }));
    }
}
