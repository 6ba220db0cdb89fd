//! External command execution through the host shell.
//!
//! This module handles:
//! - Picking the shell interpreter for the host OS (once per process)
//! - Spawning a command line with stdout captured and no console window
//! - Bounded waiting, returning whatever output was captured in time

use lazy_static::lazy_static;
use log::{debug, warn};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

/// Default bounded wait for an external command
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// How often the child is polled for exit
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Extra time given to the reader after the child exits, so the last chunk lands
const DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Longest wait used when the requested timeout does not fit in an `Instant`
const MAX_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// A shell interpreter and the flag that makes it run a single command string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shell {
    pub program: &'static str,
    pub flag: &'static str,
}

impl Shell {
    /// The interpreter for the OS this binary was built for
    pub fn for_host() -> Self {
        if cfg!(windows) {
            Shell { program: "cmd", flag: "/C" }
        } else {
            Shell { program: "sh", flag: "-c" }
        }
    }

    /// The process-wide shell, resolved on first use
    pub fn host() -> &'static Shell {
        lazy_static! {
            static ref HOST_SHELL: Shell = Shell::for_host();
        }
        &HOST_SHELL
    }

    fn command(&self, command_line: &str) -> Command {
        let mut cmd = Command::new(self.program);
        cmd.arg(self.flag).arg(command_line);
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }
        cmd
    }
}

/// Failure to obtain any result from a command
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("failed to launch `{program} {flag} {command}`: {source}")]
    Spawn {
        program: &'static str,
        flag: &'static str,
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("stdout of `{0}` was not captured")]
    NoStdout(String),
}

/// Anything that can run a command line and hand back its stdout
///
/// The probe and gate only see this trait, so tests swap in canned output.
pub trait CommandExec {
    fn run(&self, command: &str) -> Result<String, ExecError>;
}

/// Runs command lines through the host shell in a fixed working directory
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: &'static Shell,
    working_dir: PathBuf,
    timeout: Duration,
}

impl ShellRunner {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        ShellRunner { shell: Shell::host(), working_dir: working_dir.into(), timeout: DEFAULT_TIMEOUT }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl CommandExec for ShellRunner {
    fn run(&self, command: &str) -> Result<String, ExecError> {
        run_in(self.shell, &self.working_dir, command, self.timeout)
    }
}

/// Run `command` through `shell` and collect its stdout.
///
/// Stdout is drained on a reader thread while this thread polls for exit, so
/// output larger than the pipe buffer cannot stall the child. If the child is
/// still running at the deadline it is left alone and the output captured so
/// far is returned.
pub fn run_in(shell: &Shell, working_dir: &Path, command: &str, timeout: Duration) -> Result<String, ExecError> {
    debug!("Attempting to execute: {} {} \"{}\" in {:?}", shell.program, shell.flag, command, working_dir);

    let mut child = shell
        .command(command)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ExecError::Spawn {
            program: shell.program,
            flag: shell.flag,
            command: command.to_string(),
            source,
        })?;

    let stdout = child.stdout.take().ok_or_else(|| ExecError::NoStdout(command.to_string()))?;
    let captured = Arc::new(Mutex::new(Vec::new()));
    let (done_tx, done_rx) = mpsc::channel();
    {
        let sink = Arc::clone(&captured);
        thread::spawn(move || {
            drain_into(stdout, &sink);
            let _ = done_tx.send(());
        });
    }

    if let Some(stderr) = child.stderr.take() {
        let label = command.to_string();
        thread::spawn(move || {
            let sink = Mutex::new(Vec::new());
            drain_into(stderr, &sink);
            let bytes = sink.into_inner().unwrap_or_else(PoisonError::into_inner);
            if !bytes.is_empty() {
                debug!("stderr of `{}`: {}", label, String::from_utf8_lossy(&bytes).trim_end());
            }
        });
    }

    let deadline = deadline_after(Instant::now(), timeout);
    match wait_until(&mut child, deadline) {
        Some(status) => {
            debug!("`{}` done ({})", command, status);
            let remaining = deadline.saturating_duration_since(Instant::now());
            if done_rx.recv_timeout(remaining.max(DRAIN_GRACE)).is_err() {
                debug!("stdout of `{}` still open after exit, using partial output", command);
            }
        }
        None => {
            warn!("`{}` did not finish within {:?}, using partial output", command, timeout);
        }
    }

    let bytes = captured.lock().unwrap_or_else(PoisonError::into_inner).clone();
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// `start + timeout`, clamped instead of overflowing
fn deadline_after(start: Instant, timeout: Duration) -> Instant {
    start.checked_add(timeout).or_else(|| start.checked_add(MAX_WAIT)).unwrap_or(start)
}

/// Poll the child until it exits or the deadline passes
fn wait_until(child: &mut Child, deadline: Instant) -> Option<ExitStatus> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Some(status),
            Ok(None) => {}
            Err(e) => {
                warn!("Failed to poll child process: {}", e);
                return None;
            }
        }
        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

/// Copy a pipe into the shared buffer chunk by chunk until EOF
fn drain_into(mut pipe: impl Read, sink: &Mutex<Vec<u8>>) {
    let mut chunk = [0u8; 4096];
    loop {
        match pipe.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => sink.lock().unwrap_or_else(PoisonError::into_inner).extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!("Pipe read failed: {}", e);
                break;
            }
        }
    }
}
