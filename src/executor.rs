//! Running snippet bodies as external processes.

use crate::env::Environment;
use crate::io_adapters::OutputSink;
use crate::registry::Binding;
use std::borrow::Cow;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Conventional process exit code type used by this crate.
pub type ExitCode = i32;

/// Lines buffered between the reader threads and the sink.
const LINE_BUFFER: usize = 1024;

/// Why a snippet run did not succeed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionFailure {
    #[error("exited with status {code}")]
    NonZeroExit { code: ExitCode },

    #[error("could not start '{command}': {reason}")]
    Spawn { command: String, reason: String },

    #[error("timed out after {}s", .after.as_secs_f64())]
    Timeout { after: Duration },
}

/// Outcome of running one snippet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub success: bool,
    /// Combined stdout/stderr, one entry per line, joined with `\n`.
    pub output: String,
    pub failure: Option<ExecutionFailure>,
}

impl ExecutionResult {
    fn finished(output: String, code: ExitCode) -> Self {
        if code == 0 {
            Self {
                success: true,
                output,
                failure: None,
            }
        } else {
            Self::failed(output, ExecutionFailure::NonZeroExit { code })
        }
    }

    fn failed(output: String, failure: ExecutionFailure) -> Self {
        Self {
            success: false,
            output,
            failure: Some(failure),
        }
    }
}

/// Object-safe seam between the dispatcher and whatever actually runs code.
pub trait Executor {
    /// Run `body` with `binding`, streaming output lines to `sink`.
    fn execute(
        &self,
        binding: &Binding,
        body: &str,
        overlay: &HashMap<String, String>,
        timeout: Option<Duration>,
        sink: &mut dyn OutputSink,
    ) -> ExecutionResult;
}

/// Spawns `command options... body` as a child process.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    base: Environment,
}

impl ProcessExecutor {
    /// Executor whose children inherit a snapshot of the current process environment.
    pub fn inherited() -> Self {
        Self::with_environment(Environment::inherited())
    }

    pub fn with_environment(base: Environment) -> Self {
        Self { base }
    }
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::inherited()
    }
}

impl Executor for ProcessExecutor {
    fn execute(
        &self,
        binding: &Binding,
        body: &str,
        overlay: &HashMap<String, String>,
        timeout: Option<Duration>,
        sink: &mut dyn OutputSink,
    ) -> ExecutionResult {
        let env = self.base.with_overlay(overlay);

        let mut cmd = match invocation(binding, body, &env) {
            Some(cmd) => cmd,
            None => {
                return ExecutionResult::failed(
                    String::new(),
                    ExecutionFailure::Spawn {
                        command: binding.command.clone(),
                        reason: "command not found".to_string(),
                    },
                );
            }
        };
        cmd.env_clear()
            .envs(env.vars.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        tracing::debug!(command = %binding.command, options = ?binding.options, "spawning snippet");
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                return ExecutionResult::failed(
                    String::new(),
                    ExecutionFailure::Spawn {
                        command: binding.command.clone(),
                        reason: err.to_string(),
                    },
                );
            }
        };

        let lines = forward_output(&mut child);
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut output = Vec::new();

        let timed_out = loop {
            let received = match deadline {
                Some(deadline) => {
                    // A queued line must not postpone the deadline.
                    let now = Instant::now();
                    if now >= deadline {
                        break true;
                    }
                    lines.recv_timeout(deadline - now)
                }
                None => lines.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok(line) => {
                    sink.line(&line);
                    output.push(line);
                }
                Err(RecvTimeoutError::Timeout) => break true,
                // Both streams closed; the child may still be running.
                Err(RecvTimeoutError::Disconnected) => break false,
            }
        };
        let output = output.join("\n");

        let status = if timed_out {
            None
        } else {
            match wait_until(&mut child, deadline) {
                Ok(status) => status,
                Err(err) => {
                    return ExecutionResult::failed(
                        output,
                        ExecutionFailure::Spawn {
                            command: binding.command.clone(),
                            reason: err.to_string(),
                        },
                    );
                }
            }
        };

        match status {
            Some(status) => ExecutionResult::finished(output, exit_code(status)),
            None => {
                // Reader threads are left to finish on their own; a grandchild may
                // still hold the pipes open.
                let _ = child.kill();
                let _ = child.wait();
                let after = timeout.unwrap_or_default();
                tracing::debug!(command = %binding.command, ?after, "snippet timed out");
                ExecutionResult::failed(output, ExecutionFailure::Timeout { after })
            }
        }
    }
}

/// Build the platform command for `binding`, or `None` if the program cannot be found.
#[cfg(not(windows))]
fn invocation(binding: &Binding, body: &str, env: &Environment) -> Option<Command> {
    let search_paths = env.get_var("PATH").unwrap_or_default();
    let program = find_command_path(OsStr::new(search_paths), Path::new(&binding.command))?;
    let mut cmd = Command::new(&*program);
    cmd.args(&binding.options).arg(body);
    Some(cmd)
}

/// Windows resolves commands through the shell.
#[cfg(windows)]
fn invocation(binding: &Binding, body: &str, _env: &Environment) -> Option<Command> {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(&binding.command).args(&binding.options).arg(body);
    Some(cmd)
}

/// Read stdout and stderr on their own threads and merge them line by line.
///
/// The channel is bounded, so a slow sink stalls the readers and in turn the child.
fn forward_output(child: &mut Child) -> Receiver<String> {
    let (tx, rx) = mpsc::sync_channel(LINE_BUFFER);
    if let Some(stdout) = child.stdout.take() {
        spawn_reader(stdout, tx.clone());
    }
    if let Some(stderr) = child.stderr.take() {
        spawn_reader(stderr, tx);
    }
    rx
}

fn spawn_reader<R: Read + Send + 'static>(stream: R, tx: SyncSender<String>) {
    thread::spawn(move || {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\n', '\r']).to_string();
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            }
        }
    });
}

/// Wait for the child, giving up at `deadline`.
///
/// Returns `Ok(None)` when the deadline passed first.
fn wait_until(child: &mut Child, deadline: Option<Instant>) -> std::io::Result<Option<ExitStatus>> {
    let Some(deadline) = deadline else {
        return child.wait().map(Some);
    };
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(Duration::from_millis(10));
    }
}

fn exit_code(status: ExitStatus) -> ExitCode {
    match status.code() {
        Some(x) => x,
        None => terminated_by_signal(status),
    }
}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = ExitStatusExt::signal(&exit_status) {
        128 + signal
    } else if ExitStatusExt::core_dumped(&exit_status) {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> i32 {
    -1
}

/// Resolve a command path the way a typical shell would.
///
/// Behavior:
/// - Absolute path: returns it if it exists.
/// - Relative with multiple components (e.g., `bin/sh`): returns it if it exists.
/// - `./foo` on Unix or any `./`-prefixed path on other platforms: returns it if it exists.
/// - Single path component (no separators): search each directory in `search_paths` (PATH)
///   and return the first existing match.
/// - Empty path: returns `None`.
pub fn find_command_path<'a>(search_paths: &OsStr, path: &'a Path) -> Option<Cow<'a, Path>> {
    if path.is_absolute() {
        return find_by_path(path).map(Cow::Borrowed);
    }

    let search_in_current_dir = cfg!(not(unix)) || path.starts_with("./");
    if search_in_current_dir && path.exists() {
        return Some(Cow::Borrowed(path));
    }

    let mut components = path.components();
    match (components.next(), components.next()) {
        (None, None) => None,
        (Some(x), None) => find_in_path(search_paths, x.as_os_str()).map(Cow::Owned),
        _ => find_by_path(path).map(Cow::Borrowed),
    }
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_paths)
        .map(|dir| dir.join(cmd))
        .find(|path| path.is_file())
}

fn find_by_path(path: &Path) -> Option<&Path> {
    if path.exists() { Some(path) } else { None }
}
