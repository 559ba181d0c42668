//! # Process Executor
//!
//! Runs one external optimizer as an isolated child process:
//! - the binary is resolved first, nothing is spawned if it is missing
//! - the command is escaped into a single shell string and run under `nice`
//! - PATH is overridden on the child only, the host environment is never touched
//! - stdin, stdout and stderr of the child go to the null device
//! - a child killed by a signal is an error, a non-zero exit is just `false`

use crate::bin_resolver::BinResolver;
use crate::error::OptimizeError;
use std::borrow::Cow;
use std::env;
use std::ffi::OsString;
use std::io::Write;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::debug;

/// Outcome of one child process
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessResult {
    pub success: bool,
    pub signal: Option<i32>,
    pub elapsed: Duration,
}

impl ProcessResult {
    fn from_status(status: ExitStatus, elapsed: Duration) -> Self {
        Self {
            success: status.success(),
            signal: termination_signal(&status),
            elapsed,
        }
    }

    /// Signal termination takes priority over the exit code
    pub fn classify(&self) -> Result<bool, OptimizeError> {
        match self.signal {
            Some(signal) => Err(OptimizeError::ProcessSignaled(signal)),
            None => Ok(self.success),
        }
    }
}

#[cfg(unix)]
fn termination_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn termination_signal(_status: &ExitStatus) -> Option<i32> {
    None
}

/// Destination of verbose diagnostic lines
pub type DiagnosticSink = Box<dyn Write + Send>;

/// Executes tool commands on behalf of workers
pub struct ProcessExecutor {
    resolver: Arc<dyn BinResolver>,
    diagnostics: Mutex<DiagnosticSink>,
}

impl ProcessExecutor {
    /// Executor reporting verbose diagnostics on stderr
    pub fn new(resolver: Arc<dyn BinResolver>) -> Self {
        Self::with_diagnostics(resolver, Box::new(std::io::stderr()))
    }

    pub fn with_diagnostics(resolver: Arc<dyn BinResolver>, sink: DiagnosticSink) -> Self {
        Self {
            resolver,
            diagnostics: Mutex::new(sink),
        }
    }

    /// Run `bin` with `args`, returning whether it exited successfully.
    ///
    /// # Errors
    /// - `BinaryNotFound` if the resolver cannot find `bin` (nothing is spawned)
    /// - `ProcessSignaled` if the child was terminated by a signal
    /// - `Io` if the child could not be spawned
    pub async fn execute(&self, bin: &str, args: &[String]) -> Result<bool, OptimizeError> {
        let resolved = self.resolver.resolve(bin)?;
        debug!("Resolved {} -> {:?}", bin, resolved);

        let command = shell_join(std::iter::once(bin).chain(args.iter().map(String::as_str)));
        let result = self.run(&command).await?;
        // a signal aborts before anything is reported
        let success = result.classify()?;

        if self.resolver.verbose() {
            self.report(&format_diagnostic(success, result.elapsed, &command));
        }
        debug!(
            command = %command,
            success,
            elapsed = ?result.elapsed,
            "Tool finished"
        );

        Ok(success)
    }

    fn report(&self, line: &str) {
        let mut sink = self.diagnostics.lock().unwrap_or_else(|e| e.into_inner());
        let _ = writeln!(sink, "{}", line);
        let _ = sink.flush();
    }

    async fn run(&self, command: &str) -> Result<ProcessResult, OptimizeError> {
        let script = format!("exec nice -n {} {}", self.resolver.nice(), command);
        let start = Instant::now();
        let status = Command::new("sh")
            .arg("-c")
            .arg(&script)
            .env("PATH", self.child_path()?)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await?;
        Ok(ProcessResult::from_status(status, start.elapsed()))
    }

    /// Host PATH with the resolve dir in front, for the child only
    fn child_path(&self) -> Result<OsString, OptimizeError> {
        let mut dirs = vec![self.resolver.resolve_dir().to_path_buf()];
        if let Some(host_path) = env::var_os("PATH") {
            dirs.extend(env::split_paths(&host_path));
        }
        env::join_paths(dirs).map_err(|e| {
            OptimizeError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
        })
    }
}

/// `<glyph> <elapsed>s <command>`
pub fn format_diagnostic(success: bool, elapsed: Duration, command: &str) -> String {
    let glyph = if success { '✓' } else { '✗' };
    format!("{} {}s {}", glyph, elapsed.as_secs_f64(), command)
}

fn is_shell_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/')
}

/// Quote `token` unless it only contains `[A-Za-z0-9_\-./]`
pub fn shell_escape(token: &str) -> Cow<'_, str> {
    if !token.is_empty() && token.chars().all(is_shell_safe) {
        Cow::Borrowed(token)
    } else {
        Cow::Owned(format!("'{}'", token.replace('\'', "'\\''")))
    }
}

/// Escape and join tokens into one command string
pub fn shell_join<'a>(tokens: impl IntoIterator<Item = &'a str>) -> String {
    tokens
        .into_iter()
        .map(shell_escape)
        .collect::<Vec<_>>()
        .join(" ")
}
