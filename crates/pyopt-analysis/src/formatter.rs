// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Optional post-refactor formatting with an external tool.
//!
//! The formatter reads source on stdin and writes the formatted source to
//! stdout (`black -q -`, `ruff format -`). It runs in its own process group
//! with a timeout; a guard kills the group and reaps the child on every early
//! exit. Formatting is best effort:
//! any failure, or output that no longer parses, falls back to the input.

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;
use wait_timeout::ChildExt;

/// Formatters tried, in order, when no command is configured.
const DEFAULT_FORMATTERS: &[(&str, &[&str])] =
    &[("black", &["-q", "-"]), ("ruff", &["format", "-"])];

// ============================================================================
// Errors
// ============================================================================

/// Errors from running an external formatter.
#[derive(Debug, Error)]
pub enum FormatterError {
    /// The formatter program was not found on PATH.
    #[error("formatter not found: {program}")]
    NotFound { program: String },

    /// The formatter could not be started.
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// Reading from or writing to the formatter failed.
    #[error("formatter I/O error: {0}")]
    Io(#[from] io::Error),

    /// The formatter did not finish in time and was killed.
    #[error("formatter timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// The formatter exited unsuccessfully.
    #[error("formatter exited with {}: {stderr}", code.map_or("a signal".to_string(), |c| format!("status {}", c)))]
    Failed { code: Option<i32>, stderr: String },

    /// A pipe reader or writer thread panicked.
    #[error("formatter pipe thread panicked")]
    ThreadPanicked,
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the external formatter.
#[derive(Debug, Clone)]
pub struct FormatterConfig {
    /// Explicit command (program and arguments). `None` discovers `black`,
    /// then `ruff`, on PATH.
    pub command: Option<Vec<String>>,
    /// Upper bound on a single formatter run.
    pub timeout: Duration,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        FormatterConfig {
            command: None,
            timeout: Duration::from_secs(10),
        }
    }
}

impl FormatterConfig {
    /// Use an explicit command instead of discovery.
    pub fn with_command(mut self, command: Vec<String>) -> Self {
        self.command = Some(command);
        self
    }

    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// ============================================================================
// Formatters
// ============================================================================

/// Something that rewrites source text into a formatted equivalent.
pub trait SourceFormatter {
    /// Short name for logs.
    fn name(&self) -> &str;

    fn format(&self, text: &str) -> Result<String, FormatterError>;
}

/// A formatter run as a child process over stdin/stdout.
#[derive(Debug, Clone)]
pub struct ExternalFormatter {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ExternalFormatter {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, timeout: Duration) -> Self {
        ExternalFormatter {
            program: program.into(),
            args,
            timeout,
        }
    }

    /// Resolve the configured command, or the first default formatter found
    /// on PATH.
    pub fn discover(config: &FormatterConfig) -> Result<Self, FormatterError> {
        if let Some(command) = &config.command {
            let Some((program, args)) = command.split_first() else {
                return Err(FormatterError::NotFound {
                    program: String::new(),
                });
            };
            let path = which::which(program).map_err(|_| FormatterError::NotFound {
                program: program.clone(),
            })?;
            return Ok(ExternalFormatter::new(path, args.to_vec(), config.timeout));
        }

        for (program, args) in DEFAULT_FORMATTERS {
            if let Ok(path) = which::which(program) {
                tracing::debug!(program, path = %path.display(), "discovered formatter");
                let args = args.iter().map(|a| a.to_string()).collect();
                return Ok(ExternalFormatter::new(path, args, config.timeout));
            }
        }
        Err(FormatterError::NotFound {
            program: DEFAULT_FORMATTERS
                .iter()
                .map(|(p, _)| *p)
                .collect::<Vec<_>>()
                .join(", "),
        })
    }

    fn spawn(&self) -> Result<ChildGuard, FormatterError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // Wrappers and shims spawn the real formatter; a new group lets the
        // guard kill those too.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        let child = command.spawn().map_err(|source| FormatterError::Spawn {
            program: self.program.display().to_string(),
            source,
        })?;
        Ok(ChildGuard { child: Some(child) })
    }
}

impl SourceFormatter for ExternalFormatter {
    fn name(&self) -> &str {
        self.program
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("formatter")
    }

    fn format(&self, text: &str) -> Result<String, FormatterError> {
        let mut guard = self.spawn()?;
        let child = guard.child_mut()?;

        let stdin = child.stdin.take();
        let input = text.as_bytes().to_vec();
        let writer = thread::spawn(move || -> io::Result<()> {
            if let Some(mut stdin) = stdin {
                stdin.write_all(&input)?;
            }
            Ok(())
        });
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let Some(status) = child.wait_timeout(self.timeout)? else {
            // Dropping the guard kills the group and reaps the child. The pipe
            // threads are detached, not joined: a process outside the group
            // may still hold a pipe open.
            drop(guard);
            tracing::debug!(timeout = ?self.timeout, "formatter killed after timeout");
            return Err(FormatterError::Timeout {
                timeout: self.timeout,
            });
        };
        guard.release();

        let written = join(writer);
        let stdout = join(stdout)?;
        let stderr = join(stderr)?;
        check_status(status, &stderr)?;
        written?;
        String::from_utf8(stdout).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e).into())
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

fn join<T>(handle: JoinHandle<io::Result<T>>) -> Result<T, FormatterError> {
    match handle.join() {
        Ok(result) => Ok(result?),
        Err(_) => Err(FormatterError::ThreadPanicked),
    }
}

fn check_status(status: ExitStatus, stderr: &[u8]) -> Result<(), FormatterError> {
    if status.success() {
        return Ok(());
    }
    Err(FormatterError::Failed {
        code: status.code(),
        stderr: String::from_utf8_lossy(stderr).trim().to_string(),
    })
}

/// Owns a running child; kills and reaps it unless released.
struct ChildGuard {
    child: Option<Child>,
}

impl ChildGuard {
    fn child_mut(&mut self) -> Result<&mut Child, FormatterError> {
        self.child
            .as_mut()
            .ok_or_else(|| io::Error::other("formatter process already released").into())
    }

    /// The child has exited and been waited on.
    fn release(&mut self) {
        self.child = None;
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            kill_process_group(&child);
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Send SIGKILL to the child's process group. Must run before the child is
/// reaped, while the group id is still reserved.
#[cfg(unix)]
fn kill_process_group(child: &Child) {
    unsafe {
        libc::killpg(child.id() as libc::pid_t, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &Child) {}

// ============================================================================
// Best effort
// ============================================================================

/// Format `text`, falling back to it unchanged on any failure.
///
/// Returns the text and whether formatting was applied. Output that does not
/// parse is discarded.
pub fn format_best_effort(formatter: &dyn SourceFormatter, text: &str) -> (String, bool) {
    match formatter.format(text) {
        Ok(formatted) => match pyopt_cst::parse_module(&formatted) {
            Ok(_) => (formatted, true),
            Err(err) => {
                tracing::warn!(
                    formatter = formatter.name(),
                    error = %err,
                    "formatter output does not parse; discarded"
                );
                (text.to_string(), false)
            }
        },
        Err(err) => {
            tracing::warn!(formatter = formatter.name(), error = %err, "formatting failed");
            (text.to_string(), false)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Result<&'static str, ()>);

    impl SourceFormatter for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn format(&self, _text: &str) -> Result<String, FormatterError> {
            match self.0 {
                Ok(text) => Ok(text.to_string()),
                Err(()) => Err(FormatterError::Timeout {
                    timeout: Duration::from_millis(1),
                }),
            }
        }
    }

    mod best_effort_tests {
        use super::*;

        #[test]
        fn uses_formatted_output() {
            let (text, formatted) = format_best_effort(&Fixed(Ok("x = 1\n")), "x=1\n");
            assert_eq!(text, "x = 1\n");
            assert!(formatted);
        }

        #[test]
        fn failure_returns_input() {
            let (text, formatted) = format_best_effort(&Fixed(Err(())), "x=1\n");
            assert_eq!(text, "x=1\n");
            assert!(!formatted);
        }

        #[test]
        fn unparseable_output_is_discarded() {
            let (text, formatted) = format_best_effort(&Fixed(Ok("def (\n")), "x=1\n");
            assert_eq!(text, "x=1\n");
            assert!(!formatted);
        }
    }

    mod config_tests {
        use super::*;

        #[test]
        fn defaults_and_builders() {
            let config = FormatterConfig::default();
            assert!(config.command.is_none());
            assert_eq!(config.timeout, Duration::from_secs(10));

            let config = FormatterConfig::default()
                .with_command(vec!["black".into(), "-".into()])
                .with_timeout(Duration::from_secs(2));
            assert_eq!(config.command.as_deref().map(|c| c.len()), Some(2));
            assert_eq!(config.timeout, Duration::from_secs(2));
        }

        #[test]
        fn missing_explicit_command_is_not_found() {
            let config =
                FormatterConfig::default().with_command(vec!["pyopt-no-such-formatter".into()]);
            assert!(matches!(
                ExternalFormatter::discover(&config),
                Err(FormatterError::NotFound { .. })
            ));
        }
    }

    #[cfg(unix)]
    mod process_tests {
        use super::*;

        fn shell(script: &str, timeout: Duration) -> ExternalFormatter {
            ExternalFormatter::new("/bin/sh", vec!["-c".into(), script.into()], timeout)
        }

        #[test]
        fn pipes_text_through_the_process() {
            let formatter = shell("cat", Duration::from_secs(10));
            assert_eq!(formatter.format("x = 1\n").unwrap(), "x = 1\n");
            assert_eq!(formatter.name(), "sh");
        }

        #[test]
        fn timeout_kills_the_process() {
            let formatter = shell("exec sleep 5", Duration::from_millis(200));
            let start = std::time::Instant::now();
            let err = formatter.format("x = 1\n").unwrap_err();
            assert!(matches!(err, FormatterError::Timeout { .. }), "{}", err);
            assert!(start.elapsed() < Duration::from_secs(4));
        }

        #[test]
        fn timeout_kills_processes_the_formatter_started() {
            let formatter = shell("sleep 4; cat", Duration::from_millis(200));
            let start = std::time::Instant::now();
            let (text, formatted) = format_best_effort(&formatter, "x = 1\n");
            assert!(start.elapsed() < Duration::from_secs(2), "{:?}", start.elapsed());
            assert_eq!(text, "x = 1\n");
            assert!(!formatted);
        }

        #[test]
        fn nonzero_exit_is_failure() {
            let formatter = shell("echo broken >&2; exit 3", Duration::from_secs(10));
            match formatter.format("x = 1\n") {
                Err(FormatterError::Failed { code, stderr }) => {
                    assert_eq!(code, Some(3));
                    assert_eq!(stderr, "broken");
                }
                other => panic!("expected failure, got {:?}", other),
            }
        }

        #[test]
        fn unparseable_process_output_falls_back() {
            let formatter = shell("cat >/dev/null; echo 'def ('", Duration::from_secs(10));
            let (text, formatted) = format_best_effort(&formatter, "x = 1\n");
            assert_eq!(text, "x = 1\n");
            assert!(!formatted);
        }
    }
}
