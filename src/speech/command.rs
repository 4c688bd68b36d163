//! External command execution with optional stdin and a bounded run time.
//!
//! The `CommandRunner` trait keeps synthesis and playback testable without
//! piper or an audio server present.

use crate::error::{MirrorError, Result};
use std::io::{Read, Write};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Interval between exit checks while waiting on a child.
const WAIT_POLL: Duration = Duration::from_millis(20);

/// Captured output of a successful command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Trait for executing system commands.
///
/// Object-safe, Send + Sync for use from the playback worker thread.
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`, feeding `stdin` if given.
    ///
    /// Returns the captured output on a zero exit status. A non-zero status
    /// is `CommandFailed`, a missing program `CommandNotFound`, and running
    /// past `timeout` kills the child and returns `CommandTimedOut`.
    fn run(
        &self,
        program: &str,
        args: &[&str],
        stdin: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput>;
}

/// Production runner using `std::process::Command`.
#[derive(Debug, Clone, Default)]
pub struct SystemCommandRunner;

impl SystemCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemCommandRunner {
    fn run(
        &self,
        program: &str,
        args: &[&str],
        stdin: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    MirrorError::CommandNotFound {
                        program: program.to_string(),
                    }
                } else {
                    MirrorError::CommandFailed {
                        program: program.to_string(),
                        status: "not started".to_string(),
                        stderr: e.to_string(),
                    }
                }
            })?;

        // Drain pipes on helper threads so a chatty child cannot block.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        if let (Some(text), Some(mut pipe)) = (stdin, child.stdin.take()) {
            // A child that exits without reading stdin reports through its status.
            let _ = pipe.write_all(text.as_bytes());
        }

        let status = match wait_with_deadline(&mut child, timeout)? {
            Some(status) => status,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(MirrorError::CommandTimedOut {
                    program: program.to_string(),
                    timeout: timeout.unwrap_or_default(),
                });
            }
        };

        let output = CommandOutput {
            stdout: collect(stdout),
            stderr: collect(stderr),
        };

        if !status.success() {
            return Err(MirrorError::CommandFailed {
                program: program.to_string(),
                status: status.to_string(),
                stderr: output.stderr.trim().to_string(),
            });
        }

        Ok(output)
    }
}

/// Wait for `child`, giving up at `timeout`. `None` means it timed out.
fn wait_with_deadline(
    child: &mut Child,
    timeout: Option<Duration>,
) -> Result<Option<std::process::ExitStatus>> {
    let Some(timeout) = timeout else {
        return Ok(Some(child.wait()?));
    };

    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(WAIT_POLL);
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn collect(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}
