//! External tool invocation.
//!
//! VCS checkouts, patching and drush are run as subprocesses. A non-zero exit
//! status is reported as `Error::Command` carrying the tool's stderr, and an
//! optional timeout kills the child and reports `Error::Timeout`.

use std::ffi::{OsStr, OsString};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::debug;

use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Captured output of a successful invocation.
#[derive(Debug, Clone, Default)]
pub struct Output {
    pub stdout: String,
    pub stderr: String,
}

/// Builder for one external tool invocation.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: OsString,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl ToolCommand {
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            current_dir: None,
            timeout: None,
        }
    }

    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn current_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Human readable command line.
    pub fn display(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|s| s.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run to completion and fail on a non-zero exit status.
    pub fn run(&self) -> Result<Output> {
        let display = self.display();
        match &self.current_dir {
            Some(dir) => debug!("{} > {}", dir.display(), display),
            None => debug!("> {}", display),
        }

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| Error::Command {
            command: display.clone(),
            status: "not started".to_string(),
            stderr: e.to_string(),
        })?;

        // Both pipes must be drained while polling, a full pipe stalls the child.
        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        let start = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if let Some(limit) = self.timeout {
                if start.elapsed() > limit {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(Error::Timeout {
                        command: display,
                        seconds: limit.as_secs(),
                    });
                }
            }
            thread::sleep(POLL_INTERVAL);
        };

        let output = Output {
            stdout: join_reader(stdout),
            stderr: join_reader(stderr),
        };

        if !status.success() {
            // Some tools (patch) report failures on stdout only.
            let message = match output.stderr.trim() {
                "" => output.stdout.trim(),
                stderr => stderr,
            };
            return Err(Error::Command {
                command: display,
                status: status.to_string(),
                stderr: message.to_string(),
            });
        }
        Ok(output)
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut reader: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_reader(handle: Option<thread::JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

/// Whether `program` can be started at all.
pub fn is_available(program: &str) -> bool {
    ToolCommand::new(program).arg("--version").run().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let cmd = ToolCommand::new("git").args(["clone", "--quiet"]).arg("repo");
        assert_eq!(cmd.display(), "git clone --quiet repo");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_captures_stdout() {
        let output = ToolCommand::new("sh").args(["-c", "echo hello"]).run().unwrap();
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_is_an_error() {
        let err = ToolCommand::new("sh")
            .args(["-c", "echo broken >&2; exit 3"])
            .run()
            .unwrap_err();
        match err {
            Error::Command { stderr, .. } => assert_eq!(stderr, "broken"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_child() {
        let err = ToolCommand::new("sh")
            .args(["-c", "sleep 5"])
            .timeout(Some(Duration::from_millis(100)))
            .run()
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
    }

    #[test]
    fn test_missing_program() {
        let err = ToolCommand::new("sitebuild-no-such-tool").run().unwrap_err();
        assert!(matches!(err, Error::Command { .. }));
        assert!(!is_available("sitebuild-no-such-tool"));
    }
}
