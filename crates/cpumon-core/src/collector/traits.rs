//! Abstractions over the host so probes can run against mocks.
//!
//! `FileSystem` covers `/proc` and `/sys` reads on Linux, `CommandRunner`
//! covers the OS utilities (`sysctl`, `ps`, `powermetrics`) that macOS needs.
//! Both have a real implementation and a mock in [`crate::collector::mock`].

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::collector::error::{ProbeError, ProbeResult};

/// Abstraction for filesystem operations.
///
/// This trait allows probes to read from the real filesystem or from
/// a mock implementation for testing purposes.
pub trait FileSystem: Send + Sync {
    /// Reads the entire contents of a file as a string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Checks if a path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Lists entries in a directory.
    ///
    /// Order is unspecified; callers that need stable ordering must sort.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;
}

/// Real filesystem implementation that delegates to `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    /// Creates a new `RealFs` instance.
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(path)?;
        let mut paths = Vec::new();
        for entry in entries {
            paths.push(entry?.path());
        }
        Ok(paths)
    }
}

/// Runs an external program and returns its standard output.
///
/// Every call is bounded by `timeout`. A program that is missing, exits
/// non-zero, or prints nothing is reported as [`ProbeError::Unavailable`];
/// one that outlives its deadline is killed and reported as
/// [`ProbeError::Timeout`].
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[&str], timeout: Duration) -> ProbeResult<String>;
}

/// Spawns real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealCommand;

impl RealCommand {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for RealCommand {
    fn run(&self, program: &str, args: &[&str], timeout: Duration) -> ProbeResult<String> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ProbeError::Unavailable(format!("{program}: {e}")))?;

        // Drain stdout on a separate thread so a chatty child cannot block on
        // a full pipe while we poll for its exit.
        let reader = child.stdout.take().map(|mut stdout| {
            thread::spawn(move || {
                let mut out = Vec::new();
                let _ = stdout.read_to_end(&mut out);
                out
            })
        });

        let start = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if start.elapsed() >= timeout {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(ProbeError::Timeout {
                            program: program.to_string(),
                            timeout,
                        });
                    }
                    thread::sleep(Duration::from_millis(5));
                }
                Err(e) => return Err(ProbeError::Unavailable(format!("{program}: {e}"))),
            }
        };

        if !status.success() {
            return Err(ProbeError::Unavailable(format!(
                "{program} exited with {status}"
            )));
        }

        let out = reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        let text = String::from_utf8_lossy(&out).trim().to_string();
        if text.is_empty() {
            return Err(ProbeError::Unavailable(format!("{program}: empty output")));
        }
        Ok(text)
    }
}
