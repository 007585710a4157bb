//! Scripted command runner for testing probes without spawning processes.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::collector::error::{ProbeError, ProbeResult};
use crate::collector::traits::CommandRunner;

#[derive(Debug, Clone)]
enum Reply {
    Output(String),
    Fail(String),
    Timeout,
}

/// Command runner that answers from a table of canned replies.
///
/// Replies are keyed by the full command line (`"sysctl -n hw.ncpu"`) or by
/// the bare program name (`"ps"`). When several replies match a run, the one
/// registered last wins, so a scenario can be overridden with a later
/// `with_*` call. Unknown commands are reported as unavailable, the same way
/// a missing binary is.
///
/// Clones share one call log.
#[derive(Debug, Clone, Default)]
pub struct MockCommand {
    replies: Vec<(String, Reply)>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers `command` with `output` on stdout.
    pub fn with_output(mut self, command: &str, output: &str) -> Self {
        self.reply(command, Reply::Output(output.to_string()))
    }

    /// Makes `command` fail as if it exited non-zero.
    pub fn with_failure(mut self, command: &str, message: &str) -> Self {
        self.reply(command, Reply::Fail(message.to_string()))
    }

    /// Makes `command` exceed whatever timeout it is given.
    pub fn with_timeout(mut self, command: &str) -> Self {
        self.reply(command, Reply::Timeout)
    }

    fn reply(mut self, command: &str, reply: Reply) -> Self {
        self.replies.retain(|(key, _)| key != command);
        self.replies.push((command.to_string(), reply));
        self
    }

    /// Command lines run so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of runs whose command line starts with `prefix`.
    pub fn call_count(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }
}

impl CommandRunner for MockCommand {
    fn run(&self, program: &str, args: &[&str], timeout: Duration) -> ProbeResult<String> {
        let line = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(line.clone());
        }

        let reply = self
            .replies
            .iter()
            .rev()
            .find(|(key, _)| *key == line || key == program)
            .map(|(_, reply)| reply);
        match reply {
            Some(Reply::Output(out)) => Ok(out.trim().to_string()),
            Some(Reply::Fail(msg)) => Err(ProbeError::Unavailable(format!("{program}: {msg}"))),
            Some(Reply::Timeout) => Err(ProbeError::Timeout {
                program: program.to_string(),
                timeout,
            }),
            None => Err(ProbeError::Unavailable(format!("{program}: not found"))),
        }
    }
}
