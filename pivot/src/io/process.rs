//! Helpers for running the external tools pivot drives.
//!
//! Every command goes through [`CommandRunner::exec`]. The provided methods
//! layer the three policies the workflow needs on top of it:
//!
//! - [`CommandRunner::run`] / [`CommandRunner::run_captured`]: fail on non-zero exit.
//! - [`CommandRunner::run_with_retry`]: bounded retry, for network operations only.
//! - [`CommandRunner::run_ignoring_errors`]: best-effort cleanup, failures are logged.

use std::fmt;
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, info, instrument, warn};
use wait_timeout::ChildExt;

use crate::io::retry::{RetryPolicy, retry};

/// What happens to a child's stdout. Stderr always passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    /// Pass stdout through to the console.
    Inherit,
    /// Collect stdout and return it.
    Capture,
}

/// An external command line plus an optional wall-clock limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cmd {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl Cmd {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Kill the child if it runs longer than `timeout`.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn time_limit(&self) -> Option<Duration> {
        self.timeout
    }
}

impl fmt::Display for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Abstraction over process execution so the workflow can run against a
/// scripted double in tests.
pub trait CommandRunner {
    /// Run `cmd` to completion. Returns raw stdout for [`Output::Capture`]
    /// (empty for [`Output::Inherit`]); errors if the command cannot be
    /// spawned, times out, or exits non-zero.
    fn exec(&self, cmd: &Cmd, output: Output) -> Result<String>;

    fn run(&self, cmd: &Cmd) -> Result<()> {
        self.exec(cmd, Output::Inherit).map(|_| ())
    }

    /// Run and return stdout with surrounding whitespace removed.
    fn run_captured(&self, cmd: &Cmd) -> Result<String> {
        Ok(self.exec(cmd, Output::Capture)?.trim().to_string())
    }

    /// Run with bounded retries. Only for commands that cross the network;
    /// local mutating commands must use [`CommandRunner::run`].
    fn run_with_retry(&self, policy: &RetryPolicy, output: Output, cmd: &Cmd) -> Result<String> {
        let label = cmd.to_string();
        let stdout = retry(policy, &label, |_attempt| self.exec(cmd, output))?;
        Ok(stdout.trim().to_string())
    }

    /// Best-effort invocation: a failure is logged and otherwise ignored.
    fn run_ignoring_errors(&self, cmd: &Cmd) {
        if let Err(err) = self.exec(cmd, Output::Inherit) {
            warn!(command = %cmd, "ignoring failure: {err:#}");
        }
    }
}

/// Runner that spawns real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    #[instrument(skip_all, fields(program = %cmd.program))]
    fn exec(&self, cmd: &Cmd, output: Output) -> Result<String> {
        info!("Running: {cmd}");

        let mut command = Command::new(&cmd.program);
        command
            .args(&cmd.args)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit());
        match output {
            Output::Inherit => command.stdout(Stdio::inherit()),
            Output::Capture => command.stdout(Stdio::piped()),
        };

        let mut child = match command.spawn() {
            Ok(c) => c,
            Err(e) => {
                error!(err = %e, "failed to spawn command");
                return Err(e).with_context(|| format!("spawn {}", cmd.program));
            }
        };

        let stdout_handle = child
            .stdout
            .take()
            .map(|stdout| thread::spawn(move || read_stream(stdout)));

        let waited = wait_for(&mut child, cmd.timeout);

        let stdout = match stdout_handle {
            Some(handle) => join_output(handle).context("join stdout")?,
            None => Vec::new(),
        };

        let status = match waited? {
            Some(status) => status,
            None => {
                return Err(anyhow!(
                    "{}: timed out after {}s",
                    cmd.program,
                    cmd.timeout.map_or(0, |t| t.as_secs())
                ));
            }
        };

        debug!(exit_code = ?status.code(), "command finished");
        if !status.success() {
            return Err(anyhow!("{}: {}", cmd.program, status));
        }
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }
}

/// Wait for `child`, killing it once `timeout` elapses. `Ok(None)` means it was killed.
fn wait_for(child: &mut Child, timeout: Option<Duration>) -> Result<Option<ExitStatus>> {
    let Some(timeout) = timeout else {
        return child.wait().map(Some).context("wait for command");
    };
    match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => Ok(Some(status)),
        None => {
            warn!(timeout_secs = timeout.as_secs(), "command timed out, killing");
            child.kill().context("kill command")?;
            child.wait().context("wait command after kill")?;
            Ok(None)
        }
    }
}

fn join_output(handle: thread::JoinHandle<Result<Vec<u8>>>) -> Result<Vec<u8>> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream<R: Read>(mut reader: R) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).context("read output")?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_succeeds_for_zero_exit() {
        SystemRunner.run(&Cmd::new("true")).expect("run true");
    }

    #[test]
    fn run_fails_for_non_zero_exit() {
        let err = SystemRunner.run(&Cmd::new("false")).unwrap_err();
        assert!(err.to_string().starts_with("false:"));
    }

    #[test]
    fn exec_capture_keeps_trailing_newline() {
        let out = SystemRunner
            .exec(&Cmd::new("echo").arg("a"), Output::Capture)
            .expect("echo");
        assert_eq!(out, "a\n");
    }

    #[test]
    fn run_captured_trims_output() {
        let out = SystemRunner
            .run_captured(&Cmd::new("echo").arg("a"))
            .expect("echo");
        assert_eq!(out, "a");
    }

    #[test]
    fn spawn_failure_is_reported() {
        let err = SystemRunner
            .run(&Cmd::new("pivot-test-no-such-binary"))
            .unwrap_err();
        assert!(err.to_string().contains("spawn pivot-test-no-such-binary"));
    }

    #[test]
    fn timeout_kills_long_running_command() {
        let cmd = Cmd::new("sleep")
            .arg("5")
            .timeout(Some(Duration::from_millis(100)));
        let err = SystemRunner.run(&cmd).unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn ignoring_errors_swallows_failures() {
        SystemRunner.run_ignoring_errors(&Cmd::new("false"));
    }

    #[test]
    fn display_joins_program_and_args() {
        let cmd = Cmd::new("podman").args(["rm", "-f", "ostree-container-pivot"]);
        assert_eq!(cmd.to_string(), "podman rm -f ostree-container-pivot");
    }
}
