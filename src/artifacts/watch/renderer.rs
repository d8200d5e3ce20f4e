//! External graph renderers
//!
//! A renderer is a long-lived subprocess that reads one graph on its standard
//! input and displays it until it is told to go away.

use crate::artifacts::watch::error::WatchError;
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::convert::Infallible;
use std::io::Write;
use std::process::{Child, Command, Stdio};
use std::str::FromStr;
use std::time::{Duration, Instant};

pub const DEFAULT_RENDERER: &str = "dot -Tx11";
/// Time a renderer gets to exit after SIGTERM before it is killed
const TERMINATE_GRACE: Duration = Duration::from_secs(2);
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Starts render processes
pub trait Renderer: Send {
    type Process: RenderProcess;

    fn spawn(&mut self) -> Result<Self::Process, WatchError>;
}

/// A running renderer
pub trait RenderProcess: Send {
    /// The stream the graph is written to; available once
    fn take_input(&mut self) -> Option<Box<dyn Write + Send>>;

    /// Ask the process to exit and wait for it
    ///
    /// A process that already exited is not an error.
    fn terminate(&mut self) -> Result<(), WatchError>;
}

/// A renderer program with its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererCommand {
    program: String,
    args: Vec<String>,
}

impl RendererCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        RendererCommand {
            program: program.into(),
            args,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl Default for RendererCommand {
    fn default() -> Self {
        RendererCommand::new("dot", vec!["-Tx11".to_string()])
    }
}

impl FromStr for RendererCommand {
    type Err = Infallible;

    /// Split a command line on whitespace; a blank line gives the default
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace().map(str::to_string);

        Ok(match words.next() {
            Some(program) => RendererCommand::new(program, words.collect()),
            None => RendererCommand::default(),
        })
    }
}

impl Renderer for RendererCommand {
    type Process = ChildProcess;

    fn spawn(&mut self) -> Result<ChildProcess, WatchError> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .spawn()
            .map_err(WatchError::subprocess("start"))?;

        tracing::info!(program = %self.program, pid = child.id(), "renderer started");

        Ok(ChildProcess {
            child,
            grace: TERMINATE_GRACE,
        })
    }
}

#[derive(Debug)]
pub struct ChildProcess {
    child: Child,
    grace: Duration,
}

impl ChildProcess {
    /// Poll until the process exits or `grace` runs out
    fn wait_for_exit(&mut self, grace: Duration) -> Result<bool, WatchError> {
        let deadline = Instant::now() + grace;
        loop {
            if let Some(status) = self
                .child
                .try_wait()
                .map_err(WatchError::subprocess("poll"))?
            {
                tracing::debug!(pid = self.child.id(), %status, "renderer stopped");
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            std::thread::sleep(EXIT_POLL_INTERVAL);
        }
    }
}

impl RenderProcess for ChildProcess {
    fn take_input(&mut self) -> Option<Box<dyn Write + Send>> {
        self.child
            .stdin
            .take()
            .map(|stdin| Box::new(stdin) as Box<dyn Write + Send>)
    }

    fn terminate(&mut self) -> Result<(), WatchError> {
        drop(self.child.stdin.take());

        if let Some(status) = self
            .child
            .try_wait()
            .map_err(WatchError::subprocess("poll"))?
        {
            tracing::debug!(pid = self.child.id(), %status, "renderer already exited");
            return Ok(());
        }

        let pid = Pid::from_raw(self.child.id() as i32);
        match signal::kill(pid, Signal::SIGTERM) {
            Ok(()) | Err(Errno::ESRCH) => {
                if self.wait_for_exit(self.grace)? {
                    return Ok(());
                }
                tracing::warn!(%pid, grace = ?self.grace, "renderer ignored SIGTERM, killing it");
            }
            Err(errno) => tracing::warn!(%pid, %errno, "failed to signal renderer, killing it"),
        }

        self.child.kill().map_err(WatchError::subprocess("kill"))?;
        let status = self.child.wait().map_err(WatchError::subprocess("wait for"))?;
        tracing::debug!(%pid, %status, "renderer killed");

        Ok(())
    }
}
