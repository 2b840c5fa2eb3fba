//! Supervised bridge processes.
//!
//! A [`Worker`] owns one child process running a bridge. It starts the child
//! on first use, forwards the child's stdout and stderr to the log line by
//! line, and starts a fresh child when the previous one has exited. A call
//! that fails mid-exchange (timeout, broken channel) kills the child so the
//! next call starts from a clean process.

use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use pipebridge_codec::Value;
use pipebridge_frame::FrameError;
use pipebridge_transport::{spawn_with_channels, ByteChannel, ChannelConfig, TransportError};
use tracing::{debug, info, warn};

use crate::caller::{Caller, CallerConfig};
use crate::error::{DispatchError, Result};

/// Builds the command for each (re)start of a bridge process.
pub type CommandFactory = Arc<dyn Fn() -> Command + Send + Sync>;

/// Settings for supervised bridge processes.
#[derive(Debug, Clone, Default)]
pub struct WorkerConfig {
    /// Descriptors the child sees its channels on.
    pub channels: ChannelConfig,
    /// Frame limits and call timeout.
    pub caller: CallerConfig,
}

/// One supervised bridge process.
pub struct Worker {
    command: CommandFactory,
    config: WorkerConfig,
    live: Option<Live>,
    last_exit: Option<ExitStatus>,
    starts: u64,
}

struct Live {
    child: Child,
    caller: Caller<ByteChannel, ByteChannel>,
    output: Vec<JoinHandle<()>>,
}

impl Worker {
    /// Create a worker. No process is started until [`start`](Self::start)
    /// or the first [`call`](Self::call).
    pub fn new<F>(command: F, config: WorkerConfig) -> Self
    where
        F: Fn() -> Command + Send + Sync + 'static,
    {
        Self::with_factory(Arc::new(command), config)
    }

    pub(crate) fn with_factory(command: CommandFactory, config: WorkerConfig) -> Self {
        Self {
            command,
            config,
            live: None,
            last_exit: None,
            starts: 0,
        }
    }

    /// Make sure a ready bridge process is running and return its pid.
    ///
    /// A process that has exited since the last call is reaped and replaced.
    pub fn start(&mut self) -> Result<u32> {
        let exited = match self.live.as_mut() {
            Some(live) => match live.child.try_wait().map_err(TransportError::from)? {
                None => return Ok(live.child.id()),
                Some(status) => Some((live.child.id(), status)),
            },
            None => None,
        };

        if let Some((pid, status)) = exited {
            warn!(pid, %status, "bridge process exited, restarting");
            self.live = None;
            self.last_exit = Some(status);
        }
        self.spawn()
    }

    /// Invoke `function` on the bridge, starting or restarting it first.
    pub fn call(&mut self, function: &str, args: &Value) -> Result<Value> {
        self.start()?;
        let live = self
            .live
            .as_mut()
            .ok_or(DispatchError::Frame(FrameError::ChannelClosed))?;

        let outcome = live.caller.call(function, args);
        if let Err(err) = &outcome {
            // The result document may be undecodable while the exchange itself
            // completed; the bridge is still in step then.
            if !matches!(err, DispatchError::Codec(_)) {
                warn!(pid = live.child.id(), function, error = %err, "call failed, stopping bridge process");
                self.kill();
            }
        }
        outcome
    }

    /// Pid of the running bridge process, if any.
    pub fn pid(&self) -> Option<u32> {
        self.live.as_ref().map(|live| live.child.id())
    }

    /// True while the current bridge process has not exited.
    pub fn is_running(&mut self) -> Result<bool> {
        match self.live.as_mut() {
            Some(live) => Ok(live.child.try_wait().map_err(TransportError::from)?.is_none()),
            None => Ok(false),
        }
    }

    /// Exit status of the most recently reaped bridge process.
    pub fn last_exit(&self) -> Option<ExitStatus> {
        self.last_exit
    }

    /// Number of bridge processes started so far.
    pub fn starts(&self) -> u64 {
        self.starts
    }

    /// Close the bridge's inbound channel and wait for it to exit.
    ///
    /// Returns the exit status of the last process this worker ran, if any.
    pub fn shutdown(&mut self) -> Result<Option<ExitStatus>> {
        if let Some(mut live) = self.live.take() {
            drop(live.caller);
            let status = live.child.wait().map_err(TransportError::from)?;
            for handle in live.output {
                if handle.join().is_err() {
                    debug!("output forwarder panicked");
                }
            }
            debug!(pid = live.child.id(), %status, "bridge process stopped");
            self.last_exit = Some(status);
        }
        Ok(self.last_exit)
    }

    fn spawn(&mut self) -> Result<u32> {
        let mut command = (self.command)();
        command.stdout(Stdio::piped()).stderr(Stdio::piped());

        let (child, reader, writer) = spawn_with_channels(command, &self.config.channels)?.into_parts();
        self.starts += 1;
        let pid = child.id();

        let mut live = Live {
            child,
            caller: Caller::with_config(reader, writer, self.config.caller.clone()),
            output: Vec::with_capacity(2),
        };

        let setup = live
            .forward_output()
            .and_then(|()| live.caller.await_ready());
        if let Err(err) = setup {
            warn!(pid, error = %err, "bridge process failed to become ready");
            self.last_exit = live.kill();
            return Err(err);
        }

        info!(pid, starts = self.starts, "bridge process ready");
        self.live = Some(live);
        Ok(pid)
    }

    fn kill(&mut self) {
        if let Some(live) = self.live.take() {
            self.last_exit = live.kill();
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.kill();
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("pid", &self.pid())
            .field("starts", &self.starts)
            .field("last_exit", &self.last_exit)
            .field("config", &self.config)
            .finish()
    }
}

impl Live {
    fn forward_output(&mut self) -> Result<()> {
        let pid = self.child.id();
        if let Some(stdout) = self.child.stdout.take() {
            self.output.push(forward_lines(stdout, pid, "stdout")?);
        }
        if let Some(stderr) = self.child.stderr.take() {
            self.output.push(forward_lines(stderr, pid, "stderr")?);
        }
        Ok(())
    }

    /// Kill and reap the child. Forwarder threads end on their own at EOF.
    fn kill(mut self) -> Option<ExitStatus> {
        let pid = self.child.id();
        if let Err(err) = self.child.kill() {
            // Already exited; wait() below still reaps it.
            debug!(pid, error = %err, "kill failed");
        }
        drop(self.caller);
        match self.child.wait() {
            Ok(status) => {
                debug!(pid, %status, "bridge process killed");
                Some(status)
            }
            Err(err) => {
                warn!(pid, error = %err, "could not reap bridge process");
                None
            }
        }
    }
}

/// Log each line the child writes to `stream` until it closes.
fn forward_lines<S>(stream: S, pid: u32, name: &'static str) -> Result<JoinHandle<()>>
where
    S: Read + Send + 'static,
{
    let handle = thread::Builder::new()
        .name(format!("bridge-{pid}-{name}"))
        .spawn(move || {
            let mut reader = BufReader::new(stream);
            let mut line = Vec::new();
            loop {
                line.clear();
                match reader.read_until(b'\n', &mut line) {
                    Ok(0) => break,
                    Ok(_) => {
                        let text = String::from_utf8_lossy(&line);
                        info!(pid, stream = name, line = %text.trim_end(), "child process output");
                    }
                    Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                    Err(err) => {
                        debug!(pid, stream = name, error = %err, "stopped reading child output");
                        break;
                    }
                }
            }
        })
        .map_err(TransportError::from)?;
    Ok(handle)
}
