use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use pipebridge_codec::Value;
use pipebridge_frame::{await_ready, FrameConfig, FrameError, FrameReader, FrameWriter};
use pipebridge_transport::ReadTimeout;
use tracing::{debug, warn};

use crate::error::{DispatchError, Result};

/// How long a caller waits for the bridge unless configured otherwise.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings for the supervisor side of a bridge.
#[derive(Debug, Clone)]
pub struct CallerConfig {
    /// Frame limits applied to both directions.
    pub frame: FrameConfig,
    /// Upper bound on each wait for the readiness marker or a result.
    /// `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Default for CallerConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            timeout: Some(DEFAULT_CALL_TIMEOUT),
        }
    }
}

/// Supervisor side of a bridge: sends requests and reads their results.
///
/// `reader` is the bridge's outbound channel and `writer` its inbound one.
/// Call [`await_ready`](Self::await_ready) once before the first
/// [`call`](Self::call). Dropping the caller closes the bridge's inbound
/// channel, which is how the bridge is told to stop.
pub struct Caller<R, W> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
    timeout: Option<Duration>,
}

impl<R: Read + ReadTimeout, W: Write> Caller<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_config(reader, writer, CallerConfig::default())
    }

    pub fn with_config(mut reader: R, writer: W, config: CallerConfig) -> Self {
        reader.set_read_timeout(config.timeout);
        Self {
            reader: FrameReader::with_config(reader, config.frame.clone()),
            writer: FrameWriter::with_config(writer, config.frame),
            timeout: config.timeout,
        }
    }

    /// Block until the bridge has announced readiness.
    pub fn await_ready(&mut self) -> Result<()> {
        await_ready(&mut self.reader).map_err(|err| self.classify(err))
    }

    /// Invoke `function` with `args` and wait for its result.
    ///
    /// A bridge that stops without answering surfaces as
    /// [`FrameError::ChannelClosed`], one that stays silent past the timeout
    /// as [`DispatchError::Timeout`]. After a timeout the channels are out of
    /// step with the bridge and the caller should be discarded.
    pub fn call(&mut self, function: &str, args: &Value) -> Result<Value> {
        let payload = pipebridge_codec::encode(args)?;
        self.writer.send(function.as_bytes())?;
        self.writer.send(&payload)?;
        debug!(function, args_len = payload.len(), "request sent");

        let frame = self.reader.read_frame().map_err(|err| self.classify(err))?;
        debug!(function, result_len = frame.len(), "result received");
        Ok(pipebridge_codec::decode(&frame.payload)?)
    }

    /// The bound applied to each wait for the bridge.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Consume the caller and return `(reader, writer)`.
    pub fn into_inner(self) -> (R, W) {
        (self.reader.into_inner(), self.writer.into_inner())
    }

    fn classify(&self, err: FrameError) -> DispatchError {
        if let (FrameError::Io(io), Some(timeout)) = (&err, self.timeout) {
            if io.kind() == ErrorKind::TimedOut {
                warn!(?timeout, "bridge did not answer in time");
                return DispatchError::Timeout(timeout);
            }
        }
        err.into()
    }
}
