use std::time::Duration;

use crate::registry::HandlerError;

/// Errors that end a dispatch loop or a supervisor call.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] pipebridge_transport::TransportError),

    /// Frame-level error, including a channel closed mid-request.
    #[error("frame error: {0}")]
    Frame(#[from] pipebridge_frame::FrameError),

    /// Argument or result document could not be decoded or encoded.
    #[error("codec error: {0}")]
    Codec(#[from] pipebridge_codec::CodecError),

    /// The function-name frame is not valid UTF-8.
    #[error("function name is not valid utf-8: {0}")]
    InvalidFunctionName(#[source] std::str::Utf8Error),

    /// No handler is registered under the requested name.
    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    /// A handler returned an error.
    #[error("handler '{function}' failed: {source}")]
    Handler {
        function: String,
        #[source]
        source: HandlerError,
    },

    /// The bridge sent nothing within the caller's read timeout.
    #[error("bridge did not answer within {0:?}")]
    Timeout(Duration),

    /// A worker pool needs at least one worker.
    #[error("worker pool size must be at least 1")]
    EmptyPool,
}

impl DispatchError {
    /// True when the underlying cause is the peer closing its channel.
    pub fn is_channel_closed(&self) -> bool {
        matches!(
            self,
            DispatchError::Frame(pipebridge_frame::FrameError::ChannelClosed)
        )
    }

    /// True when the bridge stayed silent past the caller's timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, DispatchError::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;
