/// Failures while moving frames over a channel.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("channel I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The channel was closed at a frame boundary.
    #[error("channel closed")]
    ChannelClosed,

    /// The channel ended part-way through a frame.
    #[error("short read: expected {expected} bytes, channel ended after {received}")]
    ShortRead { expected: usize, received: usize },

    /// The peer sent something other than the readiness marker.
    #[error("expected readiness marker {expected:?}, received {received:?}")]
    HandshakeMismatch { expected: String, received: String },
}

pub type Result<T> = std::result::Result<T, FrameError>;
