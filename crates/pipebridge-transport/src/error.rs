/// Errors that can occur while acquiring or wiring byte channels.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The descriptor handed over by the launcher is not open.
    #[error("file descriptor {fd} is not an open channel: {source}")]
    InvalidDescriptor { fd: i32, source: std::io::Error },

    /// Inbound and outbound were configured on the same descriptor.
    #[error("inbound and outbound channels both use file descriptor {0}")]
    DescriptorConflict(i32),

    /// Failed to start a bridge child process.
    #[error("failed to spawn bridge process: {0}")]
    Spawn(std::io::Error),

    /// An I/O error occurred on a channel.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
