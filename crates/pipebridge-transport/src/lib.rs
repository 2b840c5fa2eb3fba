//! Byte channels for pipebridge.
//!
//! The bridge talks to its supervisor over two one-directional byte streams
//! that the launcher opens before the bridge starts:
//! - `inbound` (fd 3 by default): requests from the supervisor
//! - `outbound` (fd 4 by default): the readiness marker and responses
//!
//! This is the lowest layer of pipebridge. Everything else reads and writes
//! through the [`ByteChannel`] type provided here. The supervisor side uses
//! [`spawn_with_channels`] to start a bridge process with both channels wired.

pub mod error;

#[cfg(unix)]
pub mod channel;
#[cfg(unix)]
pub mod spawn;

pub use error::{Result, TransportError};

#[cfg(unix)]
pub use channel::{
    ByteChannel, ChannelConfig, ChannelPair, ReadTimeout, DEFAULT_INBOUND_FD, DEFAULT_OUTBOUND_FD,
};
#[cfg(unix)]
pub use spawn::{spawn_with_channels, ChildBridge};
