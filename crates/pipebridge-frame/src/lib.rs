//! Length-prefixed message framing for pipebridge.
//!
//! Every message on a channel is framed as:
//! - A 4-byte big-endian payload length
//! - Exactly that many payload bytes
//!
//! Before the first frame the bridge writes the unframed readiness marker
//! `ready` on its outbound channel (see [`handshake`]).
//!
//! [`FrameReader`] and [`FrameWriter`] hide partial reads and writes; callers
//! only ever see whole payloads.

pub mod codec;
pub mod error;
pub mod handshake;
pub mod reader;
pub mod writer;

pub use codec::{decode_frame, encode_frame, Frame, FrameConfig, DEFAULT_MAX_PAYLOAD, HEADER_SIZE};
pub use error::{FrameError, Result};
pub use handshake::{announce_ready, await_ready, READY_MARKER};
pub use reader::FrameReader;
pub use writer::FrameWriter;
