//! Readiness handshake.
//!
//! The bridge writes [`READY_MARKER`] once, unframed, as soon as it holds both
//! channels. The supervisor must not write requests before it has seen the
//! marker. Nothing is sent back in reply.

use std::io::{Read, Write};

use tracing::debug;

use crate::error::{FrameError, Result};
use crate::reader::FrameReader;
use crate::writer::FrameWriter;

/// Literal bytes announcing that the bridge is live.
pub const READY_MARKER: &[u8] = b"ready";

/// Bridge side: announce readiness on the outbound channel.
pub fn announce_ready<W: Write>(writer: &mut FrameWriter<W>) -> Result<()> {
    writer.write_raw(READY_MARKER)?;
    debug!("readiness marker sent");
    Ok(())
}

/// Supervisor side: consume the readiness marker from the bridge's outbound
/// channel.
pub fn await_ready<R: Read>(reader: &mut FrameReader<R>) -> Result<()> {
    let received = reader.read_raw(READY_MARKER.len())?;
    if received.as_ref() != READY_MARKER {
        return Err(FrameError::HandshakeMismatch {
            expected: String::from_utf8_lossy(READY_MARKER).into_owned(),
            received: String::from_utf8_lossy(&received).into_owned(),
        });
    }
    debug!("readiness marker received");
    Ok(())
}
