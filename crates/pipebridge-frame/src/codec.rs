use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame header: a single big-endian u32 payload length.
pub const HEADER_SIZE: usize = 4;

/// Default maximum payload size: everything the length field can express.
pub const DEFAULT_MAX_PAYLOAD: usize = u32::MAX as usize;

/// A framed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The message payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Payload length in bytes (the value of the length field).
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// True when the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────────────┐
/// │ Length       │ Payload          │
/// │ (4B BE u32)  │ (Length bytes)   │
/// └──────────────┴──────────────────┘
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLarge {
        size: payload.len(),
        max: DEFAULT_MAX_PAYLOAD,
    })?;
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u32(len);
    dst.put_slice(payload);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    let Some(payload_len) = peek_length(src) else {
        return Ok(None);
    };

    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    if src.len() < HEADER_SIZE + payload_len {
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();

    Ok(Some(Frame { payload }))
}

/// Payload length announced by a buffered header, if the header is complete.
pub(crate) fn peek_length(src: &[u8]) -> Option<usize> {
    let header: [u8; HEADER_SIZE] = src.get(..HEADER_SIZE)?.try_into().ok()?;
    Some(u32::from_be_bytes(header) as usize)
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: `u32::MAX`.
    pub max_payload_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framed(payloads: &[&[u8]]) -> BytesMut {
        let mut buf = BytesMut::new();
        for payload in payloads {
            encode_frame(payload, &mut buf).expect("payload should encode");
        }
        buf
    }

    fn next(buf: &mut BytesMut) -> Option<Frame> {
        decode_frame(buf, DEFAULT_MAX_PAYLOAD).expect("frame should decode")
    }

    #[test]
    fn request_pair_decodes_in_order() {
        let mut buf = framed(&[b"add", br#"{"a":2,"b":3}"#]);

        assert_eq!(next(&mut buf), Some(Frame::new("add")));
        assert_eq!(next(&mut buf), Some(Frame::new(r#"{"a":2,"b":3}"#)));
        assert_eq!(next(&mut buf), None);
    }

    #[test]
    fn length_is_big_endian() {
        let buf = framed(&[&[7u8; 258]]);
        assert_eq!(&buf[..HEADER_SIZE], &[0x00, 0x00, 0x01, 0x02]);
        assert_eq!(buf.len(), HEADER_SIZE + 258);
    }

    #[test]
    fn empty_payload_round_trips() {
        let mut buf = framed(&[b""]);
        assert_eq!(buf.as_ref(), &[0, 0, 0, 0]);
        assert!(next(&mut buf).expect("empty frame").is_empty());
        assert!(buf.is_empty());
    }

    #[test]
    fn partial_input_is_left_untouched() {
        let mut header_only = BytesMut::from(&[0x00, 0x00, 0x00][..]);
        assert_eq!(next(&mut header_only), None);
        assert_eq!(header_only.len(), 3);

        let mut cut = framed(&[b"identity"]);
        cut.truncate(HEADER_SIZE + 2);
        assert_eq!(next(&mut cut), None);
        assert_eq!(cut.len(), HEADER_SIZE + 2);
    }

    #[test]
    fn announced_length_checked_before_payload_arrives() {
        let mut buf = BytesMut::new();
        buf.put_u32(1 << 20);

        let err = decode_frame(&mut buf, 1024).unwrap_err();
        assert!(matches!(
            err,
            FrameError::PayloadTooLarge {
                size: 1_048_576,
                max: 1024
            }
        ));
    }

    #[test]
    fn frame_sizes() {
        let frame = Frame::new(Bytes::from_static(b"null"));
        assert_eq!(frame.len(), 4);
        assert_eq!(frame.wire_size(), 8);
        assert_eq!(FrameConfig::default().max_payload_size, u32::MAX as usize);
    }

    #[test]
    fn peek_needs_full_header() {
        assert_eq!(peek_length(&[0, 0, 0]), None);
        assert_eq!(peek_length(&[0, 0, 1, 0, 0xff]), Some(256));
    }
}
