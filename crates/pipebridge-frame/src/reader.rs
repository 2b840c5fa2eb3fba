use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};

use crate::codec::{decode_frame, peek_length, Frame, FrameConfig, HEADER_SIZE};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete frames from any `Read` stream.
///
/// Partial reads are buffered internally; callers always get complete frames.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ChannelClosed)` when EOF is reached between
    /// frames and `Err(FrameError::ShortRead { .. })` when it is reached inside
    /// one.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = decode_frame(&mut self.buf, self.config.max_payload_size)? {
                return Ok(frame);
            }

            if !self.fill()? {
                let expected = match peek_length(&self.buf) {
                    Some(len) => HEADER_SIZE + len,
                    None => HEADER_SIZE,
                };
                return Err(self.eof_error(expected));
            }
        }
    }

    /// Read exactly `len` unframed bytes (blocking).
    ///
    /// Used for the readiness marker, which precedes the first frame.
    pub fn read_raw(&mut self, len: usize) -> Result<Bytes> {
        while self.buf.len() < len {
            if !self.fill()? {
                return Err(self.eof_error(len));
            }
        }
        Ok(self.buf.split_to(len).freeze())
    }

    /// Pull one chunk from the stream into the buffer. False on EOF.
    fn fill(&mut self) -> Result<bool> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            match self.inner.read(&mut chunk) {
                Ok(0) => return Ok(false),
                Ok(n) => {
                    self.buf.extend_from_slice(&chunk[..n]);
                    return Ok(true);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    fn eof_error(&self, expected: usize) -> FrameError {
        if self.buf.is_empty() {
            FrameError::ChannelClosed
        } else {
            FrameError::ShortRead {
                expected,
                received: self.buf.len(),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum payload size for subsequent frame decoding.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io::Cursor;

    use bytes::{BufMut, BytesMut};
    use pipebridge_transport::ByteChannel;

    use super::*;
    use crate::codec::encode_frame;
    use crate::writer::FrameWriter;

    fn wire(payloads: &[&[u8]]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for payload in payloads {
            encode_frame(payload, &mut buf).expect("payload should encode");
        }
        buf.to_vec()
    }

    /// Replays a fixed sequence of read outcomes.
    enum Step {
        Data(Vec<u8>),
        Fail(ErrorKind),
    }

    struct Script(VecDeque<Step>);

    impl Script {
        fn trickle(bytes: &[u8]) -> Self {
            Self(bytes.iter().map(|b| Step::Data(vec![*b])).collect())
        }

        fn after(kind: ErrorKind, bytes: Vec<u8>) -> Self {
            Self(VecDeque::from([Step::Fail(kind), Step::Data(bytes)]))
        }
    }

    impl Read for Script {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.0.pop_front() {
                None => Ok(0),
                Some(Step::Fail(kind)) => Err(kind.into()),
                Some(Step::Data(mut data)) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    if n < data.len() {
                        self.0.push_front(Step::Data(data.split_off(n)));
                    }
                    Ok(n)
                }
            }
        }
    }

    #[test]
    fn name_then_args_frames() {
        let bytes = wire(&[b"add", br#"{"a":2,"b":3}"#]);
        let mut reader = FrameReader::new(Cursor::new(bytes));

        assert_eq!(reader.read_frame().unwrap().payload.as_ref(), b"add");
        assert_eq!(
            reader.read_frame().unwrap().payload.as_ref(),
            br#"{"a":2,"b":3}"#
        );
        assert!(matches!(
            reader.read_frame().unwrap_err(),
            FrameError::ChannelClosed
        ));
    }

    #[test]
    fn empty_payload_is_a_frame() {
        let mut reader = FrameReader::new(Cursor::new(wire(&[b"", b"next"])));
        assert!(reader.read_frame().unwrap().is_empty());
        assert_eq!(reader.read_frame().unwrap().payload.as_ref(), b"next");
    }

    #[test]
    fn payload_larger_than_one_chunk() {
        let payload = vec![0x5a; 3 * READ_CHUNK_SIZE + 17];
        let mut reader = FrameReader::new(Cursor::new(wire(&[&payload])));
        assert_eq!(reader.read_frame().unwrap().payload.len(), payload.len());
    }

    #[test]
    fn frame_assembled_from_single_bytes() {
        let mut reader = FrameReader::new(Script::trickle(&wire(&[b"identity"])));
        assert_eq!(reader.read_frame().unwrap().payload.as_ref(), b"identity");
    }

    #[test]
    fn no_bytes_means_closed() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        assert!(matches!(
            reader.read_frame().unwrap_err(),
            FrameError::ChannelClosed
        ));
    }

    #[test]
    fn eof_inside_header_is_short_read() {
        let mut reader = FrameReader::new(Cursor::new(vec![0, 0, 1]));
        assert!(matches!(
            reader.read_frame().unwrap_err(),
            FrameError::ShortRead {
                expected: 4,
                received: 3
            }
        ));
    }

    #[test]
    fn eof_inside_payload_is_short_read() {
        let mut bytes = BytesMut::new();
        bytes.put_u32(10);
        bytes.put_slice(b"{\"a\"");

        let mut reader = FrameReader::new(Cursor::new(bytes.to_vec()));
        assert!(matches!(
            reader.read_frame().unwrap_err(),
            FrameError::ShortRead {
                expected: 14,
                received: 8
            }
        ));
    }

    #[test]
    fn announced_length_over_limit_rejected() {
        let mut bytes = BytesMut::new();
        bytes.put_u32(4096);

        let config = FrameConfig {
            max_payload_size: 64,
        };
        let mut reader = FrameReader::with_config(Cursor::new(bytes.to_vec()), config);
        assert!(matches!(
            reader.read_frame().unwrap_err(),
            FrameError::PayloadTooLarge {
                size: 4096,
                max: 64
            }
        ));
    }

    #[test]
    fn marker_bytes_then_frames() {
        let mut bytes = b"ready".to_vec();
        bytes.extend(wire(&[b"{\"result\":5}"]));

        let mut reader = FrameReader::new(Script::trickle(&bytes));
        assert_eq!(reader.read_raw(5).unwrap().as_ref(), b"ready");
        assert_eq!(
            reader.read_frame().unwrap().payload.as_ref(),
            b"{\"result\":5}"
        );
    }

    #[test]
    fn raw_read_cut_short() {
        let mut reader = FrameReader::new(Cursor::new(b"rea".to_vec()));
        assert!(matches!(
            reader.read_raw(5).unwrap_err(),
            FrameError::ShortRead {
                expected: 5,
                received: 3
            }
        ));
    }

    #[test]
    fn interrupted_read_is_retried() {
        let mut reader = FrameReader::new(Script::after(ErrorKind::Interrupted, wire(&[b"ok"])));
        assert_eq!(reader.read_frame().unwrap().payload.as_ref(), b"ok");
    }

    #[test]
    fn other_read_errors_surface() {
        let mut reader = FrameReader::new(Script::after(ErrorKind::WouldBlock, wire(&[b"ok"])));
        assert!(matches!(
            reader.read_frame().unwrap_err(),
            FrameError::Io(err) if err.kind() == ErrorKind::WouldBlock
        ));
    }

    #[test]
    fn limit_can_be_changed() {
        let mut reader = FrameReader::new(Cursor::new(wire(&[b"0123456789"])));
        reader.set_max_payload_size(4);
        assert_eq!(reader.config().max_payload_size, 4);
        assert!(reader.read_frame().is_err());
        assert_eq!(reader.get_ref().position(), 14);
    }

    #[test]
    fn streams_between_threads_over_socket_pair() {
        let (left, right) = ByteChannel::pair().unwrap();
        let mut writer = FrameWriter::new(left);
        let mut reader = FrameReader::new(right);

        let consumer = std::thread::spawn(move || {
            (0..32)
                .map(|_| reader.read_frame().map(|f| f.payload.len()))
                .collect::<Result<Vec<_>>>()
        });

        for len in 0..32usize {
            writer.send(&vec![b'x'; len * 100]).unwrap();
        }

        let lens = consumer.join().unwrap().unwrap();
        assert_eq!(lens, (0..32).map(|len| len * 100).collect::<Vec<_>>());
    }
}
