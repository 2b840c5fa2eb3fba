use std::io::{Read, Write};

use pipebridge_frame::{announce_ready, FrameConfig, FrameError, FrameReader, FrameWriter};
#[cfg(unix)]
use pipebridge_transport::ChannelPair;
use tracing::{debug, info};

#[cfg(unix)]
use crate::config::BridgeConfig;
use crate::error::{DispatchError, Result};
use crate::registry::HandlerRegistry;

/// Where the loop is within a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Next inbound frame is a function name.
    AwaitingName,
    /// Next inbound frame is the argument document for the named function.
    AwaitingArgs,
}

/// Serves requests from one inbound channel, one at a time.
///
/// Each request is a name frame followed by an argument frame; each answer is
/// a single result frame. Nothing else is ever written after the readiness
/// marker.
pub struct Bridge<'r, R, W> {
    registry: &'r HandlerRegistry,
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
    state: State,
    served: u64,
}

impl<'r, R: Read, W: Write> Bridge<'r, R, W> {
    pub fn new(registry: &'r HandlerRegistry, reader: R, writer: W) -> Self {
        Self::with_config(registry, reader, writer, FrameConfig::default())
    }

    pub fn with_config(
        registry: &'r HandlerRegistry,
        reader: R,
        writer: W,
        config: FrameConfig,
    ) -> Self {
        Self {
            registry,
            reader: FrameReader::with_config(reader, config.clone()),
            writer: FrameWriter::with_config(writer, config),
            state: State::AwaitingName,
            served: 0,
        }
    }

    /// Announce readiness, then answer requests until the inbound channel
    /// closes between requests.
    ///
    /// Any other failure ends the loop with an error and no response frame
    /// for the request in progress.
    pub fn serve(&mut self) -> Result<()> {
        announce_ready(&mut self.writer)?;
        info!(functions = self.registry.len(), "bridge ready");

        while let Some(name) = self.next_name()? {
            self.dispatch(&name)?;
        }

        info!(served = self.served, "inbound channel closed, bridge stopping");
        Ok(())
    }

    fn next_name(&mut self) -> Result<Option<String>> {
        let frame = match self.reader.read_frame() {
            Ok(frame) => frame,
            Err(FrameError::ChannelClosed) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let name = std::str::from_utf8(&frame.payload)
            .map_err(DispatchError::InvalidFunctionName)?
            .to_string();
        self.state = State::AwaitingArgs;
        Ok(Some(name))
    }

    fn dispatch(&mut self, name: &str) -> Result<()> {
        let frame = self.reader.read_frame()?;
        let args = pipebridge_codec::decode(&frame.payload)?;
        debug!(function = name, args_len = frame.len(), "request received");

        let result = self
            .registry
            .call(name, args)
            .ok_or_else(|| DispatchError::UnknownFunction(name.to_string()))?
            .map_err(|source| DispatchError::Handler {
                function: name.to_string(),
                source,
            })?;

        let payload = pipebridge_codec::encode(&result)?;
        self.writer.send(&payload)?;
        self.state = State::AwaitingName;
        self.served += 1;
        debug!(function = name, result_len = payload.len(), "response sent");
        Ok(())
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Number of requests answered so far.
    pub fn served(&self) -> u64 {
        self.served
    }

    /// Consume the bridge and return `(reader, writer)`.
    pub fn into_inner(self) -> (R, W) {
        (self.reader.into_inner(), self.writer.into_inner())
    }
}

/// Run a bridge over the default channels (fd 3 in, fd 4 out).
#[cfg(unix)]
pub fn run(registry: &HandlerRegistry) -> Result<()> {
    run_with_config(registry, &BridgeConfig::default())
}

/// Run a bridge over explicitly configured channels.
#[cfg(unix)]
pub fn run_with_config(registry: &HandlerRegistry, config: &BridgeConfig) -> Result<()> {
    let (inbound, outbound) = ChannelPair::open(&config.channels)?.into_parts();
    Bridge::with_config(registry, inbound, outbound, config.frame.clone()).serve()
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use pipebridge_codec::{decode, decode_array, encode, ArrayRecord, TypedArray, Value};
    use pipebridge_frame::await_ready;

    use super::*;
    use crate::registry::HandlerResult;

    /// `[[1.2, 3.2], [99.1, -14.1]]` as float64, as numpy writes it.
    fn arr_2d() -> TypedArray {
        let record = ArrayRecord {
            element_type: "float64".to_string(),
            shape: Some(vec![2, 2]),
            data: "MzMzMzMz8z+amZmZmZkJQGZmZmZmxlhAMzMzMzMzLMA=".to_string(),
        };
        decode_array(&record).expect("fixture should decode")
    }

    fn add(args: Value) -> HandlerResult {
        let a = args.get("a").and_then(Value::as_i64).ok_or("missing a")?;
        let b = args.get("b").and_then(Value::as_i64).ok_or("missing b")?;
        Ok([("result", a + b)].into_iter().collect())
    }

    fn registry() -> HandlerRegistry {
        HandlerRegistry::builder()
            .register("add", add)
            .register("identity", Ok)
            .register("fail", |_| Err("handler exploded".into()))
            .register("nan", |_| Ok(Value::from(f64::NAN)))
            .build()
    }

    fn request(wire: &mut FrameWriter<Vec<u8>>, name: &str, args: &Value) {
        wire.send(name.as_bytes()).expect("name frame should encode");
        wire.send(&encode(args).expect("args should encode"))
            .expect("args frame should encode");
    }

    fn serve(registry: &HandlerRegistry, inbound: Vec<u8>) -> (Result<()>, Vec<u8>) {
        let mut bridge = Bridge::new(registry, Cursor::new(inbound), Vec::<u8>::new());
        let result = bridge.serve();
        let (_, outbound) = bridge.into_inner();
        (result, outbound)
    }

    fn responses(outbound: Vec<u8>) -> Vec<Value> {
        let mut reader = FrameReader::new(Cursor::new(outbound));
        await_ready(&mut reader).expect("outbound should start with marker");
        let mut out = Vec::new();
        loop {
            match reader.read_frame() {
                Ok(frame) => out.push(decode(&frame.payload).expect("response should decode")),
                Err(FrameError::ChannelClosed) => return out,
                Err(err) => panic!("unexpected trailing bytes: {err}"),
            }
        }
    }

    #[test]
    fn add_returns_integer_sum() {
        let registry = registry();
        let mut wire = FrameWriter::new(Vec::<u8>::new());
        let args: Value = [("a", 2), ("b", 3)].into_iter().collect();
        request(&mut wire, "add", &args);

        let (result, outbound) = serve(&registry, wire.into_inner());
        result.expect("serve should end gracefully");

        let out = responses(outbound);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get("result"), Some(&Value::from(5)));
    }

    #[test]
    fn response_document_is_plain_json() {
        let registry = registry();
        let mut wire = FrameWriter::new(Vec::<u8>::new());
        wire.send(b"add").unwrap();
        wire.send(br#"{"a": 2, "b": 3}"#).unwrap();

        let (result, outbound) = serve(&registry, wire.into_inner());
        result.unwrap();
        assert_eq!(&outbound[..5], b"ready");
        assert_eq!(&outbound[5..9], &[0, 0, 0, 12]);
        assert_eq!(&outbound[9..], br#"{"result":5}"#);
    }

    #[test]
    fn matrix_survives_bit_exact() {
        let registry = registry();
        let matrix = arr_2d();
        let mut wire = FrameWriter::new(Vec::<u8>::new());
        request(&mut wire, "identity", &Value::from(matrix.clone()));

        let (result, outbound) = serve(&registry, wire.into_inner());
        result.unwrap();

        let out = responses(outbound);
        let echoed: &TypedArray = out[0].as_array().expect("identity should echo an array");
        assert!(echoed.bit_eq(&matrix));
        assert_eq!(echoed.shape(), &[2, 2]);
        assert_eq!(echoed.to_f64_vec(), vec![1.2, 3.2, 99.1, -14.1]);
    }

    #[test]
    fn several_requests_in_order() {
        let registry = registry();
        let mut wire = FrameWriter::new(Vec::<u8>::new());
        for (a, b) in [(1, 1), (10, -4), (0, 0)] {
            let args: Value = [("a", a), ("b", b)].into_iter().collect();
            request(&mut wire, "add", &args);
        }

        let mut bridge = Bridge::new(&registry, Cursor::new(wire.into_inner()), Vec::<u8>::new());
        bridge.serve().unwrap();
        assert_eq!(bridge.served(), 3);
        assert_eq!(bridge.state(), State::AwaitingName);

        let sums: Vec<_> = responses(bridge.into_inner().1)
            .iter()
            .map(|v| v.get("result").and_then(Value::as_i64))
            .collect();
        assert_eq!(sums, vec![Some(2), Some(6), Some(0)]);
    }

    #[test]
    fn empty_inbound_is_graceful() {
        let (result, outbound) = serve(&registry(), Vec::new());
        result.unwrap();
        assert_eq!(outbound, b"ready");
    }

    #[test]
    fn unknown_function_writes_nothing() {
        let registry = registry();
        let mut wire = FrameWriter::new(Vec::<u8>::new());
        request(&mut wire, "does_not_exist", &Value::Null);

        let (result, outbound) = serve(&registry, wire.into_inner());
        match result.unwrap_err() {
            DispatchError::UnknownFunction(name) => assert_eq!(name, "does_not_exist"),
            other => panic!("expected unknown function, got {other:?}"),
        }
        assert_eq!(outbound, b"ready");
    }

    #[test]
    fn handler_failure_ends_loop() {
        let registry = registry();
        let mut wire = FrameWriter::new(Vec::<u8>::new());
        request(&mut wire, "fail", &Value::Null);
        request(&mut wire, "add", &[("a", 1), ("b", 2)].into_iter().collect());

        let mut bridge = Bridge::new(&registry, Cursor::new(wire.into_inner()), Vec::<u8>::new());
        let err = bridge.serve().unwrap_err();
        assert!(matches!(err, DispatchError::Handler { ref function, .. } if function == "fail"));
        assert_eq!(bridge.served(), 0);
        assert_eq!(bridge.into_inner().1, b"ready");
    }

    #[test]
    fn unencodable_result_writes_nothing() {
        let registry = registry();
        let mut wire = FrameWriter::new(Vec::<u8>::new());
        request(&mut wire, "nan", &Value::Null);

        let (result, outbound) = serve(&registry, wire.into_inner());
        assert!(matches!(
            result.unwrap_err(),
            DispatchError::Codec(pipebridge_codec::CodecError::UnencodableType(_))
        ));
        assert_eq!(outbound, b"ready");
    }

    #[test]
    fn close_after_name_is_an_error() {
        let registry = registry();
        let mut wire = FrameWriter::new(Vec::<u8>::new());
        wire.send(b"add").unwrap();

        let mut bridge = Bridge::new(&registry, Cursor::new(wire.into_inner()), Vec::<u8>::new());
        let err = bridge.serve().unwrap_err();
        assert!(err.is_channel_closed());
        assert_eq!(bridge.state(), State::AwaitingArgs);
    }

    #[test]
    fn truncated_args_frame_is_short_read() {
        let registry = registry();
        let mut wire = FrameWriter::new(Vec::<u8>::new());
        wire.send(b"add").unwrap();
        let mut inbound = wire.into_inner();
        inbound.extend_from_slice(&[0, 0, 0, 10, b'{', b'"', b'a']);

        let (result, outbound) = serve(&registry, inbound);
        assert!(matches!(
            result.unwrap_err(),
            DispatchError::Frame(FrameError::ShortRead { .. })
        ));
        assert_eq!(outbound, b"ready");
    }

    #[test]
    fn non_utf8_name_rejected() {
        let registry = registry();
        let mut wire = FrameWriter::new(Vec::<u8>::new());
        wire.send(&[0xff, 0xfe]).unwrap();

        let (result, _) = serve(&registry, wire.into_inner());
        assert!(matches!(
            result.unwrap_err(),
            DispatchError::InvalidFunctionName(_)
        ));
    }

    #[test]
    fn malformed_args_rejected() {
        let registry = registry();
        let mut wire = FrameWriter::new(Vec::<u8>::new());
        wire.send(b"identity").unwrap();
        wire.send(b"not json").unwrap();

        let (result, outbound) = serve(&registry, wire.into_inner());
        assert!(matches!(result.unwrap_err(), DispatchError::Codec(_)));
        assert_eq!(outbound, b"ready");
    }

    #[test]
    fn oversized_frame_rejected_by_config() {
        let registry = registry();
        let mut wire = FrameWriter::new(Vec::<u8>::new());
        request(&mut wire, "identity", &Value::from("a fairly long argument string"));

        let config = FrameConfig {
            max_payload_size: 16,
        };
        let mut bridge =
            Bridge::with_config(&registry, Cursor::new(wire.into_inner()), Vec::<u8>::new(), config);
        assert!(matches!(
            bridge.serve().unwrap_err(),
            DispatchError::Frame(FrameError::PayloadTooLarge { .. })
        ));
    }
}
