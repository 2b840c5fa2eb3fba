use std::fmt;
use std::io;

use pipebridge_codec::CodecError;
use pipebridge_dispatch::DispatchError;
use pipebridge_frame::FrameError;
use pipebridge_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

/// A failure that ends the process with `code`, after printing `message`.
#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn wrap(code: i32, context: &str, err: impl fmt::Display) -> Self {
        Self::new(code, format!("{context}: {err}"))
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut => TIMEOUT,
        io::ErrorKind::NotFound | io::ErrorKind::BrokenPipe => FAILURE,
        _ => INTERNAL,
    };
    CliError::wrap(code, context, err)
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    let code = match err {
        TransportError::Spawn(source) | TransportError::Io(source) => {
            return io_error(context, source)
        }
        TransportError::DescriptorConflict(_) => USAGE,
        TransportError::InvalidDescriptor { .. } => TRANSPORT_ERROR,
    };
    CliError::wrap(code, context, err)
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    let code = match err {
        FrameError::Io(source) => return io_error(context, source),
        FrameError::PayloadTooLarge { .. } => DATA_INVALID,
        FrameError::ChannelClosed => FAILURE,
        FrameError::ShortRead { .. } | FrameError::HandshakeMismatch { .. } => TRANSPORT_ERROR,
    };
    CliError::wrap(code, context, err)
}

pub fn codec_error(context: &str, err: CodecError) -> CliError {
    CliError::wrap(DATA_INVALID, context, err)
}

pub fn dispatch_error(context: &str, err: DispatchError) -> CliError {
    let code = match err {
        DispatchError::Transport(err) => return transport_error(context, err),
        DispatchError::Frame(err) => return frame_error(context, err),
        DispatchError::Codec(err) => return codec_error(context, err),
        DispatchError::InvalidFunctionName(_) => DATA_INVALID,
        DispatchError::UnknownFunction(_) => USAGE,
        DispatchError::Handler { .. } => FAILURE,
        DispatchError::Timeout(_) => TIMEOUT,
        DispatchError::EmptyPool => USAGE,
    };
    CliError::wrap(code, context, err)
}
