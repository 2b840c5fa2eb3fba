use std::fs::File;
use std::io::{Read, Write};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::net::UnixStream;
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};

/// Descriptor the bridge reads requests from unless configured otherwise.
pub const DEFAULT_INBOUND_FD: RawFd = 3;

/// Descriptor the bridge writes responses to unless configured otherwise.
pub const DEFAULT_OUTBOUND_FD: RawFd = 4;

/// Which descriptors carry the two channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Descriptor the bridge reads from.
    pub inbound_fd: RawFd,
    /// Descriptor the bridge writes to.
    pub outbound_fd: RawFd,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            inbound_fd: DEFAULT_INBOUND_FD,
            outbound_fd: DEFAULT_OUTBOUND_FD,
        }
    }
}

impl ChannelConfig {
    /// Reject negative descriptors and a shared inbound/outbound descriptor.
    pub fn validate(&self) -> Result<()> {
        for fd in [self.inbound_fd, self.outbound_fd] {
            if fd < 0 {
                return Err(TransportError::InvalidDescriptor {
                    fd,
                    source: std::io::Error::from_raw_os_error(libc::EBADF),
                });
            }
        }
        if self.inbound_fd == self.outbound_fd {
            return Err(TransportError::DescriptorConflict(self.inbound_fd));
        }
        Ok(())
    }
}

/// A one-directional byte stream: implements Read + Write.
///
/// Pipe channels wrap a descriptor inherited from the launcher. Unix stream
/// channels exist so both ends of a bridge can live in one process.
pub struct ByteChannel {
    inner: ByteChannelInner,
    read_timeout: Option<Duration>,
}

enum ByteChannelInner {
    Pipe(File),
    Unix(UnixStream),
}

impl ByteChannel {
    /// Take ownership of an already-open descriptor.
    ///
    /// The descriptor must not be owned by anything else in this process; it
    /// is closed when the channel is dropped.
    pub fn from_fd(fd: RawFd) -> Result<Self> {
        if fd < 0 {
            return Err(TransportError::InvalidDescriptor {
                fd,
                source: std::io::Error::from_raw_os_error(libc::EBADF),
            });
        }

        // SAFETY: F_GETFD only reads descriptor flags; it has no effect on `fd`.
        let rc = unsafe { libc::fcntl(fd, libc::F_GETFD) };
        if rc == -1 {
            return Err(TransportError::InvalidDescriptor {
                fd,
                source: std::io::Error::last_os_error(),
            });
        }

        // SAFETY: `fd` is open (checked above) and the launcher hands it to this
        // process exclusively, so the channel becomes its only owner.
        let file = unsafe { File::from_raw_fd(fd) };
        debug!(fd, "acquired byte channel");
        Ok(Self::from_file(file))
    }

    /// Wrap an open file (typically one end of a pipe).
    pub fn from_file(file: File) -> Self {
        Self::wrap(ByteChannelInner::Pipe(file))
    }

    fn wrap(inner: ByteChannelInner) -> Self {
        Self {
            inner,
            read_timeout: None,
        }
    }

    pub(crate) fn from_owned_fd(fd: OwnedFd) -> Self {
        Self::from_file(File::from(fd))
    }

    /// Create a connected pair of in-process channels.
    pub fn pair() -> Result<(Self, Self)> {
        let (left, right) = UnixStream::pair()?;
        Ok((Self::from(left), Self::from(right)))
    }

    /// Try to clone this channel (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        let inner = match &self.inner {
            ByteChannelInner::Pipe(file) => ByteChannelInner::Pipe(file.try_clone()?),
            ByteChannelInner::Unix(stream) => ByteChannelInner::Unix(stream.try_clone()?),
        };
        Ok(Self {
            inner,
            read_timeout: self.read_timeout,
        })
    }

    /// Bound every blocking read by `timeout`. `None` waits forever.
    ///
    /// A read that sees no data in time fails with
    /// [`ErrorKind::TimedOut`](std::io::ErrorKind::TimedOut).
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        self.read_timeout = timeout;
    }

    /// The bound applied to blocking reads.
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    /// The underlying descriptor number.
    pub fn raw_fd(&self) -> RawFd {
        match &self.inner {
            ByteChannelInner::Pipe(file) => file.as_raw_fd(),
            ByteChannelInner::Unix(stream) => stream.as_raw_fd(),
        }
    }
}

impl From<UnixStream> for ByteChannel {
    fn from(stream: UnixStream) -> Self {
        Self::wrap(ByteChannelInner::Unix(stream))
    }
}

impl From<File> for ByteChannel {
    fn from(file: File) -> Self {
        Self::from_file(file)
    }
}

impl AsRawFd for ByteChannel {
    fn as_raw_fd(&self) -> RawFd {
        self.raw_fd()
    }
}

/// Streams whose blocking reads can be given an upper bound.
pub trait ReadTimeout {
    fn set_read_timeout(&mut self, timeout: Option<Duration>);
}

impl ReadTimeout for ByteChannel {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        ByteChannel::set_read_timeout(self, timeout);
    }
}

/// Wait until `fd` is readable (data, EOF or error) or `timeout` passes.
fn wait_readable(fd: RawFd, timeout: Duration) -> std::io::Result<()> {
    let millis = libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX);
    let mut pollfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    // SAFETY: `pollfd` is a valid, exclusively borrowed array of one entry.
    match unsafe { libc::poll(&mut pollfd, 1, millis) } {
        -1 => Err(std::io::Error::last_os_error()),
        0 => Err(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("no data within {timeout:?}"),
        )),
        _ => Ok(()),
    }
}

impl Read for ByteChannel {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if let Some(timeout) = self.read_timeout {
            wait_readable(self.raw_fd(), timeout)?;
        }
        match &mut self.inner {
            ByteChannelInner::Pipe(file) => file.read(buf),
            ByteChannelInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for ByteChannel {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            ByteChannelInner::Pipe(file) => file.write(buf),
            ByteChannelInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            ByteChannelInner::Pipe(file) => file.flush(),
            ByteChannelInner::Unix(stream) => stream.flush(),
        }
    }
}

impl std::fmt::Debug for ByteChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.inner {
            ByteChannelInner::Pipe(_) => "pipe",
            ByteChannelInner::Unix(_) => "unix",
        };
        f.debug_struct("ByteChannel")
            .field("type", &kind)
            .field("fd", &self.raw_fd())
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}

/// The bridge's two channels.
#[derive(Debug)]
pub struct ChannelPair {
    /// Requests arrive here.
    pub inbound: ByteChannel,
    /// The readiness marker and responses leave here.
    pub outbound: ByteChannel,
}

impl ChannelPair {
    /// Acquire both channels from the configured descriptors.
    pub fn open(config: &ChannelConfig) -> Result<Self> {
        config.validate()?;
        let inbound = ByteChannel::from_fd(config.inbound_fd)?;
        let outbound = ByteChannel::from_fd(config.outbound_fd)?;
        debug!(
            inbound_fd = config.inbound_fd,
            outbound_fd = config.outbound_fd,
            "opened channel pair"
        );
        Ok(Self { inbound, outbound })
    }

    /// Split into `(inbound, outbound)`.
    pub fn into_parts(self) -> (ByteChannel, ByteChannel) {
        (self.inbound, self.outbound)
    }
}
