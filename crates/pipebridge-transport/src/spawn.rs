use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::process::CommandExt;
use std::process::{Child, Command};

use tracing::info;

use crate::channel::{ByteChannel, ChannelConfig};
use crate::error::{Result, TransportError};

/// A running bridge process plus the supervisor ends of its channels.
#[derive(Debug)]
pub struct ChildBridge {
    child: Child,
    reader: ByteChannel,
    writer: ByteChannel,
}

impl ChildBridge {
    /// OS process id of the bridge.
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Supervisor end of the bridge's outbound channel.
    pub fn reader(&mut self) -> &mut ByteChannel {
        &mut self.reader
    }

    /// Supervisor end of the bridge's inbound channel.
    pub fn writer(&mut self) -> &mut ByteChannel {
        &mut self.writer
    }

    /// Mutably borrow the child process handle.
    pub fn child_mut(&mut self) -> &mut Child {
        &mut self.child
    }

    /// Split into `(child, reader, writer)`.
    ///
    /// Dropping `writer` closes the bridge's inbound channel, which is how a
    /// supervisor asks the bridge to stop.
    pub fn into_parts(self) -> (Child, ByteChannel, ByteChannel) {
        (self.child, self.reader, self.writer)
    }
}

/// Spawn `command` with two fresh pipes installed on the configured descriptors.
///
/// The child sees its inbound channel on `config.inbound_fd` and its outbound
/// channel on `config.outbound_fd`. Stdio is left as configured on `command`;
/// supervisors that print to their own stdout should pipe the child's.
pub fn spawn_with_channels(mut command: Command, config: &ChannelConfig) -> Result<ChildBridge> {
    config.validate()?;

    // supervisor -> bridge
    let (child_inbound, supervisor_writer) = pipe()?;
    // bridge -> supervisor
    let (supervisor_reader, child_outbound) = pipe()?;

    let staged_inbound = child_inbound.as_raw_fd();
    let staged_outbound = child_outbound.as_raw_fd();
    let inbound_target = config.inbound_fd;
    let outbound_target = config.outbound_fd;
    let floor = inbound_target.max(outbound_target) + 1;

    // SAFETY: the hook runs between fork and exec and only calls fcntl/dup2,
    // both async-signal-safe. The staged descriptors stay open in the parent
    // until `spawn` returns.
    unsafe {
        command.pre_exec(move || {
            // Move both ends above the targets first so neither dup2 can
            // clobber the other source descriptor.
            let high_inbound = check(libc::fcntl(staged_inbound, libc::F_DUPFD_CLOEXEC, floor))?;
            let high_outbound =
                check(libc::fcntl(staged_outbound, libc::F_DUPFD_CLOEXEC, floor))?;
            check(libc::dup2(high_inbound, inbound_target))?;
            check(libc::dup2(high_outbound, outbound_target))?;
            Ok(())
        });
    }

    let child = command.spawn().map_err(TransportError::Spawn)?;

    // The child holds its own copies now; ours must go so EOF can propagate.
    drop(child_inbound);
    drop(child_outbound);

    info!(
        pid = child.id(),
        inbound_fd = inbound_target,
        outbound_fd = outbound_target,
        "spawned bridge process"
    );

    Ok(ChildBridge {
        child,
        reader: ByteChannel::from_owned_fd(supervisor_reader),
        writer: ByteChannel::from_owned_fd(supervisor_writer),
    })
}

fn check(rc: libc::c_int) -> std::io::Result<libc::c_int> {
    if rc == -1 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(rc)
    }
}

/// Create a close-on-exec pipe, returned as `(read_end, write_end)`.
pub(crate) fn pipe() -> Result<(OwnedFd, OwnedFd)> {
    let mut fds: [RawFd; 2] = [-1, -1];

    #[cfg(target_os = "linux")]
    {
        // SAFETY: `fds` is a writable buffer of two descriptors.
        check(unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) })?;
    }

    #[cfg(not(target_os = "linux"))]
    {
        // SAFETY: `fds` is a writable buffer of two descriptors.
        check(unsafe { libc::pipe(fds.as_mut_ptr()) })?;
        for fd in fds {
            // SAFETY: `fd` was just returned by pipe() and is open.
            check(unsafe { libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC) })?;
        }
    }

    // SAFETY: pipe() returned two fresh descriptors nothing else owns.
    let ends = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
    Ok(ends)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn pipe_ends_are_connected() {
        let (read_end, write_end) = pipe().unwrap();
        let mut reader = ByteChannel::from_owned_fd(read_end);
        let mut writer = ByteChannel::from_owned_fd(write_end);

        writer.write_all(b"abc").unwrap();
        drop(writer);

        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"abc");
    }

    #[test]
    fn pipe_is_close_on_exec() {
        let (read_end, _write_end) = pipe().unwrap();
        // SAFETY: F_GETFD only reads descriptor flags.
        let flags = unsafe { libc::fcntl(read_end.as_raw_fd(), libc::F_GETFD) };
        assert!(flags & libc::FD_CLOEXEC != 0);
    }

    #[test]
    fn spawn_rejects_conflicting_config() {
        let config = ChannelConfig {
            inbound_fd: 7,
            outbound_fd: 7,
        };
        let result = spawn_with_channels(Command::new("true"), &config);
        assert!(matches!(result, Err(TransportError::DescriptorConflict(7))));
    }

    #[test]
    fn spawn_reports_missing_program() {
        let result = spawn_with_channels(
            Command::new("/nonexistent/pipebridge-test-binary"),
            &ChannelConfig::default(),
        );
        assert!(matches!(result, Err(TransportError::Spawn(_))));
    }

    #[test]
    fn child_sees_channels_on_configured_descriptors() {
        // The child echoes its inbound channel to its outbound channel.
        let mut command = Command::new("sh");
        command.arg("-c").arg("cat <&3 >&4");

        let bridge = spawn_with_channels(command, &ChannelConfig::default()).unwrap();
        let (mut child, mut reader, mut writer) = bridge.into_parts();

        writer.write_all(b"through the pipes").unwrap();
        drop(writer);

        let mut echoed = Vec::new();
        reader.read_to_end(&mut echoed).unwrap();
        assert_eq!(echoed, b"through the pipes");
        assert!(child.wait().unwrap().success());
    }

    #[test]
    fn child_sees_channels_on_custom_descriptors() {
        let mut command = Command::new("sh");
        command.arg("-c").arg("cat <&7 >&6");

        let config = ChannelConfig {
            inbound_fd: 7,
            outbound_fd: 6,
        };
        let mut bridge = spawn_with_channels(command, &config).unwrap();
        assert!(bridge.id() > 0);

        bridge.writer().write_all(b"custom").unwrap();
        let (mut child, mut reader, writer) = bridge.into_parts();
        drop(writer);

        let mut echoed = Vec::new();
        reader.read_to_end(&mut echoed).unwrap();
        assert_eq!(echoed, b"custom");
        assert!(child.wait().unwrap().success());
    }
}
