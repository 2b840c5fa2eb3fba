use pipebridge_frame::{HEADER_SIZE, READY_MARKER};
use pipebridge_transport::{DEFAULT_INBOUND_FD, DEFAULT_OUTBOUND_FD};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("pipebridge {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: pipebridge");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("PIPEBRIDGE_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("frame_header: {HEADER_SIZE} bytes, big-endian length");
    println!("ready_marker: {}", String::from_utf8_lossy(READY_MARKER));
    println!("default_fds: inbound={DEFAULT_INBOUND_FD} outbound={DEFAULT_OUTBOUND_FD}");
    println!("element_types: float32, float64");

    Ok(SUCCESS)
}
