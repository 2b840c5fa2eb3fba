use pipebridge_dispatch::{run_with_config, BridgeConfig};
use pipebridge_frame::{FrameConfig, DEFAULT_MAX_PAYLOAD};
use pipebridge_transport::ChannelConfig;
use tracing::info;

use crate::cmd::ServeArgs;
use crate::exit::{dispatch_error, CliResult, SUCCESS};
use crate::handlers;

pub fn run(args: ServeArgs, channels: ChannelConfig) -> CliResult<i32> {
    let registry = handlers::registry();
    let config = BridgeConfig {
        channels,
        frame: FrameConfig {
            max_payload_size: args.max_payload.unwrap_or(DEFAULT_MAX_PAYLOAD),
        },
    };

    info!(
        inbound_fd = channels.inbound_fd,
        outbound_fd = channels.outbound_fd,
        functions = registry.len(),
        "starting bridge"
    );
    run_with_config(&registry, &config).map_err(|err| dispatch_error("bridge failed", err))?;
    Ok(SUCCESS)
}
