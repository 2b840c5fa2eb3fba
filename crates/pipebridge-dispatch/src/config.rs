use pipebridge_frame::FrameConfig;
use pipebridge_transport::ChannelConfig;

/// Settings for a bridge started with [`run_with_config`](crate::run_with_config).
#[derive(Debug, Clone, Default)]
pub struct BridgeConfig {
    /// Descriptors carrying the inbound and outbound channels.
    pub channels: ChannelConfig,
    /// Frame limits applied to both directions.
    pub frame: FrameConfig,
}
