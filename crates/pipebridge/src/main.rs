mod cmd;
mod exit;
mod handlers;
mod logging;
mod output;

use std::os::fd::RawFd;

use clap::Parser;
use pipebridge_transport::{ChannelConfig, DEFAULT_INBOUND_FD, DEFAULT_OUTBOUND_FD};

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "pipebridge", version, about = "Serve and call functions over framed pipes")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    /// Descriptor the bridge reads requests from.
    #[arg(
        long,
        value_name = "FD",
        env = "PIPEBRIDGE_INBOUND_FD",
        default_value_t = DEFAULT_INBOUND_FD,
        global = true
    )]
    inbound_fd: RawFd,

    /// Descriptor the bridge writes responses to.
    #[arg(
        long,
        value_name = "FD",
        env = "PIPEBRIDGE_OUTBOUND_FD",
        default_value_t = DEFAULT_OUTBOUND_FD,
        global = true
    )]
    outbound_fd: RawFd,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn channels(&self) -> ChannelConfig {
        ChannelConfig {
            inbound_fd: self.inbound_fd,
            outbound_fd: self.outbound_fd,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let channels = cli.channels();
    let result = cmd::run(cli.command, format, channels);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}
