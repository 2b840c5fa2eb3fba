use clap::{Args, Subcommand};
use pipebridge_transport::ChannelConfig;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod call;
pub mod functions;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the built-in functions over the configured descriptors.
    Serve(ServeArgs),
    /// Spawn a bridge program, make one call and print the result.
    Call(CallArgs),
    /// List the built-in functions.
    Functions(FunctionsArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat, channels: ChannelConfig) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, channels),
        Command::Call(args) => call::run(args, format, channels),
        Command::Functions(args) => functions::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Largest accepted frame payload in bytes. Default: the wire maximum.
    #[arg(long, value_name = "BYTES")]
    pub max_payload: Option<usize>,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Function to invoke.
    pub function: String,
    /// Argument document (JSON; arrays as `_elementType`/`_shape`/`_data` records).
    #[arg(long, default_value = "null")]
    pub json: String,
    /// How long to wait for the readiness marker and for the result
    /// (e.g. `10s`, `500ms`). The bridge is killed when it expires.
    #[arg(long, value_name = "DURATION", default_value = "10s")]
    pub timeout: String,
    /// Bridge program and its arguments, after `--`.
    #[arg(last = true, required = true, value_name = "PROGRAM")]
    pub program: Vec<String>,
}

#[derive(Args, Debug, Default)]
pub struct FunctionsArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build and wire-format details.
    #[arg(long)]
    pub extended: bool,
}
