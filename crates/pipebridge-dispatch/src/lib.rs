//! Request dispatch for pipebridge.
//!
//! A bridge reads a function name and a JSON argument document from its
//! inbound channel, runs the handler registered under that name, and writes
//! the JSON result to its outbound channel. Requests are served strictly one
//! at a time. Closing the inbound channel between requests stops the loop.
//!
//! The supervisor side starts bridge programs as child processes:
//! [`Caller`] speaks the protocol over a pair of channels, [`Worker`] keeps
//! one child alive across calls and [`BridgePool`] spreads calls over several.
//!
//! ```no_run
//! use pipebridge_codec::Value;
//! use pipebridge_dispatch::HandlerRegistry;
//!
//! let registry = HandlerRegistry::builder()
//!     .register("identity", Ok)
//!     .register("answer", |_args: Value| Ok(Value::from(42)))
//!     .build();
//!
//! pipebridge_dispatch::run(&registry)?;
//! # Ok::<(), pipebridge_dispatch::DispatchError>(())
//! ```

pub mod bridge;
#[cfg(unix)]
pub mod caller;
#[cfg(unix)]
pub mod config;
pub mod error;
#[cfg(unix)]
pub mod pool;
pub mod registry;
#[cfg(unix)]
pub mod worker;

pub use bridge::{Bridge, State};
#[cfg(unix)]
pub use bridge::{run, run_with_config};
#[cfg(unix)]
pub use caller::{Caller, CallerConfig, DEFAULT_CALL_TIMEOUT};
#[cfg(unix)]
pub use config::BridgeConfig;
pub use error::{DispatchError, Result};
#[cfg(unix)]
pub use pool::BridgePool;
pub use registry::{HandlerError, HandlerRegistry, HandlerRegistryBuilder, HandlerResult};
#[cfg(unix)]
pub use worker::{CommandFactory, Worker, WorkerConfig};
