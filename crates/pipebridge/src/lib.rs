//! Serve named functions to a supervising process over two pipes.
//!
//! A supervisor starts a bridge process with two extra descriptors open
//! (fd 3 for requests, fd 4 for responses). The bridge announces `ready`,
//! then answers `name` + JSON-argument requests with JSON results until the
//! request pipe closes. Numeric arrays travel losslessly inside the JSON.
//!
//! # Crate Structure
//!
//! - [`transport`]: byte channels over pre-opened descriptors, child spawning
//! - [`frame`]: length-prefixed framing and the readiness marker
//! - [`codec`]: structured values, typed arrays and their JSON encoding
//! - [`dispatch`]: handler registry, bridge loop, and the supervisor side
//!   (caller, restarting worker, round-robin pool)
//!
//! ```no_run
//! use pipebridge::{HandlerRegistry, Value};
//!
//! let registry = HandlerRegistry::builder()
//!     .register("double", |args: Value| {
//!         let x = args.as_f64().ok_or("expected a number")?;
//!         Ok(Value::from(x * 2.0))
//!     })
//!     .build();
//!
//! pipebridge::run(&registry)?;
//! # Ok::<(), pipebridge::dispatch::DispatchError>(())
//! ```

/// Re-export transport types.
pub mod transport {
    pub use pipebridge_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use pipebridge_frame::*;
}

/// Re-export codec types.
pub mod codec {
    pub use pipebridge_codec::*;
}

/// Re-export dispatch types.
pub mod dispatch {
    pub use pipebridge_dispatch::*;
}

pub use pipebridge_codec::{TypedArray, Value};
#[cfg(unix)]
pub use pipebridge_dispatch::{
    run, run_with_config, BridgeConfig, BridgePool, Caller, CallerConfig, Worker, WorkerConfig,
};
pub use pipebridge_dispatch::{HandlerRegistry, HandlerResult};
