//! Crashreplay Core - deterministic filesystem operation replay
//!
//! This crate re-executes a recorded sequence of filesystem operations
//! against a target filesystem, one operation per mount/unmount cycle, so
//! that each step can be checked for persistence after a simulated crash.
//! It provides the log tokenizer and record parser, the dispatch table,
//! the deterministic payload generator, the mount-lifecycle controller,
//! the pre-population bootstrap and the replay driver tying them together.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rust_2018_idioms)]

pub mod bootstrap;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fsops;
pub mod mount;
pub mod payload;
pub mod record;
pub mod replay;
pub mod session;
pub mod store;
pub mod tokenizer;

mod sys;

// Re-export the error types
pub use error::{Error, Result};

pub use config::{ConfigError, ReplayConfig};
pub use dispatch::{dispatch, Dispatched, ResultLine};
pub use fsops::{FsOps, SysFs, SysResult};
pub use mount::{
    MountBackend, MountController, MountError, MountState, MountTarget, NullMount, RetryPolicy,
    SysMount, UnmountReport,
};
pub use payload::FillPolicy;
pub use record::{Operation, ParseError};
pub use replay::{ReplaySummary, Replayer};
pub use session::ReplaySession;
pub use sys::errno_description;

/// Re-export common types and traits
pub mod prelude {
    pub use crate::error::Result;
    pub use crate::fsops::FsOps;
    pub use crate::mount::MountBackend;
}
