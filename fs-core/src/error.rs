//! Top-level error type of the replayer

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::bootstrap::BootstrapError;
use crate::config::ConfigError;
use crate::mount::MountError;
use crate::record::ParseError;
use crate::store::StoreError;

/// Fatal replay errors. Anything that reaches this type ends the run;
/// per-operation failures are reported on the audit trail instead.
#[derive(Debug)]
pub enum Error {
    /// Reading the operation log failed
    Io(io::Error),
    /// The operation log could not be opened
    LogOpen {
        /// Log path
        path: PathBuf,
        /// OS error
        source: io::Error,
    },
    /// Writing the audit trail failed
    Audit(io::Error),
    /// Configuration error
    Config(ConfigError),
    /// Mount lifecycle error
    Mount(MountError),
    /// Pre-population error
    Bootstrap(BootstrapError),
    /// A log record could not be decoded
    Parse {
        /// Sequence number the record would have had
        seq: u64,
        /// The offending line
        line: String,
        /// What was wrong with it
        source: ParseError,
    },
    /// Allocation failure
    Store(StoreError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error reading operation log: {}", e),
            Error::LogOpen { path, source } => {
                write!(f, "Cannot open {}. Does it exist? ({})", path.display(), source)
            }
            Error::Audit(e) => write!(f, "Failed to write audit trail: {}", e),
            Error::Config(e) => write!(f, "{}", e),
            Error::Mount(e) => write!(f, "{}", e),
            Error::Bootstrap(e) => write!(f, "Pre-population failed: {}", e),
            Error::Parse { seq, line, source } => {
                write!(f, "Malformed record at seq={} ({}): {}", seq, line, source)
            }
            Error::Store(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) | Error::Audit(e) => Some(e),
            Error::LogOpen { source, .. } => Some(source),
            Error::Config(e) => Some(e),
            Error::Mount(e) => Some(e),
            Error::Bootstrap(e) => Some(e),
            Error::Parse { source, .. } => Some(source),
            Error::Store(e) => Some(e),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<MountError> for Error {
    fn from(err: MountError) -> Self {
        Error::Mount(err)
    }
}

impl From<BootstrapError> for Error {
    fn from(err: BootstrapError) -> Self {
        Error::Bootstrap(err)
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        Error::Store(err)
    }
}

/// Result type for replay operations
pub type Result<T> = std::result::Result<T, Error>;
