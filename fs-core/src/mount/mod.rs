//! Mount-lifecycle controller
//!
//! Every replayed record runs inside exactly one mount session:
//! `unmounted -> mounted -> unmounted`. Mount failure is always reported
//! as an error. Unmount retries "device busy" with exponential backoff
//! (100ms, 200ms, 400ms, ...) for a fixed number of attempts; any other
//! error ends the attempt immediately.

mod backend;

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use self::backend::{MountBackend, MountTarget, NullMount, SysMount};

/// Default number of unmount attempts
pub const DEFAULT_UNMOUNT_ATTEMPTS: u32 = 19;

/// Default wait after the first busy unmount
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(100);

/// Error type for mount lifecycle operations
#[derive(Error, Debug)]
pub enum MountError {
    /// mount(2) failed
    #[error("Could not mount file system {fs_type} in {} at {} ({source})", .device.display(), .mount_point.display())]
    Mount {
        /// Filesystem type
        fs_type: String,
        /// Backing device
        device: PathBuf,
        /// Mount point
        mount_point: PathBuf,
        /// OS error
        #[source]
        source: io::Error,
    },
    /// umount2(2) failed with something other than "busy"
    #[error("Could not unmount file system {fs_type} at {} ({source})", .mount_point.display())]
    Unmount {
        /// Filesystem type
        fs_type: String,
        /// Mount point
        mount_point: PathBuf,
        /// OS error
        #[source]
        source: io::Error,
    },
    /// The device stayed busy for every attempt
    #[error("Failed to unmount file system {fs_type} at {} after {attempts} retries", .mount_point.display())]
    RetriesExhausted {
        /// Filesystem type
        fs_type: String,
        /// Mount point
        mount_point: PathBuf,
        /// Number of umount calls issued
        attempts: u32,
    },
    /// A session is already open
    #[error("A file system is already mounted at {}", .0.display())]
    AlreadyMounted(PathBuf),
    /// The last unmount failed, so the target may still be mounted
    #[error("Previous unmount of {} did not complete", .0.display())]
    UnmountIncomplete(PathBuf),
}

/// Result type for mount lifecycle operations
pub type Result<T> = std::result::Result<T, MountError>;

/// Unmount retry budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of unmount attempts
    pub max_attempts: u32,
    /// Wait after the first busy attempt; doubles after each further one
    #[serde(with = "millis")]
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_UNMOUNT_ATTEMPTS,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Wait after the `retry`-th busy attempt (0-based)
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.initial_backoff.saturating_mul(factor)
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Lifecycle state of the single mount session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountState {
    /// Nothing mounted
    Unmounted,
    /// Target filesystem mounted
    Mounted,
    /// The last unmount did not complete
    Failed,
}

/// What an unmount call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnmountReport {
    /// Number of umount calls issued
    pub attempts: u32,
    /// Total time spent sleeping between busy attempts
    pub waited: Duration,
    /// Whether the filesystem ended up unmounted
    pub unmounted: bool,
}

/// Drives mount/unmount of one target through a [`MountBackend`]
#[derive(Debug)]
pub struct MountController<B: MountBackend> {
    backend: B,
    target: MountTarget,
    policy: RetryPolicy,
    state: MountState,
}

impl<B: MountBackend> MountController<B> {
    /// Create a controller; nothing is mounted yet
    pub fn new(backend: B, target: MountTarget, policy: RetryPolicy) -> Self {
        Self {
            backend,
            target,
            policy,
            state: MountState::Unmounted,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> MountState {
        self.state
    }

    /// The mount target
    pub fn target(&self) -> &MountTarget {
        &self.target
    }

    /// Access the backend (tests inspect scripted backends through this)
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mount the target. Only one session may be mounted at a time, and a
    /// target whose last unmount failed is never mounted again.
    pub fn mount(&mut self) -> Result<()> {
        match self.state {
            MountState::Unmounted => {}
            MountState::Mounted => {
                return Err(MountError::AlreadyMounted(self.target.mount_point.clone()))
            }
            MountState::Failed => {
                return Err(MountError::UnmountIncomplete(self.target.mount_point.clone()))
            }
        }

        match self.backend.mount(&self.target) {
            Ok(()) => {
                info!(
                    "Mounted {} ({}) at {}",
                    self.target.device.display(),
                    self.target.fs_type,
                    self.target.mount_point.display()
                );
                self.state = MountState::Mounted;
                Ok(())
            }
            Err(source) => {
                let err = MountError::Mount {
                    fs_type: self.target.fs_type.clone(),
                    device: self.target.device.clone(),
                    mount_point: self.target.mount_point.clone(),
                    source,
                };
                error!("{}", err);
                Err(err)
            }
        }
    }

    /// Unmount the target, retrying while the device is busy.
    ///
    /// With `strict` set a failed unmount is returned as an error; otherwise
    /// it is logged and reported through [`UnmountReport::unmounted`].
    pub fn unmount(&mut self, strict: bool) -> Result<UnmountReport> {
        let mut report = UnmountReport {
            attempts: 0,
            waited: Duration::ZERO,
            unmounted: false,
        };
        let mut failure = None;
        let mut budget = self.policy.max_attempts;

        while budget > 0 {
            report.attempts += 1;
            match self.backend.unmount(&self.target) {
                Ok(()) => {
                    report.unmounted = true;
                    break;
                }
                Err(e) if e.raw_os_error() == Some(libc::EBUSY) => {
                    let wait = self.policy.backoff(report.attempts - 1);
                    warn!(
                        "File system {} mounted on {} is busy. Retry {} times, unmounting after {}ms.",
                        self.target.fs_type,
                        self.target.mount_point.display(),
                        report.attempts,
                        wait.as_millis()
                    );
                    self.backend.sleep(wait);
                    report.waited += wait;
                    budget -= 1;
                }
                Err(source) => {
                    failure = Some(MountError::Unmount {
                        fs_type: self.target.fs_type.clone(),
                        mount_point: self.target.mount_point.clone(),
                        source,
                    });
                    break;
                }
            }
        }

        if report.unmounted {
            info!("Unmounted {}", self.target.mount_point.display());
            self.state = MountState::Unmounted;
            return Ok(report);
        }

        let err = failure.unwrap_or_else(|| MountError::RetriesExhausted {
            fs_type: self.target.fs_type.clone(),
            mount_point: self.target.mount_point.clone(),
            attempts: report.attempts,
        });
        self.state = MountState::Failed;
        if strict {
            error!("{}", err);
            Err(err)
        } else {
            warn!("{}", err);
            Ok(report)
        }
    }
}
