//! Replay configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mount::{MountTarget, RetryPolicy};

/// Error type for configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("Failed to read config {}: {source}", .path.display())]
    Read {
        /// Config path
        path: PathBuf,
        /// OS error
        #[source]
        source: std::io::Error,
    },
    /// The config file is not valid JSON for [`ReplayConfig`]
    #[error("Failed to parse config {}: {source}", .path.display())]
    Parse {
        /// Config path
        path: PathBuf,
        /// Parser error
        #[source]
        source: serde_json::Error,
    },
    /// A setting is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Everything a replay run needs to know about its environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Backing device of the target filesystem
    pub device: PathBuf,
    /// Where the target filesystem is mounted
    pub mount_point: PathBuf,
    /// Filesystem type passed to mount(2)
    pub fs_type: String,
    /// Filesystem-specific mount data
    pub mount_data: String,
    /// Operation log to replay
    pub sequence_log: PathBuf,
    /// Number of filesystem instances replaying the same log in lockstep
    pub instances: u32,
    /// Prepended verbatim to every path in the log
    pub path_prefix: String,
    /// Unmount busy-retry budget
    pub retry: RetryPolicy,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/ram0"),
            mount_point: PathBuf::from("/mnt/test-jfs-i1-s0"),
            fs_type: "jfs".to_string(),
            mount_data: String::new(),
            sequence_log: PathBuf::from("jfs_op_sequence.log"),
            instances: 1,
            path_prefix: String::new(),
            retry: RetryPolicy::default(),
        }
    }
}

impl ReplayConfig {
    /// Load a JSON config file; missing keys take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reject settings the replayer cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instances == 0 {
            return Err(ConfigError::Invalid("instance count must be at least 1".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("unmount retry budget must be at least 1".into()));
        }
        if self.fs_type.is_empty() {
            return Err(ConfigError::Invalid("filesystem type is empty".into()));
        }
        Ok(())
    }

    /// The mount target described by this config
    pub fn mount_target(&self) -> MountTarget {
        MountTarget {
            device: self.device.clone(),
            mount_point: self.mount_point.clone(),
            fs_type: self.fs_type.clone(),
            data: self.mount_data.clone(),
        }
    }
}
