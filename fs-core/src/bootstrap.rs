//! Pre-population bootstrap
//!
//! Before replay starts, a fixed set of paths is created under the mount
//! point so every recorded operation finds the baseline tree it expects.
//! Existing entries count as success, which makes the bootstrap idempotent.

use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, info};
use thiserror::Error;

use crate::fsops::FsOps;
use crate::store::{RecordStore, StoreError};
use crate::sys::errno_description;

/// Paths created under the mount point before replay, in order
pub const PREPOPULATED_PATHS: &[&str] = &["/d-01", "/d-01/f-00", "/d-00/d-01", "/d-01/d-01"];

/// Mode for every directory the bootstrap creates
pub const DIR_MODE: u32 = 0o755;

/// Mode for every file the bootstrap creates
pub const FILE_MODE: u32 = 0o644;

/// Error type for bootstrap operations
#[derive(Error, Debug)]
pub enum BootstrapError {
    /// mkdir failed with something other than EEXIST
    #[error("Failed to create directory {}: {}", .path.display(), describe(.errno))]
    CreateDir {
        /// Directory being created
        path: PathBuf,
        /// errno of the failed call
        errno: i32,
    },
    /// open(O_CREAT) failed with something other than EEXIST
    #[error("Failed to create file {}: {}", .path.display(), describe(.errno))]
    CreateFile {
        /// File being created
        path: PathBuf,
        /// errno of the failed call
        errno: i32,
    },
    /// The mount point does not form a UTF-8 path
    #[error("Path is not valid UTF-8: {}", .0.display())]
    InvalidPath(PathBuf),
    /// Allocation failure
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Writing the audit trail failed
    #[error("Failed to write audit line: {0}")]
    Audit(#[from] std::io::Error),
}

fn describe(errno: &i32) -> String {
    errno_description(*errno)
}

/// Result type for bootstrap operations
pub type Result<T> = std::result::Result<T, BootstrapError>;

/// What the final segment of a bootstrap path denotes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Segment starts with `f`: a zero-length file
    File,
    /// Segment starts with `d`: a directory
    Directory,
    /// Anything else: nothing is created past the parents
    None,
}

impl NodeKind {
    /// Classify a path by its final segment
    pub fn of(path: &Path) -> Self {
        match path.file_name().and_then(|n| n.to_str()).and_then(|n| n.chars().next()) {
            Some('f') => NodeKind::File,
            Some('d') => NodeKind::Directory,
            _ => NodeKind::None,
        }
    }
}

/// Every proper ancestor of `path`, shallowest first, excluding the root.
///
/// `/mnt/a/b` yields `/mnt`, `/mnt/a`.
pub fn parent_chain(path: &Path) -> Vec<PathBuf> {
    let mut chain: Vec<PathBuf> = path
        .ancestors()
        .skip(1)
        .filter(|p| p.parent().is_some() && !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .collect();
    chain.reverse();
    chain
}

/// Join a table entry onto the mount point
pub fn absolute_path(mount_point: &Path, suffix: &str) -> PathBuf {
    mount_point.join(suffix.trim_start_matches('/'))
}

fn utf8(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| BootstrapError::InvalidPath(path.to_path_buf()))
}

/// Create `path`'s parents and, depending on its [`NodeKind`], the node itself
pub fn make_path<F: FsOps>(fs: &mut F, path: &Path) -> Result<NodeKind> {
    for dir in parent_chain(path) {
        let res = fs.mkdir(utf8(&dir)?, DIR_MODE);
        if res.is_err() && res.errno != libc::EEXIST {
            return Err(BootstrapError::CreateDir { path: dir, errno: res.errno });
        }
    }

    let kind = NodeKind::of(path);
    let leaf = utf8(path)?;
    match kind {
        NodeKind::File => {
            let res = fs.create(leaf, libc::O_CREAT | libc::O_WRONLY | libc::O_TRUNC, FILE_MODE);
            if res.is_err() && res.errno != libc::EEXIST {
                return Err(BootstrapError::CreateFile {
                    path: path.to_path_buf(),
                    errno: res.errno,
                });
            }
        }
        NodeKind::Directory => {
            let res = fs.mkdir(leaf, DIR_MODE);
            if res.is_err() && res.errno != libc::EEXIST {
                return Err(BootstrapError::CreateDir {
                    path: path.to_path_buf(),
                    errno: res.errno,
                });
            }
        }
        NodeKind::None => {}
    }
    debug!("Bootstrapped {} as {:?}", path.display(), kind);
    Ok(kind)
}

/// Create every entry of `table` under `mount_point`, writing `pre=N` and
/// `pre_path_name=PATH` lines to `audit`. Returns the number of entries.
pub fn run<F: FsOps, W: Write>(
    fs: &mut F,
    mount_point: &Path,
    table: &[&str],
    audit: &mut W,
) -> Result<usize> {
    let mut paths = RecordStore::with_capacity(table.len());
    for suffix in table {
        paths.push(absolute_path(mount_point, suffix))?;
    }

    for (pre, path) in paths.iter().enumerate() {
        writeln!(audit, "pre={} ", pre)?;
        writeln!(audit, "pre_path_name={}", path.display())?;
        audit.flush()?;
        make_path(fs, path)?;
    }
    info!("Pre-populated {} paths under {}", paths.len(), mount_point.display());
    Ok(paths.len())
}
