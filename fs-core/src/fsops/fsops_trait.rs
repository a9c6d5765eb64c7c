//! Filesystem primitive boundary
//!
//! The replayer's only contract with the operating environment. Every call
//! returns the primitive's raw return value together with the errno captured
//! right after the call, so nothing in between can clobber it.

use std::fmt;

use crate::sys::errno_description;

/// Raw outcome of one filesystem primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SysResult {
    /// Return value (`-1` on failure, byte count for writes, `0` otherwise)
    pub ret: i64,
    /// errno captured immediately after the call; 0 on success
    pub errno: i32,
}

impl SysResult {
    /// A successful call returning `ret`
    pub fn ok(ret: i64) -> Self {
        Self { ret, errno: 0 }
    }

    /// A failed call with the given errno
    pub fn err(errno: i32) -> Self {
        Self { ret: -1, errno }
    }

    /// Whether the primitive reported failure
    pub fn is_err(&self) -> bool {
        self.ret < 0
    }
}

impl fmt::Display for SysResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ret={}, errno={}", self.ret, errno_description(self.errno))
    }
}

/// POSIX-like filesystem primitives used by the dispatch table and bootstrap
pub trait FsOps {
    /// `open(path, flags, mode)` followed by `close`
    fn create(&mut self, path: &str, flags: i32, mode: u32) -> SysResult;

    /// `open(path, flags)`, `lseek(offset)`, `write(data)`, `close`
    fn write(&mut self, path: &str, flags: i32, data: &[u8], offset: u64) -> SysResult;

    /// `truncate(path, len)`
    fn truncate(&mut self, path: &str, len: i64) -> SysResult;

    /// `unlink(path)`
    fn unlink(&mut self, path: &str) -> SysResult;

    /// `symlink(target, linkpath)`
    fn symlink(&mut self, target: &str, linkpath: &str) -> SysResult;

    /// `link(existing, new)`
    fn link(&mut self, existing: &str, new: &str) -> SysResult;

    /// `mkdir(path, mode)`
    fn mkdir(&mut self, path: &str, mode: u32) -> SysResult;

    /// `rmdir(path)`
    fn rmdir(&mut self, path: &str) -> SysResult;

    /// `setxattr(path, name, value, flags)`
    fn setxattr(&mut self, path: &str, name: &str, value: &[u8], flags: i32) -> SysResult;

    /// `removexattr(path, name)`
    fn removexattr(&mut self, path: &str, name: &str) -> SysResult;

    /// `chown(path, uid, gid)`; `None` leaves that id unchanged
    fn chown(&mut self, path: &str, uid: Option<u32>, gid: Option<u32>) -> SysResult;

    /// `chmod(path, mode)`
    fn chmod(&mut self, path: &str, mode: u32) -> SysResult;
}
