//! Filesystem primitives backed by the host kernel

mod fsops_trait;

use log::warn;

use crate::sys::{c_string, last_errno};

// Re-export the primitive boundary
pub use self::fsops_trait::{FsOps, SysResult};

/// Permissions for a file created by a write whose flags include `O_CREAT`
pub const WRITE_CREATE_MODE: u32 = 0o644;

/// Convert a path argument or bail out of the primitive with EINVAL
macro_rules! c_arg {
    ($s:expr) => {
        match c_string($s) {
            Ok(c) => c,
            Err(errno) => return SysResult::err(errno),
        }
    };
}

/// Turn a libc status return into a [`SysResult`], reading errno on failure
fn status(rc: libc::c_int) -> SysResult {
    if rc < 0 {
        SysResult::err(last_errno())
    } else {
        SysResult::ok(rc as i64)
    }
}

/// [`FsOps`] implemented with direct libc calls
#[derive(Debug, Default, Clone, Copy)]
pub struct SysFs;

impl SysFs {
    /// Create a new host filesystem handle
    pub fn new() -> Self {
        Self
    }
}

impl FsOps for SysFs {
    fn create(&mut self, path: &str, flags: i32, mode: u32) -> SysResult {
        let path = c_arg!(path);
        let fd = unsafe { libc::open(path.as_ptr(), flags, mode as libc::c_uint) };
        if fd < 0 {
            return SysResult::err(last_errno());
        }
        unsafe { libc::close(fd) };
        SysResult::ok(0)
    }

    fn write(&mut self, path: &str, flags: i32, data: &[u8], offset: u64) -> SysResult {
        let c_path = c_arg!(path);
        let Ok(offset) = libc::off_t::try_from(offset) else {
            return SysResult::err(libc::EOVERFLOW);
        };
        let fd = unsafe { libc::open(c_path.as_ptr(), flags, WRITE_CREATE_MODE as libc::c_uint) };
        if fd < 0 {
            return SysResult::err(last_errno());
        }

        let result = if unsafe { libc::lseek(fd, offset, libc::SEEK_SET) } < 0 {
            SysResult::err(last_errno())
        } else {
            let written = unsafe { libc::write(fd, data.as_ptr().cast(), data.len()) };
            if written < 0 {
                SysResult::err(last_errno())
            } else {
                if (written as usize) < data.len() {
                    warn!(
                        "less data written than expected ({} < {}) to {}",
                        written,
                        data.len(),
                        path
                    );
                }
                SysResult::ok(written as i64)
            }
        };
        // errno already captured
        unsafe { libc::close(fd) };
        result
    }

    fn truncate(&mut self, path: &str, len: i64) -> SysResult {
        let path = c_arg!(path);
        status(unsafe { libc::truncate(path.as_ptr(), len as libc::off_t) })
    }

    fn unlink(&mut self, path: &str) -> SysResult {
        let path = c_arg!(path);
        status(unsafe { libc::unlink(path.as_ptr()) })
    }

    fn symlink(&mut self, target: &str, linkpath: &str) -> SysResult {
        let target = c_arg!(target);
        let linkpath = c_arg!(linkpath);
        status(unsafe { libc::symlink(target.as_ptr(), linkpath.as_ptr()) })
    }

    fn link(&mut self, existing: &str, new: &str) -> SysResult {
        let existing = c_arg!(existing);
        let new = c_arg!(new);
        status(unsafe { libc::link(existing.as_ptr(), new.as_ptr()) })
    }

    fn mkdir(&mut self, path: &str, mode: u32) -> SysResult {
        let path = c_arg!(path);
        status(unsafe { libc::mkdir(path.as_ptr(), mode as libc::mode_t) })
    }

    fn rmdir(&mut self, path: &str) -> SysResult {
        let path = c_arg!(path);
        status(unsafe { libc::rmdir(path.as_ptr()) })
    }

    #[cfg(target_os = "linux")]
    fn setxattr(&mut self, path: &str, name: &str, value: &[u8], flags: i32) -> SysResult {
        let path = c_arg!(path);
        let name = c_arg!(name);
        status(unsafe {
            libc::setxattr(
                path.as_ptr(),
                name.as_ptr(),
                value.as_ptr().cast(),
                value.len(),
                flags,
            )
        })
    }

    #[cfg(not(target_os = "linux"))]
    fn setxattr(&mut self, _path: &str, _name: &str, _value: &[u8], _flags: i32) -> SysResult {
        SysResult::err(libc::ENOTSUP)
    }

    #[cfg(target_os = "linux")]
    fn removexattr(&mut self, path: &str, name: &str) -> SysResult {
        let path = c_arg!(path);
        let name = c_arg!(name);
        status(unsafe { libc::removexattr(path.as_ptr(), name.as_ptr()) })
    }

    #[cfg(not(target_os = "linux"))]
    fn removexattr(&mut self, _path: &str, _name: &str) -> SysResult {
        SysResult::err(libc::ENOTSUP)
    }

    fn chown(&mut self, path: &str, uid: Option<u32>, gid: Option<u32>) -> SysResult {
        let path = c_arg!(path);
        // (uid_t)-1 / (gid_t)-1 leave the id unchanged
        let uid = uid.unwrap_or(u32::MAX) as libc::uid_t;
        let gid = gid.unwrap_or(u32::MAX) as libc::gid_t;
        status(unsafe { libc::chown(path.as_ptr(), uid, gid) })
    }

    fn chmod(&mut self, path: &str, mode: u32) -> SysResult {
        let path = c_arg!(path);
        status(unsafe { libc::chmod(path.as_ptr(), mode as libc::mode_t) })
    }
}
