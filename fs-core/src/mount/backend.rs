//! Mount backends
//!
//! The controller talks to the kernel through [`MountBackend`], which also
//! owns the blocking sleep used between busy retries.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What to mount and where
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountTarget {
    /// Backing block device
    pub device: PathBuf,
    /// Directory the filesystem is mounted on
    pub mount_point: PathBuf,
    /// Filesystem type passed to mount(2)
    pub fs_type: String,
    /// Filesystem-specific mount data
    pub data: String,
}

/// Trait for mount/unmount primitives
pub trait MountBackend {
    /// Mount `target` with no-atime semantics
    fn mount(&mut self, target: &MountTarget) -> io::Result<()>;

    /// Unmount whatever is mounted at the target's mount point
    fn unmount(&mut self, target: &MountTarget) -> io::Result<()>;

    /// Block the whole process between unmount attempts
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// mount(2)/umount2(2) on the host
#[derive(Debug, Default, Clone, Copy)]
pub struct SysMount;

#[cfg(target_os = "linux")]
impl MountBackend for SysMount {
    fn mount(&mut self, target: &MountTarget) -> io::Result<()> {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let to_c = |bytes: &[u8]| {
            CString::new(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
        };
        let device = to_c(target.device.as_os_str().as_bytes())?;
        let mount_point = to_c(target.mount_point.as_os_str().as_bytes())?;
        let fs_type = to_c(target.fs_type.as_bytes())?;
        let data = to_c(target.data.as_bytes())?;

        let rc = unsafe {
            libc::mount(
                device.as_ptr(),
                mount_point.as_ptr(),
                fs_type.as_ptr(),
                libc::MS_NOATIME,
                data.as_ptr().cast(),
            )
        };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn unmount(&mut self, target: &MountTarget) -> io::Result<()> {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let mount_point = CString::new(target.mount_point.as_os_str().as_bytes())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        if unsafe { libc::umount2(mount_point.as_ptr(), 0) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

#[cfg(not(target_os = "linux"))]
impl MountBackend for SysMount {
    fn mount(&mut self, _target: &MountTarget) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "mount(2) replay is only supported on Linux",
        ))
    }

    fn unmount(&mut self, _target: &MountTarget) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "umount2(2) replay is only supported on Linux",
        ))
    }
}

/// Backend that never touches the kernel.
///
/// Used to replay against an already-present directory tree.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMount;

impl MountBackend for NullMount {
    fn mount(&mut self, _target: &MountTarget) -> io::Result<()> {
        Ok(())
    }

    fn unmount(&mut self, _target: &MountTarget) -> io::Result<()> {
        Ok(())
    }
}
