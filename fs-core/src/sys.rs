//! Thin helpers around raw libc calls

use std::ffi::{CStr, CString};
use std::io;

/// errno of the most recent failed libc call on this thread
pub fn last_errno() -> i32 {
    io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

/// `strerror(errno)`; errno 0 reads "Success"
pub fn errno_description(errno: i32) -> String {
    let mut buf = [0 as libc::c_char; 256];
    let rc = unsafe { libc::strerror_r(errno, buf.as_mut_ptr(), buf.len()) };
    if rc != 0 {
        return format!("Unknown error {}", errno);
    }
    unsafe { CStr::from_ptr(buf.as_ptr()) }
        .to_string_lossy()
        .into_owned()
}

/// Convert a path or name for a libc call, mapping interior NULs to EINVAL
pub fn c_string(s: &str) -> Result<CString, i32> {
    CString::new(s).map_err(|_| libc::EINVAL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_description() {
        assert_eq!(errno_description(libc::ENOENT), "No such file or directory");
        assert!(!errno_description(0).is_empty());
    }

    #[test]
    fn test_c_string_rejects_nul() {
        assert!(c_string("/d-01/f-00").is_ok());
        assert_eq!(c_string("/a\0b"), Err(libc::EINVAL));
    }
}
