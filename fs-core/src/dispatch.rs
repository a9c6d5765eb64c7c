//! Operation dispatch table
//!
//! Maps each [`Operation`] to exactly one filesystem primitive. Primitive
//! failures are results, never errors: crash-consistency runs want to see
//! an `EACCES` from a write, not stop on it.

use std::fmt;

use log::debug;

use crate::fsops::{FsOps, SysResult};
use crate::payload::{self, FillPolicy};
use crate::record::Operation;
use crate::store::Result;

/// Fill policy for replayed writes
pub const WRITE_FILL_POLICY: FillPolicy = FillPolicy::UniformByte;

/// Outcome of dispatching one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// The primitive ran
    Executed(SysResult),
    /// The operation name is unknown; nothing ran
    Unrecognized(String),
}

/// One result line of the audit trail
pub struct ResultLine<'a> {
    /// The operation as dispatched
    pub op: &'a Operation,
    /// What dispatching it produced
    pub outcome: &'a Dispatched,
}

impl fmt::Display for ResultLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.outcome {
            Dispatched::Executed(res) => write!(f, "{} -> {}", self.op, res),
            Dispatched::Unrecognized(name) => write!(f, "Unrecognized op: {}", name),
        }
    }
}

/// Bytes handed to setxattr: `value` resized to exactly `size` bytes,
/// zero-padded when the recorded size exceeds the value
fn xattr_value(value: &str, size: usize) -> Vec<u8> {
    let mut buf = value.as_bytes().to_vec();
    buf.resize(size, 0);
    buf
}

/// Run `op` against `fs`. `fill_value` is the uniform byte written by
/// `write_file`, normally [`crate::session::fill_value`].
///
/// Primitive failures come back inside [`Dispatched`]; the only error is a
/// write payload too large to allocate.
pub fn dispatch<F: FsOps>(op: &Operation, fill_value: u32, fs: &mut F) -> Result<Dispatched> {
    let res = match op {
        Operation::CreateFile { path, flags, mode } => fs.create(path, *flags, *mode),
        Operation::WriteFile {
            path,
            flags,
            offset,
            len,
        } => {
            let data = payload::generate(*len, *offset, WRITE_FILL_POLICY, fill_value)?;
            debug!(
                "write payload for {}: {} bytes of {:#04x}, crc32={:08x}",
                path,
                data.len(),
                fill_value as u8,
                payload::digest(&data)
            );
            fs.write(path, *flags, &data, *offset)
        }
        Operation::Truncate { path, len } => fs.truncate(path, *len),
        Operation::Unlink { path } => fs.unlink(path),
        Operation::Symlink { target, linkpath } => fs.symlink(target, linkpath),
        Operation::Link { existing, new } => fs.link(existing, new),
        Operation::Mkdir { path, mode } => fs.mkdir(path, *mode),
        Operation::Rmdir { path } => fs.rmdir(path),
        Operation::SetXattr {
            path,
            name,
            value,
            size,
            flags,
        } => fs.setxattr(path, name, &xattr_value(value, *size), *flags),
        Operation::RemoveXattr { path, name } => fs.removexattr(path, name),
        Operation::Chown { path, uid } => fs.chown(path, Some(*uid), None),
        Operation::Chgrp { path, gid } => fs.chown(path, None, Some(*gid)),
        Operation::Chmod { path, mode } => fs.chmod(path, *mode),
        Operation::Unrecognized { name } => return Ok(Dispatched::Unrecognized(name.clone())),
    };
    Ok(Dispatched::Executed(res))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;

    /// Records every primitive call and answers with a canned result
    #[derive(Default)]
    struct RecordingFs {
        calls: Vec<String>,
        written: Vec<u8>,
        xattr: Vec<u8>,
    }

    impl FsOps for RecordingFs {
        fn create(&mut self, path: &str, flags: i32, mode: u32) -> SysResult {
            self.calls.push(format!("create {} {:o} {:o}", path, flags, mode));
            SysResult::ok(0)
        }
        fn write(&mut self, path: &str, _flags: i32, data: &[u8], offset: u64) -> SysResult {
            self.calls.push(format!("write {} {}", path, offset));
            self.written = data.to_vec();
            SysResult::ok(data.len() as i64)
        }
        fn truncate(&mut self, path: &str, len: i64) -> SysResult {
            self.calls.push(format!("truncate {} {}", path, len));
            SysResult::ok(0)
        }
        fn unlink(&mut self, path: &str) -> SysResult {
            self.calls.push(format!("unlink {}", path));
            SysResult::err(libc::ENOENT)
        }
        fn symlink(&mut self, target: &str, linkpath: &str) -> SysResult {
            self.calls.push(format!("symlink {} {}", target, linkpath));
            SysResult::ok(0)
        }
        fn link(&mut self, existing: &str, new: &str) -> SysResult {
            self.calls.push(format!("link {} {}", existing, new));
            SysResult::ok(0)
        }
        fn mkdir(&mut self, path: &str, mode: u32) -> SysResult {
            self.calls.push(format!("mkdir {} {:o}", path, mode));
            SysResult::ok(0)
        }
        fn rmdir(&mut self, path: &str) -> SysResult {
            self.calls.push(format!("rmdir {}", path));
            SysResult::ok(0)
        }
        fn setxattr(&mut self, path: &str, name: &str, value: &[u8], flags: i32) -> SysResult {
            self.calls.push(format!("setxattr {} {} {}", path, name, flags));
            self.xattr = value.to_vec();
            SysResult::ok(0)
        }
        fn removexattr(&mut self, path: &str, name: &str) -> SysResult {
            self.calls.push(format!("removexattr {} {}", path, name));
            SysResult::ok(0)
        }
        fn chown(&mut self, path: &str, uid: Option<u32>, gid: Option<u32>) -> SysResult {
            self.calls.push(format!("chown {} {:?} {:?}", path, uid, gid));
            SysResult::ok(0)
        }
        fn chmod(&mut self, path: &str, mode: u32) -> SysResult {
            self.calls.push(format!("chmod {} {:o}", path, mode));
            SysResult::ok(0)
        }
    }

    #[test]
    fn test_write_uses_fill_value() {
        let mut fs = RecordingFs::default();
        let op = Operation::WriteFile {
            path: "/d-01/f-00".into(),
            flags: 2,
            offset: 0,
            len: 4096,
        };
        let outcome = dispatch(&op, 7, &mut fs).unwrap();

        assert_eq!(outcome, Dispatched::Executed(SysResult::ok(4096)));
        assert_eq!(fs.written.len(), 4096);
        assert!(fs.written.iter().all(|&b| b == 7));

        let line = ResultLine { op: &op, outcome: &outcome }.to_string();
        assert!(line.starts_with("write_file(/d-01/f-00, 2, 0, 4096) -> ret=4096, errno="));
    }

    #[test]
    fn test_one_primitive_per_operation() {
        let mut fs = RecordingFs::default();
        let ops = [
            Operation::Chown { path: "/f".into(), uid: 10 },
            Operation::Chgrp { path: "/f".into(), gid: 20 },
            Operation::Symlink { target: "/t".into(), linkpath: "/l".into() },
        ];
        for op in &ops {
            dispatch(op, 0, &mut fs).unwrap();
        }
        assert_eq!(
            fs.calls,
            vec!["chown /f Some(10) None", "chown /f None Some(20)", "symlink /t /l"]
        );
    }

    #[test]
    fn test_failure_is_a_result() {
        let mut fs = RecordingFs::default();
        let op = Operation::Unlink { path: "/missing".into() };
        let outcome = dispatch(&op, 0, &mut fs).unwrap();
        assert_eq!(outcome, Dispatched::Executed(SysResult::err(libc::ENOENT)));

        let line = ResultLine { op: &op, outcome: &outcome }.to_string();
        assert_eq!(line, "unlink(/missing) -> ret=-1, errno=No such file or directory");
    }

    #[test]
    fn test_xattr_value_is_sized() {
        let mut fs = RecordingFs::default();
        let op = Operation::SetXattr {
            path: "/f".into(),
            name: "user.k".into(),
            value: "abc".into(),
            size: 5,
            flags: 1,
        };
        dispatch(&op, 0, &mut fs).unwrap();
        assert_eq!(fs.xattr, b"abc\0\0");

        assert_eq!(xattr_value("abcdef", 2), b"ab");
    }

    #[test]
    fn test_oversized_write_never_reaches_fs() {
        let mut fs = RecordingFs::default();
        let op = Operation::WriteFile {
            path: "/d-01/f-00".into(),
            flags: 2,
            offset: 0,
            len: usize::MAX / 2,
        };
        assert!(matches!(
            dispatch(&op, 0, &mut fs),
            Err(StoreError::OutOfMemory { .. })
        ));
        assert!(fs.calls.is_empty());
    }

    #[test]
    fn test_unrecognized() {
        let mut fs = RecordingFs::default();
        let op = Operation::Unrecognized { name: "rename".into() };
        let outcome = dispatch(&op, 0, &mut fs).unwrap();

        assert_eq!(outcome, Dispatched::Unrecognized("rename".into()));
        assert!(fs.calls.is_empty());
        assert_eq!(
            ResultLine { op: &op, outcome: &outcome }.to_string(),
            "Unrecognized op: rename"
        );
    }
}
