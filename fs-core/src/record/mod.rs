//! Operation records
//!
//! One line of the operation log becomes one [`Operation`]. Each variant
//! carries its own typed arguments, extracted from fixed field positions
//! and validated up front: a record either parses completely or fails
//! with a [`ParseError`] before anything touches the filesystem.

mod numeric;

use std::fmt;

use thiserror::Error;

use crate::store::RecordStore;

pub use self::numeric::{parse_as, parse_i64, Radix};

/// Error type for record parsing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The line has no fields
    #[error("Empty record")]
    Empty,
    /// The line is not valid UTF-8
    #[error("Record is not valid UTF-8")]
    NotUtf8,
    /// The operation needs more fields than the record has
    #[error("{op}: missing field {index} ({field})")]
    MissingField {
        /// Operation name
        op: String,
        /// Position of the missing field
        index: usize,
        /// What the field holds
        field: &'static str,
    },
    /// A numeric field has characters outside its base
    #[error("{op}: invalid {field} '{value}' for base {radix}")]
    InvalidNumber {
        /// Operation name
        op: String,
        /// What the field holds
        field: &'static str,
        /// Field text
        value: String,
        /// Base the field is read in
        radix: u32,
    },
    /// A numeric field does not fit its type
    #[error("{op}: {field} '{value}' is out of range")]
    Overflow {
        /// Operation name
        op: String,
        /// What the field holds
        field: &'static str,
        /// Field text
        value: String,
    },
}

/// A replayable filesystem operation.
///
/// Variant fields are named after the log columns shown on each variant.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// `create_file, path, flags, mode`
    CreateFile { path: String, flags: i32, mode: u32 },
    /// `write_file, path, flags, offset, length`
    WriteFile {
        path: String,
        flags: i32,
        offset: u64,
        len: usize,
    },
    /// `truncate, path, length`
    Truncate { path: String, len: i64 },
    /// `unlink, path`
    Unlink { path: String },
    /// `symlink, target, linkpath`
    Symlink { target: String, linkpath: String },
    /// `link, existing, new`
    Link { existing: String, new: String },
    /// `mkdir, path, mode`
    Mkdir { path: String, mode: u32 },
    /// `rmdir, path`
    Rmdir { path: String },
    /// `setxattr, path, name, value, size, flags`
    SetXattr {
        path: String,
        name: String,
        value: String,
        size: usize,
        flags: i32,
    },
    /// `removexattr, path, name`
    RemoveXattr { path: String, name: String },
    /// `chown_file, path, uid`
    Chown { path: String, uid: u32 },
    /// `chgrp_file, path, gid`
    Chgrp { path: String, gid: u32 },
    /// `chmod, path, mode`
    Chmod { path: String, mode: u32 },
    /// Any operation name this replayer does not know
    Unrecognized { name: String },
}

/// Positional view over one tokenized record
struct Fields<'a> {
    op: &'a str,
    fields: &'a RecordStore<String>,
}

impl<'a> Fields<'a> {
    fn text(&self, index: usize, field: &'static str) -> Result<&'a str, ParseError> {
        self.fields
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| ParseError::MissingField {
                op: self.op.to_string(),
                index,
                field,
            })
    }

    fn owned(&self, index: usize, field: &'static str) -> Result<String, ParseError> {
        self.text(index, field).map(str::to_owned)
    }

    fn number<T: TryFrom<i64>>(
        &self,
        index: usize,
        field: &'static str,
        radix: Radix,
    ) -> Result<T, ParseError> {
        parse_as(self.op, field, self.text(index, field)?, radix)
    }
}

impl Operation {
    /// Build an operation from the tokenized fields of one log line.
    ///
    /// Field 0 names the operation. Fields past the last one an operation
    /// uses are ignored.
    pub fn parse(fields: &RecordStore<String>) -> Result<Self, ParseError> {
        let op = fields.get(0).ok_or(ParseError::Empty)?;
        let f = Fields {
            op: op.as_str(),
            fields,
        };

        let operation = match op.as_str() {
            "create_file" => Operation::CreateFile {
                path: f.owned(1, "path")?,
                flags: f.number(2, "flags", Radix::Octal)?,
                mode: f.number(3, "mode", Radix::Octal)?,
            },
            "write_file" => Operation::WriteFile {
                path: f.owned(1, "path")?,
                flags: f.number(2, "flags", Radix::Octal)?,
                offset: f.number(3, "offset", Radix::Decimal)?,
                len: f.number(4, "length", Radix::Decimal)?,
            },
            "truncate" => Operation::Truncate {
                path: f.owned(1, "path")?,
                len: f.number(2, "length", Radix::Decimal)?,
            },
            "unlink" => Operation::Unlink {
                path: f.owned(1, "path")?,
            },
            "symlink" => Operation::Symlink {
                target: f.owned(1, "target")?,
                linkpath: f.owned(2, "linkpath")?,
            },
            "link" => Operation::Link {
                existing: f.owned(1, "existing")?,
                new: f.owned(2, "new")?,
            },
            "mkdir" => Operation::Mkdir {
                path: f.owned(1, "path")?,
                mode: f.number(2, "mode", Radix::Octal)?,
            },
            "rmdir" => Operation::Rmdir {
                path: f.owned(1, "path")?,
            },
            "setxattr" => Operation::SetXattr {
                path: f.owned(1, "path")?,
                name: f.owned(2, "name")?,
                value: f.owned(3, "value")?,
                size: f.number(4, "size", Radix::Decimal)?,
                flags: f.number(5, "flags", Radix::Prefixed)?,
            },
            "removexattr" => Operation::RemoveXattr {
                path: f.owned(1, "path")?,
                name: f.owned(2, "name")?,
            },
            "chown_file" => Operation::Chown {
                path: f.owned(1, "path")?,
                uid: f.number(2, "uid", Radix::Decimal)?,
            },
            "chgrp_file" => Operation::Chgrp {
                path: f.owned(1, "path")?,
                gid: f.number(2, "gid", Radix::Decimal)?,
            },
            "chmod" => Operation::Chmod {
                path: f.owned(1, "path")?,
                mode: f.number(2, "mode", Radix::Octal)?,
            },
            other => Operation::Unrecognized {
                name: other.to_string(),
            },
        };
        Ok(operation)
    }

    /// Name of the primitive this operation invokes, as shown in result lines
    pub fn name(&self) -> &str {
        match self {
            Operation::CreateFile { .. } => "create_file",
            Operation::WriteFile { .. } => "write_file",
            Operation::Truncate { .. } => "truncate",
            Operation::Unlink { .. } => "unlink",
            Operation::Symlink { .. } => "symlink",
            Operation::Link { .. } => "link",
            Operation::Mkdir { .. } => "mkdir",
            Operation::Rmdir { .. } => "rmdir",
            Operation::SetXattr { .. } => "setxattr",
            Operation::RemoveXattr { .. } => "removexattr",
            Operation::Chown { .. } => "chown",
            Operation::Chgrp { .. } => "chgrp",
            Operation::Chmod { .. } => "chmod",
            Operation::Unrecognized { name } => name,
        }
    }

    /// Prepend `prefix` to every path this operation touches.
    ///
    /// A symlink's target is link content, not a location, and is kept as is.
    pub fn with_path_prefix(self, prefix: &str) -> Self {
        if prefix.is_empty() {
            return self;
        }
        let p = |path: String| format!("{}{}", prefix, path);
        match self {
            Operation::CreateFile { path, flags, mode } => Operation::CreateFile {
                path: p(path),
                flags,
                mode,
            },
            Operation::WriteFile {
                path,
                flags,
                offset,
                len,
            } => Operation::WriteFile {
                path: p(path),
                flags,
                offset,
                len,
            },
            Operation::Truncate { path, len } => Operation::Truncate { path: p(path), len },
            Operation::Unlink { path } => Operation::Unlink { path: p(path) },
            Operation::Symlink { target, linkpath } => Operation::Symlink {
                target,
                linkpath: p(linkpath),
            },
            Operation::Link { existing, new } => Operation::Link {
                existing: p(existing),
                new: p(new),
            },
            Operation::Mkdir { path, mode } => Operation::Mkdir { path: p(path), mode },
            Operation::Rmdir { path } => Operation::Rmdir { path: p(path) },
            Operation::SetXattr {
                path,
                name,
                value,
                size,
                flags,
            } => Operation::SetXattr {
                path: p(path),
                name,
                value,
                size,
                flags,
            },
            Operation::RemoveXattr { path, name } => Operation::RemoveXattr {
                path: p(path),
                name,
            },
            Operation::Chown { path, uid } => Operation::Chown { path: p(path), uid },
            Operation::Chgrp { path, gid } => Operation::Chgrp { path: p(path), gid },
            Operation::Chmod { path, mode } => Operation::Chmod { path: p(path), mode },
            unrecognized @ Operation::Unrecognized { .. } => unrecognized,
        }
    }
}

/// Formats the call with its decoded arguments, e.g. `mkdir(/d-00, 0755)`
impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name();
        match self {
            Operation::CreateFile { path, flags, mode } => {
                write!(f, "{}({}, 0{:o}, 0{:o})", name, path, flags, mode)
            }
            Operation::WriteFile {
                path,
                flags,
                offset,
                len,
            } => write!(f, "{}({}, {:o}, {}, {})", name, path, flags, offset, len),
            Operation::Truncate { path, len } => write!(f, "{}({}, {})", name, path, len),
            Operation::Unlink { path } | Operation::Rmdir { path } => {
                write!(f, "{}({})", name, path)
            }
            Operation::Symlink { target, linkpath } => {
                write!(f, "{}({}, {})", name, target, linkpath)
            }
            Operation::Link { existing, new } => write!(f, "{}({}, {})", name, existing, new),
            Operation::Mkdir { path, mode } | Operation::Chmod { path, mode } => {
                write!(f, "{}({}, 0{:o})", name, path, mode)
            }
            Operation::SetXattr {
                path,
                name: attr,
                value,
                size,
                flags,
            } => write!(f, "{}({}, {}, {}, {}, {})", name, path, attr, value, size, flags),
            Operation::RemoveXattr { path, name: attr } => {
                write!(f, "{}({}, {})", name, path, attr)
            }
            Operation::Chown { path, uid: id } | Operation::Chgrp { path, gid: id } => {
                write!(f, "{}({}, {})", name, path, id)
            }
            Operation::Unrecognized { .. } => write!(f, "{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::{tokenize, LOG_DELIMITERS};

    fn parse(line: &str) -> Result<Operation, ParseError> {
        Operation::parse(&tokenize(line, LOG_DELIMITERS).unwrap())
    }

    #[test]
    fn test_parse_create_file() {
        let op = parse("create_file, /d-01/f-00, 0100, 0644").unwrap();
        assert_eq!(
            op,
            Operation::CreateFile {
                path: "/d-01/f-00".into(),
                flags: 0o100,
                mode: 0o644,
            }
        );
        assert_eq!(op.to_string(), "create_file(/d-01/f-00, 0100, 0644)");
    }

    #[test]
    fn test_parse_write_file() {
        // trailing fields past the length are ignored
        let op = parse("write_file, /d-01/f-00, 02, 0, 4096, 4096").unwrap();
        assert_eq!(
            op,
            Operation::WriteFile {
                path: "/d-01/f-00".into(),
                flags: 2,
                offset: 0,
                len: 4096,
            }
        );
        assert_eq!(op.to_string(), "write_file(/d-01/f-00, 2, 0, 4096)");

        let op = parse("write_file, /d-01/f-00, 0102, 512, 8").unwrap();
        assert_eq!(op.to_string(), "write_file(/d-01/f-00, 102, 512, 8)");
    }

    #[test]
    fn test_parse_every_kind() {
        let cases = [
            ("truncate, /f, 100", "truncate(/f, 100)"),
            ("unlink, /f", "unlink(/f)"),
            ("symlink, /a, /b", "symlink(/a, /b)"),
            ("link, /a, /b", "link(/a, /b)"),
            ("mkdir, /d, 0755", "mkdir(/d, 0755)"),
            ("rmdir, /d", "rmdir(/d)"),
            ("setxattr, /f, user.k, v, 1, 0x1", "setxattr(/f, user.k, v, 1, 1)"),
            ("removexattr, /f, user.k", "removexattr(/f, user.k)"),
            ("chown_file, /f, 1000", "chown(/f, 1000)"),
            ("chgrp_file, /f, 100", "chgrp(/f, 100)"),
            ("chmod, /f, 0600", "chmod(/f, 0600)"),
        ];
        for (line, display) in cases {
            assert_eq!(parse(line).unwrap().to_string(), display, "{}", line);
        }
    }

    #[test]
    fn test_unrecognized_operation() {
        let op = parse("rename, /a, /b").unwrap();
        assert_eq!(op, Operation::Unrecognized { name: "rename".into() });
        assert_eq!(op.name(), "rename");
    }

    #[test]
    fn test_path_prefix() {
        let op = parse("symlink, /d-01/f-00, /d-00/f-01").unwrap().with_path_prefix("/mnt");
        assert_eq!(op.to_string(), "symlink(/d-01/f-00, /mnt/d-00/f-01)");

        let op = parse("link, /a, /b").unwrap().with_path_prefix("/mnt");
        assert_eq!(op.to_string(), "link(/mnt/a, /mnt/b)");

        let op = parse("rmdir, /d").unwrap();
        assert_eq!(op.clone().with_path_prefix(""), op);
    }

    #[test]
    fn test_malformed_records() {
        assert_eq!(parse(""), Err(ParseError::Empty));
        assert!(matches!(
            parse("mkdir, /d"),
            Err(ParseError::MissingField { index: 2, .. })
        ));
        assert!(matches!(
            parse("write_file, /f, 02, 10"),
            Err(ParseError::MissingField { index: 4, field: "length", .. })
        ));
        assert!(matches!(
            parse("chmod, /f, 0999"),
            Err(ParseError::InvalidNumber { radix: 8, .. })
        ));
        assert!(matches!(
            parse("write_file, /f, 02, -1, 10"),
            Err(ParseError::Overflow { field: "offset", .. })
        ));
    }
}
