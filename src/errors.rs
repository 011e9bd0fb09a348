//! Typed error definitions for fsutil.
//! Every operation fails with a single `IoError` carrying the attempted operation,
//! the offending path and the underlying OS error.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::fs_ops::helpers::build_message;

/// The operation that was being attempted when an `IoError` was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    MakePathRelative,
    Touch,
    Copy,
    DumpFile,
    AppendToFile,
    Rename,
    Remove,
    Symlink,
    ReadLink,
    Chmod,
    Mkdir,
    Mirror,
    Lock,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::MakePathRelative => "make path relative",
            Operation::Touch => "touch",
            Operation::Copy => "copy",
            Operation::DumpFile => "dump file",
            Operation::AppendToFile => "append to file",
            Operation::Rename => "rename",
            Operation::Remove => "remove",
            Operation::Symlink => "symlink",
            Operation::ReadLink => "read link",
            Operation::Chmod => "chmod",
            Operation::Mkdir => "mkdir",
            Operation::Mirror => "mirror",
            Operation::Lock => "lock",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("{}", build_message(.op.as_str(), .path, .source))]
pub struct IoError {
    op: Operation,
    path: PathBuf,
    #[source]
    source: io::Error,
}

impl IoError {
    pub fn new(op: Operation, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self {
            op,
            path: path.into(),
            source,
        }
    }

    /// Build an error that has no OS origin (policy refusals such as "target exists").
    pub fn with_kind(
        op: Operation,
        path: impl Into<PathBuf>,
        kind: io::ErrorKind,
        msg: impl Into<String>,
    ) -> Self {
        Self::new(op, path, io::Error::new(kind, msg.into()))
    }

    pub fn op(&self) -> Operation {
        self.op
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> io::ErrorKind {
        self.source.kind()
    }

    pub fn raw_os_error(&self) -> Option<i32> {
        self.source.raw_os_error()
    }

    pub fn io_error(&self) -> &io::Error {
        &self.source
    }
}

pub type Result<T> = std::result::Result<T, IoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_op_and_path() {
        let e = IoError::new(
            Operation::Copy,
            "/nope/src.txt",
            io::Error::from(io::ErrorKind::NotFound),
        );
        let msg = e.to_string();
        assert!(msg.starts_with("copy '/nope/src.txt'"), "msg was: {msg}");
        assert_eq!(e.kind(), io::ErrorKind::NotFound);
        assert_eq!(e.op(), Operation::Copy);
    }

    #[test]
    fn policy_error_keeps_kind() {
        let e = IoError::with_kind(
            Operation::Rename,
            "b.txt",
            io::ErrorKind::AlreadyExists,
            "target already exists",
        );
        assert_eq!(e.kind(), io::ErrorKind::AlreadyExists);
        assert!(e.raw_os_error().is_none());
        assert!(e.to_string().contains("target already exists"));
    }
}
