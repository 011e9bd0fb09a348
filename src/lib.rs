//! Core library for `fsutil`.
//!
//! Composable filesystem operations over a pluggable storage backend:
//! - path algebra (`normalize`, `make_path_relative`, `is_absolute_path`)
//! - single-entry operations with explicit overwrite rules (copy, rename, symlink)
//! - atomic whole-file writes (`dump_file`)
//! - tree operations (`mkdir`, `mirror`)
//! - a named advisory lock (`LockHandler`)
//!
//! ```no_run
//! use fsutil::prelude::*;
//!
//! let fs = Filesystem::new();
//! fs.mkdir("/tmp/fsutil-demo/a")?;
//! fs.dump_file("/tmp/fsutil-demo/a/hello.txt", "hello")?;
//! fs.copy("/tmp/fsutil-demo/a/hello.txt", "/tmp/fsutil-demo/b/hello.txt", false)?;
//! # Ok::<(), fsutil::IoError>(())
//! ```

pub mod backend;
pub mod cli;
pub mod config;
pub mod errors;
pub mod fs_ops;
pub mod output;

pub use backend::{Backend, FaultPoint, MemoryBackend, OsBackend};
pub use config::{Config, LogLevel};
pub use errors::{IoError, Operation, Result};
pub use fs_ops::{
    is_absolute_path, make_path_relative, normalize, CopyOutcome, Filesystem, LockHandler,
    MirrorOptions, MirrorReport, Options, Paths,
};

/// Convenience re-exports for callers.
pub mod prelude {
    pub use crate::backend::{Backend, MemoryBackend, OsBackend};
    pub use crate::errors::{IoError, Operation};
    pub use crate::fs_ops::{
        is_absolute_path, make_path_relative, normalize, CopyOutcome, Filesystem, LockHandler,
        MirrorOptions, MirrorReport, Options, Paths,
    };
}
