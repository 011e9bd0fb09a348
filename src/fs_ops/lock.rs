//! Named advisory lock.
//!
//! Holds an open handle on `<dir>/<name>` with an exclusive, non-blocking OS lock
//! (`flock(LOCK_EX | LOCK_NB)` on Unix, `LockFileEx` on Windows, via fs2).
//!
//! Notes:
//! - The lock is tied to the open file handle, so the OS drops it when the process
//!   exits; a crash never leaves a held lock behind, only an empty lock file.
//! - The lock file is kept on release. Unlinking it would let a later caller lock a
//!   fresh inode while an earlier holder still owns the old one.
//! - Advisory only: processes that never call `lock()` are not stopped.

use std::env;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{trace, warn};

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

use super::helpers::io_error_with_help;
use crate::errors::{IoError, Operation, Result};

/// Replace every run of characters outside `[A-Za-z0-9._-]` with a single `-`.
fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_run = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('-');
            in_run = true;
        }
    }
    out
}

fn is_contended(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// A lock on a named file. States: unlocked (no handle) and locked (handle held).
#[derive(Debug)]
pub struct LockHandler {
    path: PathBuf,
    file: Option<File>,
}

impl LockHandler {
    /// Prepare a lock named `name` in `dir` (default: the system temp directory).
    ///
    /// The directory is created if missing. Nothing is locked yet.
    pub fn new(name: &str, dir: Option<&Path>) -> Result<Self> {
        let dir = dir.map(Path::to_path_buf).unwrap_or_else(env::temp_dir);

        let file_name = sanitize(name);
        if file_name.is_empty() || file_name == "." || file_name == ".." {
            return Err(IoError::with_kind(
                Operation::Lock,
                dir.join(name),
                io::ErrorKind::InvalidInput,
                "lock name is empty after sanitizing",
            ));
        }

        fs::create_dir_all(&dir).map_err(io_error_with_help(Operation::Lock, &dir))?;

        Ok(Self {
            path: dir.join(file_name),
            file: None,
        })
    }

    /// Try once to take the lock without blocking.
    ///
    /// `Ok(true)` when acquired, `Ok(false)` when someone else holds it or this
    /// handler already does (not re-entrant).
    pub fn lock(&mut self) -> Result<bool> {
        if self.file.is_some() {
            trace!(path = %self.path.display(), "lock already held by this handler");
            return Ok(false);
        }

        let mut opts = OpenOptions::new();
        opts.read(true).write(true).create(true).truncate(false);
        #[cfg(unix)]
        opts.mode(0o666);

        let file = opts
            .open(&self.path)
            .map_err(io_error_with_help(Operation::Lock, &self.path))?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                trace!(path = %self.path.display(), "try-lock success");
                self.file = Some(file);
                Ok(true)
            }
            Err(e) if is_contended(&e) => {
                trace!(path = %self.path.display(), "try-lock would block");
                Ok(false)
            }
            Err(e) => Err(IoError::new(Operation::Lock, &self.path, e)),
        }
    }

    /// Drop the lock if held. Safe to call repeatedly.
    pub fn release(&mut self) {
        if let Some(file) = self.file.take() {
            // Closing the handle releases the lock as well; unlock explicitly first.
            if let Err(e) = FileExt::unlock(&file) {
                warn!(path = %self.path.display(), error = %e, "unlock failed; closing the handle");
            }
            trace!(path = %self.path.display(), "lock released");
        }
    }

    pub fn is_locked(&self) -> bool {
        self.file.is_some()
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockHandler {
    fn drop(&mut self) {
        self.release();
    }
}
