//! I/O error helpers.
//!
//! Turns a bare `io::Error` into an `IoError` tagged with the operation and path,
//! and renders messages with platform-aware hints.
//!
//! Usage:
//!   backend.create_dir(dir, mode).map_err(io_error_with_help(Operation::Mkdir, dir))?;

use std::io;
use std::path::Path;

use crate::errors::{IoError, Operation};

/// Hint for a raw OS error code, if we have one.
#[cfg(unix)]
fn os_hint(code: i32) -> Option<&'static str> {
    let hint = match code {
        libc::EACCES | libc::EPERM => "permission denied; check ownership and mode bits",
        libc::EXDEV => "cross-device link; rename cannot span filesystems",
        libc::EBUSY => "resource busy; another process holds it",
        libc::ENOENT => "path not found; check that the parent directory exists",
        libc::EEXIST => "already exists",
        libc::ENOTDIR => "a path component is not a directory",
        libc::EISDIR => "is a directory",
        libc::ENOTEMPTY => "directory not empty",
        libc::ENOSPC => "no space left on device",
        libc::EROFS => "read-only filesystem",
        libc::ELOOP => "too many levels of symbolic links; possible symlink cycle",
        libc::ENAMETOOLONG => "file name or path too long",
        libc::EMFILE => "process file descriptor limit reached",
        libc::ENFILE => "system-wide file table full",
        _ => return None,
    };
    Some(hint)
}

#[cfg(windows)]
fn os_hint(code: i32) -> Option<&'static str> {
    let hint = match code {
        5 => "access denied; check permissions",        // ERROR_ACCESS_DENIED
        17 => "not same device; rename cannot span volumes", // ERROR_NOT_SAME_DEVICE
        32 => "sharing violation; file is in use",     // ERROR_SHARING_VIOLATION
        33 => "lock violation; region is locked",      // ERROR_LOCK_VIOLATION
        2 | 3 => "path not found; check that the parent directory exists",
        80 | 183 => "already exists",                  // ERROR_FILE_EXISTS / ERROR_ALREADY_EXISTS
        112 => "disk full",                            // ERROR_DISK_FULL
        19 => "write protected media",                 // ERROR_WRITE_PROTECT
        206 => "file name or path too long",           // ERROR_FILENAME_EXCED_RANGE
        _ => return None,
    };
    Some(hint)
}

#[cfg(not(any(unix, windows)))]
fn os_hint(_code: i32) -> Option<&'static str> {
    None
}

fn kind_hint(kind: io::ErrorKind) -> Option<&'static str> {
    match kind {
        io::ErrorKind::PermissionDenied => Some("permission denied; check ownership and mode bits"),
        io::ErrorKind::NotFound => Some("path not found"),
        io::ErrorKind::AlreadyExists => Some("already exists"),
        io::ErrorKind::InvalidInput => Some("invalid argument"),
        _ => None,
    }
}

/// Format "<op> '<path>': <error> — <hint> [os code: N]".
pub(crate) fn build_message(op: &str, path: &Path, e: &io::Error) -> String {
    let mut msg = format!("{} '{}': {}", op, path.display(), e);

    match e.raw_os_error() {
        Some(code) => {
            if let Some(hint) = os_hint(code) {
                msg.push_str(" — ");
                msg.push_str(hint);
            }
            msg.push_str(&format!(" [os code: {}]", code));
        }
        None => {
            // Policy errors carry their own text; only add a hint when the text is bare.
            if let Some(hint) = kind_hint(e.kind())
                && e.get_ref().is_none()
            {
                msg.push_str(" — ");
                msg.push_str(hint);
            }
        }
    }

    msg
}

/// Returns a closure for `.map_err(...)` that wraps an io::Error into an `IoError`.
pub fn io_error_with_help<'a>(
    op: Operation,
    path: &'a Path,
) -> impl FnOnce(io::Error) -> IoError + 'a {
    move |e: io::Error| IoError::new(op, path, e)
}

/// Whether an io::Error says "the path is not there", used by idempotent operations.
pub(crate) fn is_not_found(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::NotFound
}

/// Detect EXDEV / ERROR_NOT_SAME_DEVICE; std has no stable ErrorKind for it.
pub(crate) fn is_cross_device(e: &io::Error) -> bool {
    match e.raw_os_error() {
        #[cfg(unix)]
        Some(code) => code == libc::EXDEV,
        #[cfg(windows)]
        Some(code) => code == 17,
        #[cfg(not(any(unix, windows)))]
        Some(_) => false,
        None => false,
    }
}
