//! Single-entry operations: touch, copy, dump, append, rename, remove, symlink,
//! read_link and chmod.
//!
//! Writes that replace a whole file (copy, dump) go through a hidden temp sibling
//! followed by an atomic rename, so readers see either the old or the new content.

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, warn};

use super::helpers::{io_error_with_help, is_cross_device, is_not_found};
use super::{Filesystem, MirrorOptions, Paths};
use crate::backend::{temp_sibling, Backend, EntryKind, Metadata};
use crate::errors::{IoError, Operation, Result};

/// What `copy` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied { bytes: u64 },
    /// The target was at least as new as the source.
    Skipped,
}

impl CopyOutcome {
    pub fn is_copied(&self) -> bool {
        matches!(self, CopyOutcome::Copied { .. })
    }
}

impl<B: Backend> Filesystem<B> {
    /// Create any missing parent directory of `path`.
    pub(super) fn ensure_parent(&self, op: Operation, path: &Path) -> Result<()> {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                self.create_dir_all(parent, op).map(|_| ())
            }
            _ => Ok(()),
        }
    }

    /// Create each missing file, then set its times.
    ///
    /// `mtime` defaults to now and `atime` to `mtime`. Parents are not created.
    pub fn touch(
        &self,
        paths: impl Into<Paths>,
        mtime: Option<SystemTime>,
        atime: Option<SystemTime>,
    ) -> Result<()> {
        let mtime = mtime.unwrap_or_else(SystemTime::now);
        let atime = atime.unwrap_or(mtime);

        for path in paths.into() {
            self.backend
                .create_file(&path)
                .map_err(io_error_with_help(Operation::Touch, &path))?;
            self.backend
                .set_times(&path, atime, mtime)
                .map_err(io_error_with_help(Operation::Touch, &path))?;
            debug!(path = %path.display(), "touched");
        }
        Ok(())
    }

    /// Copy a regular file.
    ///
    /// An existing target is replaced only when the source is strictly newer, unless
    /// `overwrite_newer` forces it. Executable bits of the source carry over. A target
    /// that is a symlink stays in place and the file it points to receives the bytes.
    pub fn copy(
        &self,
        source: impl AsRef<Path>,
        target: impl AsRef<Path>,
        overwrite_newer: bool,
    ) -> Result<CopyOutcome> {
        let source = source.as_ref();
        let op = Operation::Copy;
        let resolved = self.write_destination(op, target.as_ref())?;
        let target = resolved.as_path();

        let src_meta = self
            .backend
            .metadata(source)
            .map_err(io_error_with_help(op, source))?;
        if !src_meta.is_file() {
            return Err(IoError::with_kind(
                op,
                source,
                io::ErrorKind::NotFound,
                "source is not a regular file",
            ));
        }

        if !overwrite_newer {
            match self.backend.metadata(target) {
                Ok(dst_meta) if src_meta.modified <= dst_meta.modified => {
                    debug!(src = %source.display(), dst = %target.display(), "target is up to date; skipped");
                    return Ok(CopyOutcome::Skipped);
                }
                Ok(_) => {}
                Err(e) if is_not_found(&e) => {}
                Err(e) => return Err(IoError::new(op, target, e)),
            }
        }

        self.ensure_parent(op, target)?;

        let tmp = temp_sibling(target);
        let bytes = self
            .copy_into_place(source, target, &tmp, &src_meta)
            .map_err(|e| {
                let _ = self.backend.remove_file(&tmp);
                IoError::new(op, target, e)
            })?;

        debug!(src = %source.display(), dst = %target.display(), bytes, "copied");
        Ok(CopyOutcome::Copied { bytes })
    }

    /// Where a write to `path` lands: the file a symlink points to, or `path` itself.
    fn write_destination(&self, op: Operation, path: &Path) -> Result<PathBuf> {
        match self.backend.symlink_metadata(path) {
            Ok(meta) if meta.is_symlink() => match self.backend.canonicalize(path) {
                Ok(real) => Ok(real),
                // Dangling: write where the link text says.
                Err(e) if is_not_found(&e) => {
                    let text = self
                        .backend
                        .read_link(path)
                        .map_err(io_error_with_help(op, path))?;
                    Ok(match path.parent() {
                        Some(parent) => parent.join(text),
                        None => text,
                    })
                }
                Err(e) => Err(IoError::new(op, path, e)),
            },
            _ => Ok(path.to_path_buf()),
        }
    }

    fn copy_into_place(
        &self,
        source: &Path,
        target: &Path,
        tmp: &Path,
        src_meta: &Metadata,
    ) -> io::Result<u64> {
        let bytes = self.backend.copy_new(source, tmp)?;
        if bytes != src_meta.len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("copied {bytes} of {} bytes", src_meta.len),
            ));
        }

        let exec = src_meta.mode & 0o111;
        if exec != 0 {
            let mode = self.backend.metadata(tmp)?.mode;
            if mode & exec != exec {
                self.backend.set_mode(tmp, mode | exec)?;
            }
        }

        self.backend.rename(tmp, target)?;
        Ok(bytes)
    }

    /// Atomically replace `path` with `content`.
    ///
    /// Parents are created. A replaced file keeps its permission bits; a new one gets
    /// `file_mode & !umask`. On failure the previous content is left untouched.
    pub fn dump_file(&self, path: impl AsRef<Path>, content: impl AsRef<[u8]>) -> Result<()> {
        let path = path.as_ref();
        let content = content.as_ref();
        let op = Operation::DumpFile;

        self.ensure_parent(op, path)?;

        let mode = match self.backend.metadata(path) {
            Ok(meta) if meta.is_file() => meta.mode,
            _ => self.options.file_mode & !self.options.umask,
        };

        let tmp = temp_sibling(path);
        let written = self
            .backend
            .write_new(&tmp, content, mode)
            .and_then(|()| self.backend.rename(&tmp, path));
        if let Err(e) = written {
            if let Err(cleanup) = self.backend.remove_file(&tmp)
                && !is_not_found(&cleanup)
            {
                warn!(tmp = %tmp.display(), error = %cleanup, "could not remove temp file");
            }
            return Err(IoError::new(op, path, e));
        }

        debug!(path = %path.display(), bytes = content.len(), "dumped");
        Ok(())
    }

    /// Append to `path`, creating it and its parents if needed. Not atomic.
    pub fn append_to_file(&self, path: impl AsRef<Path>, content: impl AsRef<[u8]>) -> Result<()> {
        let path = path.as_ref();
        let op = Operation::AppendToFile;

        self.ensure_parent(op, path)?;
        self.backend
            .append(path, content.as_ref())
            .map_err(io_error_with_help(op, path))?;
        debug!(path = %path.display(), bytes = content.as_ref().len(), "appended");
        Ok(())
    }

    /// Rename a file, directory or link.
    ///
    /// An existing target is an error unless `overwrite` is set; a directory target is
    /// then removed first. Across filesystems the entry is copied and the source removed.
    pub fn rename(
        &self,
        source: impl AsRef<Path>,
        target: impl AsRef<Path>,
        overwrite: bool,
    ) -> Result<()> {
        let (source, target) = (source.as_ref(), target.as_ref());
        let op = Operation::Rename;

        let src_meta = self
            .backend
            .symlink_metadata(source)
            .map_err(io_error_with_help(op, source))?;

        match self.backend.symlink_metadata(target) {
            Ok(dst_meta) => {
                if !overwrite {
                    return Err(IoError::with_kind(
                        op,
                        target,
                        io::ErrorKind::AlreadyExists,
                        "target already exists",
                    ));
                }
                if self.same_entry(source, target) {
                    return Ok(());
                }
                if dst_meta.is_dir() {
                    self.remove(target)?;
                }
            }
            Err(e) if is_not_found(&e) => {}
            Err(e) => return Err(IoError::new(op, target, e)),
        }

        match self.backend.rename(source, target) {
            Ok(()) => {
                debug!(src = %source.display(), dst = %target.display(), "renamed");
                Ok(())
            }
            Err(e) if is_cross_device(&e) => {
                warn!(
                    src = %source.display(),
                    dst = %target.display(),
                    "rename crosses filesystems; copying and removing source"
                );
                self.move_by_copy(source, target, &src_meta)
            }
            Err(e) => Err(IoError::new(op, source, e)),
        }
    }

    fn same_entry(&self, a: &Path, b: &Path) -> bool {
        match (self.backend.canonicalize(a), self.backend.canonicalize(b)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }

    fn move_by_copy(&self, source: &Path, target: &Path, src_meta: &Metadata) -> Result<()> {
        match src_meta.kind {
            EntryKind::Dir => {
                let opts = MirrorOptions {
                    override_newer: true,
                    delete: true,
                };
                self.mirror(source, target, opts)?;
            }
            EntryKind::Symlink => {
                let link = self
                    .backend
                    .read_link(source)
                    .map_err(io_error_with_help(Operation::Rename, source))?;
                self.symlink(link, target, true)?;
            }
            EntryKind::File => {
                self.copy(source, target, true)?;
            }
        }
        self.remove(source)
    }

    /// Remove files, links and whole directory trees. Missing paths are ignored and
    /// links are never followed.
    pub fn remove(&self, paths: impl Into<Paths>) -> Result<()> {
        for path in paths.into() {
            self.remove_one(&path)?;
        }
        Ok(())
    }

    fn remove_one(&self, path: &Path) -> Result<()> {
        let op = Operation::Remove;
        let meta = match self.backend.symlink_metadata(path) {
            Ok(meta) => meta,
            Err(e) if is_not_found(&e) => return Ok(()),
            Err(e) => return Err(IoError::new(op, path, e)),
        };

        if meta.is_dir() {
            let entries = self
                .backend
                .walk(path)
                .map_err(io_error_with_help(op, path))?;
            // Walk order is parents first; reversed, children go before their parents.
            for entry in entries.iter().rev() {
                let removed = match entry.kind {
                    EntryKind::Dir => self.backend.remove_dir(&entry.path),
                    _ => self.backend.remove_file(&entry.path),
                };
                match removed {
                    Ok(()) => {}
                    Err(e) if is_not_found(&e) => {}
                    Err(e) => return Err(IoError::new(op, &entry.path, e)),
                }
            }
            ignore_missing(self.backend.remove_dir(path)).map_err(io_error_with_help(op, path))?;
        } else {
            ignore_missing(self.backend.remove_file(path)).map_err(io_error_with_help(op, path))?;
        }

        debug!(path = %path.display(), "removed");
        Ok(())
    }

    /// Create a symbolic link at `target` pointing to `origin`.
    ///
    /// A link that already points to `origin` is left alone. Anything else at `target`
    /// is an error unless `replace` is set.
    pub fn symlink(
        &self,
        origin: impl AsRef<Path>,
        target: impl AsRef<Path>,
        replace: bool,
    ) -> Result<()> {
        let (origin, target) = (origin.as_ref(), target.as_ref());
        let op = Operation::Symlink;

        self.ensure_parent(op, target)?;

        match self.backend.symlink_metadata(target) {
            Ok(meta) => {
                if meta.is_symlink()
                    && self
                        .backend
                        .read_link(target)
                        .is_ok_and(|current| current == origin)
                {
                    debug!(link = %target.display(), "link already in place");
                    return Ok(());
                }
                if !replace {
                    return Err(IoError::with_kind(
                        op,
                        target,
                        io::ErrorKind::AlreadyExists,
                        "target already exists",
                    ));
                }
                self.remove(target)?;
            }
            Err(e) if is_not_found(&e) => {}
            Err(e) => return Err(IoError::new(op, target, e)),
        }

        self.backend
            .symlink(origin, target)
            .map_err(io_error_with_help(op, target))?;
        debug!(origin = %origin.display(), link = %target.display(), "linked");
        Ok(())
    }

    /// The text of the link at `path`, or with `canonicalize` the fully resolved path.
    ///
    /// Returns `None` when `path` is not a link, or (with `canonicalize`) does not resolve.
    pub fn read_link(
        &self,
        path: impl AsRef<Path>,
        canonicalize: bool,
    ) -> Result<Option<PathBuf>> {
        let path = path.as_ref();
        let op = Operation::ReadLink;

        if canonicalize {
            return match self.backend.canonicalize(path) {
                Ok(resolved) => Ok(Some(resolved)),
                Err(e) if is_not_found(&e) => Ok(None),
                Err(e) => Err(IoError::new(op, path, e)),
            };
        }

        match self.backend.symlink_metadata(path) {
            Ok(meta) if meta.is_symlink() => self
                .backend
                .read_link(path)
                .map(Some)
                .map_err(io_error_with_help(op, path)),
            Ok(_) => Ok(None),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(IoError::new(op, path, e)),
        }
    }

    /// Set `mode & !umask` on each path, descending into directories when `recursive`.
    /// Links found while descending are skipped.
    pub fn chmod(
        &self,
        paths: impl Into<Paths>,
        mode: u32,
        umask: u32,
        recursive: bool,
    ) -> Result<()> {
        let op = Operation::Chmod;
        let mode = mode & !umask;

        for path in paths.into() {
            self.backend
                .set_mode(&path, mode)
                .map_err(io_error_with_help(op, &path))?;

            let is_dir = self
                .backend
                .symlink_metadata(&path)
                .is_ok_and(|m| m.is_dir());
            if recursive && is_dir {
                let entries = self
                    .backend
                    .walk(&path)
                    .map_err(io_error_with_help(op, &path))?;
                for entry in entries.iter().filter(|e| e.kind != EntryKind::Symlink) {
                    self.backend
                        .set_mode(&entry.path, mode)
                        .map_err(io_error_with_help(op, &entry.path))?;
                }
            }
            debug!(path = %path.display(), mode = format_args!("{mode:o}"), recursive, "chmod");
        }
        Ok(())
    }
}

fn ignore_missing(res: io::Result<()>) -> io::Result<()> {
    match res {
        Err(e) if is_not_found(&e) => Ok(()),
        other => other,
    }
}
