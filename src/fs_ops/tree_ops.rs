//! Recursive mkdir and directory mirroring.

use std::io;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info};

use super::file_ops::CopyOutcome;
use super::helpers::{io_error_with_help, is_not_found};
use super::{Filesystem, Paths};
use crate::backend::{Backend, EntryKind};
use crate::errors::{IoError, Operation, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorOptions {
    /// Copy files even when the destination copy is newer.
    pub override_newer: bool,
    /// Remove destination entries that have no counterpart in the source.
    pub delete: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorReport {
    pub dirs_created: usize,
    pub files_copied: usize,
    pub files_skipped: usize,
    pub links_created: usize,
    pub removed: usize,
}

impl<B: Backend> Filesystem<B> {
    /// Create each directory along with its missing ancestors.
    pub fn mkdir(&self, paths: impl Into<Paths>) -> Result<()> {
        for dir in paths.into() {
            self.create_dir_all(&dir, Operation::Mkdir)?;
        }
        Ok(())
    }

    /// Returns whether `dir` itself had to be created.
    pub(super) fn create_dir_all(&self, dir: &Path, op: Operation) -> Result<bool> {
        match self.backend.metadata(dir) {
            Ok(meta) if meta.is_dir() => return Ok(false),
            Ok(_) => {
                return Err(IoError::with_kind(
                    op,
                    dir,
                    io::ErrorKind::AlreadyExists,
                    "path exists and is not a directory",
                ));
            }
            Err(e) if is_not_found(&e) => {}
            Err(e) => return Err(IoError::new(op, dir, e)),
        }

        if let Some(parent) = dir.parent()
            && !parent.as_os_str().is_empty()
        {
            self.create_dir_all(parent, op)?;
        }

        let mode = self.options.dir_mode & !self.options.umask;
        match self.backend.create_dir(dir, mode) {
            Ok(()) => {
                debug!(path = %dir.display(), mode = format_args!("{mode:o}"), "created directory");
                Ok(true)
            }
            // Lost a race with another creator.
            Err(e)
                if e.kind() == io::ErrorKind::AlreadyExists
                    && self.backend.metadata(dir).is_ok_and(|m| m.is_dir()) =>
            {
                Ok(false)
            }
            Err(e) => Err(IoError::new(op, dir, e)),
        }
    }

    /// Make `destination` contain everything in `source`.
    ///
    /// Directories are created first, then files are copied in parallel following the
    /// `copy` rule. Links are recreated with the same link text. Entries only present in
    /// the destination survive unless `options.delete` is set.
    pub fn mirror(
        &self,
        source: impl AsRef<Path>,
        destination: impl AsRef<Path>,
        options: MirrorOptions,
    ) -> Result<MirrorReport> {
        let (source, destination) = (source.as_ref(), destination.as_ref());
        let op = Operation::Mirror;
        let mut report = MirrorReport::default();

        let src_meta = self
            .backend
            .metadata(source)
            .map_err(io_error_with_help(op, source))?;
        if !src_meta.is_dir() {
            return Err(IoError::with_kind(
                op,
                source,
                io::ErrorKind::NotADirectory,
                "source is not a directory",
            ));
        }

        if self.create_dir_all(destination, op)? {
            report.dirs_created += 1;
        }

        let excluded = self.nested_destination(source, destination)?;
        if excluded.as_deref() == Some(source) {
            debug!(path = %source.display(), "source and destination are the same directory");
            return Ok(report);
        }

        let entries = self
            .backend
            .walk(source)
            .map_err(io_error_with_help(op, source))?;

        let mut files: Vec<(PathBuf, PathBuf)> = Vec::new();
        for entry in entries {
            if excluded.as_ref().is_some_and(|x| entry.path.starts_with(x)) {
                continue;
            }
            let Ok(rel) = entry.path.strip_prefix(source) else {
                continue;
            };
            let target = destination.join(rel);

            match entry.kind {
                EntryKind::Dir => {
                    if self.create_dir_all(&target, op)? {
                        report.dirs_created += 1;
                    }
                }
                EntryKind::Symlink => {
                    if self.mirror_link(&entry.path, &target)? {
                        report.links_created += 1;
                    }
                }
                EntryKind::File => files.push((entry.path, target)),
            }
        }

        let outcomes = files
            .par_iter()
            .map(|(src, dst)| self.copy(src, dst, options.override_newer))
            .collect::<Result<Vec<CopyOutcome>>>()?;
        for outcome in outcomes {
            match outcome {
                CopyOutcome::Copied { .. } => report.files_copied += 1,
                CopyOutcome::Skipped => report.files_skipped += 1,
            }
        }

        if options.delete {
            report.removed = self.remove_extras(source, destination)?;
        }

        info!(
            src = %source.display(),
            dst = %destination.display(),
            dirs = report.dirs_created,
            copied = report.files_copied,
            skipped = report.files_skipped,
            links = report.links_created,
            removed = report.removed,
            "mirror complete"
        );
        Ok(report)
    }

    /// If `destination` resolves to a location inside (or equal to) `source`, the
    /// corresponding path under `source` so the walk can skip it.
    fn nested_destination(&self, source: &Path, destination: &Path) -> Result<Option<PathBuf>> {
        let src_real = self
            .backend
            .canonicalize(source)
            .map_err(io_error_with_help(Operation::Mirror, source))?;
        let dst_real = self
            .backend
            .canonicalize(destination)
            .map_err(io_error_with_help(Operation::Mirror, destination))?;

        Ok(dst_real.strip_prefix(&src_real).ok().map(|rel| {
            if rel.as_os_str().is_empty() {
                source.to_path_buf()
            } else {
                source.join(rel)
            }
        }))
    }

    /// Recreate the link at `link` in the destination; returns whether anything changed.
    fn mirror_link(&self, link: &Path, target: &Path) -> Result<bool> {
        let text = self
            .backend
            .read_link(link)
            .map_err(io_error_with_help(Operation::Mirror, link))?;
        let current = self.backend.read_link(target).ok();
        if current.as_deref() == Some(text.as_path()) {
            return Ok(false);
        }
        self.symlink(&text, target, true)?;
        Ok(true)
    }

    /// Remove destination entries missing from `source`, deepest first.
    ///
    /// When `source` lives inside `destination`, the source itself, its ancestors and
    /// everything below it are never removed.
    fn remove_extras(&self, source: &Path, destination: &Path) -> Result<usize> {
        let op = Operation::Mirror;
        let src_real = self
            .backend
            .canonicalize(source)
            .map_err(io_error_with_help(op, source))?;
        let dst_real = self
            .backend
            .canonicalize(destination)
            .map_err(io_error_with_help(op, destination))?;
        let entries = self
            .backend
            .walk(destination)
            .map_err(io_error_with_help(op, destination))?;

        let mut removed = 0;
        for entry in entries.iter().rev() {
            let Ok(rel) = entry.path.strip_prefix(destination) else {
                continue;
            };
            // The walk never descends links, so this is the entry's real location.
            let entry_real = dst_real.join(rel);
            if entry_real.starts_with(&src_real) || src_real.starts_with(&entry_real) {
                continue;
            }
            match self.backend.symlink_metadata(&source.join(rel)) {
                Ok(_) => {}
                Err(e) if is_not_found(&e) => {
                    self.remove(&entry.path)?;
                    removed += 1;
                }
                Err(e) => return Err(IoError::new(Operation::Mirror, source.join(rel), e)),
            }
        }
        Ok(removed)
    }
}
