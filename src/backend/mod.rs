//! Storage backends.
//!
//! `Filesystem` implements every policy (overwrite rules, mirroring, atomic dumps)
//! on top of the primitive calls below. `OsBackend` maps them to the real disk;
//! `MemoryBackend` keeps a tree in memory so policies can be tested without I/O.
//!
//! Primitives return plain `io::Result`; the operation layer attaches op/path context.

mod memory;
mod os;
mod temp;

pub use memory::{FaultPoint, MemoryBackend};
pub use os::OsBackend;
pub(crate) use temp::temp_sibling;
#[cfg(test)]
pub(crate) use temp::is_temp_name;

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub kind: EntryKind,
    pub len: u64,
    pub modified: SystemTime,
    pub accessed: SystemTime,
    /// Permission bits (`0o777` range). Best-effort on non-Unix hosts.
    pub mode: u32,
}

impl Metadata {
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }

    pub fn is_symlink(&self) -> bool {
        self.kind == EntryKind::Symlink
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub path: PathBuf,
    pub kind: EntryKind,
}

pub trait Backend: Send + Sync {
    /// Stat following symlinks.
    fn metadata(&self, path: &Path) -> io::Result<Metadata>;

    /// Stat without following a final symlink.
    fn symlink_metadata(&self, path: &Path) -> io::Result<Metadata>;

    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Create an empty file if absent; leave an existing file untouched.
    fn create_file(&self, path: &Path) -> io::Result<()>;

    /// Create a new file holding `contents` and flush it. Fails if `path` exists.
    fn write_new(&self, path: &Path, contents: &[u8], mode: u32) -> io::Result<()>;

    /// Append to a file, creating it if missing.
    fn append(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// Copy the bytes of `src` into a new file at `dst`. Fails if `dst` exists.
    fn copy_new(&self, src: &Path, dst: &Path) -> io::Result<u64>;

    fn set_times(&self, path: &Path, atime: SystemTime, mtime: SystemTime) -> io::Result<()>;

    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()>;

    /// Atomic replace: an existing non-directory at `to` is overwritten.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Remove an empty directory.
    fn remove_dir(&self, path: &Path) -> io::Result<()>;

    /// Create a single directory; the parent must exist.
    fn create_dir(&self, path: &Path, mode: u32) -> io::Result<()>;

    /// Immediate children, in no particular order.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>>;

    fn symlink(&self, original: &Path, link: &Path) -> io::Result<()>;

    fn read_link(&self, path: &Path) -> io::Result<PathBuf>;

    /// Resolve every symlink and `..` in `path`; the path must exist.
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;

    /// Every descendant of `root` (not `root` itself), parents before children,
    /// symlinks reported as links and never descended into.
    fn walk(&self, root: &Path) -> io::Result<Vec<DirEntry>> {
        let mut out = Vec::new();
        let mut stack = vec![root.to_path_buf()];
        while let Some(dir) = stack.pop() {
            let mut children = self.read_dir(&dir)?;
            children.sort_by(|a, b| a.path.cmp(&b.path));
            for child in children.iter().rev() {
                if child.kind == EntryKind::Dir {
                    stack.push(child.path.clone());
                }
            }
            out.extend(children);
        }
        Ok(out)
    }
}
