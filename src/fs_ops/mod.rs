//! Filesystem operations.
//!
//! `Filesystem<B>` holds nothing but a backend and the default modes; every call
//! re-reads backend state. Operations are split by concern:
//! - `path_ops`: pure path algebra plus `exists`
//! - `file_ops`: single-entry mutations (touch, copy, dump, rename, remove, links, chmod)
//! - `tree_ops`: recursive mkdir and mirror
//! - `lock`: named advisory lock, independent of any backend

mod file_ops;
pub(crate) mod helpers;
mod lock;
pub(crate) mod path_ops;
mod tree_ops;

pub use file_ops::CopyOutcome;
pub use helpers::io_error_with_help;
pub use lock::LockHandler;
pub use path_ops::{is_absolute_path, make_path_relative, normalize};
pub use tree_ops::{MirrorOptions, MirrorReport};

use std::path::{Path, PathBuf};

use crate::backend::{Backend, OsBackend};

/// Modes applied to entries created by `mkdir` and `dump_file`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    pub dir_mode: u32,
    pub file_mode: u32,
    /// Bits cleared from `dir_mode`/`file_mode` before use.
    pub umask: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            dir_mode: 0o777,
            file_mode: 0o666,
            umask: 0o022,
        }
    }
}

/// An ordered list of paths accepted by the multi-path operations.
///
/// Built from a single path (`"a"`, `&Path`, `PathBuf`) or from any collection of them,
/// so a lone `&Path` is never mistaken for a sequence of components.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Paths(Vec<PathBuf>);

impl Paths {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathBuf> {
        self.0.iter()
    }
}

impl From<&str> for Paths {
    fn from(p: &str) -> Self {
        Paths(vec![PathBuf::from(p)])
    }
}

impl From<String> for Paths {
    fn from(p: String) -> Self {
        Paths(vec![PathBuf::from(p)])
    }
}

impl From<&Path> for Paths {
    fn from(p: &Path) -> Self {
        Paths(vec![p.to_path_buf()])
    }
}

impl From<PathBuf> for Paths {
    fn from(p: PathBuf) -> Self {
        Paths(vec![p])
    }
}

impl From<&PathBuf> for Paths {
    fn from(p: &PathBuf) -> Self {
        Paths(vec![p.clone()])
    }
}

impl<P: AsRef<Path>> From<Vec<P>> for Paths {
    fn from(v: Vec<P>) -> Self {
        v.into_iter().collect()
    }
}

impl<P: AsRef<Path>, const N: usize> From<[P; N]> for Paths {
    fn from(a: [P; N]) -> Self {
        a.into_iter().collect()
    }
}

impl<P: AsRef<Path>> From<&[P]> for Paths {
    fn from(s: &[P]) -> Self {
        s.iter().collect()
    }
}

impl<P: AsRef<Path>> FromIterator<P> for Paths {
    fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
        Paths(iter.into_iter().map(|p| p.as_ref().to_path_buf()).collect())
    }
}

impl IntoIterator for Paths {
    type Item = PathBuf;
    type IntoIter = std::vec::IntoIter<PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Paths {
    type Item = &'a PathBuf;
    type IntoIter = std::slice::Iter<'a, PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Entry point for every path, file and tree operation.
#[derive(Debug, Clone, Default)]
pub struct Filesystem<B: Backend = OsBackend> {
    backend: B,
    options: Options,
}

impl Filesystem<OsBackend> {
    /// Operate on the real disk with default modes.
    pub fn new() -> Self {
        Self::with_backend(OsBackend)
    }
}

impl<B: Backend> Filesystem<B> {
    pub fn with_backend(backend: B) -> Self {
        Self {
            backend,
            options: Options::default(),
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}
