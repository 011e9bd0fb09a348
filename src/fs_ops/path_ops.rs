//! Path algebra and existence checks.
//!
//! Everything here except `exists` is lexical: no filesystem access, no symlink
//! resolution.

use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::trace;

use super::{Filesystem, Paths};
use crate::backend::Backend;
use crate::errors::{IoError, Operation, Result};

/// Collapse `.` and `..` without touching the disk.
///
/// `..` directly under an absolute root is dropped; leading `..` on a relative path
/// is kept. An empty result is `.`.
pub fn normalize(path: impl AsRef<Path>) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    let mut rooted = false;

    for comp in path.as_ref().components() {
        match comp {
            Component::Prefix(_) => out.push(comp),
            Component::RootDir => {
                rooted = true;
                out.push(comp);
            }
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                _ if rooted => {}
                _ => out.push(comp),
            },
            Component::Normal(_) => out.push(comp),
        }
    }

    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().collect()
}

/// True for `/x`, `\x`, `C:\x`, `C:/x`, `\\server\share` and `scheme://...`.
pub fn is_absolute_path(path: &str) -> bool {
    match path.as_bytes() {
        [] => false,
        [b'/' | b'\\', ..] => true,
        [drive, b':', b'/' | b'\\', ..] if drive.is_ascii_alphabetic() => true,
        _ => has_url_scheme(path),
    }
}

fn has_url_scheme(path: &str) -> bool {
    let Some((scheme, _)) = path.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn segments(path: &str) -> Vec<String> {
    let unified;
    let path = if cfg!(windows) {
        unified = path.replace('\\', "/");
        unified.as_str()
    } else {
        path
    };

    let mut out: Vec<String> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            s => out.push(s.to_string()),
        }
    }

    // Drive letters compare case-insensitively.
    if cfg!(windows)
        && let Some(first) = out.first_mut()
        && first.len() == 2
        && first.ends_with(':')
    {
        first.make_ascii_lowercase();
    }
    out
}

/// Relative path leading from directory `start` to `end`, always ending in `/`.
///
/// Both inputs must be absolute. Equal paths give `./`.
///
/// ```
/// use fsutil::fs_ops::make_path_relative;
/// assert_eq!(make_path_relative("/home/user/a/.ssh", "/home/user/a/www").unwrap(), "../.ssh/");
/// assert_eq!(make_path_relative("/home/user/a/www/web", "/home/user/a/www").unwrap(), "web/");
/// ```
pub fn make_path_relative(end: impl AsRef<Path>, start: impl AsRef<Path>) -> Result<String> {
    let end = end.as_ref();
    let start = start.as_ref();
    let end_str = end.to_string_lossy();
    let start_str = start.to_string_lossy();

    for (p, s) in [(end, &end_str), (start, &start_str)] {
        if !is_absolute_path(s) {
            return Err(IoError::with_kind(
                Operation::MakePathRelative,
                p,
                io::ErrorKind::InvalidInput,
                "path must be absolute",
            ));
        }
    }

    let end_segs = segments(&end_str);
    let start_segs = segments(&start_str);
    let common = end_segs
        .iter()
        .zip(&start_segs)
        .take_while(|(a, b)| a == b)
        .count();

    let mut rel = "../".repeat(start_segs.len() - common);
    let rest = &end_segs[common..];
    if !rest.is_empty() {
        rel.push_str(&rest.join("/"));
        rel.push('/');
    }
    if rel.is_empty() {
        rel.push_str("./");
    }
    Ok(rel)
}

impl<B: Backend> Filesystem<B> {
    /// True when every path exists (symlinks followed). An empty list is vacuously true.
    pub fn exists(&self, paths: impl Into<Paths>) -> bool {
        paths.into().iter().all(|p| {
            let found = self.backend.metadata(p).is_ok();
            trace!(path = %p.display(), found, "exists");
            found
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use std::time::SystemTime;

    #[test]
    fn normalize_collapses_dots() {
        assert_eq!(normalize("/a/./b/../c"), PathBuf::from("/a/c"));
        assert_eq!(normalize("a/b/../../.."), PathBuf::from(".."));
        assert_eq!(normalize("/.."), PathBuf::from("/"));
        assert_eq!(normalize("./"), PathBuf::from("."));
        assert_eq!(normalize("../x/./y"), PathBuf::from("../x/y"));
    }

    #[test]
    fn normalize_is_idempotent() {
        for p in ["/a/../../b", "x/../../y/./z", "./.", "/", "../../q"] {
            let once = normalize(p);
            assert_eq!(normalize(&once), once, "input {p}");
        }
    }

    #[test]
    fn relative_sibling_and_child() {
        assert_eq!(
            make_path_relative("/home/user/a/.ssh", "/home/user/a/www").unwrap(),
            "../.ssh/"
        );
        assert_eq!(
            make_path_relative("/home/user/a/www/web", "/home/user/a/www").unwrap(),
            "web/"
        );
    }

    #[test]
    fn relative_edge_cases() {
        assert_eq!(make_path_relative("/a/b", "/a/b").unwrap(), "./");
        assert_eq!(make_path_relative("/a/b/", "/a/b/./").unwrap(), "./");
        assert_eq!(make_path_relative("/a", "/a/b/c").unwrap(), "../../");
        assert_eq!(make_path_relative("/x/y", "/a/b").unwrap(), "../../x/y/");
        assert_eq!(make_path_relative("/a/b/../c", "/a").unwrap(), "c/");
    }

    #[test]
    fn relative_rejects_relative_input() {
        let err = make_path_relative("a/b", "/a").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(err.path(), Path::new("a/b"));
        assert_eq!(err.op(), Operation::MakePathRelative);
    }

    #[cfg(windows)]
    #[test]
    fn relative_windows_drive_case() {
        assert_eq!(make_path_relative(r"C:\a\b", r"c:\a").unwrap(), "b/");
    }

    #[test]
    fn absolute_forms() {
        for p in ["/var/lib", "\\share", "C:\\Windows", "c:/tmp", "\\\\server\\x", "vfs://root", "file:///etc"] {
            assert!(is_absolute_path(p), "{p}");
        }
        for p in ["", "var/lib", "C:", "C:foo", "./x", "://nope", "1a://x"] {
            assert!(!is_absolute_path(p), "{p}");
        }
    }

    #[test]
    fn exists_all_or_nothing() {
        let mem = MemoryBackend::new();
        mem.add_file("/a.txt", "", SystemTime::now())
            .add_dir("/d")
            .add_symlink("/gone", "/dangling");
        let fs = Filesystem::with_backend(mem);

        assert!(fs.exists("/a.txt"));
        assert!(fs.exists(["/a.txt"]));
        assert!(fs.exists(vec!["/a.txt", "/d"]));
        assert!(!fs.exists(vec!["/a.txt", "/missing"]));
        assert!(!fs.exists("/dangling"));
        assert!(fs.exists(Vec::<PathBuf>::new()));
    }
}
