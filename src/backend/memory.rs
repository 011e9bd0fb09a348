//! In-memory backend.
//!
//! A single `BTreeMap` keyed by normalized absolute paths. The root `/` always exists.
//! Relative paths are taken relative to `/`. Symlinks are stored as link text and
//! resolved on lookup, both for intermediate components and (when asked) the final one.
//!
//! `fail_next` arms a one-shot failure for the next call of a given primitive, which is
//! how callers exercise cleanup paths (a rename that fails after the temp file is written,
//! a cross-device rename, ...).

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;

use super::{Backend, DirEntry, EntryKind, Metadata};
use crate::fs_ops::path_ops::normalize;

const MAX_LINK_HOPS: usize = 40;
const NEW_FILE_MODE: u32 = 0o644;
const NEW_DIR_MODE: u32 = 0o755;

/// Primitive whose next invocation should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    Rename,
    /// Rename fails with the platform's cross-device error code.
    CrossDeviceRename,
    WriteNew,
    CopyNew,
    /// `copy_new` succeeds but writes only the first half of the source.
    ShortCopy,
    Append,
    SetTimes,
    CreateDir,
    RemoveFile,
    RemoveDir,
    Symlink,
}

impl FaultPoint {
    fn error(self) -> io::Error {
        match self {
            #[cfg(unix)]
            FaultPoint::CrossDeviceRename => io::Error::from_raw_os_error(libc::EXDEV),
            #[cfg(windows)]
            FaultPoint::CrossDeviceRename => io::Error::from_raw_os_error(17),
            other => io::Error::other(format!("injected {other:?} failure")),
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    File {
        data: Vec<u8>,
        mtime: SystemTime,
        atime: SystemTime,
        mode: u32,
    },
    Dir {
        mtime: SystemTime,
        mode: u32,
    },
    Symlink {
        target: PathBuf,
        mtime: SystemTime,
    },
}

impl Node {
    fn kind(&self) -> EntryKind {
        match self {
            Node::File { .. } => EntryKind::File,
            Node::Dir { .. } => EntryKind::Dir,
            Node::Symlink { .. } => EntryKind::Symlink,
        }
    }

    fn metadata(&self) -> Metadata {
        match self {
            Node::File {
                data,
                mtime,
                atime,
                mode,
            } => Metadata {
                kind: EntryKind::File,
                len: data.len() as u64,
                modified: *mtime,
                accessed: *atime,
                mode: *mode,
            },
            Node::Dir { mtime, mode } => Metadata {
                kind: EntryKind::Dir,
                len: 0,
                modified: *mtime,
                accessed: *mtime,
                mode: *mode,
            },
            Node::Symlink { target, mtime } => Metadata {
                kind: EntryKind::Symlink,
                len: target.as_os_str().len() as u64,
                modified: *mtime,
                accessed: *mtime,
                mode: 0o777,
            },
        }
    }

    fn new_file(data: Vec<u8>, mode: u32) -> Self {
        let now = SystemTime::now();
        Node::File {
            data,
            mtime: now,
            atime: now,
            mode,
        }
    }

    fn new_dir(mode: u32) -> Self {
        Node::Dir {
            mtime: SystemTime::now(),
            mode,
        }
    }
}

fn key(path: &Path) -> PathBuf {
    normalize(&Path::new("/").join(path))
}

fn names(path: &Path) -> Vec<OsString> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(n) => Some(n.to_os_string()),
            _ => None,
        })
        .collect()
}

fn err(kind: io::ErrorKind) -> io::Error {
    io::Error::from(kind)
}

#[derive(Debug, Default)]
struct State {
    nodes: BTreeMap<PathBuf, Node>,
    faults: Vec<FaultPoint>,
}

impl State {
    fn take_fault(&mut self, point: FaultPoint) -> io::Result<()> {
        if let Some(i) = self.faults.iter().position(|f| *f == point) {
            self.faults.remove(i);
            return Err(point.error());
        }
        Ok(())
    }

    /// Map `path` to the key it designates, expanding symlinks in every intermediate
    /// component and in the final one when `follow_final` is set. The result need not exist.
    fn resolve(&self, path: &Path, follow_final: bool) -> io::Result<PathBuf> {
        let mut pending = names(&key(path));
        pending.reverse();
        let mut cur = PathBuf::from("/");
        let mut hops = 0;

        while let Some(name) = pending.pop() {
            let next = cur.join(&name);
            let last = pending.is_empty();
            match self.nodes.get(&next) {
                Some(Node::Symlink { target, .. }) if follow_final || !last => {
                    hops += 1;
                    if hops > MAX_LINK_HOPS {
                        return Err(io::Error::other("too many levels of symbolic links"));
                    }
                    let mut dest = names(&key(&cur.join(target)));
                    dest.reverse();
                    pending.extend(dest);
                    cur = PathBuf::from("/");
                }
                Some(Node::File { .. }) if !last => return Err(err(io::ErrorKind::NotADirectory)),
                _ => cur = next,
            }
        }
        Ok(cur)
    }

    fn get(&self, path: &Path, follow: bool) -> io::Result<(PathBuf, &Node)> {
        let at = self.resolve(path, follow)?;
        match self.nodes.get(&at) {
            Some(node) => Ok((at, node)),
            None => Err(err(io::ErrorKind::NotFound)),
        }
    }

    fn check_parent(&self, at: &Path) -> io::Result<()> {
        let Some(parent) = at.parent() else {
            return Ok(());
        };
        match self.nodes.get(parent) {
            Some(Node::Dir { .. }) => Ok(()),
            Some(_) => Err(err(io::ErrorKind::NotADirectory)),
            None => Err(err(io::ErrorKind::NotFound)),
        }
    }

    fn has_children(&self, dir: &Path) -> bool {
        self.nodes.keys().any(|k| k.parent() == Some(dir))
    }

    fn insert_with_ancestors(&mut self, at: PathBuf, node: Node) {
        for ancestor in at.ancestors().skip(1) {
            self.nodes
                .entry(ancestor.to_path_buf())
                .or_insert_with(|| Node::new_dir(NEW_DIR_MODE));
        }
        self.nodes.insert(at, node);
    }
}

/// Mutex-guarded in-memory tree implementing [`Backend`].
#[derive(Debug)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        let mut state = State::default();
        state
            .nodes
            .insert(PathBuf::from("/"), Node::new_dir(NEW_DIR_MODE));
        Self {
            state: Mutex::new(state),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A panicking test thread must not wedge the others.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make the next call of `point` fail. Faults queue up and are consumed in order.
    pub fn fail_next(&self, point: FaultPoint) {
        self.state().faults.push(point);
    }

    /// Create a directory and any missing ancestors.
    pub fn add_dir(&self, path: impl AsRef<Path>) -> &Self {
        let at = key(path.as_ref());
        let mut st = self.state();
        if !st.nodes.contains_key(&at) {
            st.insert_with_ancestors(at, Node::new_dir(NEW_DIR_MODE));
        }
        drop(st);
        self
    }

    /// Create (or replace) a file with a given modification time; ancestors are created.
    pub fn add_file(
        &self,
        path: impl AsRef<Path>,
        content: impl AsRef<[u8]>,
        mtime: SystemTime,
    ) -> &Self {
        let node = Node::File {
            data: content.as_ref().to_vec(),
            mtime,
            atime: mtime,
            mode: NEW_FILE_MODE,
        };
        self.state().insert_with_ancestors(key(path.as_ref()), node);
        self
    }

    pub fn add_symlink(&self, original: impl AsRef<Path>, link: impl AsRef<Path>) -> &Self {
        let node = Node::Symlink {
            target: original.as_ref().to_path_buf(),
            mtime: SystemTime::now(),
        };
        self.state().insert_with_ancestors(key(link.as_ref()), node);
        self
    }

    /// Bytes of the file at `path` (symlinks followed), if it is a file.
    pub fn file_content(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        let st = self.state();
        match st.get(path.as_ref(), true) {
            Ok((_, Node::File { data, .. })) => Some(data.clone()),
            _ => None,
        }
    }

    /// Every key in the tree, sorted, root included.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.state().nodes.keys().cloned().collect()
    }
}

impl Backend for MemoryBackend {
    fn metadata(&self, path: &Path) -> io::Result<Metadata> {
        let st = self.state();
        st.get(path, true).map(|(_, node)| node.metadata())
    }

    fn symlink_metadata(&self, path: &Path) -> io::Result<Metadata> {
        let st = self.state();
        st.get(path, false).map(|(_, node)| node.metadata())
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let st = self.state();
        match st.get(path, true)? {
            (_, Node::File { data, .. }) => Ok(data.clone()),
            _ => Err(err(io::ErrorKind::IsADirectory)),
        }
    }

    fn create_file(&self, path: &Path) -> io::Result<()> {
        let mut st = self.state();
        let at = st.resolve(path, true)?;
        match st.nodes.get(&at) {
            Some(Node::Dir { .. }) => Err(err(io::ErrorKind::IsADirectory)),
            Some(_) => Ok(()),
            None => {
                st.check_parent(&at)?;
                st.nodes.insert(at, Node::new_file(Vec::new(), NEW_FILE_MODE));
                Ok(())
            }
        }
    }

    fn write_new(&self, path: &Path, contents: &[u8], mode: u32) -> io::Result<()> {
        let mut st = self.state();
        st.take_fault(FaultPoint::WriteNew)?;
        let at = st.resolve(path, false)?;
        if st.nodes.contains_key(&at) {
            return Err(err(io::ErrorKind::AlreadyExists));
        }
        st.check_parent(&at)?;
        st.nodes.insert(at, Node::new_file(contents.to_vec(), mode));
        Ok(())
    }

    fn append(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let mut st = self.state();
        st.take_fault(FaultPoint::Append)?;
        let at = st.resolve(path, true)?;
        match st.nodes.get_mut(&at) {
            Some(Node::File { data, mtime, .. }) => {
                data.extend_from_slice(contents);
                *mtime = SystemTime::now();
                Ok(())
            }
            Some(_) => Err(err(io::ErrorKind::IsADirectory)),
            None => {
                st.check_parent(&at)?;
                st.nodes
                    .insert(at, Node::new_file(contents.to_vec(), NEW_FILE_MODE));
                Ok(())
            }
        }
    }

    fn copy_new(&self, src: &Path, dst: &Path) -> io::Result<u64> {
        let mut st = self.state();
        st.take_fault(FaultPoint::CopyNew)?;
        let mut data = match st.get(src, true)? {
            (_, Node::File { data, .. }) => data.clone(),
            _ => return Err(err(io::ErrorKind::IsADirectory)),
        };
        if st.take_fault(FaultPoint::ShortCopy).is_err() {
            data.truncate(data.len() / 2);
        }
        let at = st.resolve(dst, false)?;
        if st.nodes.contains_key(&at) {
            return Err(err(io::ErrorKind::AlreadyExists));
        }
        st.check_parent(&at)?;
        let len = data.len() as u64;
        st.nodes.insert(at, Node::new_file(data, NEW_FILE_MODE));
        Ok(len)
    }

    fn set_times(&self, path: &Path, atime: SystemTime, mtime: SystemTime) -> io::Result<()> {
        let mut st = self.state();
        st.take_fault(FaultPoint::SetTimes)?;
        let at = st.resolve(path, true)?;
        match st.nodes.get_mut(&at) {
            Some(Node::File {
                mtime: m, atime: a, ..
            }) => {
                *m = mtime;
                *a = atime;
                Ok(())
            }
            Some(Node::Dir { mtime: m, .. }) => {
                *m = mtime;
                Ok(())
            }
            _ => Err(err(io::ErrorKind::NotFound)),
        }
    }

    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()> {
        let mut st = self.state();
        let at = st.resolve(path, true)?;
        match st.nodes.get_mut(&at) {
            Some(Node::File { mode: m, .. }) | Some(Node::Dir { mode: m, .. }) => {
                *m = mode & 0o7777;
                Ok(())
            }
            _ => Err(err(io::ErrorKind::NotFound)),
        }
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let mut st = self.state();
        st.take_fault(FaultPoint::CrossDeviceRename)?;
        st.take_fault(FaultPoint::Rename)?;

        let (from_at, from_node) = st.get(from, false)?;
        let from_is_dir = matches!(from_node, Node::Dir { .. });
        let to_at = st.resolve(to, false)?;
        if from_at == to_at {
            return Ok(());
        }
        if to_at.starts_with(&from_at) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot move a directory into itself",
            ));
        }
        st.check_parent(&to_at)?;

        match st.nodes.get(&to_at) {
            Some(Node::Dir { .. }) if !from_is_dir => return Err(err(io::ErrorKind::IsADirectory)),
            Some(Node::Dir { .. }) if st.has_children(&to_at) => {
                return Err(err(io::ErrorKind::DirectoryNotEmpty));
            }
            Some(Node::Dir { .. }) => {}
            Some(_) if from_is_dir => return Err(err(io::ErrorKind::NotADirectory)),
            _ => {}
        }
        st.nodes.remove(&to_at);

        let moved: Vec<PathBuf> = st
            .nodes
            .keys()
            .filter(|k| k.starts_with(&from_at))
            .cloned()
            .collect();
        for old in moved {
            let Some(node) = st.nodes.remove(&old) else {
                continue;
            };
            let new = match old.strip_prefix(&from_at) {
                Ok(rest) if !rest.as_os_str().is_empty() => to_at.join(rest),
                _ => to_at.clone(),
            };
            st.nodes.insert(new, node);
        }
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        let mut st = self.state();
        st.take_fault(FaultPoint::RemoveFile)?;
        let (at, node) = st.get(path, false)?;
        if matches!(node, Node::Dir { .. }) {
            return Err(err(io::ErrorKind::IsADirectory));
        }
        st.nodes.remove(&at);
        Ok(())
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        let mut st = self.state();
        st.take_fault(FaultPoint::RemoveDir)?;
        let (at, node) = st.get(path, false)?;
        if !matches!(node, Node::Dir { .. }) {
            return Err(err(io::ErrorKind::NotADirectory));
        }
        if at.parent().is_none() {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "cannot remove the root directory",
            ));
        }
        if st.has_children(&at) {
            return Err(err(io::ErrorKind::DirectoryNotEmpty));
        }
        st.nodes.remove(&at);
        Ok(())
    }

    fn create_dir(&self, path: &Path, mode: u32) -> io::Result<()> {
        let mut st = self.state();
        st.take_fault(FaultPoint::CreateDir)?;
        let at = st.resolve(path, false)?;
        if st.nodes.contains_key(&at) {
            return Err(err(io::ErrorKind::AlreadyExists));
        }
        st.check_parent(&at)?;
        st.nodes.insert(at, Node::new_dir(mode));
        Ok(())
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let st = self.state();
        let (at, node) = st.get(path, true)?;
        if !matches!(node, Node::Dir { .. }) {
            return Err(err(io::ErrorKind::NotADirectory));
        }
        let entries = st
            .nodes
            .iter()
            .filter(|(k, _)| k.parent() == Some(at.as_path()))
            .filter_map(|(k, node)| {
                k.file_name().map(|name| DirEntry {
                    path: path.join(name),
                    kind: node.kind(),
                })
            })
            .collect();
        Ok(entries)
    }

    fn symlink(&self, original: &Path, link: &Path) -> io::Result<()> {
        let mut st = self.state();
        st.take_fault(FaultPoint::Symlink)?;
        let at = st.resolve(link, false)?;
        if st.nodes.contains_key(&at) {
            return Err(err(io::ErrorKind::AlreadyExists));
        }
        st.check_parent(&at)?;
        st.nodes.insert(
            at,
            Node::Symlink {
                target: original.to_path_buf(),
                mtime: SystemTime::now(),
            },
        );
        Ok(())
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        let st = self.state();
        match st.get(path, false)? {
            (_, Node::Symlink { target, .. }) => Ok(target.clone()),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "not a symbolic link",
            )),
        }
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        let st = self.state();
        st.get(path, true).map(|(at, _)| at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    fn t(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn root_always_present() {
        let fs = MemoryBackend::new();
        assert!(fs.metadata(Path::new("/")).unwrap().is_dir());
        assert!(fs.remove_dir(Path::new("/")).is_err());
    }

    #[test]
    fn add_file_creates_ancestors() {
        let fs = MemoryBackend::new();
        fs.add_file("/a/b/c.txt", "x", t(10));
        assert!(fs.metadata(Path::new("/a/b")).unwrap().is_dir());
        let meta = fs.metadata(Path::new("/a/b/c.txt")).unwrap();
        assert_eq!(meta.len, 1);
        assert_eq!(meta.modified, t(10));
    }

    #[test]
    fn write_new_requires_parent_and_absence() {
        let fs = MemoryBackend::new();
        let err = fs.write_new(Path::new("/missing/f"), b"", 0o644).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);

        fs.add_file("/f", "old", t(1));
        let err = fs.write_new(Path::new("/f"), b"new", 0o644).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs.file_content("/f").unwrap(), b"old");
    }

    #[test]
    fn rename_moves_subtree() {
        let fs = MemoryBackend::new();
        fs.add_file("/src/a/one.txt", "1", t(1))
            .add_file("/src/two.txt", "2", t(1))
            .add_dir("/dst");
        fs.rename(Path::new("/src"), Path::new("/dst/moved")).unwrap();

        assert_eq!(fs.file_content("/dst/moved/a/one.txt").unwrap(), b"1");
        assert_eq!(fs.file_content("/dst/moved/two.txt").unwrap(), b"2");
        assert!(fs.paths().iter().all(|p| !p.starts_with("/src")));
    }

    #[test]
    fn rename_replaces_file_but_not_full_dir() {
        let fs = MemoryBackend::new();
        fs.add_file("/a", "a", t(1)).add_file("/b", "b", t(1));
        fs.rename(Path::new("/a"), Path::new("/b")).unwrap();
        assert_eq!(fs.file_content("/b").unwrap(), b"a");

        fs.add_dir("/d1").add_file("/d2/keep", "", t(1));
        let err = fs.rename(Path::new("/d1"), Path::new("/d2")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::DirectoryNotEmpty);
    }

    #[test]
    fn symlinks_resolve_through_directories() {
        let fs = MemoryBackend::new();
        fs.add_file("/real/dir/f.txt", "hello", t(1))
            .add_symlink("real/dir", "/alias");
        assert_eq!(fs.file_content("/alias/f.txt").unwrap(), b"hello");
        assert_eq!(
            fs.canonicalize(Path::new("/alias/f.txt")).unwrap(),
            PathBuf::from("/real/dir/f.txt")
        );
        assert!(fs.symlink_metadata(Path::new("/alias")).unwrap().is_symlink());
        assert!(fs.metadata(Path::new("/alias")).unwrap().is_dir());
    }

    #[test]
    fn symlink_cycle_is_an_error() {
        let fs = MemoryBackend::new();
        fs.add_symlink("/b", "/a").add_symlink("/a", "/b");
        assert!(fs.metadata(Path::new("/a")).is_err());
        assert!(fs.symlink_metadata(Path::new("/a")).unwrap().is_symlink());
    }

    #[test]
    fn fault_fires_once() {
        let fs = MemoryBackend::new();
        fs.add_file("/a", "", t(1));
        fs.fail_next(FaultPoint::Rename);
        assert!(fs.rename(Path::new("/a"), Path::new("/b")).is_err());
        fs.rename(Path::new("/a"), Path::new("/b")).unwrap();
        assert!(fs.file_content("/b").is_some());
    }

    #[test]
    fn walk_is_parent_first_and_skips_link_targets() {
        let fs = MemoryBackend::new();
        fs.add_file("/r/x/y.txt", "", t(1))
            .add_dir("/outside/deep")
            .add_symlink("/outside", "/r/link");
        let walked: Vec<PathBuf> = fs
            .walk(Path::new("/r"))
            .unwrap()
            .into_iter()
            .map(|e| e.path)
            .collect();
        assert_eq!(
            walked,
            vec![
                PathBuf::from("/r/link"),
                PathBuf::from("/r/x"),
                PathBuf::from("/r/x/y.txt"),
            ]
        );
    }

    #[test]
    fn remove_dir_refuses_non_empty() {
        let fs = MemoryBackend::new();
        fs.add_file("/d/f", "", t(1));
        let err = fs.remove_dir(Path::new("/d")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::DirectoryNotEmpty);
        fs.remove_file(Path::new("/d/f")).unwrap();
        fs.remove_dir(Path::new("/d")).unwrap();
    }
}
