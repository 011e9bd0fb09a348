//! Real-disk backend.
//!
//! - New files are created with O_EXCL semantics and fsynced before they are renamed into place.
//! - Renames fsync the destination directory on Unix (best-effort) and clear the target first
//!   on Windows, where MoveFile does not overwrite.
//! - Directory walks go through walkdir without following links.

use filetime::{set_file_times, FileTime};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::trace;
use walkdir::WalkDir;

#[cfg(unix)]
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt};

use super::{Backend, DirEntry, EntryKind, Metadata};

/// Backend over `std::fs`. Stateless; cheap to copy.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsBackend;

impl OsBackend {
    pub fn new() -> Self {
        Self
    }
}

fn kind_of(ft: fs::FileType) -> EntryKind {
    if ft.is_symlink() {
        EntryKind::Symlink
    } else if ft.is_dir() {
        EntryKind::Dir
    } else {
        EntryKind::File
    }
}

#[cfg(unix)]
fn mode_of(meta: &fs::Metadata) -> u32 {
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn mode_of(meta: &fs::Metadata) -> u32 {
    let base = if meta.is_dir() { 0o777 } else { 0o666 };
    if meta.permissions().readonly() {
        base & !0o222
    } else {
        base
    }
}

fn convert(meta: &fs::Metadata) -> Metadata {
    let modified = meta.modified().unwrap_or(UNIX_EPOCH);
    Metadata {
        kind: kind_of(meta.file_type()),
        len: meta.len(),
        modified,
        accessed: meta.accessed().unwrap_or(modified),
        mode: mode_of(meta),
    }
}

#[cfg(unix)]
fn fsync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn fsync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

impl Backend for OsBackend {
    fn metadata(&self, path: &Path) -> io::Result<Metadata> {
        fs::metadata(path).map(|m| convert(&m))
    }

    fn symlink_metadata(&self, path: &Path) -> io::Result<Metadata> {
        fs::symlink_metadata(path).map(|m| convert(&m))
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn create_file(&self, path: &Path) -> io::Result<()> {
        OpenOptions::new().create(true).append(true).open(path)?;
        Ok(())
    }

    fn write_new(&self, path: &Path, contents: &[u8], mode: u32) -> io::Result<()> {
        let mut opts = OpenOptions::new();
        opts.write(true).create_new(true);
        #[cfg(unix)]
        opts.mode(mode);

        let mut f = opts.open(path)?;
        f.write_all(contents)?;
        f.sync_all()?;
        drop(f);
        // The process umask applied at create; pin the exact requested mode.
        self.set_mode(path, mode)
    }

    fn append(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let mut f = OpenOptions::new().create(true).append(true).open(path)?;
        f.write_all(contents)?;
        f.flush()
    }

    fn copy_new(&self, src: &Path, dst: &Path) -> io::Result<u64> {
        let mut src_f = File::open(src)?;
        let mut dst_f = OpenOptions::new().write(true).create_new(true).open(dst)?;
        // std::io::copy between two Files uses copy_file_range/sendfile where available.
        let bytes = io::copy(&mut src_f, &mut dst_f)?;
        dst_f.sync_all()?;
        trace!(src = %src.display(), dst = %dst.display(), bytes, "copied into new file");
        Ok(bytes)
    }

    fn set_times(&self, path: &Path, atime: SystemTime, mtime: SystemTime) -> io::Result<()> {
        set_file_times(
            path,
            FileTime::from_system_time(atime),
            FileTime::from_system_time(mtime),
        )
    }

    #[cfg(unix)]
    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()> {
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
    }

    #[cfg(not(unix))]
    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()> {
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_readonly(mode & 0o222 == 0);
        fs::set_permissions(path, perms)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        #[cfg(windows)]
        {
            if let Ok(meta) = fs::symlink_metadata(to)
                && !meta.is_dir()
            {
                if let Err(e) = fs::remove_file(to)
                    && e.kind() != io::ErrorKind::NotFound
                {
                    return Err(e);
                }
            }
        }

        fs::rename(from, to)?;

        #[cfg(unix)]
        if let Some(parent) = to.parent() {
            // A failed directory fsync must not turn a completed rename into an error.
            let parent = if parent.as_os_str().is_empty() { Path::new(".") } else { parent };
            let _ = fsync_dir(parent);
        }
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        #[cfg(windows)]
        {
            // Directory symlinks/junctions are removed with RemoveDirectory on Windows.
            if let Ok(meta) = fs::symlink_metadata(path)
                && meta.file_type().is_symlink()
                && fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
            {
                return fs::remove_dir(path);
            }
        }
        fs::remove_file(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir(path)
    }

    #[cfg(unix)]
    fn create_dir(&self, path: &Path, mode: u32) -> io::Result<()> {
        fs::DirBuilder::new().mode(mode).create(path)
    }

    #[cfg(not(unix))]
    fn create_dir(&self, path: &Path, _mode: u32) -> io::Result<()> {
        fs::create_dir(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            out.push(DirEntry {
                path: entry.path(),
                kind: kind_of(entry.file_type()?),
            });
        }
        Ok(out)
    }

    #[cfg(unix)]
    fn symlink(&self, original: &Path, link: &Path) -> io::Result<()> {
        std::os::unix::fs::symlink(original, link)
    }

    #[cfg(windows)]
    fn symlink(&self, original: &Path, link: &Path) -> io::Result<()> {
        // Relative link text resolves against the link's directory.
        let resolved = match link.parent() {
            Some(parent) if original.is_relative() => parent.join(original),
            _ => original.to_path_buf(),
        };
        if resolved.is_dir() {
            std::os::windows::fs::symlink_dir(original, link)
        } else {
            std::os::windows::fs::symlink_file(original, link)
        }
    }

    #[cfg(not(any(unix, windows)))]
    fn symlink(&self, _original: &Path, _link: &Path) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "symlinks are not supported on this platform"))
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        fs::read_link(path)
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        dunce::canonicalize(path)
    }

    fn walk(&self, root: &Path) -> io::Result<Vec<DirEntry>> {
        let mut out = Vec::new();
        for entry in WalkDir::new(root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = entry.map_err(io::Error::from)?;
            out.push(DirEntry {
                kind: kind_of(entry.file_type()),
                path: entry.into_path(),
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn copy_new_refuses_existing_destination() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        fs::write(&src, b"data").unwrap();
        fs::write(&dst, b"x").unwrap();

        let err = OsBackend.copy_new(&src, &dst).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read(&dst).unwrap(), b"x");
    }

    #[test]
    fn copy_new_large_file() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("big.bin");
        let dst = dir.path().join("big.out");
        let size = 2 * 1024 * 1024 + 123;
        let data: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        fs::write(&src, &data).unwrap();

        let n = OsBackend.copy_new(&src, &dst).unwrap();
        assert_eq!(n as usize, size);
        assert_eq!(fs::read(&dst).unwrap(), data);
    }

    #[test]
    fn walk_lists_parents_first() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("a/b/f.txt"), b"").unwrap();

        let entries = OsBackend.walk(dir.path()).unwrap();
        let pos = |p: &str| entries.iter().position(|e| e.path == dir.path().join(p)).unwrap();
        assert!(pos("a") < pos("a/b"));
        assert!(pos("a/b") < pos("a/b/f.txt"));
        assert_eq!(entries.len(), 3);
    }

    #[cfg(unix)]
    #[test]
    fn write_new_pins_mode() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("m.txt");
        OsBackend.write_new(&p, b"hi", 0o640).unwrap();
        assert_eq!(OsBackend.metadata(&p).unwrap().mode & 0o777, 0o640);
        assert_eq!(fs::read(&p).unwrap(), b"hi");
    }

    #[cfg(unix)]
    #[test]
    fn symlink_metadata_does_not_follow() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("t.txt");
        let link = dir.path().join("l.txt");
        fs::write(&target, b"t").unwrap();
        OsBackend.symlink(&target, &link).unwrap();

        assert!(OsBackend.symlink_metadata(&link).unwrap().is_symlink());
        assert!(OsBackend.metadata(&link).unwrap().is_file());
        assert_eq!(OsBackend.read_link(&link).unwrap(), target);
    }
}
