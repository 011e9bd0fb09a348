//! Unique hidden sibling names for write-then-rename.
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Pattern: `<dir>/.fsutil.<name>.<pid>.<nanos>.<seq>.tmp`, in the same directory as `target`
/// so the final rename never crosses a filesystem boundary.
pub(crate) fn temp_sibling(target: &Path) -> PathBuf {
    let pid = std::process::id();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let stem = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".into());
    let name = format!(".fsutil.{stem}.{pid}.{nanos}.{seq}.tmp");
    target.parent().unwrap_or_else(|| Path::new(".")).join(name)
}

#[cfg(test)]
pub(crate) fn is_temp_name(name: &str) -> bool {
    name.starts_with(".fsutil.") && name.ends_with(".tmp")
}
