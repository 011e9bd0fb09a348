//! Default path helpers and symlink checks.

use dirs::config_dir;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "FSUTIL_CONFIG";

/// OS-appropriate default config path: `<config dir>/fsutil/config.xml`.
pub fn default_config_path() -> Option<PathBuf> {
    if let Some(mut base) = config_dir() {
        base.push("fsutil");
        base.push("config.xml");
        Some(base)
    } else {
        env::var("HOME").ok().map(|h| {
            PathBuf::from(h)
                .join(".config")
                .join("fsutil")
                .join("config.xml")
        })
    }
}

/// `$FSUTIL_CONFIG` when set and non-empty, else the default path.
pub fn config_path() -> Option<PathBuf> {
    match env::var_os(CONFIG_ENV) {
        Some(p) if !p.is_empty() => Some(PathBuf::from(p)),
        _ => default_config_path(),
    }
}

/// Return true if any existing ancestor of `path` is a symlink.
pub fn path_has_symlink_ancestor(path: &Path) -> io::Result<bool> {
    let mut p = path.parent();
    while let Some(anc) = p {
        if anc.as_os_str().is_empty() {
            break;
        }
        match fs::symlink_metadata(anc) {
            Ok(meta) if meta.file_type().is_symlink() => return Ok(true),
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        p = anc.parent();
    }
    Ok(false)
}
