use std::fs;

use fsutil::{Filesystem, Options};
use tempfile::tempdir;

fn leftovers(dir: &std::path::Path) -> Vec<String> {
    fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with(".fsutil.") && n.ends_with(".tmp"))
        .collect()
}

#[test]
fn dump_creates_parents_and_writes() {
    let td = tempdir().unwrap();
    let path = td.path().join("a/b/state.json");

    Filesystem::new().dump_file(&path, r#"{"ok":true}"#).unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), r#"{"ok":true}"#);
    assert!(leftovers(path.parent().unwrap()).is_empty());
}

#[test]
fn dump_replaces_whole_content() {
    let td = tempdir().unwrap();
    let path = td.path().join("file.txt");
    fs::write(&path, "a much longer previous content").unwrap();

    Filesystem::new().dump_file(&path, "short").unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "short");
    assert!(leftovers(td.path()).is_empty());
}

#[test]
fn append_extends_file() {
    let td = tempdir().unwrap();
    let path = td.path().join("log/out.txt");
    let fs_ = Filesystem::new();

    fs_.append_to_file(&path, "one\n").unwrap();
    fs_.append_to_file(&path, "two\n").unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "one\ntwo\n");
}

#[cfg(unix)]
#[test]
fn new_file_mode_honors_umask_and_existing_mode_is_kept() {
    use std::os::unix::fs::PermissionsExt;

    let td = tempdir().unwrap();
    let fs_ = Filesystem::new().with_options(Options {
        file_mode: 0o666,
        umask: 0o027,
        ..Options::default()
    });

    let fresh = td.path().join("fresh.txt");
    fs_.dump_file(&fresh, "x").unwrap();
    let mode = fs::metadata(&fresh).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o640);

    let existing = td.path().join("existing.txt");
    fs::write(&existing, "old").unwrap();
    fs::set_permissions(&existing, fs::Permissions::from_mode(0o600)).unwrap();
    fs_.dump_file(&existing, "new").unwrap();
    let mode = fs::metadata(&existing).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o600);
}
