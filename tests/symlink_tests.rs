#![cfg(unix)]

use std::fs;
use std::io;
use std::path::PathBuf;

use fsutil::Filesystem;
use tempfile::tempdir;

#[test]
fn writing_through_link_modifies_origin() {
    let td = tempdir().unwrap();
    let origin = td.path().join("origin.txt");
    fs::write(&origin, "before").unwrap();
    let link = td.path().join("links/current");

    let fs_ = Filesystem::new();
    fs_.symlink(&origin, &link, false).unwrap();
    fs_.append_to_file(&link, " after").unwrap();

    assert_eq!(fs::read_to_string(&origin).unwrap(), "before after");
    assert_eq!(fs_.read_link(&link, false).unwrap(), Some(origin.clone()));
}

#[test]
fn relinking_same_origin_is_a_noop_but_other_origin_needs_replace() {
    let td = tempdir().unwrap();
    let a = td.path().join("a");
    let b = td.path().join("b");
    fs::write(&a, "a").unwrap();
    fs::write(&b, "b").unwrap();
    let link = td.path().join("link");

    let fs_ = Filesystem::new();
    fs_.symlink(&a, &link, false).unwrap();
    fs_.symlink(&a, &link, false).unwrap();

    let err = fs_.symlink(&b, &link, false).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);

    fs_.symlink(&b, &link, true).unwrap();
    assert_eq!(fs::read_link(&link).unwrap(), b);
}

#[test]
fn replace_swaps_a_directory_for_a_link() {
    let td = tempdir().unwrap();
    let origin = td.path().join("origin");
    fs::create_dir(&origin).unwrap();
    let target = td.path().join("target");
    fs::create_dir_all(target.join("inner")).unwrap();

    Filesystem::new().symlink(&origin, &target, true).unwrap();

    assert!(fs::symlink_metadata(&target).unwrap().file_type().is_symlink());
}

#[test]
fn read_link_canonicalize_resolves_chains() {
    let td = tempdir().unwrap();
    let base = fs::canonicalize(td.path()).unwrap();
    let real = base.join("real.txt");
    fs::write(&real, "x").unwrap();
    std::os::unix::fs::symlink(&real, base.join("one")).unwrap();
    std::os::unix::fs::symlink(base.join("one"), base.join("two")).unwrap();

    let fs_ = Filesystem::new();
    assert_eq!(fs_.read_link(base.join("two"), true).unwrap(), Some(real.clone()));
    assert_eq!(
        fs_.read_link(base.join("two"), false).unwrap(),
        Some(base.join("one"))
    );
    assert_eq!(fs_.read_link(&real, false).unwrap(), None);
    assert_eq!(fs_.read_link(base.join("missing"), true).unwrap(), None::<PathBuf>);
}

#[test]
fn remove_deletes_link_not_target() {
    let td = tempdir().unwrap();
    let dir = td.path().join("keep");
    fs::create_dir(&dir).unwrap();
    fs::write(dir.join("file"), "x").unwrap();
    let link = td.path().join("link");
    std::os::unix::fs::symlink(&dir, &link).unwrap();

    Filesystem::new().remove(&link).unwrap();

    assert!(fs::symlink_metadata(&link).is_err());
    assert!(dir.join("file").exists());
}
