use std::fs;
use std::time::{Duration, SystemTime};

use assert_fs::prelude::*;
use filetime::{set_file_mtime, FileTime};
use fsutil::{Filesystem, MirrorOptions};

fn populate(root: &assert_fs::TempDir) -> assert_fs::fixture::ChildPath {
    let src = root.child("source");
    src.child("a.txt").write_str("a").unwrap();
    src.child("sub/b.txt").write_str("b").unwrap();
    src.child("sub/deeper/c.txt").write_str("c").unwrap();
    src.child("empty").create_dir_all().unwrap();
    src
}

#[test]
fn mirror_copies_whole_tree() {
    let root = assert_fs::TempDir::new().unwrap();
    let src = populate(&root);
    let dst = root.child("mirror");

    let report = Filesystem::new()
        .mirror(src.path(), dst.path(), MirrorOptions::default())
        .unwrap();

    dst.child("a.txt").assert("a");
    dst.child("sub/b.txt").assert("b");
    dst.child("sub/deeper/c.txt").assert("c");
    assert!(dst.child("empty").path().is_dir());
    assert_eq!(report.files_copied, 3);
}

#[test]
fn second_mirror_copies_nothing() {
    let root = assert_fs::TempDir::new().unwrap();
    let src = populate(&root);
    let dst = root.child("mirror");
    let fs_ = Filesystem::new();

    fs_.mirror(src.path(), dst.path(), MirrorOptions::default())
        .unwrap();
    let again = fs_
        .mirror(src.path(), dst.path(), MirrorOptions::default())
        .unwrap();

    assert_eq!(again.files_copied, 0);
    assert_eq!(again.files_skipped, 3);
    assert_eq!(again.dirs_created, 0);
}

#[test]
fn newer_destination_file_survives_unless_overridden() {
    let root = assert_fs::TempDir::new().unwrap();
    let src = populate(&root);
    let dst = root.child("mirror");
    dst.child("a.txt").write_str("edited").unwrap();
    let old = SystemTime::now() - Duration::from_secs(3600);
    set_file_mtime(src.child("a.txt").path(), FileTime::from_system_time(old)).unwrap();

    let fs_ = Filesystem::new();
    fs_.mirror(src.path(), dst.path(), MirrorOptions::default())
        .unwrap();
    dst.child("a.txt").assert("edited");

    let forced = MirrorOptions {
        override_newer: true,
        ..Default::default()
    };
    fs_.mirror(src.path(), dst.path(), forced).unwrap();
    dst.child("a.txt").assert("a");
}

#[test]
fn extras_are_removed_only_with_delete() {
    let root = assert_fs::TempDir::new().unwrap();
    let src = populate(&root);
    let dst = root.child("mirror");
    dst.child("stale.txt").write_str("old").unwrap();
    dst.child("gone/x.txt").write_str("x").unwrap();

    let fs_ = Filesystem::new();
    fs_.mirror(src.path(), dst.path(), MirrorOptions::default())
        .unwrap();
    assert!(dst.child("stale.txt").path().exists());

    let report = fs_
        .mirror(
            src.path(),
            dst.path(),
            MirrorOptions {
                delete: true,
                ..Default::default()
            },
        )
        .unwrap();
    assert!(!dst.child("stale.txt").path().exists());
    assert!(!dst.child("gone").path().exists());
    assert!(report.removed >= 2);
    dst.child("sub/b.txt").assert("b");
}

#[test]
fn delete_into_enclosing_directory_keeps_source() {
    let root = assert_fs::TempDir::new().unwrap();
    root.child("sub/a.txt").write_str("a").unwrap();
    root.child("sub/nested/b.txt").write_str("b").unwrap();
    root.child("leftover.txt").write_str("x").unwrap();
    let src = root.path().join("sub");

    let report = Filesystem::new()
        .mirror(
            &src,
            root.path(),
            MirrorOptions {
                delete: true,
                ..Default::default()
            },
        )
        .unwrap();

    root.child("sub/a.txt").assert("a");
    root.child("sub/nested/b.txt").assert("b");
    root.child("a.txt").assert("a");
    root.child("nested/b.txt").assert("b");
    assert!(!root.child("leftover.txt").path().exists());
    assert_eq!(report.removed, 1);
}

#[test]
fn mirror_into_sibling_of_source() {
    // Same layout as a typical "source/../testmirror" call.
    let root = assert_fs::TempDir::new().unwrap();
    let src = populate(&root);
    let target = src.path().join("..").join("testmirror");

    Filesystem::new()
        .mirror(src.path(), &target, MirrorOptions::default())
        .unwrap();

    assert_eq!(
        fs::read_to_string(root.path().join("testmirror/sub/deeper/c.txt")).unwrap(),
        "c"
    );
}

#[cfg(unix)]
#[test]
fn links_are_recreated_not_followed() {
    let root = assert_fs::TempDir::new().unwrap();
    let src = populate(&root);
    std::os::unix::fs::symlink("sub/b.txt", src.path().join("link")).unwrap();
    let dst = root.child("mirror");

    let report = Filesystem::new()
        .mirror(src.path(), dst.path(), MirrorOptions::default())
        .unwrap();

    let link = dst.path().join("link");
    assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
    assert_eq!(
        fs::read_link(&link).unwrap(),
        std::path::PathBuf::from("sub/b.txt")
    );
    assert_eq!(report.links_created, 1);
}
