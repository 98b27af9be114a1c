use rw_zip::{ExtractOptions, ZipArchive};

fn sample_archive() -> ZipArchive {
    let mut zip = ZipArchive::new();
    zip.add_directory("docs").unwrap();
    zip.add_bytes("docs/guide.txt", b"read the guide".to_vec())
        .unwrap();
    zip.add_bytes("top.txt", b"top level".to_vec()).unwrap();
    // a unix symlink pointing at guide.txt
    let link = zip.add_bytes("docs/latest", b"guide.txt".to_vec()).unwrap();
    link.set_unix_mode(0o120777);
    zip
}

#[test_log::test]
fn extracts_files_and_directories() {
    let dir = tempfile::tempdir().unwrap();
    let mut zip = sample_archive();
    let extracted = zip
        .extract_to_dir(dir.path(), &ExtractOptions::default())
        .unwrap();

    // symlink skipped silently: 2 files + 1 directory
    assert_eq!(extracted, 3);
    assert_eq!(
        std::fs::read(dir.path().join("docs/guide.txt")).unwrap(),
        b"read the guide"
    );
    assert_eq!(std::fs::read(dir.path().join("top.txt")).unwrap(), b"top level");
    assert!(!dir.path().join("docs/latest").exists());
    assert!(dir.path().join("docs/latest").symlink_metadata().is_err());
}

#[cfg(unix)]
#[test_log::test]
fn symlinks_materialize_only_on_opt_in() {
    let dir = tempfile::tempdir().unwrap();
    let mut zip = sample_archive();
    let options = ExtractOptions {
        extract_symlinks: true,
        ..Default::default()
    };
    let extracted = zip.extract_to_dir(dir.path(), &options).unwrap();
    assert_eq!(extracted, 4);

    let link = dir.path().join("docs/latest");
    let meta = link.symlink_metadata().unwrap();
    assert!(meta.file_type().is_symlink());
    assert_eq!(
        std::fs::read_link(&link).unwrap(),
        std::path::PathBuf::from("guide.txt")
    );
    // and it resolves to the extracted file
    assert_eq!(std::fs::read(&link).unwrap(), b"read the guide");
}

#[test_log::test]
fn filter_limits_extraction() {
    let dir = tempfile::tempdir().unwrap();
    let mut zip = sample_archive();
    let options = ExtractOptions {
        filter: Some(Box::new(|e| e.name().ends_with(".txt"))),
        ..Default::default()
    };
    let extracted = zip.extract_to_dir(dir.path(), &options).unwrap();

    assert_eq!(extracted, 2);
    assert!(dir.path().join("top.txt").exists());
    assert!(dir.path().join("docs/guide.txt").exists());
}

#[test_log::test]
fn hostile_names_do_not_escape() {
    // a container can hold any name; extraction is where it must be caught
    let mut zip = ZipArchive::new();
    zip.add_bytes("../escape.txt", b"nope".to_vec()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let err = zip
        .extract_to_dir(dir.path(), &ExtractOptions::default())
        .map(|_| ())
        .expect_err("traversal must be rejected");
    assert!(matches!(err, rw_zip::Error::InvalidName(_)), "got {err:?}");
    assert!(!dir.path().parent().unwrap().join("escape.txt").exists());
}

#[cfg(unix)]
#[test_log::test]
fn permissions_and_mtimes_are_applied() {
    use chrono::TimeZone;
    use std::os::unix::fs::PermissionsExt;

    let mut zip = ZipArchive::new();
    let entry = zip.add_bytes("bin/tool", b"#!/bin/sh\n".to_vec()).unwrap();
    entry.set_unix_mode(0o100755);
    let stamp = chrono::Utc.with_ymd_and_hms(2020, 6, 1, 12, 0, 0).unwrap();
    zip.get_mut("bin/tool").unwrap().set_modified(stamp);

    let dir = tempfile::tempdir().unwrap();
    zip.extract_to_dir(dir.path(), &ExtractOptions::default())
        .unwrap();

    let meta = std::fs::metadata(dir.path().join("bin/tool")).unwrap();
    assert_eq!(meta.permissions().mode() & 0o777, 0o755);
    let mtime = meta.modified().unwrap();
    let expected = std::time::UNIX_EPOCH + std::time::Duration::from_secs(stamp.timestamp() as u64);
    assert_eq!(mtime, expected);
}
