use rw_zip::{AddOptions, Method, TimeSpec, ZipArchive};

fn build_tree() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("sub/deeper")).unwrap();
    std::fs::write(dir.path().join("root.txt"), b"root file").unwrap();
    std::fs::write(dir.path().join("sub/nested.txt"), b"nested file").unwrap();
    std::fs::write(dir.path().join("sub/deeper/leaf.txt"), b"leaf").unwrap();
    dir
}

#[test_log::test]
fn adds_a_tree_with_directory_entries() {
    let tree = build_tree();
    let mut zip = ZipArchive::new();
    let added = zip.add_dir_all(tree.path(), &AddOptions::default()).unwrap();
    assert_eq!(added, 5, "3 files + 2 directories");

    let bytes = zip.save_to_bytes().unwrap();
    let mut back = ZipArchive::read_bytes(bytes).unwrap();
    assert!(back.get("sub/").unwrap().is_directory());
    assert!(back.get("sub/deeper/").unwrap().is_directory());
    assert_eq!(back.read("root.txt").unwrap(), b"root file");
    assert_eq!(back.read("sub/deeper/leaf.txt").unwrap(), b"leaf");
}

#[test_log::test]
fn only_files_skips_directory_entries() {
    let tree = build_tree();
    let mut zip = ZipArchive::new();
    let options = AddOptions {
        only_files: true,
        compression_method: Some(Method::Store),
        modified_time: Some(TimeSpec::Rfc3339("2021-03-04T05:06:08Z".into())),
        ..Default::default()
    };
    let added = zip.add_dir_all(tree.path(), &options).unwrap();
    assert_eq!(added, 3);
    assert!(zip.get("sub/").is_none());

    let bytes = zip.save_to_bytes().unwrap();
    let mut back = ZipArchive::read_bytes(bytes).unwrap();
    let entry = back.get("sub/nested.txt").unwrap();
    assert_eq!(entry.method(), Method::Store);
    // DOS timestamps keep 2-second resolution, so the even second survives
    assert_eq!(
        entry.modified().to_rfc3339(),
        "2021-03-04T05:06:08+00:00"
    );
    assert_eq!(back.read("sub/nested.txt").unwrap(), b"nested file");
}

#[test_log::test]
fn seconds_timespec_resolves() {
    let tree = build_tree();
    let mut zip = ZipArchive::new();
    let options = AddOptions {
        only_files: true,
        modified_time: Some(TimeSpec::Seconds(1_600_000_000)),
        ..Default::default()
    };
    zip.add_dir_all(tree.path(), &options).unwrap();
    assert_eq!(
        zip.get("root.txt").unwrap().modified().timestamp(),
        1_600_000_000
    );
}
