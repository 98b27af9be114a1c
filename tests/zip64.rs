use rw_zip::{Method, ZipArchive};

fn archive_with_entries(count: usize) -> ZipArchive {
    let mut zip = ZipArchive::new();
    for i in 0..count {
        let mut entry = rw_zip::Entry::new(
            format!("e{i:05}"),
            rw_zip::EntrySource::Bytes(b"x".to_vec()),
        )
        .unwrap();
        entry.set_method(Method::Store).unwrap();
        zip.add(entry);
    }
    zip
}

fn eocd_offset(bytes: &[u8]) -> usize {
    bytes
        .windows(4)
        .rposition(|w| w == b"PK\x05\x06")
        .expect("eocd present")
}

fn u16_at(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn u64_at(bytes: &[u8], at: usize) -> u64 {
    u64::from_le_bytes(bytes[at..at + 8].try_into().unwrap())
}

#[test_log::test]
fn entry_count_at_the_classic_limit_stays_classic() {
    let mut zip = archive_with_entries(0xffff);
    let bytes = zip.save_to_bytes().unwrap();

    let eocd = eocd_offset(&bytes);
    assert_eq!(u16_at(&bytes, eocd + 10), 0xffff, "true count fits");
    assert!(
        !bytes[eocd.saturating_sub(20)..eocd].starts_with(b"PK\x06\x07"),
        "no zip64 locator for 65535 entries"
    );

    let back = ZipArchive::read_bytes(bytes).unwrap();
    assert_eq!(back.len(), 0xffff);
}

#[test_log::test]
fn one_more_entry_promotes_to_zip64() {
    let mut zip = archive_with_entries(0x10000);
    let bytes = zip.save_to_bytes().unwrap();

    // classic record holds the sentinel
    let eocd = eocd_offset(&bytes);
    assert_eq!(u16_at(&bytes, eocd + 10), 0xffff);

    // the locator sits immediately before the classic record and points at
    // a zip64 record carrying the true count
    let locator = eocd - 20;
    assert!(bytes[locator..].starts_with(b"PK\x06\x07"));
    let eocd64 = u64_at(&bytes, locator + 8) as usize;
    assert!(bytes[eocd64..].starts_with(b"PK\x06\x06"));
    assert_eq!(u64_at(&bytes, eocd64 + 32), 0x10000, "true entry count");

    let mut back = ZipArchive::read_bytes(bytes).unwrap();
    assert_eq!(back.len(), 0x10000);
    assert_eq!(back.read("e65535").unwrap(), b"x");
}
