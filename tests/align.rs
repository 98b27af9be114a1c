use rw_zip::{Method, ZipArchive};

/// Walks contiguous local records, returning `(name, payload_offset)`.
fn payload_offsets(bytes: &[u8]) -> Vec<(String, u64)> {
    let mut out = Vec::new();
    let mut offset = 0usize;
    while bytes[offset..].starts_with(b"PK\x03\x04") {
        let name_len = u16::from_le_bytes([bytes[offset + 26], bytes[offset + 27]]) as usize;
        let extra_len = u16::from_le_bytes([bytes[offset + 28], bytes[offset + 29]]) as usize;
        let compressed = u32::from_le_bytes([
            bytes[offset + 18],
            bytes[offset + 19],
            bytes[offset + 20],
            bytes[offset + 21],
        ]) as usize;
        let name = String::from_utf8(bytes[offset + 30..offset + 30 + name_len].to_vec()).unwrap();
        let payload_offset = offset + 30 + name_len + extra_len;
        out.push((name, payload_offset as u64));
        offset = payload_offset + compressed;
    }
    out
}

#[test_log::test]
fn stored_entries_align_and_so_files_get_4096() {
    let mut zip = ZipArchive::new();
    zip.add_bytes("lib/a.so", vec![0x7f; 300]).unwrap();
    zip.add_bytes("meta.txt", b"metadata".to_vec()).unwrap();
    for name in ["lib/a.so", "meta.txt"] {
        zip.get_mut(name).unwrap().set_method(Method::Store).unwrap();
    }
    zip.set_alignment(Some(4)).unwrap();
    let bytes = zip.save_to_bytes().unwrap();

    let offsets = payload_offsets(&bytes);
    let so = offsets.iter().find(|(n, _)| n == "lib/a.so").unwrap();
    let meta = offsets.iter().find(|(n, _)| n == "meta.txt").unwrap();
    assert_eq!(so.1 % 4096, 0, "shared objects align to 4096");
    assert_eq!(meta.1 % 4, 0, "stored entries align to the multiple");

    // padding must not confuse a reader
    let mut back = ZipArchive::read_bytes(bytes).unwrap();
    assert_eq!(back.read("lib/a.so").unwrap(), vec![0x7f; 300]);
    assert_eq!(back.read("meta.txt").unwrap(), b"metadata");
}

#[test_log::test]
fn compressed_and_encrypted_entries_are_not_padded() {
    let deflatable = "pad me not\n".repeat(200).into_bytes();
    let mut zip = ZipArchive::new();
    zip.add_bytes("text.txt", deflatable).unwrap();
    zip.get_mut("text.txt")
        .unwrap()
        .set_method(Method::Deflate)
        .unwrap();
    zip.add_bytes("sealed.bin", vec![1u8; 64]).unwrap();
    zip.get_mut("sealed.bin").unwrap().set_method(Method::Store).unwrap();
    zip.set_entry_password("sealed.bin", Some("pw"), None).unwrap();
    zip.set_alignment(Some(1024)).unwrap();
    let bytes = zip.save_to_bytes().unwrap();

    // neither local header carries the padding field
    let mut offset = 0usize;
    while bytes[offset..].starts_with(b"PK\x03\x04") {
        let name_len = u16::from_le_bytes([bytes[offset + 26], bytes[offset + 27]]) as usize;
        let extra_len = u16::from_le_bytes([bytes[offset + 28], bytes[offset + 29]]) as usize;
        let compressed = u32::from_le_bytes([
            bytes[offset + 18],
            bytes[offset + 19],
            bytes[offset + 20],
            bytes[offset + 21],
        ]) as usize;
        let extra_start = offset + 30 + name_len;
        let extra = &bytes[extra_start..extra_start + extra_len];
        let mut at = 0;
        while at + 4 <= extra.len() {
            let tag = u16::from_le_bytes([extra[at], extra[at + 1]]);
            let size = u16::from_le_bytes([extra[at + 2], extra[at + 3]]) as usize;
            assert_ne!(tag, 0xd935, "unexpected apk alignment field");
            at += 4 + size;
        }
        offset = extra_start + extra_len + compressed;
    }
}

#[test_log::test]
fn alignment_applies_to_copied_entries_too() {
    let mut zip = ZipArchive::new();
    zip.add_bytes("lib/b.so", vec![0x42; 100]).unwrap();
    zip.get_mut("lib/b.so").unwrap().set_method(Method::Store).unwrap();
    let unaligned = zip.save_to_bytes().unwrap();

    let mut back = ZipArchive::read_bytes(unaligned).unwrap();
    back.set_alignment(Some(4)).unwrap();
    // a new entry in front shifts the copied one around
    back.add_bytes("0-prefix.txt", b"shift things".to_vec()).unwrap();
    let aligned = back.save_to_bytes().unwrap();

    let offsets = payload_offsets(&aligned);
    let so = offsets.iter().find(|(n, _)| n == "lib/b.so").unwrap();
    assert_eq!(so.1 % 4096, 0);

    let mut reread = ZipArchive::read_bytes(aligned).unwrap();
    assert_eq!(reread.read("lib/b.so").unwrap(), vec![0x42; 100]);
}