use rw_zip::{AuthError, EncryptionMethod, Error, Method, ZipArchive};

fn assert_auth_fail(result: Result<Vec<u8>, Error>) {
    match result.map(|_| ()) {
        Err(Error::Auth(e)) => match e {
            AuthError::PkwareCheckByteMismatch
            | AuthError::AesVerifierMismatch
            | AuthError::AesHmacMismatch => {}
            other => panic!("expected a password failure, got {other:?}"),
        },
        Err(other) => panic!("expected an auth error, got {other:?}"),
        Ok(()) => panic!("expected an auth error, got plaintext"),
    }
}

#[test_log::test]
fn aes256_archive_password_round_trip() {
    let content = "test;test2;test3\n".repeat(1000).into_bytes();
    let mut zip = ZipArchive::new();
    zip.add_bytes("codes.csv", content.clone()).unwrap();
    zip.set_password(Some("p"), Some(EncryptionMethod::Aes256));
    let bytes = zip.save_to_bytes().unwrap();

    // local header: bit 0 set, method 99 (AE-x marker)
    let flags = u16::from_le_bytes([bytes[6], bytes[7]]);
    assert_eq!(flags & 0b1, 0b1);
    assert_eq!(u16::from_le_bytes([bytes[8], bytes[9]]), 99);

    let mut back = ZipArchive::read_bytes(bytes).unwrap();
    {
        let entry = back.get("codes.csv").unwrap();
        assert_eq!(entry.encryption(), EncryptionMethod::Aes256);
        // large deflated payload: AE-1, so the CRC is retained
        assert_ne!(entry.crc32(), 0);
        assert_eq!(entry.method(), Method::Deflate);
        // compressed size includes salt, verifier and hmac trailer
        assert_eq!(entry.encryption_overhead(), 16 + 2 + 10);
    }

    back.set_read_password(Some("wrong"));
    assert_auth_fail(back.read("codes.csv"));

    back.set_read_password(Some("p"));
    assert_eq!(back.read("codes.csv").unwrap(), content);
}

#[test_log::test]
fn missing_password_is_reported_as_such() {
    let mut zip = ZipArchive::new();
    zip.add_bytes("secret.txt", b"sealed".to_vec()).unwrap();
    zip.set_password(Some("pw"), None);
    let bytes = zip.save_to_bytes().unwrap();

    let mut back = ZipArchive::read_bytes(bytes).unwrap();
    match back.read("secret.txt").map(|_| ()) {
        Err(Error::Auth(AuthError::PasswordRequired(name))) => assert_eq!(name, "secret.txt"),
        other => panic!("expected PasswordRequired, got {other:?}"),
    }
}

#[test_log::test]
fn short_and_bzip2_payloads_use_ae2() {
    let mut zip = ZipArchive::new();
    // under 20 bytes of plaintext
    zip.add_bytes("tiny.txt", b"wee".to_vec()).unwrap();
    // bzip2, regardless of size
    let big = "round and round the data goes\n".repeat(400).into_bytes();
    zip.add_bytes("big.txt", big.clone()).unwrap();
    zip.get_mut("big.txt").unwrap().set_method(Method::Bzip2).unwrap();
    zip.set_password(Some("pw"), Some(EncryptionMethod::Aes192));
    let bytes = zip.save_to_bytes().unwrap();

    let mut back = ZipArchive::read_bytes(bytes).unwrap();
    // AE-2 zeroes the central CRC
    assert_eq!(back.get("tiny.txt").unwrap().crc32(), 0);
    assert_eq!(back.get("big.txt").unwrap().crc32(), 0);
    assert_eq!(
        back.get("tiny.txt").unwrap().encryption(),
        EncryptionMethod::Aes192
    );

    back.set_read_password(Some("pw"));
    assert_eq!(back.read("tiny.txt").unwrap(), b"wee");
    assert_eq!(back.read("big.txt").unwrap(), big);
}

#[test_log::test]
fn per_entry_passwords_and_methods() {
    let mut zip = ZipArchive::new();
    zip.add_bytes(".hidden", b"pkware sealed".to_vec()).unwrap();
    zip.add_bytes("text.txt", b"aes sealed".to_vec()).unwrap();
    zip.add_bytes("notes.txt", b"out in the open".to_vec()).unwrap();
    zip.set_entry_password(".hidden", Some("P1"), Some(EncryptionMethod::Pkware))
        .unwrap();
    zip.set_entry_password("text.txt", Some("P2"), Some(EncryptionMethod::Aes256))
        .unwrap();
    let bytes = zip.save_to_bytes().unwrap();

    let mut back = ZipArchive::read_bytes(bytes).unwrap();
    assert_eq!(
        back.get(".hidden").unwrap().encryption(),
        EncryptionMethod::Pkware
    );
    assert_eq!(
        back.get("text.txt").unwrap().encryption(),
        EncryptionMethod::Aes256
    );
    assert_eq!(
        back.get("notes.txt").unwrap().encryption(),
        EncryptionMethod::None
    );

    // wrong passwords fail on both schemes
    back.set_entry_read_password(".hidden", Some("nope")).unwrap();
    back.set_entry_read_password("text.txt", Some("nope")).unwrap();
    assert_auth_fail(back.read(".hidden"));
    assert_auth_fail(back.read("text.txt"));

    // the plain entry needs no password at all
    assert_eq!(back.read("notes.txt").unwrap(), b"out in the open");

    // per-entry read passwords unlock each one
    back.set_entry_read_password(".hidden", Some("P1")).unwrap();
    back.set_entry_read_password("text.txt", Some("P2")).unwrap();
    assert_eq!(back.read(".hidden").unwrap(), b"pkware sealed");
    assert_eq!(back.read("text.txt").unwrap(), b"aes sealed");
}

#[test_log::test]
fn clearing_the_password_decrypts_on_save() {
    let mut zip = ZipArchive::new();
    zip.add_bytes("s.txt", b"once sealed, then not".to_vec())
        .unwrap();
    zip.set_password(Some("pw"), Some(EncryptionMethod::Aes128));
    let sealed = zip.save_to_bytes().unwrap();

    let mut back = ZipArchive::read_bytes(sealed).unwrap();
    back.set_read_password(Some("pw"));
    back.set_password(None, None);
    let open = back.save_to_bytes().unwrap();

    let mut plain = ZipArchive::read_bytes(open).unwrap();
    assert_eq!(
        plain.get("s.txt").unwrap().encryption(),
        EncryptionMethod::None
    );
    assert_eq!(plain.read("s.txt").unwrap(), b"once sealed, then not");
}

#[test_log::test]
fn encrypted_copy_path_preserves_payload_bytes() {
    // an encrypted entry that is never touched is copied verbatim, salt
    // and all, so the output opens with the same password
    let mut zip = ZipArchive::new();
    zip.add_bytes("kept.txt", b"same envelope".to_vec()).unwrap();
    zip.set_password(Some("pw"), Some(EncryptionMethod::Aes256));
    let first = zip.save_to_bytes().unwrap();

    let mut middle = ZipArchive::read_bytes(first.clone()).unwrap();
    middle.add_bytes("new.txt", b"added later".to_vec()).unwrap();
    let second = middle.save_to_bytes().unwrap();

    let mut back = ZipArchive::read_bytes(second).unwrap();
    back.set_entry_read_password("kept.txt", Some("pw")).unwrap();
    assert_eq!(back.read("kept.txt").unwrap(), b"same envelope");
    assert_eq!(back.read("new.txt").unwrap(), b"added later");
}
