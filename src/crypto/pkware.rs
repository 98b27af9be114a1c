//! Traditional PKWARE encryption, also known as ZipCrypto.
//!
//! Three 32-bit key registers are mixed from the password, then every
//! payload byte updates them. The 12-byte header that precedes the payload
//! ends with a check byte used to reject wrong passwords cheaply: the high
//! byte of the entry's CRC-32, or of its DOS time field when a data
//! descriptor makes the CRC unavailable at header-writing time.
//!
//! All arithmetic is u32 wrapping; there is no other portability concern.

use crate::error::{AuthError, Error, FormatError};

/// Size of the encryption header that precedes the payload.
pub(crate) const HEADER_LEN: usize = 12;

// The raw (unconditioned) CRC-32 step the key schedule is built on.
// crc32fast can't express this: it pre- and post-inverts, while the PKWARE
// recurrence feeds key state straight through the table.
const fn crc32_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut b = 0;
    while b < 256 {
        let mut rmd = b as u32;
        let mut bit = 0;
        while bit < 8 {
            rmd = if rmd & 1 != 0 {
                (rmd >> 1) ^ 0xedb8_8320
            } else {
                rmd >> 1
            };
            bit += 1;
        }
        table[b] = rmd;
        b += 1;
    }
    table
}

static CRC32_TABLE: [u32; 256] = crc32_table();

#[inline]
fn crc32_step(crc: u32, b: u8) -> u32 {
    CRC32_TABLE[((crc ^ b as u32) & 0xff) as usize] ^ (crc >> 8)
}

/// The three-register keystream state.
struct Keys {
    k0: u32,
    k1: u32,
    k2: u32,
}

impl Keys {
    fn new(password: &[u8]) -> Self {
        let mut keys = Self {
            k0: 0x1234_5678,
            k1: 0x2345_6789,
            k2: 0x3456_7890,
        };
        for &b in password {
            keys.update(b);
        }
        keys
    }

    /// Mixes a plaintext byte into the key registers.
    fn update(&mut self, b: u8) {
        self.k0 = crc32_step(self.k0, b);
        self.k1 = self
            .k1
            .wrapping_add(self.k0 & 0xff)
            .wrapping_mul(0x0808_8405)
            .wrapping_add(1);
        self.k2 = crc32_step(self.k2, (self.k1 >> 24) as u8);
    }

    /// The next keystream byte; does not advance the state.
    fn stream_byte(&self) -> u8 {
        let t = (self.k2 | 2) as u16;
        (t.wrapping_mul(t ^ 1) >> 8) as u8
    }

    fn encrypt_byte(&mut self, plain: u8) -> u8 {
        let cipher = plain ^ self.stream_byte();
        self.update(plain);
        cipher
    }

    fn decrypt_byte(&mut self, cipher: u8) -> u8 {
        let plain = cipher ^ self.stream_byte();
        self.update(plain);
        plain
    }
}

/// Encrypts a compressed payload, prepending the 12-byte header whose last
/// byte is `check_byte`.
pub(crate) fn encrypt(data: &[u8], password: &[u8], check_byte: u8) -> Result<Vec<u8>, Error> {
    let mut header = [0u8; HEADER_LEN];
    super::random_bytes(&mut header[..HEADER_LEN - 1])?;
    header[HEADER_LEN - 1] = check_byte;
    Ok(encrypt_with_header(&header, data, password))
}

fn encrypt_with_header(header: &[u8; HEADER_LEN], data: &[u8], password: &[u8]) -> Vec<u8> {
    let mut keys = Keys::new(password);
    let mut out = Vec::with_capacity(HEADER_LEN + data.len());
    for &b in header.iter().chain(data) {
        out.push(keys.encrypt_byte(b));
    }
    out
}

/// Decrypts an encrypted payload (header included), verifying the header's
/// check byte against `check_byte` before handing back the plaintext.
pub(crate) fn decrypt(data: &[u8], password: &[u8], check_byte: u8) -> Result<Vec<u8>, Error> {
    if data.len() < HEADER_LEN {
        return Err(FormatError::Truncated {
            needed: (HEADER_LEN - data.len()) as u64,
            offset: 0,
        }
        .into());
    }

    let mut keys = Keys::new(password);
    let mut header_last = 0u8;
    for &b in &data[..HEADER_LEN] {
        header_last = keys.decrypt_byte(b);
    }
    if header_last != check_byte {
        return Err(AuthError::PkwareCheckByteMismatch.into());
    }

    Ok(data[HEADER_LEN..]
        .iter()
        .map(|&b| keys.decrypt_byte(b))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_schedule_matches_appnote_init() {
        let keys = Keys::new(b"");
        assert_eq!((keys.k0, keys.k1, keys.k2), (0x12345678, 0x23456789, 0x34567890));
    }

    #[test]
    fn round_trip() {
        let plain = b"attack at dawn, bring snacks".to_vec();
        let check = 0xa7;
        let encrypted = encrypt(&plain, b"s3cret", check).unwrap();
        assert_eq!(encrypted.len(), plain.len() + HEADER_LEN);
        assert_ne!(&encrypted[HEADER_LEN..], &plain[..]);

        let decrypted = decrypt(&encrypted, b"s3cret", check).unwrap();
        assert_eq!(decrypted, plain);
    }

    #[test]
    fn check_byte_mismatch_detected() {
        let header = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 0x42];
        let encrypted = encrypt_with_header(&header, b"payload", b"pw");
        // right password, but the caller expects a different check byte
        match decrypt(&encrypted, b"pw", 0x43) {
            Err(Error::Auth(AuthError::PkwareCheckByteMismatch)) => {}
            other => panic!("expected check byte mismatch, got {other:?}"),
        }
    }

    #[test]
    fn wrong_password_never_yields_plaintext() {
        let header = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 0x42];
        let encrypted = encrypt_with_header(&header, b"payload", b"right");
        // the check byte catches 255 out of 256 wrong passwords; the
        // unlucky remainder decrypts to garbage
        match decrypt(&encrypted, b"wrong", 0x42) {
            Err(Error::Auth(AuthError::PkwareCheckByteMismatch)) => {}
            Ok(plain) => assert_ne!(plain, b"payload"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn truncated_header_is_corrupt_not_auth() {
        match decrypt(&[0u8; 5], b"pw", 0) {
            Err(Error::Format(FormatError::Truncated { .. })) => {}
            other => panic!("expected truncation error, got {other:?}"),
        }
    }
}
