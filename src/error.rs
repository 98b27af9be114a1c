//! All error types used in this crate

use crate::parse::{EncryptionMethod, Method};

use super::encoding;

/// Any zip-related error, from invalid archives to encoding problems.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Not a valid zip file, or a variant that is unsupported.
    #[error("format: {0}")]
    Format(#[from] FormatError),

    /// Something is not supported by this crate
    #[error("unsupported: {0}")]
    Unsupported(#[from] UnsupportedError),

    /// Wrong password, or encrypted data that fails authentication.
    #[error("auth: {0}")]
    Auth(#[from] AuthError),

    /// Invalid UTF-8, Shift-JIS, or any problem encountered while decoding text in general.
    #[error("encoding: {0:?}")]
    Encoding(#[from] encoding::DecodingError),

    /// I/O-related error
    #[error("io: {0}")]
    IO(#[from] std::io::Error),

    /// No entry with that name in the archive.
    #[error("no such entry: {0:?}")]
    NotFound(String),

    /// An entry with that name already exists.
    #[error("entry already exists: {0:?}")]
    AlreadyExists(String),

    /// The entry name is empty or longer than 65535 bytes.
    #[error("invalid entry name: {0:?}")]
    InvalidName(String),

    /// The compression level is outside the default / 1..=9 range.
    #[error("invalid compression level: {0}")]
    InvalidLevel(i64),

    /// Caller misuse that doesn't fit a more precise variant.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The archive's byte source was closed before this entry's payload
    /// was materialized.
    #[error("archive byte source was closed")]
    SourceClosed,
}

impl Error {
    /// Create a new error indicating that the given method is not supported.
    pub fn method_not_supported(method: Method) -> Self {
        Self::Unsupported(UnsupportedError::MethodNotSupported(method))
    }
}

/// Some part of the zip format is not supported by this crate.
#[derive(Debug, thiserror::Error)]
pub enum UnsupportedError {
    /// The compression method is recognized, but this crate cannot
    /// compress or decompress it.
    #[error("compression method not supported: {0:?}")]
    MethodNotSupported(Method),

    /// The encryption method is not supported.
    #[error("encryption method not supported: {0:?}")]
    EncryptionNotSupported(EncryptionMethod),

    /// Central-directory encryption (appnote section 7), as opposed to the
    /// per-entry schemes this crate knows about.
    #[error("strong encryption (appnote 7.x) is not supported")]
    StrongEncryption,

    /// Multi-disk (spanned) archives.
    #[error("spanned archives are not supported (disk {disk} of {total})")]
    SpannedArchive {
        /// disk number this archive claims to be
        disk: u32,
        /// total number of disks
        total: u32,
    },
}

/// Password or authentication failures while decrypting an entry.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The entry is encrypted and no password was supplied.
    #[error("entry {0:?} is encrypted, no password was supplied")]
    PasswordRequired(String),

    /// The 12th byte of the traditional PKWARE header didn't match.
    ///
    /// This almost always means a wrong password, but can also indicate
    /// corruption: the check byte only catches 255 out of 256 wrong
    /// passwords.
    #[error("wrong password (PKWARE check byte mismatch)")]
    PkwareCheckByteMismatch,

    /// The 2-byte AES password verification value didn't match.
    #[error("wrong password (AES verification value mismatch)")]
    AesVerifierMismatch,

    /// The HMAC-SHA1 authentication code over the ciphertext didn't match.
    #[error("AES authentication failed: wrong password or corrupted data")]
    AesHmacMismatch,
}

/// Specific zip format errors, mostly due to invalid zip archives but that could also stem from
/// implementation shortcomings.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// The end of central directory record was not found.
    ///
    /// This usually indicates that the file being read is not a zip archive.
    #[error("end of central directory record not found")]
    DirectoryEndSignatureNotFound,

    /// The zip64 end of central directory record could not be parsed.
    ///
    /// This is only returned when a zip64 end of central directory *locator* was found,
    /// so the archive should be zip64, but isn't.
    #[error("zip64 end of central directory record not found")]
    Directory64EndRecordInvalid,

    /// Corrupted/partial zip file: the offset we found for the central directory
    /// points outside of the current file.
    #[error("directory offset points outside of file")]
    DirectoryOffsetPointsOutsideFile,

    /// The central record is corrupted somewhat.
    ///
    /// This can happen when the end of central directory record advertises
    /// a certain number of files, but we weren't able to read the same number of central directory
    /// headers.
    #[error("invalid central record: expected to read {expected} files, got {actual}")]
    InvalidCentralRecord {
        /// expected number of files
        expected: u64,
        /// actual number of files
        actual: u64,
    },

    /// An extra field (that we support) was not decoded correctly.
    ///
    /// This can indicate an invalid zip archive, or an implementation error in this crate.
    #[error("could not decode extra field")]
    InvalidExtraField,

    /// The local file header (before the file data) could not be parsed correctly.
    #[error("invalid local file header for {entry:?}")]
    InvalidLocalHeader {
        /// name of the entry whose local header is bad
        entry: String,
    },

    /// The data descriptor (after the file data) could not be parsed correctly.
    #[error("invalid data descriptor")]
    InvalidDataDescriptor,

    /// A record was cut short by the end of the input.
    #[error("truncated record: needed {needed} more bytes at offset {offset}")]
    Truncated {
        /// how many more bytes the record needed, when known (0 otherwise)
        needed: u64,
        /// byte offset at which the record started
        offset: u64,
    },

    /// The uncompressed size didn't match
    #[error("uncompressed size didn't match: expected {expected}, got {actual}")]
    WrongSize {
        /// expected size in bytes (from the central directory, data descriptor, etc.)
        expected: u64,
        /// actual size in bytes (from decompressing the entry)
        actual: u64,
    },

    /// The CRC-32 checksum didn't match.
    #[error("checksum didn't match: expected {expected:x?}, got {actual:x?}")]
    WrongChecksum {
        /// expected checksum (from the central directory, etc.)
        expected: u32,
        /// actual checksum (from decompressing the entry)
        actual: u32,
    },

    /// The WinZip AES extra field is missing or malformed on an entry whose
    /// method says AE-x.
    #[error("AE-x entry without a usable WinZip AES extra field")]
    InvalidWinZipAesField,
}

impl From<Error> for std::io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::IO(e) => e,
            e => std::io::Error::other(e),
        }
    }
}
