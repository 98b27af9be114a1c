//! The mutable, in-memory model of a single archive entry.
//!
//! Entries come from two places: the reader builds them from central
//! directory records (payload still sitting in the archive's byte source),
//! and callers build them from bytes, files, streams, or nothing at all
//! (directories). Metadata edits are cheap; edits that affect the payload
//! (method, level, encryption, source) flip [Entry::payload_dirty], which is
//! what sends the entry through the encode pipeline on save instead of the
//! verbatim copy path.

use std::fmt;
use std::io::Read;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::{
    error::Error,
    parse::{
        EncryptionMethod, ExtraField, ExtraWinZipAesField, HostSystem, Method, Mode, MsdosMode,
        UnixMode, Version,
    },
};

/// Limit on name and comment fields, from their u16 length prefix.
pub(crate) const MAX_NAME_LENGTH: usize = 0xffff;

/// A compression level: the codec's default, or an explicit 1 (fastest)
/// through 9 (smallest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionLevel {
    /// Let the codec pick (deflate: flate2's default; bzip2: block size 4).
    #[default]
    Default,

    /// An explicit level in 1..=9.
    Precise(u8),
}

impl CompressionLevel {
    /// The conventional "default" sentinel accepted by [Self::from_raw].
    pub const DEFAULT_SENTINEL: i64 = -1;

    /// Validates a caller-supplied level: `-1` for default, or 1..=9.
    pub fn from_raw(level: i64) -> Result<Self, Error> {
        match level {
            Self::DEFAULT_SENTINEL => Ok(Self::Default),
            1..=9 => Ok(Self::Precise(level as u8)),
            other => Err(Error::InvalidLevel(other)),
        }
    }

    /// The deflate sub-level bits for the general purpose flags
    /// (appnote 4.4.4): super-fast, fast, maximum, or normal.
    pub(crate) fn deflate_flag_bits(self) -> u16 {
        match self {
            CompressionLevel::Precise(1) => 0b110, // super fast
            CompressionLevel::Precise(2) => 0b100, // fast
            CompressionLevel::Precise(9) => 0b010, // maximum
            _ => 0,
        }
    }
}

/// On-disk state of a payload still living in the archive's byte source.
///
/// Everything needed to either copy the compressed bytes verbatim or to
/// decrypt-and-decompress them: the local header offset, the sizes, and the
/// crypto envelope as the central directory described it.
#[derive(Debug, Clone)]
pub struct StoredPayload {
    /// Absolute offset of the local file header (global offset applied).
    pub(crate) header_offset: u64,

    /// Compressed size on disk, including any encryption envelope.
    pub(crate) compressed_size: u64,

    /// Uncompressed size, from the central directory.
    pub(crate) uncompressed_size: u64,

    /// CRC-32 from the central directory (zero for AE-2 entries).
    pub(crate) crc32: u32,

    /// Method as stored on disk: [Method::Aex] for AES entries.
    pub(crate) method: Method,

    /// General purpose flags as stored on disk.
    pub(crate) flags: u16,

    /// WinZip AES properties, when the on-disk method is AE-x.
    pub(crate) aes: Option<ExtraWinZipAesField>,
}

impl StoredPayload {
    pub(crate) fn is_encrypted(&self) -> bool {
        self.flags & 0b1 != 0
    }

    pub(crate) fn has_data_descriptor(&self) -> bool {
        self.flags & 0b1000 != 0
    }

    /// The encryption scheme the on-disk bytes are wrapped in.
    pub(crate) fn encryption(&self) -> Result<EncryptionMethod, Error> {
        if let Some(aes) = &self.aes {
            return EncryptionMethod::from_aes_strength(aes.strength)
                .ok_or(Error::Format(crate::error::FormatError::InvalidWinZipAesField));
        }
        if self.is_encrypted() {
            Ok(EncryptionMethod::Pkware)
        } else {
            Ok(EncryptionMethod::None)
        }
    }
}

/// Where an entry's payload comes from.
pub enum EntrySource {
    /// Still sitting in the archive this entry was read from.
    Archive(StoredPayload),

    /// An in-memory buffer of plaintext.
    Bytes(Vec<u8>),

    /// A file on disk, read at save time.
    File(PathBuf),

    /// A reader drained at save time. Its size is unknown up front, so
    /// entries with this source get a data descriptor.
    Stream(Box<dyn Read>),

    /// No payload at all: a directory entry.
    Directory,
}

impl fmt::Debug for EntrySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntrySource::Archive(sp) => f.debug_tuple("Archive").field(sp).finish(),
            EntrySource::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            EntrySource::File(p) => f.debug_tuple("File").field(p).finish(),
            EntrySource::Stream(_) => f.write_str("Stream(..)"),
            EntrySource::Directory => f.write_str("Directory"),
        }
    }
}

/// The entry's file type: a directory, a file, or a symbolic link.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum EntryKind {
    /// The entry is a directory
    Directory,

    /// The entry is a file
    File,

    /// The entry is a symbolic link
    Symlink,
}

/// A single archive entry: metadata plus a payload source.
#[derive(Debug)]
pub struct Entry {
    pub(crate) name: String,
    pub(crate) comment: Option<String>,

    /// Effective compression method: for AES entries read from disk, this is
    /// the *actual* method from the AES extra field, not [Method::Aex].
    pub(crate) method: Method,
    pub(crate) level: CompressionLevel,
    pub(crate) encryption: EncryptionMethod,
    pub(crate) password: Option<String>,
    pub(crate) read_password: Option<String>,

    pub(crate) modified: DateTime<Utc>,
    pub(crate) created: Option<DateTime<Utc>>,
    pub(crate) accessed: Option<DateTime<Utc>>,

    pub(crate) creator_version: Version,
    pub(crate) reader_version: Version,
    pub(crate) flags: u16,
    pub(crate) internal_attrs: u16,
    pub(crate) external_attrs: u32,

    pub(crate) crc32: u32,
    pub(crate) compressed_size: u64,
    pub(crate) uncompressed_size: u64,
    pub(crate) header_offset: u64,

    pub(crate) uid: Option<u32>,
    pub(crate) gid: Option<u32>,

    pub(crate) extra_fields: Vec<ExtraField>,

    /// The central directory extra blob exactly as read, so unchanged
    /// entries round-trip byte-for-byte (including fields we couldn't
    /// parse).
    pub(crate) raw_extra: Vec<u8>,

    pub(crate) source: EntrySource,
    pub(crate) payload_dirty: bool,

    /// True until a caller picks a method explicitly: the writer is free to
    /// choose between Store and Deflate based on the payload.
    pub(crate) auto_method: bool,
}

pub(crate) fn validate_name(name: &str) -> Result<(), Error> {
    if name.is_empty() || name.len() > MAX_NAME_LENGTH {
        return Err(Error::InvalidName(name.to_string()));
    }
    Ok(())
}

impl Entry {
    /// A fresh entry with the given payload source and this crate's defaults
    /// everywhere else. The name is validated.
    pub fn new(name: impl Into<String>, source: EntrySource) -> Result<Self, Error> {
        let name = name.into();
        validate_name(&name)?;
        let is_dir = matches!(source, EntrySource::Directory);
        Ok(Self {
            name,
            comment: None,
            method: if is_dir { Method::Store } else { Method::Deflate },
            level: CompressionLevel::Default,
            encryption: EncryptionMethod::None,
            password: None,
            read_password: None,
            modified: Utc::now(),
            created: None,
            accessed: None,
            creator_version: Version::made_by(HostSystem::Unix),
            reader_version: Version::needed(Version::NEEDED_DEFAULT),
            flags: 0,
            internal_attrs: 0,
            external_attrs: if is_dir {
                ((UnixMode::IFDIR.0 | 0o755) << 16) | MsdosMode::DIR.0
            } else {
                (UnixMode::IFREG.0 | 0o644) << 16
            },
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            header_offset: 0,
            uid: None,
            gid: None,
            extra_fields: Vec::new(),
            raw_extra: Vec::new(),
            source,
            payload_dirty: true,
            auto_method: true,
        })
    }

    /// Name of the entry, a `/`-separated relative path. Directory entries
    /// end with `/`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) -> Result<(), Error> {
        let name = name.into();
        validate_name(&name)?;
        self.name = name;
        Ok(())
    }

    /// Entry comment, if any.
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Sets or clears the entry comment.
    pub fn set_comment(&mut self, comment: Option<String>) -> Result<(), Error> {
        if let Some(c) = &comment {
            if c.len() > MAX_NAME_LENGTH {
                return Err(Error::InvalidArgument(format!(
                    "entry comment is {} bytes, maximum is {MAX_NAME_LENGTH}",
                    c.len()
                )));
            }
        }
        self.comment = comment;
        Ok(())
    }

    /// The effective compression method. For encrypted entries this is the
    /// method applied before encryption, never [Method::Aex].
    pub fn method(&self) -> Method {
        self.method
    }

    /// Changes the compression method the entry will be written with.
    ///
    /// Only [Method::Store], [Method::Deflate] and [Method::Bzip2] can be
    /// produced; other codes exist purely so foreign entries keep their
    /// metadata, and asking for one here is an error.
    pub fn set_method(&mut self, method: Method) -> Result<(), Error> {
        if !method.is_supported() {
            return Err(Error::method_not_supported(method));
        }
        if self.method != method {
            self.method = method;
            self.payload_dirty = true;
        }
        self.auto_method = false;
        Ok(())
    }

    /// The compression level.
    pub fn compression_level(&self) -> CompressionLevel {
        self.level
    }

    /// Sets the compression level: `-1` for the default, or 1..=9.
    pub fn set_compression_level(&mut self, level: i64) -> Result<(), Error> {
        let level = CompressionLevel::from_raw(level)?;
        if self.level != level {
            self.level = level;
            self.payload_dirty = true;
        }
        Ok(())
    }

    /// The encryption method the entry will be written with.
    pub fn encryption(&self) -> EncryptionMethod {
        self.encryption
    }

    /// Sets the write-side password. `None` removes encryption on write.
    /// When `method` is `None`, the current method is kept (defaulting to
    /// AES-256 if there was none).
    pub fn set_password(&mut self, password: Option<&str>, method: Option<EncryptionMethod>) {
        match password {
            Some(pwd) => {
                self.password = Some(pwd.to_string());
                self.encryption = method
                    .or(match self.encryption {
                        EncryptionMethod::None => None,
                        m => Some(m),
                    })
                    .unwrap_or(EncryptionMethod::Aes256);
            }
            None => {
                self.password = None;
                self.encryption = EncryptionMethod::None;
            }
        }
        self.payload_dirty = true;
    }

    /// Sets the password used to *read* this entry's payload, overriding the
    /// archive-wide read password.
    pub fn set_read_password(&mut self, password: Option<&str>) {
        self.read_password = password.map(str::to_string);
    }

    /// Last modification time.
    pub fn modified(&self) -> DateTime<Utc> {
        self.modified
    }

    /// Sets the last modification time.
    pub fn set_modified(&mut self, modified: DateTime<Utc>) {
        self.modified = modified;
    }

    /// Creation time, when an extra field supplied one.
    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.created
    }

    /// Last access time, when an extra field supplied one.
    pub fn accessed(&self) -> Option<DateTime<Utc>> {
        self.accessed
    }

    /// External file attributes: DOS attributes in the low byte, Unix mode
    /// in the high 16 bits for Unix-made entries.
    pub fn external_attrs(&self) -> u32 {
        self.external_attrs
    }

    /// Sets the raw external attributes.
    pub fn set_external_attrs(&mut self, attrs: u32) {
        self.external_attrs = attrs;
    }

    /// Sets a Unix file mode (e.g. `0o100644`), stamping the entry as
    /// Unix-made so readers interpret the attributes correctly.
    pub fn set_unix_mode(&mut self, mode: u32) {
        self.external_attrs = (self.external_attrs & 0xffff) | (mode << 16);
        self.creator_version = Version::made_by(HostSystem::Unix);
    }

    /// Internal file attributes.
    pub fn internal_attrs(&self) -> u16 {
        self.internal_attrs
    }

    /// General purpose bit flags, as last read or written.
    pub fn flags(&self) -> u16 {
        self.flags
    }

    /// Version needed to extract this entry, as last read or written.
    pub fn reader_version(&self) -> Version {
        self.reader_version
    }

    /// CRC-32 of the uncompressed payload. Zero for AE-2 entries.
    pub fn crc32(&self) -> u32 {
        self.crc32
    }

    /// Size of the payload after compression (and encryption, if any).
    pub fn compressed_size(&self) -> u64 {
        self.compressed_size
    }

    /// Size of the payload before compression.
    pub fn uncompressed_size(&self) -> u64 {
        self.uncompressed_size
    }

    /// Offset of the local file header in the source archive, for entries
    /// that were read from one.
    pub fn header_offset(&self) -> u64 {
        self.header_offset
    }

    /// Unix user ID, when an extra field supplied one.
    pub fn uid(&self) -> Option<u32> {
        self.uid
    }

    /// Unix group ID, when an extra field supplied one.
    pub fn gid(&self) -> Option<u32> {
        self.gid
    }

    /// The entry's typed extra fields.
    pub fn extra_fields(&self) -> &[ExtraField] {
        &self.extra_fields
    }

    /// Appends an extra field, replacing any existing field with the same tag.
    pub fn set_extra_field(&mut self, field: ExtraField) {
        self.extra_fields.retain(|f| f.tag() != field.tag());
        self.extra_fields.push(field);
    }

    /// Removes the extra field with the given tag, returning it if present.
    pub fn remove_extra_field(&mut self, tag: u16) -> Option<ExtraField> {
        let pos = self.extra_fields.iter().position(|f| f.tag() == tag)?;
        Some(self.extra_fields.remove(pos))
    }

    /// The entry's payload source.
    pub fn source(&self) -> &EntrySource {
        &self.source
    }

    /// Replaces the payload source.
    pub fn set_source(&mut self, source: EntrySource) {
        self.source = source;
        self.payload_dirty = true;
    }

    /// True when the name ends with `/`.
    ///
    /// Believe it or not, this is straight from the APPNOTE.
    pub fn is_directory(&self) -> bool {
        self.name.ends_with('/')
    }

    /// File mode, derived from the external attributes the way the creator
    /// host system encoded them.
    pub fn mode(&self) -> Mode {
        let mut mode = match self.creator_version.host_system {
            HostSystem::Unix | HostSystem::Osx => UnixMode(self.external_attrs >> 16).into(),
            HostSystem::WindowsNtfs | HostSystem::Vfat | HostSystem::MsDos => {
                MsdosMode(self.external_attrs).into()
            }
            _ => Mode(0),
        };
        if self.is_directory() {
            mode |= Mode::DIR;
        }
        mode
    }

    /// Determine the kind of this entry based on its mode.
    pub fn kind(&self) -> EntryKind {
        if self.mode().has(Mode::SYMLINK) {
            EntryKind::Symlink
        } else if self.mode().has(Mode::DIR) {
            EntryKind::Directory
        } else {
            EntryKind::File
        }
    }

    /// True when this entry's payload will be followed by a data descriptor:
    /// its size can't be known before it's been drained and compressed.
    pub fn requires_data_descriptor(&self) -> bool {
        matches!(self.source, EntrySource::Stream(_))
    }

    /// True when any of the sizes or the header offset overflow their
    /// classic 32-bit fields and the entry needs a zip64 extra field.
    pub fn requires_zip64(&self) -> bool {
        self.compressed_size > 0xffff_ffff
            || self.uncompressed_size > 0xffff_ffff
            || self.header_offset > 0xffff_ffff
    }

    /// Bytes the encryption envelope will add to the compressed payload.
    pub fn encryption_overhead(&self) -> u64 {
        self.encryption.overhead()
    }

    /// True when the payload still lives in the archive's byte source.
    pub fn is_from_archive(&self) -> bool {
        matches!(self.source, EntrySource::Archive(_))
    }

    /// True when saving must re-encode this entry's payload rather than
    /// copying its stored bytes verbatim.
    pub(crate) fn needs_encoding(&self) -> bool {
        self.payload_dirty || !self.is_from_archive()
    }

    /// Returns a sanitized version of the entry's name, if it
    /// seems safe. In particular, if this method feels like the
    /// entry name is trying to do a zip slip (cf.
    /// <https://snyk.io/research/zip-slip-vulnerability>), it'll return
    /// None.
    ///
    /// Other than that, it will strip any leading slashes on non-Windows OSes.
    pub fn sanitized_name(&self) -> Option<&str> {
        let name = self.name.as_str();

        // refuse entries with traversed/absolute path to mitigate zip slip
        if name.contains("..") {
            return None;
        }

        #[cfg(windows)]
        {
            if name.contains(":\\") || name.starts_with("\\") {
                return None;
            }
            Some(name)
        }

        #[cfg(not(windows))]
        {
            // strip absolute prefix on entries pointing to root path
            let mut entry_chars = name.chars();
            let mut name = name;
            while name.starts_with('/') {
                entry_chars.next();
                name = entry_chars.as_str()
            }
            Some(name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_validation() {
        assert_eq!(
            CompressionLevel::from_raw(-1).unwrap(),
            CompressionLevel::Default
        );
        assert_eq!(
            CompressionLevel::from_raw(9).unwrap(),
            CompressionLevel::Precise(9)
        );
        assert!(matches!(
            CompressionLevel::from_raw(0),
            Err(Error::InvalidLevel(0))
        ));
        assert!(matches!(
            CompressionLevel::from_raw(10),
            Err(Error::InvalidLevel(10))
        ));
    }

    #[test]
    fn name_validation() {
        assert!(Entry::new("", EntrySource::Directory).is_err());
        assert!(Entry::new("a".repeat(0x10000), EntrySource::Directory).is_err());
        assert!(Entry::new("ok.txt", EntrySource::Bytes(vec![])).is_ok());
    }

    #[test]
    fn unsupported_method_rejected_on_set() {
        let mut e = Entry::new("a.txt", EntrySource::Bytes(vec![1, 2, 3])).unwrap();
        assert!(e.set_method(Method::Bzip2).is_ok());
        assert!(matches!(
            e.set_method(Method::Lzma),
            Err(Error::Unsupported(_))
        ));
    }

    #[test]
    fn clearing_password_clears_encryption() {
        let mut e = Entry::new("a.txt", EntrySource::Bytes(vec![])).unwrap();
        e.set_password(Some("hunter2"), None);
        assert_eq!(e.encryption(), EncryptionMethod::Aes256);
        e.set_password(None, None);
        assert_eq!(e.encryption(), EncryptionMethod::None);
    }

    #[test]
    fn directory_kind_from_name_and_mode() {
        let e = Entry::new("dir/", EntrySource::Directory).unwrap();
        assert!(e.is_directory());
        assert_eq!(e.kind(), EntryKind::Directory);

        let mut link = Entry::new("link", EntrySource::Bytes(b"target".to_vec())).unwrap();
        link.set_unix_mode(UnixMode::IFLNK.0 | 0o777);
        assert_eq!(link.kind(), EntryKind::Symlink);
    }

    #[test]
    fn zip_slip_names_rejected() {
        let e = Entry::new("../evil", EntrySource::Bytes(vec![])).unwrap();
        assert_eq!(e.sanitized_name(), None);
        let e = Entry::new("/abs/path", EntrySource::Bytes(vec![])).unwrap();
        assert_eq!(e.sanitized_name(), Some("abs/path"));
    }
}
