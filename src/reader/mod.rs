//! Opening archives: end-of-central-directory discovery, the central
//! directory walk, and on-demand payload reads.
//!
//! The reader never touches a local file header until someone asks for the
//! entry's bytes; until then an entry is just central directory metadata
//! plus a [StoredPayload] descriptor pointing back into the byte source.

use std::io;

use tracing::trace;
use winnow::{Parser, Partial};

use crate::{
    encoding::Encoding,
    entry::{Entry, EntrySource, StoredPayload},
    error::{AuthError, Error, FormatError, UnsupportedError},
    parse::{
        parse_extra_fields, CentralDirectoryFileHeader, EncryptionMethod,
        EndOfCentralDirectory, EndOfCentralDirectory64Locator, EndOfCentralDirectory64Record,
        EndOfCentralDirectoryRecord, ExtraField, ExtraFieldSettings, Located, LocalFileHeader,
        Method, NtfsAttr,
    },
};

use chrono::offset::TimeZone;

/// A random-access byte source an archive can be read from.
///
/// This is the seam between the codec and I/O: in-memory buffers implement
/// it directly, files go through [positioned_io::ReadAt].
pub trait ByteSource {
    /// Total size of the source, in bytes.
    fn size(&self) -> u64;

    /// Reads at the given offset; returns the number of bytes read.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Reads exactly `buf.len()` bytes at the given offset.
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let mut pos = offset;
        let mut buf = buf;
        while !buf.is_empty() {
            match self.read_at(pos, buf)? {
                0 => return Err(io::ErrorKind::UnexpectedEof.into()),
                n => {
                    pos += n as u64;
                    buf = &mut buf[n..];
                }
            }
        }
        Ok(())
    }
}

impl ByteSource for Vec<u8> {
    fn size(&self) -> u64 {
        self.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let offset = offset.min(self.len() as u64) as usize;
        let available = &self[offset..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        Ok(n)
    }
}

impl ByteSource for std::fs::File {
    fn size(&self) -> u64 {
        self.metadata().map(|m| m.len()).unwrap_or(0)
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        positioned_io::ReadAt::read_at(self, offset, buf)
    }
}

/// Options that control how an archive is opened.
#[derive(Debug, Default, Clone)]
pub struct ReadOptions {
    /// Code page for names and comments that aren't flagged UTF-8.
    ///
    /// `None` auto-detects (and falls back to CP-437), which is the right
    /// choice nearly always.
    pub charset: Option<Encoding>,
}

/// Everything the central directory told us, before it's turned into a
/// live container.
pub(crate) struct ParsedDirectory {
    pub(crate) entries: Vec<Entry>,
    pub(crate) comment: Option<String>,
    pub(crate) encoding: Encoding,
    pub(crate) records: Vec<CentralDirectoryFileHeader>,
    pub(crate) global_offset: u64,
}

/// Locates the end of central directory, upgrades to zip64 when a locator
/// is present, and walks the central directory.
pub(crate) fn read_directory(
    source: &dyn ByteSource,
    options: &ReadOptions,
) -> Result<ParsedDirectory, Error> {
    let size = source.size();
    if size < EndOfCentralDirectoryRecord::MIN_LENGTH as u64 {
        return Err(FormatError::DirectoryEndSignatureNotFound.into());
    }

    // 22 bytes of record plus up to 65535 bytes of comment
    let haystack_size = size.min(EndOfCentralDirectoryRecord::MAX_SCAN);
    let haystack_offset = size - haystack_size;
    let mut haystack = vec![0u8; haystack_size as usize];
    source.read_exact_at(haystack_offset, &mut haystack)?;

    let mut eocdr = EndOfCentralDirectoryRecord::find_in_block(&haystack)
        .ok_or(FormatError::DirectoryEndSignatureNotFound)?;
    eocdr.offset += haystack_offset;
    trace!(offset = eocdr.offset, "found end of central directory record");

    let eocdr64 = read_eocd64(source, &eocdr)?;
    let eocd = EndOfCentralDirectory::new(size, eocdr, eocdr64)?;

    if eocd.dir.inner.disk_nbr != eocd.dir.inner.dir_disk_nbr
        || eocd.dir.inner.dir_records_this_disk != eocd.dir.inner.directory_records
    {
        return Err(UnsupportedError::SpannedArchive {
            disk: eocd.dir.inner.disk_nbr as u32,
            total: eocd.dir.inner.dir_disk_nbr as u32 + 1,
        }
        .into());
    }

    let records = read_central_directory(source, &eocd)?;

    let encoding = options
        .charset
        .unwrap_or_else(|| detect_encoding(&records));
    trace!(%encoding, entries = records.len(), "walked central directory");

    let global_offset = eocd.global_offset as u64;
    let entries = records
        .iter()
        .map(|r| record_to_entry(r, encoding, global_offset))
        .collect::<Result<Vec<_>, _>>()?;

    let comment = if eocd.comment().is_empty() {
        None
    } else {
        Some(encoding.decode(eocd.comment())?)
    };

    Ok(ParsedDirectory {
        entries,
        comment,
        encoding,
        records,
        global_offset,
    })
}

/// Looks for a zip64 locator right before the end of central directory
/// record and, if one is there, reads the zip64 record it points at.
fn read_eocd64(
    source: &dyn ByteSource,
    eocdr: &Located<EndOfCentralDirectoryRecord>,
) -> Result<Option<Located<EndOfCentralDirectory64Record>>, Error> {
    if eocdr.offset < EndOfCentralDirectory64Locator::LENGTH as u64 {
        // no room for an EOCD64 locator, definitely not a zip64 file
        return Ok(None);
    }

    let locator_offset = eocdr.offset - EndOfCentralDirectory64Locator::LENGTH as u64;
    let mut buf = [0u8; EndOfCentralDirectory64Locator::LENGTH];
    source.read_exact_at(locator_offset, &mut buf)?;

    let locator = match EndOfCentralDirectory64Locator::parser.parse_peek(Partial::new(&buf[..])) {
        Err(_) => {
            // we don't have a zip64 end of central directory locator - that's ok!
            trace!("no zip64 end of central directory locator");
            return Ok(None);
        }
        Ok((_, locator)) => locator,
    };
    trace!(?locator, "found zip64 end of central directory locator");

    let mut record_buf = [0u8; 56];
    source
        .read_exact_at(locator.directory_offset, &mut record_buf)
        .map_err(|_| FormatError::Directory64EndRecordInvalid)?;
    match EndOfCentralDirectory64Record::parser.parse_peek(Partial::new(&record_buf[..])) {
        Ok((_, record)) => Ok(Some(Located {
            offset: locator.directory_offset,
            inner: record,
        })),
        Err(_) => Err(FormatError::Directory64EndRecordInvalid.into()),
    }
}

fn read_central_directory(
    source: &dyn ByteSource,
    eocd: &EndOfCentralDirectory,
) -> Result<Vec<CentralDirectoryFileHeader>, Error> {
    let expected = eocd.directory_records();

    // each entry needs at least a fixed-size header; a directory that
    // claims more records than the file could hold is lying
    let min_size = expected.saturating_mul(CentralDirectoryFileHeader::FIXED_LENGTH as u64);
    if min_size > source.size() {
        return Err(FormatError::InvalidCentralRecord {
            expected,
            actual: source.size() / CentralDirectoryFileHeader::FIXED_LENGTH as u64,
        }
        .into());
    }

    eocd.directory_offset()
        .checked_add(eocd.directory_size())
        .filter(|end| *end <= source.size())
        .ok_or(FormatError::DirectoryOffsetPointsOutsideFile)?;

    let mut cd = vec![0u8; eocd.directory_size() as usize];
    source.read_exact_at(eocd.directory_offset(), &mut cd)?;

    let mut records = Vec::with_capacity(expected.min(0xffff) as usize);
    let mut input = Partial::new(&cd[..]);
    while records.len() < expected as usize {
        match CentralDirectoryFileHeader::parser.parse_next(&mut input) {
            Ok(record) => records.push(record),
            // incomplete or bad signature: either way the directory lied
            // about its record count
            Err(_) => break,
        }
    }

    if records.len() as u64 != expected {
        return Err(FormatError::InvalidCentralRecord {
            expected,
            actual: records.len() as u64,
        }
        .into());
    }
    Ok(records)
}

/// Guesses the text encoding of a central directory, the same way archive
/// managers do: UTF-8 if everything decodes as such, otherwise ask
/// chardetng, with a correction because CP-437 names are routinely
/// misdetected as Shift-JIS.
fn detect_encoding(records: &[CentralDirectoryFileHeader]) -> Encoding {
    let mut detector = chardetng::EncodingDetector::new();
    let mut all_utf8 = true;
    let mut had_suspicious_chars_for_cp437 = false;

    {
        let max_feed: usize = 4096;
        let mut total_fed: usize = 0;
        let mut feed = |slice: &[u8]| {
            detector.feed(slice, false);
            for b in slice {
                if (0xB0..=0xDF).contains(b) {
                    // those are, like, box drawing characters
                    had_suspicious_chars_for_cp437 = true;
                }
            }

            total_fed += slice.len();
            total_fed < max_feed
        };

        'recognize_encoding: for record in records.iter().filter(|r| r.is_non_utf8()) {
            all_utf8 = false;
            if !feed(&record.name) || !feed(&record.comment) {
                break 'recognize_encoding;
            }
        }
    }

    if all_utf8 {
        return Encoding::Utf8;
    }

    let encoding = detector.guess(None, true);
    if encoding == encoding_rs::SHIFT_JIS {
        // well hold on, sometimes Codepage 437 is detected as Shift-JIS by
        // chardetng. If we have any characters that aren't valid DOS file
        // names, then okay it's probably Shift-JIS. Otherwise, assume CP437.
        if had_suspicious_chars_for_cp437 {
            Encoding::ShiftJis
        } else {
            Encoding::Cp437
        }
    } else if encoding == encoding_rs::UTF_8 {
        Encoding::Utf8
    } else {
        Encoding::Cp437
    }
}

/// Converts a central directory record into a live entry: decodes text,
/// folds in the extra fields, and binds the payload to the byte source.
pub(crate) fn record_to_entry(
    record: &CentralDirectoryFileHeader,
    encoding: Encoding,
    global_offset: u64,
) -> Result<Entry, Error> {
    let mut name = encoding.decode(&record.name)?;
    let mut comment = if record.comment.is_empty() {
        None
    } else {
        Some(encoding.decode(&record.comment)?)
    };

    let settings = ExtraFieldSettings {
        uncompressed_size_u32: record.uncompressed_size,
        compressed_size_u32: record.compressed_size,
        header_offset_u32: record.header_offset,
        disk_start_u16: record.disk_nbr_start,
    };
    let extra_fields = parse_extra_fields(&record.extra, settings);

    let mut compressed_size = record.compressed_size as u64;
    let mut uncompressed_size = record.uncompressed_size as u64;
    let mut header_offset = record.header_offset as u64;

    let mut modified = record.modified.to_datetime();
    let mut created = None;
    let mut accessed = None;
    let mut uid = None;
    let mut gid = None;
    let mut aes = None;

    for ef in &extra_fields {
        match ef {
            ExtraField::Zip64(z64) => {
                if let Some(n) = z64.uncompressed_size {
                    uncompressed_size = n;
                }
                if let Some(n) = z64.compressed_size {
                    compressed_size = n;
                }
                if let Some(n) = z64.header_offset {
                    header_offset = n;
                }
            }
            ExtraField::Timestamp(ts) => {
                if let Some(mtime) = ts.mtime {
                    modified = chrono::Utc.timestamp_opt(mtime as i64, 0).single();
                }
                if let Some(atime) = ts.atime {
                    accessed = chrono::Utc.timestamp_opt(atime as i64, 0).single();
                }
                if let Some(ctime) = ts.ctime {
                    created = chrono::Utc.timestamp_opt(ctime as i64, 0).single();
                }
            }
            ExtraField::Ntfs(nf) => {
                for attr in &nf.attrs {
                    // note: other attributes are unsupported
                    if let NtfsAttr::Attr1(attr) = attr {
                        modified = attr.mtime.to_datetime();
                        created = attr.ctime.to_datetime();
                        accessed = attr.atime.to_datetime();
                    }
                }
            }
            ExtraField::Unix(uf) => {
                modified = chrono::Utc.timestamp_opt(uf.mtime as i64, 0).single();
                accessed = chrono::Utc.timestamp_opt(uf.atime as i64, 0).single();
                if uid.is_none() {
                    uid = uf.uid.map(u32::from);
                }
                if gid.is_none() {
                    gid = uf.gid.map(u32::from);
                }
            }
            ExtraField::NewUnix(uf) => {
                uid = Some(uf.uid as u32);
                gid = Some(uf.gid as u32);
            }
            ExtraField::UnicodePath(up) => {
                // stale overrides (CRC of the legacy name changed) are ignored
                if up.matches(&record.name) {
                    if let Ok(better) = std::str::from_utf8(&up.text) {
                        name = better.to_string();
                    }
                }
            }
            ExtraField::UnicodeComment(uc) => {
                if uc.matches(&record.comment) {
                    if let Ok(better) = std::str::from_utf8(&uc.text) {
                        comment = Some(better.to_string());
                    }
                }
            }
            ExtraField::WinZipAes(field) => {
                aes = Some(*field);
            }
            _ => {}
        }
    }

    header_offset += global_offset;

    // for AE-x entries the on-disk method is a marker; the real one is in
    // the extra field
    let (method, encryption) = match record.method {
        Method::Aex => {
            let aes = aes.ok_or(FormatError::InvalidWinZipAesField)?;
            let encryption = EncryptionMethod::from_aes_strength(aes.strength)
                .ok_or(FormatError::InvalidWinZipAesField)?;
            (aes.method, encryption)
        }
        method if record.flags & 0b1 != 0 => (method, EncryptionMethod::Pkware),
        method => (method, EncryptionMethod::None),
    };

    let stored = StoredPayload {
        header_offset,
        compressed_size,
        uncompressed_size,
        crc32: record.crc32,
        method: record.method,
        flags: record.flags,
        aes,
    };

    Ok(Entry {
        name,
        comment,
        method,
        level: Default::default(),
        encryption,
        password: None,
        read_password: None,
        modified: modified.unwrap_or_else(crate::parse::zero_datetime),
        created,
        accessed,
        creator_version: record.creator_version,
        reader_version: record.reader_version,
        flags: record.flags,
        internal_attrs: record.internal_attrs,
        external_attrs: record.external_attrs,
        crc32: record.crc32,
        compressed_size,
        uncompressed_size,
        header_offset,
        uid,
        gid,
        extra_fields,
        raw_extra: record.extra.clone(),
        source: EntrySource::Archive(stored),
        payload_dirty: false,
        auto_method: false,
    })
}

/// The result of reading an entry's stored bytes: the raw (possibly
/// encrypted) compressed payload plus the local header it sat behind.
pub(crate) struct StoredBytes {
    pub(crate) local_header: LocalFileHeader,
    pub(crate) data: Vec<u8>,
}

/// Seeks to an entry's local file header, validates it, and reads the
/// compressed payload that follows — no decryption, no decompression.
pub(crate) fn fetch_stored_bytes(
    source: &dyn ByteSource,
    stored: &StoredPayload,
    name: &str,
) -> Result<StoredBytes, Error> {
    let mut fixed = [0u8; LocalFileHeader::FIXED_LENGTH];
    source
        .read_exact_at(stored.header_offset, &mut fixed)
        .map_err(|_| FormatError::InvalidLocalHeader {
            entry: name.to_string(),
        })?;

    let name_len = u16::from_le_bytes([fixed[26], fixed[27]]) as usize;
    let extra_len = u16::from_le_bytes([fixed[28], fixed[29]]) as usize;

    let mut header_buf = vec![0u8; LocalFileHeader::FIXED_LENGTH + name_len + extra_len];
    source
        .read_exact_at(stored.header_offset, &mut header_buf)
        .map_err(|_| FormatError::InvalidLocalHeader {
            entry: name.to_string(),
        })?;

    let local_header = match LocalFileHeader::parser.parse_peek(Partial::new(&header_buf[..])) {
        Ok((_, header)) => header,
        Err(_) => {
            return Err(FormatError::InvalidLocalHeader {
                entry: name.to_string(),
            }
            .into())
        }
    };

    let data_offset = stored.header_offset + header_buf.len() as u64;
    if stored
        .compressed_size
        .checked_add(data_offset)
        .map(|end| end > source.size())
        .unwrap_or(true)
    {
        return Err(FormatError::Truncated {
            needed: stored.compressed_size,
            offset: data_offset,
        }
        .into());
    }
    let mut data = vec![0u8; stored.compressed_size as usize];
    source
        .read_exact_at(data_offset, &mut data)
        .map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => Error::Format(FormatError::Truncated {
                needed: 0,
                offset: data_offset,
            }),
            _ => Error::IO(e),
        })?;

    Ok(StoredBytes { local_header, data })
}

/// The check byte PKWARE decryption verifies: the high byte of the CRC, or
/// of the DOS time field when a data descriptor means the CRC wasn't known
/// at encryption time.
pub(crate) fn pkware_check_byte(stored: &StoredPayload, dos_time: u16) -> u8 {
    if stored.has_data_descriptor() {
        (dos_time >> 8) as u8
    } else {
        (stored.crc32 >> 24) as u8
    }
}

/// Decrypts (verifying) and decompresses an entry's stored bytes, then
/// checks size and checksum. This is the whole read pipeline after
/// [fetch_stored_bytes].
///
/// The method comes from the on-disk state, never from the entry: a pending
/// `set_method` affects the next save, not what's sitting in the source.
pub(crate) fn decode_stored_bytes(
    stored: &StoredPayload,
    bytes: &StoredBytes,
    password: Option<&str>,
    name: &str,
) -> Result<Vec<u8>, Error> {
    // bit 6 announces appnote-7.x strong encryption, which this crate does
    // not do; AE-x entries legitimately set it alongside their extra field
    if stored.flags & (1 << 6) != 0 && stored.aes.is_none() {
        return Err(UnsupportedError::StrongEncryption.into());
    }

    let method = match &stored.aes {
        Some(aes) => aes.method,
        None => stored.method,
    };

    let compressed: Vec<u8> = match stored.encryption()? {
        EncryptionMethod::None => bytes.data.clone(),
        EncryptionMethod::Pkware => {
            let password =
                password.ok_or_else(|| AuthError::PasswordRequired(name.to_string()))?;
            let check = pkware_check_byte(stored, bytes.local_header.modified.time);
            crate::crypto::pkware::decrypt(&bytes.data, password.as_bytes(), check)?
        }
        aes_method => {
            let password =
                password.ok_or_else(|| AuthError::PasswordRequired(name.to_string()))?;
            let strength = aes_method.aes_strength().expect("checked by encryption()");
            crate::crypto::winzip_aes::decrypt(&bytes.data, password.as_bytes(), strength)?
        }
    };

    let plain = crate::compress::decompress(method, &compressed, stored.uncompressed_size)?;

    if plain.len() as u64 != stored.uncompressed_size {
        return Err(FormatError::WrongSize {
            expected: stored.uncompressed_size,
            actual: plain.len() as u64,
        }
        .into());
    }

    // AE-2 zeroes the central CRC; there is nothing to check against
    let skip_crc = matches!(&stored.aes, Some(aes) if aes.vendor_version == 2);
    if !skip_crc {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&plain);
        let actual = hasher.finalize();
        if actual != stored.crc32 {
            return Err(FormatError::WrongChecksum {
                expected: stored.crc32,
                actual,
            }
            .into());
        }
    }

    Ok(plain)
}
