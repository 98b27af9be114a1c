//! Serializing a container back into an archive: local records and
//! payloads, the central directory, zip64 upgrades, zip-align padding, and
//! the end-of-central-directory family.
//!
//! Entries whose payload hasn't been touched are copied verbatim from the
//! source archive: same compressed bytes, same encryption envelope, same
//! central extra blob. Everything else goes through the encode pipeline:
//! materialize plaintext, compress, encrypt, emit.

use std::io::{self, Read, Write};
use std::path::Path;

use tracing::trace;

use crate::{
    archive::{ZipArchive, SO_ALIGNMENT},
    compress,
    crypto::{pkware, winzip_aes},
    encoding::needs_utf8_flag,
    entry::{Entry, EntrySource},
    error::Error,
    parse::{
        write_extra_fields, CentralDirectoryFileHeader, DataDescriptorRecord, EncryptionMethod,
        EndOfCentralDirectory64Locator, EndOfCentralDirectory64Record,
        EndOfCentralDirectoryRecord, ExtraApkAlignmentField, ExtraField, ExtraWinZipAesField,
        ExtraZip64Field, LocalFileHeader, Method, MsdosTimestamp, Version,
    },
};

/// Payloads shorter than this are stored rather than deflated when the
/// method choice is automatic: the deflate framing would eat the savings.
const AUTO_STORE_THRESHOLD: usize = 512;

/// AE-1 keeps the plaintext CRC; payloads shorter than this (or bzip2
/// payloads) are written as AE-2 with a zeroed CRC instead, so the CRC of
/// a short secret can't be used as an oracle.
const AE2_PLAINTEXT_THRESHOLD: usize = 20;

/// The classic-field sentinels that hand off to zip64.
const U32_SENTINEL: u64 = 0xffff_ffff;
const U16_SENTINEL: u64 = 0xffff;

struct CountingWriter<W> {
    inner: W,
    count: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, count: 0 }
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Everything needed to emit one entry: the local record's fields, the
/// on-disk payload, and the central record's fields.
struct PreparedEntry {
    name: Vec<u8>,
    comment: Vec<u8>,

    /// Method as it goes on disk: [Method::Aex] for AES entries.
    method: Method,
    flags: u16,
    modified: MsdosTimestamp,
    crc32: u32,
    compressed_size: u64,
    uncompressed_size: u64,

    creator_version: Version,
    reader_version: Version,
    internal_attrs: u16,
    external_attrs: u32,

    /// Local extra blob, before any alignment padding is spliced in.
    local_extra: Vec<u8>,

    /// Central extra fields, minus zip64 (regenerated per offset at
    /// directory-writing time).
    central_extra_fields: Vec<ExtraField>,

    /// When set, the central extra blob is reused verbatim instead of
    /// re-serializing `central_extra_fields`.
    raw_central_extra: Option<Vec<u8>>,

    /// On-disk payload: compressed and, if applicable, encrypted.
    payload: Vec<u8>,

    /// Emitted after the payload when bit 3 is set.
    descriptor: Option<DataDescriptorRecord>,

    /// Wide sizes in the local header's own zip64 field.
    local_zip64: bool,

    /// Subject to zip-align: stored and unencrypted.
    alignable: bool,

    /// Filled in while emitting local records.
    header_offset: u64,
}

/// Serializes the whole container. Stream-sourced payloads are drained in
/// the process (and retained as in-memory buffers).
pub(crate) fn save<W: Write>(archive: &mut ZipArchive, w: W) -> Result<(), Error> {
    let mut w = CountingWriter::new(w);

    let mut prepared = Vec::with_capacity(archive.entries.len());
    for idx in 0..archive.entries.len() {
        prepared.push(prepare_entry(archive, idx)?);
    }

    // local records and payloads
    for entry in &mut prepared {
        write_local(&mut w, entry, archive.alignment)?;
    }

    // central directory
    let cd_offset = w.count;
    for entry in &prepared {
        write_central(&mut w, entry)?;
    }
    let cd_size = w.count - cd_offset;

    write_eocd(
        &mut w,
        prepared.len() as u64,
        cd_size,
        cd_offset,
        archive.comment.as_deref(),
    )?;

    w.flush()?;
    Ok(())
}

/// Serializes the container into a fresh buffer.
pub(crate) fn save_to_bytes(archive: &mut ZipArchive) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    save(archive, &mut out)?;
    Ok(out)
}

/// Serializes the container into a temporary sibling of `path`, then
/// renames it into place. The destination is untouched on any error.
pub(crate) fn save_to_file(archive: &mut ZipArchive, path: &Path) -> Result<(), Error> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    save(archive, tmp.as_file_mut())?;
    tmp.persist(path).map_err(|e| Error::IO(e.error))?;
    trace!(path = %path.display(), "archive saved");
    Ok(())
}

fn prepare_entry(archive: &mut ZipArchive, idx: usize) -> Result<PreparedEntry, Error> {
    let needs_encoding = archive.entries[idx].needs_encoding();
    if needs_encoding {
        let plaintext = materialize_plaintext(archive, idx)?;
        let write_password = archive.write_password.clone();
        encode_entry(&mut archive.entries[idx], plaintext, write_password)
    } else {
        copy_entry(archive, idx)
    }
}

/// Pulls the plaintext of an entry into memory, whatever its source.
fn materialize_plaintext(archive: &mut ZipArchive, idx: usize) -> Result<Vec<u8>, Error> {
    if matches!(archive.entries[idx].source, EntrySource::Archive(_)) {
        // payload-dirty reader-bound entry: decode through the normal read
        // pipeline, then re-encode below
        let name = archive.entries[idx].name.clone();
        return archive.read(&name);
    }

    let entry = &mut archive.entries[idx];
    match &mut entry.source {
        EntrySource::Directory => Ok(Vec::new()),
        EntrySource::Bytes(bytes) => Ok(bytes.clone()),
        EntrySource::File(path) => Ok(std::fs::read(&*path)?),
        EntrySource::Stream(reader) => {
            let mut bytes = Vec::new();
            reader.read_to_end(&mut bytes)?;
            // keep the drained bytes so a second save sees the same payload
            entry.source = EntrySource::Stream(Box::new(io::Cursor::new(bytes.clone())));
            Ok(bytes)
        }
        EntrySource::Archive(_) => unreachable!("handled above"),
    }
}

/// The encode pipeline: plaintext → compress → encrypt, plus all the
/// header bookkeeping.
fn encode_entry(
    entry: &mut Entry,
    plaintext: Vec<u8>,
    archive_password: Option<(String, EncryptionMethod)>,
) -> Result<PreparedEntry, Error> {
    let is_directory = entry.is_directory();

    // per-entry credentials win over the archive-wide ones; directories are
    // never encrypted
    let credentials = if is_directory {
        None
    } else {
        match (&entry.password, archive_password) {
            (Some(pwd), _) => Some((pwd.clone(), entry.encryption)),
            (None, Some((pwd, method))) => Some((pwd, method)),
            (None, None) => None,
        }
    };

    let method = if is_directory {
        Method::Store
    } else if entry.auto_method {
        let method = choose_method(&plaintext);
        trace!(name = %entry.name, ?method, "automatic method choice");
        method
    } else {
        entry.method
    };
    if !method.is_supported() {
        return Err(Error::method_not_supported(method));
    }

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&plaintext);
    let mut crc32 = hasher.finalize();
    let uncompressed_size = plaintext.len() as u64;

    let mut payload = compress::compress(method, entry.level, &plaintext)?;

    let has_descriptor = entry.requires_data_descriptor();
    let modified = MsdosTimestamp::from_datetime(entry.modified);

    let mut flags = 0u16;
    if method == Method::Deflate {
        flags |= entry.level.deflate_flag_bits();
    }
    if has_descriptor {
        flags |= 0b1000;
    }
    if needs_utf8_flag(&entry.name, entry.comment.as_deref()) {
        flags |= 0x800;
    }

    // carried central fields: everything we don't regenerate
    let mut central_extra_fields: Vec<ExtraField> = entry
        .extra_fields
        .iter()
        .filter(|f| {
            !matches!(
                f,
                ExtraField::Zip64(_) | ExtraField::WinZipAes(_) | ExtraField::ApkAlignment(_)
            )
        })
        .cloned()
        .collect();

    let mut disk_method = method;
    let mut aes_field = None;
    if let Some((password, encryption)) = credentials {
        flags |= 0b1;
        match encryption {
            EncryptionMethod::None => {
                flags &= !0b1;
            }
            EncryptionMethod::Pkware => {
                let check_byte = if has_descriptor {
                    (modified.time >> 8) as u8
                } else {
                    (crc32 >> 24) as u8
                };
                payload = pkware::encrypt(&payload, password.as_bytes(), check_byte)?;
            }
            aes => {
                let vendor_version =
                    if plaintext.len() < AE2_PLAINTEXT_THRESHOLD || method == Method::Bzip2 {
                        2
                    } else {
                        1
                    };
                payload = winzip_aes::encrypt(&payload, password.as_bytes(), aes)?;
                let field = ExtraWinZipAesField {
                    vendor_version,
                    strength: aes.aes_strength().expect("aes methods have a strength"),
                    method,
                };
                aes_field = Some(field);
                central_extra_fields.push(ExtraField::WinZipAes(field));
                disk_method = Method::Aex;
                if vendor_version == 2 {
                    crc32 = 0;
                }
            }
        }
    }

    let compressed_size = payload.len() as u64;
    let requires_zip64 = compressed_size > U32_SENTINEL || uncompressed_size > U32_SENTINEL;

    let reader_version = version_needed(disk_method, method, aes_field.is_some(), requires_zip64);
    let creator_version = Version::made_by(entry.creator_version.host_system);

    // the local extra carries the AES field too; zip64 is spliced in at
    // emission time if the offset turns out to overflow
    let local_extra_fields: Vec<ExtraField> = central_extra_fields
        .iter()
        .filter(|f| !matches!(f, ExtraField::UnicodePath(_) | ExtraField::UnicodeComment(_)))
        .cloned()
        .collect();

    let descriptor = has_descriptor.then_some(DataDescriptorRecord {
        crc32,
        compressed_size,
        uncompressed_size,
    });

    // keep the entry's own view of itself current
    entry.method = method;
    entry.flags = flags;
    entry.crc32 = crc32;
    entry.compressed_size = compressed_size;
    entry.uncompressed_size = uncompressed_size;
    entry.reader_version = reader_version;

    Ok(PreparedEntry {
        name: entry.name.clone().into_bytes(),
        comment: entry
            .comment
            .clone()
            .map(String::into_bytes)
            .unwrap_or_default(),
        method: disk_method,
        flags,
        modified,
        crc32,
        compressed_size,
        uncompressed_size,
        creator_version,
        reader_version,
        internal_attrs: entry.internal_attrs,
        external_attrs: entry.external_attrs,
        local_extra: write_extra_fields(&local_extra_fields),
        central_extra_fields,
        raw_central_extra: None,
        payload,
        descriptor,
        local_zip64: requires_zip64,
        alignable: disk_method == Method::Store && flags & 0b1 == 0,
        header_offset: 0,
    })
}

/// The verbatim copy path for unchanged reader-bound entries: original
/// compressed payload, original extras, no re-compression, no
/// re-encryption. Data-descriptor sizes are materialized into the local
/// header, since the central directory knows them.
fn copy_entry(archive: &ZipArchive, idx: usize) -> Result<PreparedEntry, Error> {
    let entry = &archive.entries[idx];
    let EntrySource::Archive(stored) = &entry.source else {
        unreachable!("copy_entry is only called for archive-bound entries");
    };

    let source = archive.source.as_deref().ok_or(Error::SourceClosed)?;
    let bytes = crate::reader::fetch_stored_bytes(source, stored, &entry.name)?;

    let mut flags = stored.flags;
    let mut descriptor = None;
    let sizes_fit = stored.compressed_size <= U32_SENTINEL && stored.uncompressed_size <= U32_SENTINEL;
    if stored.has_data_descriptor() {
        if sizes_fit {
            // the central directory knew the real sizes, so the rewritten
            // local header can carry them and drop the descriptor
            flags &= !0b1000;
        } else {
            descriptor = Some(DataDescriptorRecord {
                crc32: stored.crc32,
                compressed_size: stored.compressed_size,
                uncompressed_size: stored.uncompressed_size,
            });
        }
    }

    // names are re-encoded as UTF-8, so the flag follows the new bytes
    if needs_utf8_flag(&entry.name, entry.comment.as_deref()) {
        flags |= 0x800;
    } else {
        flags &= !0x800;
    }

    let local_zip64 = !sizes_fit;
    let requires_zip64 = local_zip64;
    let computed = version_needed(
        stored.method,
        entry.method,
        stored.aes.is_some(),
        requires_zip64,
    );
    // never downgrade what the original writer asked for: a copied lzma or
    // ppmd payload still needs whatever it needed before
    let reader_version = Version::needed(computed.version.max(entry.reader_version.version));

    // strip the original local extra's zip64 and padding fields; both are
    // regenerated against the new offsets
    let local_extra_fields: Vec<ExtraField> = crate::parse::parse_extra_fields(
        &bytes.local_header.extra,
        crate::parse::ExtraFieldSettings {
            uncompressed_size_u32: bytes.local_header.uncompressed_size,
            compressed_size_u32: bytes.local_header.compressed_size,
            header_offset_u32: 0,
            disk_start_u16: 0,
        },
    )
    .into_iter()
    .filter(|f| !matches!(f, ExtraField::Zip64(_) | ExtraField::ApkAlignment(_)))
    .collect();

    // the central extra is reused byte-for-byte unless zip64 state forces a
    // rebuild (its header offset field would go stale)
    let had_zip64 = entry
        .extra_fields
        .iter()
        .any(|f| matches!(f, ExtraField::Zip64(_)));
    let central_extra_fields: Vec<ExtraField> = entry
        .extra_fields
        .iter()
        .filter(|f| !matches!(f, ExtraField::Zip64(_)))
        .cloned()
        .collect();
    let raw_central_extra = (!had_zip64 && !requires_zip64).then(|| entry.raw_extra.clone());

    Ok(PreparedEntry {
        name: entry.name.clone().into_bytes(),
        comment: entry
            .comment
            .clone()
            .map(String::into_bytes)
            .unwrap_or_default(),
        method: stored.method,
        flags,
        modified: MsdosTimestamp::from_datetime(entry.modified),
        crc32: stored.crc32,
        compressed_size: stored.compressed_size,
        uncompressed_size: stored.uncompressed_size,
        creator_version: entry.creator_version,
        reader_version,
        internal_attrs: entry.internal_attrs,
        external_attrs: entry.external_attrs,
        local_extra: write_extra_fields(&local_extra_fields),
        central_extra_fields,
        raw_central_extra,
        payload: bytes.data,
        descriptor,
        local_zip64,
        alignable: stored.method == Method::Store && stored.flags & 0b1 == 0,
        header_offset: 0,
    })
}

/// The "version needed to extract" ladder.
fn version_needed(disk_method: Method, method: Method, aes: bool, zip64: bool) -> Version {
    let mut needed = Version::NEEDED_DEFAULT;
    if method == Method::Bzip2 || disk_method == Method::Bzip2 {
        needed = needed.max(Version::NEEDED_BZIP2);
    }
    if zip64 {
        needed = needed.max(Version::NEEDED_ZIP64);
    }
    if aes {
        needed = needed.max(Version::NEEDED_WINZIP_AES);
    }
    Version::needed(needed)
}

/// Decides between Store and Deflate for entries that never got an explicit
/// method: tiny payloads and already-compressed formats stay stored.
fn choose_method(plaintext: &[u8]) -> Method {
    if plaintext.len() < AUTO_STORE_THRESHOLD || is_poorly_compressible(plaintext) {
        Method::Store
    } else {
        Method::Deflate
    }
}

/// A magic-byte sniff over formats that are already entropy-coded:
/// JPEG, PNG, GIF, MP3, MP4, ZIP, GZIP.
fn is_poorly_compressible(data: &[u8]) -> bool {
    const PREFIXES: &[&[u8]] = &[
        b"\xff\xd8\xff",      // JPEG
        b"\x89PNG\r\n\x1a\n", // PNG
        b"GIF87a",
        b"GIF89a",
        b"ID3",          // MP3 with id3 tag
        b"\xff\xfb",     // bare MPEG-1 layer 3 frame
        b"PK\x03\x04",   // ZIP
        b"PK\x05\x06",   // empty ZIP
        b"\x1f\x8b",     // GZIP
    ];
    if PREFIXES.iter().any(|p| data.starts_with(p)) {
        return true;
    }
    // ISO-BMFF (mp4, mov): the brand box follows a 4-byte length
    data.len() >= 12 && &data[4..8] == b"ftyp"
}

/// Emits one local record plus payload (plus descriptor), splicing in the
/// zip64 and alignment extras that depend on the actual offset.
fn write_local<W: Write>(
    w: &mut CountingWriter<W>,
    entry: &mut PreparedEntry,
    alignment: Option<u32>,
) -> Result<(), Error> {
    entry.header_offset = w.count;

    let mut extra = entry.local_extra.clone();

    let offset_zip64 = entry.header_offset > U32_SENTINEL;
    let local_zip64 = entry.local_zip64 || offset_zip64;
    if local_zip64 {
        // the local zip64 field always carries both sizes (appnote 4.5.3)
        let mut field = Vec::new();
        ExtraField::Zip64(ExtraZip64Field {
            uncompressed_size: Some(entry.uncompressed_size),
            compressed_size: Some(entry.compressed_size),
            header_offset: None,
            disk_start: None,
        })
        .write_to(&mut field);
        extra.extend_from_slice(&field);
    }

    if let (Some(multiple), true) = (alignment, entry.alignable) {
        let multiple = u64::from(if entry.name.ends_with(b".so") {
            SO_ALIGNMENT
        } else {
            multiple
        });
        // data starts after the fixed header, name, current extras, and the
        // 6-byte header of the padding field itself
        let base = entry.header_offset
            + LocalFileHeader::FIXED_LENGTH as u64
            + entry.name.len() as u64
            + extra.len() as u64
            + 6;
        let padding = ((multiple - (base % multiple)) % multiple) as usize;
        ExtraField::ApkAlignment(ExtraApkAlignmentField {
            alignment: multiple as u16,
            padding: vec![0; padding],
        })
        .write_to(&mut extra);
        trace!(
            name = %String::from_utf8_lossy(&entry.name),
            multiple,
            padding,
            "aligned stored entry"
        );
    }

    let has_descriptor = entry.descriptor.is_some() && entry.flags & 0b1000 != 0;
    let (crc32, compressed_u32, uncompressed_u32) = if has_descriptor {
        // real values follow the payload; zip64 entries keep sentinels here
        if local_zip64 {
            (entry.crc32, U32_SENTINEL as u32, U32_SENTINEL as u32)
        } else {
            (entry.crc32, 0, 0)
        }
    } else if local_zip64 {
        (entry.crc32, U32_SENTINEL as u32, U32_SENTINEL as u32)
    } else {
        (
            entry.crc32,
            entry.compressed_size as u32,
            entry.uncompressed_size as u32,
        )
    };

    let header = LocalFileHeader {
        reader_version: entry.reader_version,
        flags: entry.flags,
        method: entry.method,
        modified: entry.modified,
        crc32,
        compressed_size: compressed_u32,
        uncompressed_size: uncompressed_u32,
        name: entry.name.clone(),
        extra,
    };
    header.write(w)?;
    w.write_all(&entry.payload)?;

    if has_descriptor {
        let descriptor = entry.descriptor.as_ref().unwrap();
        descriptor.write(w, local_zip64)?;
    }
    Ok(())
}

/// Emits one central directory record, regenerating the zip64 field
/// against the final offset.
fn write_central<W: Write>(w: &mut CountingWriter<W>, entry: &PreparedEntry) -> Result<(), Error> {
    let need_uncompressed = entry.uncompressed_size > U32_SENTINEL;
    let need_compressed = entry.compressed_size > U32_SENTINEL;
    let need_offset = entry.header_offset > U32_SENTINEL;

    let extra = match &entry.raw_central_extra {
        Some(raw) if !need_uncompressed && !need_compressed && !need_offset => raw.clone(),
        _ => {
            let mut fields = Vec::new();
            if need_uncompressed || need_compressed || need_offset {
                fields.push(ExtraField::Zip64(ExtraZip64Field {
                    uncompressed_size: need_uncompressed.then_some(entry.uncompressed_size),
                    compressed_size: need_compressed.then_some(entry.compressed_size),
                    header_offset: need_offset.then_some(entry.header_offset),
                    disk_start: None,
                }));
            }
            fields.extend(entry.central_extra_fields.iter().cloned());
            write_extra_fields(&fields)
        }
    };

    let reader_version = if need_offset && entry.reader_version.version < Version::NEEDED_ZIP64 {
        Version::needed(Version::NEEDED_ZIP64)
    } else {
        entry.reader_version
    };

    let header = CentralDirectoryFileHeader {
        creator_version: entry.creator_version,
        reader_version,
        flags: entry.flags,
        method: entry.method,
        modified: entry.modified,
        crc32: entry.crc32,
        compressed_size: if need_compressed {
            U32_SENTINEL as u32
        } else {
            entry.compressed_size as u32
        },
        uncompressed_size: if need_uncompressed {
            U32_SENTINEL as u32
        } else {
            entry.uncompressed_size as u32
        },
        disk_nbr_start: 0,
        internal_attrs: entry.internal_attrs,
        external_attrs: entry.external_attrs,
        header_offset: if need_offset {
            U32_SENTINEL as u32
        } else {
            entry.header_offset as u32
        },
        name: entry.name.clone(),
        extra,
        comment: entry.comment.clone(),
    };
    header.write(w)?;
    Ok(())
}

fn write_eocd<W: Write>(
    w: &mut CountingWriter<W>,
    records: u64,
    cd_size: u64,
    cd_offset: u64,
    comment: Option<&str>,
) -> Result<(), Error> {
    let needs_zip64 =
        records > U16_SENTINEL || cd_size > U32_SENTINEL || cd_offset > U32_SENTINEL;

    if needs_zip64 {
        let eocd64_offset = w.count;
        EndOfCentralDirectory64Record {
            record_size: EndOfCentralDirectory64Record::FIXED_PAYLOAD_SIZE,
            creator_version: u16::from(Version::made_by(
                crate::parse::HostSystem::Unix,
            )),
            reader_version: u16::from(Version::needed(Version::NEEDED_ZIP64)),
            disk_nbr: 0,
            dir_disk_nbr: 0,
            dir_records_this_disk: records,
            directory_records: records,
            directory_size: cd_size,
            directory_offset: cd_offset,
        }
        .write(w)?;

        EndOfCentralDirectory64Locator {
            dir_disk_number: 0,
            directory_offset: eocd64_offset,
            total_disks: 1,
        }
        .write(w)?;
        trace!(records, eocd64_offset, "wrote zip64 end of central directory");
    }

    EndOfCentralDirectoryRecord {
        disk_nbr: 0,
        dir_disk_nbr: 0,
        dir_records_this_disk: records.min(U16_SENTINEL) as u16,
        directory_records: records.min(U16_SENTINEL) as u16,
        directory_size: cd_size.min(U32_SENTINEL) as u32,
        directory_offset: cd_offset.min(U32_SENTINEL) as u32,
        comment: comment.map(|c| c.as_bytes().to_vec()).unwrap_or_default(),
    }
    .write(w)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_precompressed_formats() {
        assert!(is_poorly_compressible(b"\xff\xd8\xff\xe0 jpeg stuff"));
        assert!(is_poorly_compressible(b"\x89PNG\r\n\x1a\n rest"));
        assert!(is_poorly_compressible(b"PK\x03\x04nested zip"));
        assert!(is_poorly_compressible(b"\x00\x00\x00\x20ftypisom rest"));
        assert!(!is_poorly_compressible(b"fn main() { println!(); }"));
    }

    #[test]
    fn auto_method_stores_small_payloads() {
        assert_eq!(choose_method(b"tiny"), Method::Store);
        let big = "test;test2;test3\n".repeat(1000);
        assert_eq!(choose_method(big.as_bytes()), Method::Deflate);
    }

    #[test]
    fn version_ladder() {
        assert_eq!(
            version_needed(Method::Deflate, Method::Deflate, false, false).version,
            Version::NEEDED_DEFAULT
        );
        assert_eq!(
            version_needed(Method::Bzip2, Method::Bzip2, false, false).version,
            Version::NEEDED_BZIP2
        );
        assert_eq!(
            version_needed(Method::Deflate, Method::Deflate, false, true).version,
            Version::NEEDED_ZIP64
        );
        assert_eq!(
            version_needed(Method::Aex, Method::Bzip2, true, true).version,
            Version::NEEDED_WINZIP_AES
        );
    }
}
