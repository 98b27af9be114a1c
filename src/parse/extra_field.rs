use tracing::trace;
use winnow::{
    binary::{le_u16, le_u32, le_u64, le_u8, length_take},
    combinator::{opt, repeat_till},
    error::{ErrMode, ErrorKind, ParserError},
    seq,
    stream::Stream,
    token::{literal, take},
    PResult, Parser, Partial,
};

use crate::parse::{Method, NtfsTimestamp};

/// 4.4.28 extra field: (Variable)
pub(crate) struct ExtraFieldRecord<'a> {
    pub(crate) tag: u16,
    pub(crate) payload: &'a [u8],
}

impl<'a> ExtraFieldRecord<'a> {
    pub(crate) fn parser(i: &mut Partial<&'a [u8]>) -> PResult<Self> {
        seq! {Self {
            tag: le_u16,
            payload: length_take(le_u16),
        }}
        .parse_next(i)
    }
}

/// Useful because zip64 extended information extra field has fixed order *but*
/// optional fields. From the appnote:
///
/// If one of the size or offset fields in the Local or Central directory record
/// is too small to hold the required data, a Zip64 extended information record
/// is created. The order of the fields in the zip64 extended information record
/// is fixed, but the fields MUST only appear if the corresponding Local or
/// Central directory record field is set to 0xFFFF or 0xFFFFFFFF.
#[derive(Debug, Clone, Copy)]
pub struct ExtraFieldSettings {
    /// The uncompressed size field read from a local or central directory record.
    /// If this is 0xFFFF_FFFF, then the zip64 extra field uncompressed size
    /// field will be present.
    pub uncompressed_size_u32: u32,

    /// The compressed size field read from a local or central directory record.
    /// If this is 0xFFFF_FFFF, then the zip64 extra field compressed size
    /// field will be present.
    pub compressed_size_u32: u32,

    /// The header offset field read from a central directory record (or zero
    /// for local file headers). If this is 0xFFFF_FFFF, then the zip64
    /// extra field header offset field will be present.
    pub header_offset_u32: u32,

    /// The disk number field read from a central directory record (or zero
    /// for local file headers). If this is 0xFFFF, then the zip64 extra
    /// field disk start number field will be present.
    pub disk_start_u16: u16,
}

/// A typed record from an entry's `extra` blob.
///
/// Tags this crate knows about parse into their own variant; everything else
/// lands in [ExtraField::Unknown] with its payload intact, so it can be
/// written back verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtraField {
    /// Zip64 extended information extra field
    Zip64(ExtraZip64Field),
    /// Extended timestamp
    Timestamp(ExtraTimestampField),
    /// UNIX & Info-Zip UNIX
    Unix(ExtraUnixField),
    /// New UNIX extra field
    NewUnix(ExtraNewUnixField),
    /// NTFS (Win9x/WinNT FileTimes)
    Ntfs(ExtraNtfsField),
    /// Info-ZIP Unicode path
    UnicodePath(ExtraUnicodeField),
    /// Info-ZIP Unicode comment
    UnicodeComment(ExtraUnicodeField),
    /// Execute-permission marker emitted by java's jar tool
    JarMarker,
    /// Android zipalign padding
    ApkAlignment(ExtraApkAlignmentField),
    /// WinZip AES encryption properties
    WinZipAes(ExtraWinZipAesField),
    /// Unknown extra field, with tag and payload
    Unknown {
        /// tag of the extra field
        tag: u16,
        /// raw payload, preserved for re-serialization
        payload: Vec<u8>,
    },
}

impl ExtraField {
    /// Make a parser for extra fields, given the settings for the zip64 extra
    /// field (which depend on whether the u32 values are 0xFFFF_FFFF or not)
    pub fn mk_parser(
        settings: ExtraFieldSettings,
    ) -> impl FnMut(&mut Partial<&'_ [u8]>) -> PResult<Self> {
        move |i| {
            use ExtraField as EF;
            let rec = ExtraFieldRecord::parser.parse_next(i)?;
            let payload = &mut Partial::new(rec.payload);

            let variant = match rec.tag {
                ExtraZip64Field::TAG => {
                    opt(ExtraZip64Field::mk_parser(settings).map(EF::Zip64)).parse_next(payload)?
                }
                ExtraTimestampField::TAG => {
                    opt(ExtraTimestampField::parser.map(EF::Timestamp)).parse_next(payload)?
                }
                ExtraNtfsField::TAG => {
                    opt(ExtraNtfsField::parser.map(EF::Ntfs)).parse_next(payload)?
                }
                ExtraUnixField::TAG | ExtraUnixField::TAG_INFOZIP => {
                    opt(ExtraUnixField::parser.map(EF::Unix)).parse_next(payload)?
                }
                ExtraNewUnixField::TAG => {
                    opt(ExtraNewUnixField::parser.map(EF::NewUnix)).parse_next(payload)?
                }
                ExtraUnicodeField::TAG_PATH => {
                    opt(ExtraUnicodeField::parser.map(EF::UnicodePath)).parse_next(payload)?
                }
                ExtraUnicodeField::TAG_COMMENT => {
                    opt(ExtraUnicodeField::parser.map(EF::UnicodeComment)).parse_next(payload)?
                }
                Self::TAG_JAR_MARKER => rec.payload.is_empty().then_some(EF::JarMarker),
                ExtraApkAlignmentField::TAG => {
                    opt(ExtraApkAlignmentField::parser.map(EF::ApkAlignment)).parse_next(payload)?
                }
                ExtraWinZipAesField::TAG => {
                    opt(ExtraWinZipAesField::parser.map(EF::WinZipAes)).parse_next(payload)?
                }
                _ => None,
            }
            .unwrap_or(EF::Unknown {
                tag: rec.tag,
                payload: rec.payload.to_vec(),
            });

            Ok(variant)
        }
    }

    const TAG_JAR_MARKER: u16 = 0xcafe;

    /// The header ID this field serializes under.
    pub fn tag(&self) -> u16 {
        match self {
            ExtraField::Zip64(_) => ExtraZip64Field::TAG,
            ExtraField::Timestamp(_) => ExtraTimestampField::TAG,
            ExtraField::Unix(_) => ExtraUnixField::TAG,
            ExtraField::NewUnix(_) => ExtraNewUnixField::TAG,
            ExtraField::Ntfs(_) => ExtraNtfsField::TAG,
            ExtraField::UnicodePath(_) => ExtraUnicodeField::TAG_PATH,
            ExtraField::UnicodeComment(_) => ExtraUnicodeField::TAG_COMMENT,
            ExtraField::JarMarker => Self::TAG_JAR_MARKER,
            ExtraField::ApkAlignment(_) => ExtraApkAlignmentField::TAG,
            ExtraField::WinZipAes(_) => ExtraWinZipAesField::TAG,
            ExtraField::Unknown { tag, .. } => *tag,
        }
    }

    /// Serializes the full `header_id | size | payload` record.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        let payload = self.payload_bytes();
        out.extend_from_slice(&u16::to_le_bytes(self.tag()));
        out.extend_from_slice(&u16::to_le_bytes(payload.len() as u16));
        out.extend_from_slice(&payload);
    }

    fn payload_bytes(&self) -> Vec<u8> {
        let mut p = Vec::new();
        match self {
            ExtraField::Zip64(f) => f.write_payload(&mut p),
            ExtraField::Timestamp(f) => f.write_payload(&mut p),
            ExtraField::Unix(f) => f.write_payload(&mut p),
            ExtraField::NewUnix(f) => f.write_payload(&mut p),
            ExtraField::Ntfs(f) => f.write_payload(&mut p),
            ExtraField::UnicodePath(f) | ExtraField::UnicodeComment(f) => f.write_payload(&mut p),
            ExtraField::JarMarker => {}
            ExtraField::ApkAlignment(f) => f.write_payload(&mut p),
            ExtraField::WinZipAes(f) => f.write_payload(&mut p),
            ExtraField::Unknown { payload, .. } => p.extend_from_slice(payload),
        }
        p
    }
}

/// Parses an entry's extra blob into typed records.
///
/// A record whose declared size overruns the blob stops the walk: whatever
/// parsed so far is returned and the rest is ignored. Unchanged entries are
/// written back from their raw blob, so nothing is lost unless the entry is
/// re-encoded.
pub(crate) fn parse_extra_fields(blob: &[u8], settings: ExtraFieldSettings) -> Vec<ExtraField> {
    let mut fields = Vec::new();
    let mut slice = Partial::new(blob);
    while !slice.is_empty() {
        match ExtraField::mk_parser(settings).parse_next(&mut slice) {
            Ok(ef) => fields.push(ef),
            Err(e) => {
                trace!("stopping extra field walk: {e}");
                break;
            }
        }
    }
    fields
}

/// Serializes typed records back into an extra blob.
pub(crate) fn write_extra_fields(fields: &[ExtraField]) -> Vec<u8> {
    let mut out = Vec::new();
    for field in fields {
        field.write_to(&mut out);
    }
    out
}

/// 4.5.3 -Zip64 Extended Information Extra Field (0x0001)
///
/// Only the fields whose classic slot held a sentinel are present on disk;
/// absent fields stay `None` here so serialization mirrors the original.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtraZip64Field {
    /// 64-bit uncompressed size
    pub uncompressed_size: Option<u64>,

    /// 64-bit compressed size
    pub compressed_size: Option<u64>,

    /// 64-bit header offset
    pub header_offset: Option<u64>,

    /// 32-bit disk start number
    pub disk_start: Option<u32>,
}

impl ExtraZip64Field {
    pub(crate) const TAG: u16 = 0x0001;

    pub(crate) fn mk_parser(
        settings: ExtraFieldSettings,
    ) -> impl FnMut(&mut Partial<&'_ [u8]>) -> PResult<Self> {
        move |i| {
            let uncompressed_size = if settings.uncompressed_size_u32 == 0xFFFF_FFFF {
                Some(le_u64.parse_next(i)?)
            } else {
                None
            };
            let compressed_size = if settings.compressed_size_u32 == 0xFFFF_FFFF {
                Some(le_u64.parse_next(i)?)
            } else {
                None
            };
            let header_offset = if settings.header_offset_u32 == 0xFFFF_FFFF {
                Some(le_u64.parse_next(i)?)
            } else {
                None
            };
            let disk_start = if settings.disk_start_u16 == 0xFFFF {
                Some(le_u32.parse_next(i)?)
            } else {
                None
            };

            Ok(Self {
                uncompressed_size,
                compressed_size,
                header_offset,
                disk_start,
            })
        }
    }

    fn write_payload(&self, out: &mut Vec<u8>) {
        if let Some(n) = self.uncompressed_size {
            out.extend_from_slice(&u64::to_le_bytes(n));
        }
        if let Some(n) = self.compressed_size {
            out.extend_from_slice(&u64::to_le_bytes(n));
        }
        if let Some(n) = self.header_offset {
            out.extend_from_slice(&u64::to_le_bytes(n));
        }
        if let Some(n) = self.disk_start {
            out.extend_from_slice(&u32::to_le_bytes(n));
        }
    }
}

/// 4.5.5 -Extended Timestamp Extra Field (0x5455)
///
/// The flags byte describes which timestamps the *local* variant carries;
/// the central variant is allowed to truncate after the modification time,
/// which is why everything past the flags is optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtraTimestampField {
    /// bit 0 = mtime present, bit 1 = atime, bit 2 = ctime
    pub flags: u8,

    /// number of seconds since epoch, last modification
    pub mtime: Option<u32>,

    /// number of seconds since epoch, last access
    pub atime: Option<u32>,

    /// number of seconds since epoch, creation
    pub ctime: Option<u32>,
}

impl ExtraTimestampField {
    pub(crate) const TAG: u16 = 0x5455;

    const FLAG_MTIME: u8 = 0b001;
    const FLAG_ATIME: u8 = 0b010;
    const FLAG_CTIME: u8 = 0b100;

    fn parser(i: &mut Partial<&'_ [u8]>) -> PResult<Self> {
        let flags = le_u8.parse_next(i)?;
        let mtime = if flags & Self::FLAG_MTIME != 0 {
            opt(le_u32.complete_err()).parse_next(i)?
        } else {
            None
        };
        let atime = if flags & Self::FLAG_ATIME != 0 {
            opt(le_u32.complete_err()).parse_next(i)?
        } else {
            None
        };
        let ctime = if flags & Self::FLAG_CTIME != 0 {
            opt(le_u32.complete_err()).parse_next(i)?
        } else {
            None
        };
        Ok(Self {
            flags,
            mtime,
            atime,
            ctime,
        })
    }

    /// A field carrying only a modification time.
    pub fn from_mtime(mtime: u32) -> Self {
        Self {
            flags: Self::FLAG_MTIME,
            mtime: Some(mtime),
            atime: None,
            ctime: None,
        }
    }

    fn write_payload(&self, out: &mut Vec<u8>) {
        out.push(self.flags);
        for t in [self.mtime, self.atime, self.ctime].into_iter().flatten() {
            out.extend_from_slice(&u32::to_le_bytes(t));
        }
    }
}

/// 4.5.7 -UNIX Extra Field (0x000d):
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraUnixField {
    /// file last access time
    pub atime: u32,
    /// file last modification time
    pub mtime: u32,
    /// file user id, not always present
    pub uid: Option<u16>,
    /// file group id, not always present
    pub gid: Option<u16>,
    /// variable length data field
    pub data: Vec<u8>,
}

impl ExtraUnixField {
    pub(crate) const TAG: u16 = 0x000d;
    pub(crate) const TAG_INFOZIP: u16 = 0x5855;

    fn parser(i: &mut Partial<&'_ [u8]>) -> PResult<Self> {
        let atime = le_u32.parse_next(i)?;
        let mtime = le_u32.parse_next(i)?;
        let uid = opt(le_u16.complete_err()).parse_next(i)?;
        let gid = opt(le_u16.complete_err()).parse_next(i)?;
        let data = take(i.eof_offset()).parse_next(i)?.to_vec();
        Ok(Self {
            atime,
            mtime,
            uid,
            gid,
            data,
        })
    }

    fn write_payload(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&u32::to_le_bytes(self.atime));
        out.extend_from_slice(&u32::to_le_bytes(self.mtime));
        if let Some(uid) = self.uid {
            out.extend_from_slice(&u16::to_le_bytes(uid));
        }
        if let Some(gid) = self.gid {
            out.extend_from_slice(&u16::to_le_bytes(gid));
        }
        out.extend_from_slice(&self.data);
    }
}

/// Info-ZIP New Unix Extra Field:
/// ====================================
///
/// Currently stores Unix UIDs/GIDs up to 32 bits.
/// (Last Revision 20080509)
///
/// ```text
/// Value         Size        Description
/// -----         ----        -----------
/// 0x7875        Short       tag for this extra block type ("ux")
/// TSize         Short       total data size for this block
/// Version       1 byte      version of this extra field, currently 1
/// UIDSize       1 byte      Size of UID field
/// UID           Variable    UID for this entry
/// GIDSize       1 byte      Size of GID field
/// GID           Variable    GID for this entry
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtraNewUnixField {
    /// file user id
    pub uid: u64,

    /// file group id
    pub gid: u64,
}

impl ExtraNewUnixField {
    pub(crate) const TAG: u16 = 0x7875;

    fn parser(i: &mut Partial<&'_ [u8]>) -> PResult<Self> {
        let _ = literal("\x01").parse_next(i)?;
        seq! {Self {
            uid: Self::parse_variable_length_integer,
            gid: Self::parse_variable_length_integer,
        }}
        .parse_next(i)
    }

    fn parse_variable_length_integer(i: &mut Partial<&'_ [u8]>) -> PResult<u64> {
        let slice = length_take(le_u8).parse_next(i)?;
        if let Some(u) = match slice.len() {
            1 => Some(le_u8.parse_peek(slice)?.1 as u64),
            2 => Some(le_u16.parse_peek(slice)?.1 as u64),
            4 => Some(le_u32.parse_peek(slice)?.1 as u64),
            8 => Some(le_u64.parse_peek(slice)?.1),
            _ => None,
        } {
            Ok(u)
        } else {
            Err(ErrMode::from_error_kind(i, ErrorKind::Alt))
        }
    }

    fn write_payload(&self, out: &mut Vec<u8>) {
        out.push(1);
        for id in [self.uid, self.gid] {
            if id <= u32::MAX as u64 {
                out.push(4);
                out.extend_from_slice(&u32::to_le_bytes(id as u32));
            } else {
                out.push(8);
                out.extend_from_slice(&u64::to_le_bytes(id));
            }
        }
    }
}

/// 4.5.5 -NTFS Extra Field (0x000a):
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraNtfsField {
    /// NTFS attributes
    pub attrs: Vec<NtfsAttr>,
}

impl ExtraNtfsField {
    pub(crate) const TAG: u16 = 0x000a;

    fn parser(i: &mut Partial<&'_ [u8]>) -> PResult<Self> {
        let _ = take(4_usize).parse_next(i)?; // reserved (unused)
        seq! {Self {
            // from the winnow docs:
            //   Parsers like repeat do not know when an eof is from insufficient
            //   data or the end of the stream, causing them to always report
            //   Incomplete.
            // using repeat_till with eof combinator to work around this:
            attrs: repeat_till(0.., NtfsAttr::parser, winnow::combinator::eof).map(|x| x.0),
        }}
        .parse_next(i)
    }

    fn write_payload(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&u32::to_le_bytes(0)); // reserved
        for attr in &self.attrs {
            attr.write_to(out);
        }
    }
}

/// NTFS attribute for zip entries (mostly timestamps)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NtfsAttr {
    /// NTFS attribute 1, which contains modified/accessed/created timestamps
    Attr1(NtfsAttr1),

    /// Unknown NTFS attribute
    Unknown {
        /// tag of the attribute
        tag: u16,
        /// raw payload, preserved for re-serialization
        payload: Vec<u8>,
    },
}

impl NtfsAttr {
    fn parser(i: &mut Partial<&'_ [u8]>) -> PResult<Self> {
        let tag = le_u16.parse_next(i)?;
        let payload = length_take(le_u16).parse_next(i)?;

        match tag {
            0x0001 => NtfsAttr1::parser
                .parse_peek(Partial::new(payload))
                .map(|(_, attr)| NtfsAttr::Attr1(attr)),
            _ => Ok(NtfsAttr::Unknown {
                tag,
                payload: payload.to_vec(),
            }),
        }
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            NtfsAttr::Attr1(attr1) => {
                out.extend_from_slice(&u16::to_le_bytes(0x0001));
                out.extend_from_slice(&u16::to_le_bytes(24));
                for ts in [attr1.mtime, attr1.atime, attr1.ctime] {
                    out.extend_from_slice(&u64::to_le_bytes(ts.timestamp));
                }
            }
            NtfsAttr::Unknown { tag, payload } => {
                out.extend_from_slice(&u16::to_le_bytes(*tag));
                out.extend_from_slice(&u16::to_le_bytes(payload.len() as u16));
                out.extend_from_slice(payload);
            }
        }
    }
}

/// NTFS attribute 1, which contains modified/accessed/created timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NtfsAttr1 {
    /// modified time
    pub mtime: NtfsTimestamp,

    /// accessed time
    pub atime: NtfsTimestamp,

    /// created time
    pub ctime: NtfsTimestamp,
}

impl NtfsAttr1 {
    fn parser(i: &mut Partial<&'_ [u8]>) -> PResult<Self> {
        seq! {Self {
            mtime: NtfsTimestamp::parser,
            atime: NtfsTimestamp::parser,
            ctime: NtfsTimestamp::parser,
        }}
        .parse_next(i)
    }
}

/// Info-ZIP Unicode Path (0x7075) / Unicode Comment (0x6375) Extra Field
///
/// Carries a UTF-8 replacement for the legacy code-page name or comment.
/// The stored CRC-32 is that of the legacy bytes at the time the field was
/// written; when it no longer matches, the override is stale and must be
/// ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraUnicodeField {
    /// CRC-32 of the legacy (code page) field this overrides
    pub crc32: u32,

    /// UTF-8 replacement text
    pub text: Vec<u8>,
}

impl ExtraUnicodeField {
    pub(crate) const TAG_PATH: u16 = 0x7075;
    pub(crate) const TAG_COMMENT: u16 = 0x6375;

    fn parser(i: &mut Partial<&'_ [u8]>) -> PResult<Self> {
        // versions other than 1 are unknown to us: reject, so the whole
        // record survives as an opaque field instead
        let _ = literal("\x01").parse_next(i)?;
        let crc32 = le_u32.parse_next(i)?;
        let text = take(i.eof_offset()).parse_next(i)?.to_vec();
        Ok(Self { crc32, text })
    }

    /// True when this override still applies to the given legacy bytes.
    pub fn matches(&self, legacy: &[u8]) -> bool {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(legacy);
        hasher.finalize() == self.crc32
    }

    fn write_payload(&self, out: &mut Vec<u8>) {
        out.push(1);
        out.extend_from_slice(&u32::to_le_bytes(self.crc32));
        out.extend_from_slice(&self.text);
    }
}

/// Android zipalign padding field (0xd935)
///
/// The alignment multiple, followed by however many zero bytes were needed
/// to bring the entry's payload to that multiple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraApkAlignmentField {
    /// alignment multiple, in bytes
    pub alignment: u16,

    /// padding bytes (zeroes, as emitted by zipalign)
    pub padding: Vec<u8>,
}

impl ExtraApkAlignmentField {
    pub(crate) const TAG: u16 = 0xd935;

    fn parser(i: &mut Partial<&'_ [u8]>) -> PResult<Self> {
        let alignment = le_u16.parse_next(i)?;
        let padding = take(i.eof_offset()).parse_next(i)?.to_vec();
        Ok(Self { alignment, padding })
    }

    fn write_payload(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&u16::to_le_bytes(self.alignment));
        out.extend_from_slice(&self.padding);
    }
}

/// WinZip AES properties (0x9901)
///
/// See the appnote's Appendix E and
/// <https://www.winzip.com/en/support/aes-encryption/>
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtraWinZipAesField {
    /// 1 for AE-1 (CRC kept), 2 for AE-2 (CRC zeroed)
    pub vendor_version: u16,

    /// key strength code: 1 = 128-bit, 2 = 192-bit, 3 = 256-bit
    pub strength: u8,

    /// the compression method applied before encryption
    pub method: Method,
}

impl ExtraWinZipAesField {
    pub(crate) const TAG: u16 = 0x9901;

    /// "AE", as a little-endian u16
    const VENDOR_ID: u16 = 0x4541;

    fn parser(i: &mut Partial<&'_ [u8]>) -> PResult<Self> {
        let vendor_version = le_u16.verify(|v| (1..=2).contains(v)).parse_next(i)?;
        let _ = le_u16.verify(|v| *v == Self::VENDOR_ID).parse_next(i)?;
        let strength = le_u8.verify(|s| (1..=3).contains(s)).parse_next(i)?;
        let method = Method::parser.parse_next(i)?;
        Ok(Self {
            vendor_version,
            strength,
            method,
        })
    }

    fn write_payload(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&u16::to_le_bytes(self.vendor_version));
        out.extend_from_slice(&u16::to_le_bytes(Self::VENDOR_ID));
        out.push(self.strength);
        out.extend_from_slice(&u16::to_le_bytes(u16::from(self.method)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_sentinels() -> ExtraFieldSettings {
        ExtraFieldSettings {
            uncompressed_size_u32: 0,
            compressed_size_u32: 0,
            header_offset_u32: 0,
            disk_start_u16: 0,
        }
    }

    #[test]
    fn unknown_fields_round_trip() {
        let blob: &[u8] = &[
            0x34, 0x12, 0x03, 0x00, 0xaa, 0xbb, 0xcc, // unknown tag 0x1234
            0xfe, 0xca, 0x00, 0x00, // jar marker
        ];
        let fields = parse_extra_fields(blob, no_sentinels());
        assert_eq!(fields.len(), 2);
        assert!(matches!(fields[0], ExtraField::Unknown { tag: 0x1234, .. }));
        assert_eq!(fields[1], ExtraField::JarMarker);
        assert_eq!(write_extra_fields(&fields), blob);
    }

    #[test]
    fn overrun_stops_the_walk() {
        // second record claims 200 bytes of payload, blob ends early
        let blob: &[u8] = &[
            0xfe, 0xca, 0x00, 0x00, // jar marker
            0x34, 0x12, 0xc8, 0x00, 0x01, 0x02, // truncated
        ];
        let fields = parse_extra_fields(blob, no_sentinels());
        assert_eq!(fields, vec![ExtraField::JarMarker]);
    }

    #[test]
    fn zip64_only_carries_sentineled_fields() {
        let mut blob = Vec::new();
        ExtraField::Zip64(ExtraZip64Field {
            uncompressed_size: Some(5_000_000_000),
            compressed_size: None,
            header_offset: None,
            disk_start: None,
        })
        .write_to(&mut blob);
        assert_eq!(blob.len(), 4 + 8);

        let settings = ExtraFieldSettings {
            uncompressed_size_u32: 0xffff_ffff,
            ..no_sentinels()
        };
        let fields = parse_extra_fields(&blob, settings);
        match &fields[..] {
            [ExtraField::Zip64(z)] => {
                assert_eq!(z.uncompressed_size, Some(5_000_000_000));
                assert_eq!(z.compressed_size, None);
            }
            other => panic!("unexpected fields: {other:?}"),
        }
    }

    #[test]
    fn winzip_aes_field_round_trip() {
        let field = ExtraField::WinZipAes(ExtraWinZipAesField {
            vendor_version: 1,
            strength: 3,
            method: Method::Deflate,
        });
        let mut blob = Vec::new();
        field.write_to(&mut blob);
        assert_eq!(blob, [0x01, 0x99, 0x07, 0x00, 0x01, 0x00, 0x41, 0x45, 0x03, 0x08, 0x00]);
        assert_eq!(parse_extra_fields(&blob, no_sentinels()), vec![field]);
    }

    #[test]
    fn stale_unicode_path_detected() {
        let field = ExtraUnicodeField {
            crc32: {
                let mut h = crc32fast::Hasher::new();
                h.update(b"old-name.txt");
                h.finalize()
            },
            text: "nouveau-nom.txt".into(),
        };
        assert!(field.matches(b"old-name.txt"));
        assert!(!field.matches(b"renamed.txt"));
    }

    #[test]
    fn timestamp_flags_gate_values() {
        // central variant: flags advertise mtime+atime, only mtime stored
        let blob: &[u8] = &[0x55, 0x54, 0x05, 0x00, 0x03, 0x78, 0x56, 0x34, 0x12];
        let fields = parse_extra_fields(blob, no_sentinels());
        match &fields[..] {
            [ExtraField::Timestamp(ts)] => {
                assert_eq!(ts.flags, 0x03);
                assert_eq!(ts.mtime, Some(0x12345678));
                assert_eq!(ts.atime, None);
            }
            other => panic!("unexpected fields: {other:?}"),
        }
        // and it round-trips with the truncated shape intact
        assert_eq!(write_extra_fields(&fields), blob);
    }
}
