use std::io::{self, Write};

use byteorder::{WriteBytesExt, LE};
use winnow::{
    binary::{le_u16, le_u32, le_u64},
    combinator::opt,
    seq,
    token::{literal, take},
    PResult, Parser, Partial,
};

use crate::parse::{Method, MsdosTimestamp, Version};

/// 4.3.7 Local file header
#[derive(Debug, Clone)]
pub struct LocalFileHeader {
    /// version needed to extract
    pub reader_version: Version,

    /// general purpose bit flag
    pub flags: u16,

    /// compression method
    pub method: Method,

    /// last mod file datetime
    pub modified: MsdosTimestamp,

    /// crc-32
    pub crc32: u32,

    /// compressed size
    pub compressed_size: u32,

    /// uncompressed size
    pub uncompressed_size: u32,

    /// file name
    pub name: Vec<u8>,

    /// extra field
    pub extra: Vec<u8>,
}

impl LocalFileHeader {
    /// The signature for a local file header
    pub const SIGNATURE: &'static str = "PK\x03\x04";

    /// Length of the fixed prefix, including the signature.
    pub const FIXED_LENGTH: usize = 30;

    /// Parser for the local file header
    pub fn parser(i: &mut Partial<&'_ [u8]>) -> PResult<Self> {
        let _ = literal(Self::SIGNATURE).parse_next(i)?;

        let reader_version = Version::parser.parse_next(i)?;
        let flags = le_u16.parse_next(i)?;
        let method = le_u16.parse_next(i).map(Method::from)?;
        let modified = MsdosTimestamp::parser.parse_next(i)?;
        let crc32 = le_u32.parse_next(i)?;
        let compressed_size = le_u32.parse_next(i)?;
        let uncompressed_size = le_u32.parse_next(i)?;

        let name_len = le_u16.parse_next(i)?;
        let extra_len = le_u16.parse_next(i)?;

        let name = take(name_len).parse_next(i)?.to_vec();
        let extra = take(extra_len).parse_next(i)?.to_vec();

        Ok(Self {
            reader_version,
            flags,
            method,
            modified,
            crc32,
            compressed_size,
            uncompressed_size,
            name,
            extra,
        })
    }

    /// Check for the presence of the bit flag that indicates a data descriptor
    /// is present after the file data.
    pub fn has_data_descriptor(&self) -> bool {
        // 4.3.9.1 This descriptor MUST exist if bit 3 of the general
        // purpose bit flag is set (see below).
        self.flags & 0b1000 != 0
    }

    /// Writes the header, including signature, name and extra.
    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(Self::SIGNATURE.as_bytes())?;
        self.reader_version.write(w)?;
        w.write_u16::<LE>(self.flags)?;
        w.write_u16::<LE>(u16::from(self.method))?;
        self.modified.write(w)?;
        w.write_u32::<LE>(self.crc32)?;
        w.write_u32::<LE>(self.compressed_size)?;
        w.write_u32::<LE>(self.uncompressed_size)?;
        w.write_u16::<LE>(self.name.len() as u16)?;
        w.write_u16::<LE>(self.extra.len() as u16)?;
        w.write_all(&self.name)?;
        w.write_all(&self.extra)?;
        Ok(())
    }
}

/// 4.3.9  Data descriptor:
#[derive(Debug)]
pub struct DataDescriptorRecord {
    /// CRC32 checksum
    pub crc32: u32,
    /// Compressed size
    pub compressed_size: u64,
    /// Uncompressed size
    pub uncompressed_size: u64,
}

impl DataDescriptorRecord {
    const SIGNATURE: &'static str = "PK\x07\x08";

    /// Create a parser for the data descriptor record.
    pub fn mk_parser(is_zip64: bool) -> impl FnMut(&mut Partial<&'_ [u8]>) -> PResult<Self> {
        move |i| {
            // From appnote.txt:
            //
            // 4.3.9.3 Although not originally assigned a signature, the value
            // 0x08074b50 has commonly been adopted as a signature value for the
            // data descriptor record.  Implementers SHOULD be aware that ZIP files
            // MAY be encountered with or without this signature marking data
            // descriptors and SHOULD account for either case when reading ZIP files
            // to ensure compatibility.
            let _ = opt(literal(Self::SIGNATURE)).parse_next(i)?;

            if is_zip64 {
                seq! {Self {
                    crc32: le_u32,
                    compressed_size: le_u64,
                    uncompressed_size: le_u64,
                }}
                .parse_next(i)
            } else {
                seq! {Self {
                    crc32: le_u32,
                    compressed_size: le_u32.map(|x| x as u64),
                    uncompressed_size: le_u32.map(|x| x as u64),
                }}
                .parse_next(i)
            }
        }
    }

    /// Writes the descriptor with its (optional-per-spec, always emitted
    /// here) signature; 8-byte sizes when `is_zip64` is set.
    pub fn write<W: Write>(&self, w: &mut W, is_zip64: bool) -> io::Result<()> {
        w.write_all(Self::SIGNATURE.as_bytes())?;
        w.write_u32::<LE>(self.crc32)?;
        if is_zip64 {
            w.write_u64::<LE>(self.compressed_size)?;
            w.write_u64::<LE>(self.uncompressed_size)?;
        } else {
            w.write_u32::<LE>(self.compressed_size as u32)?;
            w.write_u32::<LE>(self.uncompressed_size as u32)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_header_round_trip() {
        let header = LocalFileHeader {
            reader_version: Version::needed(Version::NEEDED_DEFAULT),
            flags: 0x0800,
            method: Method::Deflate,
            modified: MsdosTimestamp::default(),
            crc32: 0xdeadbeef,
            compressed_size: 10,
            uncompressed_size: 30,
            name: b"hello.txt".to_vec(),
            extra: vec![],
        };
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        assert_eq!(buf.len(), LocalFileHeader::FIXED_LENGTH + 9);

        let (_, parsed) = LocalFileHeader::parser.parse_peek(Partial::new(&buf[..])).unwrap();
        assert_eq!(parsed.method, Method::Deflate);
        assert_eq!(parsed.crc32, 0xdeadbeef);
        assert_eq!(parsed.name, b"hello.txt");
    }

    #[test]
    fn descriptor_signature_is_optional_on_read() {
        let with_sig = {
            let mut v = Vec::new();
            DataDescriptorRecord {
                crc32: 1,
                compressed_size: 2,
                uncompressed_size: 3,
            }
            .write(&mut v, false)
            .unwrap();
            v
        };
        let without_sig = with_sig[4..].to_vec();

        for bytes in [with_sig, without_sig] {
            let (_, desc) = DataDescriptorRecord::mk_parser(false)
                .parse_peek(Partial::new(&bytes[..]))
                .unwrap();
            assert_eq!((desc.crc32, desc.compressed_size, desc.uncompressed_size), (1, 2, 3));
        }
    }
}
