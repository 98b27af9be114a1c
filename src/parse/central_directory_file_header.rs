use std::io::{self, Write};

use byteorder::{WriteBytesExt, LE};
use winnow::{
    binary::{le_u16, le_u32},
    prelude::PResult,
    token::{literal, take},
    Parser, Partial,
};

use crate::{
    encoding::is_entry_non_utf8,
    parse::{Method, MsdosTimestamp, Version},
};

/// 4.3.12 Central directory structure: File header
#[derive(Debug, Clone)]
pub struct CentralDirectoryFileHeader {
    /// version made by
    pub creator_version: Version,

    /// version needed to extract
    pub reader_version: Version,

    /// general purpose bit flag
    pub flags: u16,

    /// compression method
    pub method: Method,

    /// last mod file datetime
    pub modified: MsdosTimestamp,

    /// crc32 hash
    pub crc32: u32,

    /// compressed size
    pub compressed_size: u32,

    /// uncompressed size
    pub uncompressed_size: u32,

    /// disk number start
    pub disk_nbr_start: u16,

    /// internal file attributes
    pub internal_attrs: u16,

    /// external file attributes
    pub external_attrs: u32,

    /// relative offset of local header
    pub header_offset: u32,

    /// name field, in whatever encoding the archive uses
    pub name: Vec<u8>,

    /// extra field
    pub extra: Vec<u8>,

    /// comment field
    pub comment: Vec<u8>,
}

impl CentralDirectoryFileHeader {
    const SIGNATURE: &'static str = "PK\x01\x02";

    /// Length of the fixed prefix, including the signature.
    pub const FIXED_LENGTH: usize = 46;

    /// Parser for the central directory file header
    pub fn parser(i: &mut Partial<&'_ [u8]>) -> PResult<Self> {
        _ = literal(Self::SIGNATURE).parse_next(i)?;
        let creator_version = Version::parser.parse_next(i)?;
        let reader_version = Version::parser.parse_next(i)?;
        let flags = le_u16.parse_next(i)?;
        let method = Method::parser.parse_next(i)?;
        let modified = MsdosTimestamp::parser.parse_next(i)?;
        let crc32 = le_u32.parse_next(i)?;
        let compressed_size = le_u32.parse_next(i)?;
        let uncompressed_size = le_u32.parse_next(i)?;
        let name_len = le_u16.parse_next(i)?;
        let extra_len = le_u16.parse_next(i)?;
        let comment_len = le_u16.parse_next(i)?;
        let disk_nbr_start = le_u16.parse_next(i)?;
        let internal_attrs = le_u16.parse_next(i)?;
        let external_attrs = le_u32.parse_next(i)?;
        let header_offset = le_u32.parse_next(i)?;

        let name = take(name_len).parse_next(i)?;
        let extra = take(extra_len).parse_next(i)?;
        let comment = take(comment_len).parse_next(i)?;

        Ok(Self {
            creator_version,
            reader_version,
            flags,
            method,
            modified,
            crc32,
            compressed_size,
            uncompressed_size,
            disk_nbr_start,
            internal_attrs,
            external_attrs,
            header_offset,
            name: name.to_vec(),
            extra: extra.to_vec(),
            comment: comment.to_vec(),
        })
    }

    /// Returns true if the name or comment is not valid UTF-8
    pub fn is_non_utf8(&self) -> bool {
        is_entry_non_utf8(&self.name, &self.comment, self.flags)
    }

    /// Writes the header, including signature, name, extra and comment.
    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(Self::SIGNATURE.as_bytes())?;
        self.creator_version.write(w)?;
        self.reader_version.write(w)?;
        w.write_u16::<LE>(self.flags)?;
        w.write_u16::<LE>(u16::from(self.method))?;
        self.modified.write(w)?;
        w.write_u32::<LE>(self.crc32)?;
        w.write_u32::<LE>(self.compressed_size)?;
        w.write_u32::<LE>(self.uncompressed_size)?;
        w.write_u16::<LE>(self.name.len() as u16)?;
        w.write_u16::<LE>(self.extra.len() as u16)?;
        w.write_u16::<LE>(self.comment.len() as u16)?;
        w.write_u16::<LE>(self.disk_nbr_start)?;
        w.write_u16::<LE>(self.internal_attrs)?;
        w.write_u32::<LE>(self.external_attrs)?;
        w.write_u32::<LE>(self.header_offset)?;
        w.write_all(&self.name)?;
        w.write_all(&self.extra)?;
        w.write_all(&self.comment)?;
        Ok(())
    }
}
