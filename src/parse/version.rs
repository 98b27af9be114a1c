use num_enum::{FromPrimitive, IntoPrimitive};
use std::fmt;
use std::io::{self, Write};

use byteorder::{WriteBytesExt, LE};
use winnow::{binary::le_u8, seq, PResult, Parser, Partial};

/// A zip version (either created by, or required when reading an archive).
///
/// Versions determine which features are supported by a tool, and
/// which features are required when reading a file.
///
/// For more information, see the [.ZIP Application Note](https://support.pkware.com/display/PKZIP/APPNOTE), section 4.4.2.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version {
    /// The host system on which the archive was created
    pub host_system: HostSystem,

    /// Integer version, e.g. 45 for Zip version 4.5
    /// See APPNOTE, section 4.4.2.1
    pub version: u8,
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:?} v{}.{}",
            self.host_system,
            self.version / 10,
            self.version % 10
        )
    }
}

impl Version {
    /// The appnote revision this crate writes archives against.
    pub const SPEC_VERSION: u8 = 63;

    /// Minimum version needed for stored entries and folders.
    pub const NEEDED_DEFAULT: u8 = 20;

    /// Minimum version needed for zip64 extensions.
    pub const NEEDED_ZIP64: u8 = 45;

    /// Minimum version needed for bzip2 compression.
    pub const NEEDED_BZIP2: u8 = 46;

    /// Minimum version needed for WinZip AES encryption.
    pub const NEEDED_WINZIP_AES: u8 = 51;

    /// Parse a version from a byte slice
    pub fn parser(i: &mut Partial<&'_ [u8]>) -> PResult<Self> {
        seq! {Self {
            host_system: le_u8.map(HostSystem::from),
            version: le_u8,
        }}
        .parse_next(i)
    }

    /// Writes the version as its on-disk u16: low byte is the version,
    /// high byte the host system.
    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u16::<LE>(u16::from(*self))
    }

    /// The "version made by" value this crate stamps on entries it encodes.
    pub fn made_by(host_system: HostSystem) -> Self {
        Self {
            host_system,
            version: Self::SPEC_VERSION,
        }
    }

    /// A "version needed to extract" value, which carries no host system.
    pub fn needed(version: u8) -> Self {
        Self {
            host_system: HostSystem::MsDos,
            version,
        }
    }
}

impl From<u16> for Version {
    fn from(u: u16) -> Self {
        Self {
            host_system: HostSystem::from((u >> 8) as u8),
            version: u as u8,
        }
    }
}

impl From<Version> for u16 {
    fn from(v: Version) -> Self {
        ((u8::from(v.host_system) as u16) << 8) | v.version as u16
    }
}

/// System on which an archive was created, as encoded into a version u16.
///
/// See APPNOTE, section 4.4.2.2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum HostSystem {
    /// MS-DOS and OS/2 (FAT / VFAT / FAT32 file systems)
    MsDos = 0,

    /// Amiga
    Amiga = 1,

    /// OpenVMS
    OpenVms = 2,

    /// UNIX
    Unix = 3,

    /// VM/CMS
    VmCms = 4,

    /// Atari ST
    AtariSt = 5,

    /// OS/2 H.P.F.S
    Os2Hpfs = 6,

    /// Macintosh (see `Osx`)
    Macintosh = 7,

    /// Z-System
    ZSystem = 8,

    /// CP/M
    CpM = 9,

    /// Windows NTFS
    WindowsNtfs = 10,

    /// MVS (OS/390 - Z/OS)
    Mvs = 11,

    /// VSE
    Vse = 12,

    /// Acorn Risc
    AcornRisc = 13,

    /// VFAT
    Vfat = 14,

    /// alternate MVS
    AlternateMvs = 15,

    /// BeOS
    BeOs = 16,

    /// Tandem
    Tandem = 17,

    /// OS/400
    Os400 = 18,

    /// OS X (Darwin)
    Osx = 19,

    /// Unknown host system
    ///
    /// Values 20 through 255 are currently unused, as of
    /// APPNOTE.TXT 6.3.10
    #[num_enum(catch_all)]
    Unknown(u8),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_u16_round_trip() {
        let v = Version::made_by(HostSystem::Unix);
        assert_eq!(u16::from(v), (3 << 8) | 63);
        assert_eq!(Version::from(u16::from(v)), v);
    }
}
