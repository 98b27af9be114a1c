use winnow::{binary::le_u16, PResult, Parser, Partial};

/// Compression method used for a file entry.
///
/// In archives that follow [ISO/IEC 21320-1:2015](https://www.iso.org/standard/60101.html), only
/// [Store][Method::Store] and [Deflate][Method::Deflate] should be used.
///
/// This crate produces [Store][Method::Store], [Deflate][Method::Deflate] and
/// [Bzip2][Method::Bzip2]. The other codes are recognized so their metadata
/// survives a read/write cycle, but their payloads cannot be encoded or
/// decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// No compression is applied
    Store,

    /// [DEFLATE (RFC 1951)](https://www.ietf.org/rfc/rfc1951.txt)
    Deflate,

    /// [DEFLATE64](https://deflate64.com/)
    Deflate64,

    /// Legacy PKWARE Shrink
    Shrink,

    /// Legacy PKWARE Implode
    Implode,

    /// [BZIP-2](https://github.com/dsnet/compress/blob/master/doc/bzip2-format.pdf)
    Bzip2,

    /// [LZMA](https://github.com/jljusten/LZMA-SDK/blob/master/DOC/lzma-specification.txt)
    Lzma,

    /// [zstd](https://datatracker.ietf.org/doc/html/rfc8878)
    Zstd,

    /// [XZ](https://tukaani.org/xz/xz-file-format.txt)
    Xz,

    /// [JPEG](https://jpeg.org/jpeg/)
    Jpeg,

    /// [WavPack](https://www.wavpack.com/)
    WavPack,

    /// [PPMd](https://en.wikipedia.org/wiki/Prediction_by_partial_matching)
    Ppmd,

    /// AE-x encryption marker (see Appendix E of appnote); the actual
    /// compression method is in the WinZip AES extra field.
    Aex,

    /// A compression method that isn't recognized by this crate.
    Unrecognized(u16),
}

impl Method {
    const STORE: u16 = 0;
    const SHRINK: u16 = 1;
    const IMPLODE: u16 = 6;
    const DEFLATE: u16 = 8;
    const DEFLATE64: u16 = 9;
    const BZIP2: u16 = 12;
    const LZMA: u16 = 14;
    const ZSTD: u16 = 93;
    const XZ: u16 = 95;
    const JPEG: u16 = 96;
    const WAV_PACK: u16 = 97;
    const PPMD: u16 = 98;
    const AEX: u16 = 99;

    /// Parse a method from a byte slice
    pub fn parser(i: &mut Partial<&[u8]>) -> PResult<Self> {
        le_u16(i).map(From::from)
    }

    /// True for the methods whose payloads this crate can encode and decode.
    pub fn is_supported(self) -> bool {
        matches!(self, Method::Store | Method::Deflate | Method::Bzip2)
    }
}

impl From<u16> for Method {
    fn from(u: u16) -> Self {
        match u {
            Self::STORE => Self::Store,
            Self::SHRINK => Self::Shrink,
            Self::IMPLODE => Self::Implode,
            Self::DEFLATE => Self::Deflate,
            Self::DEFLATE64 => Self::Deflate64,
            Self::BZIP2 => Self::Bzip2,
            Self::LZMA => Self::Lzma,
            Self::ZSTD => Self::Zstd,
            Self::XZ => Self::Xz,
            Self::JPEG => Self::Jpeg,
            Self::WAV_PACK => Self::WavPack,
            Self::PPMD => Self::Ppmd,
            Self::AEX => Self::Aex,
            u => Self::Unrecognized(u),
        }
    }
}

impl From<Method> for u16 {
    fn from(method: Method) -> Self {
        match method {
            Method::Store => Method::STORE,
            Method::Shrink => Method::SHRINK,
            Method::Implode => Method::IMPLODE,
            Method::Deflate => Method::DEFLATE,
            Method::Deflate64 => Method::DEFLATE64,
            Method::Bzip2 => Method::BZIP2,
            Method::Lzma => Method::LZMA,
            Method::Zstd => Method::ZSTD,
            Method::Xz => Method::XZ,
            Method::Jpeg => Method::JPEG,
            Method::WavPack => Method::WAV_PACK,
            Method::Ppmd => Method::PPMD,
            Method::Aex => Method::AEX,
            Method::Unrecognized(u) => u,
        }
    }
}

/// Encryption applied to an entry's compressed payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EncryptionMethod {
    /// Plain, unencrypted payload.
    #[default]
    None,

    /// Traditional PKWARE ("ZipCrypto") stream cipher.
    Pkware,

    /// WinZip AES with a 128-bit key.
    Aes128,

    /// WinZip AES with a 192-bit key.
    Aes192,

    /// WinZip AES with a 256-bit key.
    Aes256,
}

impl EncryptionMethod {
    /// The WinZip key-strength code (1, 2 or 3), if this is an AES method.
    pub fn aes_strength(self) -> Option<u8> {
        match self {
            EncryptionMethod::Aes128 => Some(1),
            EncryptionMethod::Aes192 => Some(2),
            EncryptionMethod::Aes256 => Some(3),
            _ => None,
        }
    }

    /// Maps a WinZip key-strength code back to a method.
    pub fn from_aes_strength(code: u8) -> Option<Self> {
        match code {
            1 => Some(EncryptionMethod::Aes128),
            2 => Some(EncryptionMethod::Aes192),
            3 => Some(EncryptionMethod::Aes256),
            _ => None,
        }
    }

    /// True for any of the WinZip AES variants.
    pub fn is_aes(self) -> bool {
        self.aes_strength().is_some()
    }

    /// Bytes the encryption envelope adds to the compressed payload:
    /// salt + verification value + authentication code for AES, the 12-byte
    /// header for PKWARE.
    pub fn overhead(self) -> u64 {
        match self {
            EncryptionMethod::None => 0,
            EncryptionMethod::Pkware => 12,
            EncryptionMethod::Aes128 => 8 + 2 + 10,
            EncryptionMethod::Aes192 => 12 + 2 + 10,
            EncryptionMethod::Aes256 => 16 + 2 + 10,
        }
    }
}
