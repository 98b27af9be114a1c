//! The compression driver: Store, Deflate and Bzip2, over whole buffers.

use std::io::{Read, Write};

use crate::{
    entry::CompressionLevel,
    error::Error,
    parse::Method,
};

/// Bzip2 block size used when the level is left at its default.
const BZIP2_DEFAULT_BLOCK_SIZE: u32 = 4;

/// Compresses a plaintext buffer with the given method and level.
pub(crate) fn compress(
    method: Method,
    level: CompressionLevel,
    data: &[u8],
) -> Result<Vec<u8>, Error> {
    match method {
        Method::Store => Ok(data.to_vec()),
        Method::Deflate => {
            let compression = match level {
                CompressionLevel::Default => flate2::Compression::default(),
                CompressionLevel::Precise(n) => flate2::Compression::new(n as u32),
            };
            // raw deflate stream, no zlib header
            let mut encoder = flate2::write::DeflateEncoder::new(Vec::new(), compression);
            encoder.write_all(data)?;
            Ok(encoder.finish()?)
        }
        Method::Bzip2 => {
            let block_size = match level {
                CompressionLevel::Default => BZIP2_DEFAULT_BLOCK_SIZE,
                CompressionLevel::Precise(n) => n as u32,
            };
            let mut encoder =
                bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::new(block_size));
            encoder.write_all(data)?;
            Ok(encoder.finish()?)
        }
        method => Err(Error::method_not_supported(method)),
    }
}

/// Decompresses an entry's compressed bytes.
///
/// `size_hint` is the expected uncompressed size, used to pre-allocate; the
/// caller still validates the actual size and checksum.
pub(crate) fn decompress(method: Method, data: &[u8], size_hint: u64) -> Result<Vec<u8>, Error> {
    let mut out = Vec::with_capacity(size_hint.min(64 * 1024 * 1024) as usize);
    match method {
        Method::Store => out.extend_from_slice(data),
        Method::Deflate => {
            flate2::read::DeflateDecoder::new(data).read_to_end(&mut out)?;
        }
        Method::Bzip2 => {
            bzip2::read::BzDecoder::new(data).read_to_end(&mut out)?;
        }
        method => return Err(Error::method_not_supported(method)),
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_is_identity() {
        let data = b"as-is".to_vec();
        let out = compress(Method::Store, CompressionLevel::Default, &data).unwrap();
        assert_eq!(out, data);
        assert_eq!(decompress(Method::Store, &out, 5).unwrap(), data);
    }

    #[test]
    fn deflate_round_trip_shrinks_redundant_input() {
        let data = "test;test2;test3\n".repeat(1000).into_bytes();
        let out = compress(Method::Deflate, CompressionLevel::Default, &data).unwrap();
        assert!(out.len() < data.len());
        assert_eq!(
            decompress(Method::Deflate, &out, data.len() as u64).unwrap(),
            data
        );
    }

    #[test]
    fn deflate_levels_trade_size_for_speed() {
        let data = "abcdefgh".repeat(4096).into_bytes();
        let fast = compress(Method::Deflate, CompressionLevel::Precise(1), &data).unwrap();
        let best = compress(Method::Deflate, CompressionLevel::Precise(9), &data).unwrap();
        assert!(best.len() <= fast.len());
    }

    #[test]
    fn bzip2_round_trip() {
        let data = "sphinx of black quartz, judge my vow\n".repeat(200).into_bytes();
        let out = compress(Method::Bzip2, CompressionLevel::Default, &data).unwrap();
        assert_eq!(
            decompress(Method::Bzip2, &out, data.len() as u64).unwrap(),
            data
        );
    }

    #[test]
    fn foreign_methods_refused() {
        assert!(matches!(
            compress(Method::Lzma, CompressionLevel::Default, b""),
            Err(Error::Unsupported(_))
        ));
        assert!(matches!(
            decompress(Method::Ppmd, b"", 0),
            Err(Error::Unsupported(_))
        ));
    }
}
