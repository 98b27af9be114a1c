//! Traditional PKWARE and WinZip AES encryption engines.
//!
//! Both operate on fully-materialized buffers: the write path wraps a
//! compressed payload into its encryption envelope, the read path unwraps
//! and authenticates one. Pipeline order is always
//! compress → encrypt on the way out, decrypt → decompress on the way in.

pub(crate) mod pkware;
pub(crate) mod winzip_aes;

use crate::error::Error;

/// Fills `buf` with bytes from the operating system's CSPRNG.
pub(crate) fn random_bytes(buf: &mut [u8]) -> Result<(), Error> {
    getrandom::getrandom(buf).map_err(|e| Error::IO(std::io::Error::other(e)))
}
