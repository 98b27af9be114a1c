#![warn(missing_docs)]

//! rw-zip reads, edits, and writes zip archives.
//!
//! Opening an archive parses its central directory and nothing else: entry
//! payloads stay in the byte source until asked for, at which point they are
//! fetched, decrypted (traditional PKWARE or WinZip AES) and decompressed
//! (store, deflate, bzip2) in one go. Mutations — adding, deleting,
//! renaming, re-compressing, changing passwords — accumulate in memory and
//! are serialized by one of the `save_to_*` methods; entries that were never
//! touched are copied into the output byte-for-byte, compressed payload and
//! all. Archives too big for the classic fields upgrade to zip64
//! transparently, in both directions.
//!
//! ```no_run
//! use rw_zip::{ZipArchive, Error};
//!
//! fn main() -> Result<(), Error> {
//!     let mut zip = ZipArchive::read_file("in.zip")?;
//!     zip.add_bytes("hello.txt", &b"hello there"[..])?;
//!     zip.matcher().by_regex(r"\.bak$")?.delete();
//!     zip.save_to_file("out.zip")?;
//!     Ok(())
//! }
//! ```

mod archive;
mod compress;
mod crypto;
pub mod encoding;
mod entry;
pub mod error;
mod extract;
pub mod parse;
mod reader;
mod write;

pub use archive::{AddOptions, EntryMatcher, TimeSpec, ZipArchive, SO_ALIGNMENT};
pub use encoding::Encoding;
pub use entry::{CompressionLevel, Entry, EntryKind, EntrySource, StoredPayload};
pub use error::{AuthError, Error, FormatError, UnsupportedError};
pub use extract::ExtractOptions;
pub use parse::{EncryptionMethod, ExtraField, Method};
pub use reader::{ByteSource, ReadOptions};
