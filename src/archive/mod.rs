//! The mutable archive container: an ordered set of entries, archive-wide
//! state, and the immutable snapshot that backs the `unchange` family.

mod matcher;
pub use matcher::EntryMatcher;

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use tracing::trace;

use crate::{
    encoding::Encoding,
    entry::{validate_name, Entry, EntrySource, MAX_NAME_LENGTH},
    error::Error,
    parse::{CentralDirectoryFileHeader, EncryptionMethod, Method},
    reader::{self, ByteSource, ReadOptions},
};

/// Alignment applied to `.so` entries when zip-align is on, per the Android
/// APK convention (shared objects get mmapped straight out of the apk).
pub const SO_ALIGNMENT: u32 = 4096;

/// The parsed central directory as it looked when the archive was opened.
/// `unchange` rebuilds entries from these records.
pub(crate) struct Snapshot {
    pub(crate) records: Vec<CentralDirectoryFileHeader>,
    pub(crate) names: Vec<String>,
    pub(crate) comment: Option<String>,
    pub(crate) encoding: Encoding,
    pub(crate) global_offset: u64,
}

impl Snapshot {
    fn rebuild(&self, index: usize) -> Result<Entry, Error> {
        reader::record_to_entry(&self.records[index], self.encoding, self.global_offset)
    }
}

/// How to interpret a caller-supplied modification time.
#[derive(Debug, Clone)]
pub enum TimeSpec {
    /// Seconds since the Unix epoch.
    Seconds(i64),
    /// An RFC-3339 string, e.g. `2024-01-26T16:14:35Z`.
    Rfc3339(String),
    /// An already-parsed timestamp.
    DateTime(DateTime<Utc>),
}

impl TimeSpec {
    pub(crate) fn resolve(&self) -> Result<DateTime<Utc>, Error> {
        match self {
            TimeSpec::Seconds(secs) => Utc
                .timestamp_opt(*secs, 0)
                .single()
                .ok_or_else(|| Error::InvalidArgument(format!("timestamp out of range: {secs}"))),
            TimeSpec::Rfc3339(s) => DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| Error::InvalidArgument(format!("bad rfc3339 timestamp {s:?}: {e}"))),
            TimeSpec::DateTime(dt) => Ok(*dt),
        }
    }
}

/// Options for bulk adds from a directory tree.
#[derive(Debug, Default)]
pub struct AddOptions {
    /// Override the modification time of every added entry.
    pub modified_time: Option<TimeSpec>,

    /// Override the compression method of every added entry.
    pub compression_method: Option<Method>,

    /// Skip directory entries, adding only files.
    pub only_files: bool,
}

/// A read/modify/write handle on a zip archive.
///
/// Reading binds entries lazily to the byte source; payloads are only
/// fetched (and decrypted, and decompressed) on demand. Mutations stay in
/// memory until one of the `save_to_*` methods serializes the whole thing
/// back out.
pub struct ZipArchive {
    pub(crate) source: Option<Box<dyn ByteSource>>,
    pub(crate) entries: Vec<Entry>,
    pub(crate) comment: Option<String>,
    pub(crate) read_password: Option<String>,
    pub(crate) write_password: Option<(String, EncryptionMethod)>,
    pub(crate) alignment: Option<u32>,
    pub(crate) snapshot: Option<Snapshot>,
}

impl Default for ZipArchive {
    fn default() -> Self {
        Self::new()
    }
}

impl ZipArchive {
    /// An empty archive with no byte source.
    pub fn new() -> Self {
        Self {
            source: None,
            entries: Vec::new(),
            comment: None,
            read_password: None,
            write_password: None,
            alignment: None,
            snapshot: None,
        }
    }

    /// Opens an archive from an in-memory buffer.
    pub fn read_bytes(bytes: Vec<u8>) -> Result<Self, Error> {
        Self::read_source(Box::new(bytes), &ReadOptions::default())
    }

    /// Opens an archive from an in-memory buffer, with options.
    pub fn read_bytes_with_options(bytes: Vec<u8>, options: &ReadOptions) -> Result<Self, Error> {
        Self::read_source(Box::new(bytes), options)
    }

    /// Opens an archive from a file on disk.
    pub fn read_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::read_file_with_options(path, &ReadOptions::default())
    }

    /// Opens an archive from a file on disk, with options.
    pub fn read_file_with_options(
        path: impl AsRef<Path>,
        options: &ReadOptions,
    ) -> Result<Self, Error> {
        let file = std::fs::File::open(path)?;
        Self::read_source(Box::new(file), options)
    }

    /// Opens an archive from any [ByteSource].
    pub fn read_source(
        source: Box<dyn ByteSource>,
        options: &ReadOptions,
    ) -> Result<Self, Error> {
        let parsed = reader::read_directory(source.as_ref(), options)?;
        let names = parsed.entries.iter().map(|e| e.name.clone()).collect();
        trace!(entries = parsed.entries.len(), "opened archive");
        Ok(Self {
            source: Some(source),
            comment: parsed.comment.clone(),
            entries: parsed.entries,
            read_password: None,
            write_password: None,
            alignment: None,
            snapshot: Some(Snapshot {
                records: parsed.records,
                names,
                comment: parsed.comment,
                encoding: parsed.encoding,
                global_offset: parsed.global_offset,
            }),
        })
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the archive has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over entries in archive order.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    /// True when an entry with this exact name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    /// Borrows an entry by exact name.
    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Mutably borrows an entry by exact name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|e| e.name == name)
    }

    /// Inserts an entry, replacing any existing entry with the same name
    /// in place (archive order is preserved).
    pub fn add(&mut self, entry: Entry) -> &mut Entry {
        match self.entries.iter().position(|e| e.name == entry.name) {
            Some(pos) => {
                self.entries[pos] = entry;
                &mut self.entries[pos]
            }
            None => {
                self.entries.push(entry);
                self.entries.last_mut().unwrap()
            }
        }
    }

    /// Adds an entry from an in-memory buffer.
    pub fn add_bytes(
        &mut self,
        name: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Result<&mut Entry, Error> {
        let entry = Entry::new(name, EntrySource::Bytes(bytes.into()))?;
        Ok(self.add(entry))
    }

    /// Adds an entry whose payload is read from a file at save time.
    pub fn add_file(
        &mut self,
        name: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Result<&mut Entry, Error> {
        let entry = Entry::new(name, EntrySource::File(path.into()))?;
        Ok(self.add(entry))
    }

    /// Adds an entry whose payload is drained from a reader at save time.
    /// The entry gets a data descriptor, since its size isn't known yet.
    pub fn add_stream(
        &mut self,
        name: impl Into<String>,
        reader: Box<dyn Read>,
    ) -> Result<&mut Entry, Error> {
        let entry = Entry::new(name, EntrySource::Stream(reader))?;
        Ok(self.add(entry))
    }

    /// Adds an empty directory entry; a trailing `/` is appended if missing.
    pub fn add_directory(&mut self, name: impl Into<String>) -> Result<&mut Entry, Error> {
        let mut name = name.into();
        if !name.ends_with('/') {
            name.push('/');
        }
        let entry = Entry::new(name, EntrySource::Directory)?;
        Ok(self.add(entry))
    }

    /// Adds a directory tree from disk, rooted at `dir`, honoring
    /// [AddOptions]. Names are relative to `dir`, `/`-separated.
    pub fn add_dir_all(&mut self, dir: impl AsRef<Path>, options: &AddOptions) -> Result<usize, Error> {
        let dir = dir.as_ref();
        let modified = options
            .modified_time
            .as_ref()
            .map(TimeSpec::resolve)
            .transpose()?;
        let mut added = 0;
        self.add_dir_inner(dir, "", options, modified, &mut added)?;
        Ok(added)
    }

    fn add_dir_inner(
        &mut self,
        dir: &Path,
        prefix: &str,
        options: &AddOptions,
        modified: Option<DateTime<Utc>>,
        added: &mut usize,
    ) -> Result<(), Error> {
        let mut children: Vec<_> = std::fs::read_dir(dir)?.collect::<Result<_, _>>()?;
        children.sort_by_key(|c| c.file_name());

        for child in children {
            let file_type = child.file_type()?;
            let child_name = child.file_name();
            let Some(child_name) = child_name.to_str() else {
                return Err(Error::InvalidName(child.path().display().to_string()));
            };
            let name = format!("{prefix}{child_name}");

            if file_type.is_dir() {
                if !options.only_files {
                    let entry = self.add_directory(name.as_str())?;
                    if let Some(m) = modified {
                        entry.set_modified(m);
                    }
                    *added += 1;
                }
                self.add_dir_inner(&child.path(), &format!("{name}/"), options, modified, added)?;
            } else if file_type.is_file() {
                let entry = self.add_file(name.as_str(), child.path())?;
                if let Some(m) = modified {
                    entry.set_modified(m);
                }
                if let Some(method) = options.compression_method {
                    entry.set_method(method)?;
                }
                *added += 1;
            }
            // anything else (sockets, fifos, symlinks) is skipped
        }
        Ok(())
    }

    /// Removes an entry by exact name.
    pub fn delete(&mut self, name: &str) -> Result<(), Error> {
        match self.entries.iter().position(|e| e.name == name) {
            Some(pos) => {
                self.entries.remove(pos);
                Ok(())
            }
            None => Err(Error::NotFound(name.to_string())),
        }
    }

    /// Removes every entry the predicate selects; returns how many went.
    pub fn delete_matching(&mut self, mut predicate: impl FnMut(&Entry) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| !predicate(e));
        before - self.entries.len()
    }

    /// Renames an entry. Fails if `old` doesn't exist or `new` already does.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<(), Error> {
        validate_name(new)?;
        if old == new {
            return Ok(());
        }
        if self.contains(new) {
            return Err(Error::AlreadyExists(new.to_string()));
        }
        let entry = self
            .get_mut(old)
            .ok_or_else(|| Error::NotFound(old.to_string()))?;
        entry.set_name(new)
    }

    /// The archive comment, if any.
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Sets or clears the archive comment. Comments above 65535 bytes are a
    /// caller error, not a truncation.
    pub fn set_comment(&mut self, comment: Option<String>) -> Result<(), Error> {
        if let Some(c) = &comment {
            if c.len() > MAX_NAME_LENGTH {
                return Err(Error::InvalidArgument(format!(
                    "archive comment is {} bytes, maximum is {MAX_NAME_LENGTH}",
                    c.len()
                )));
            }
        }
        self.comment = comment;
        Ok(())
    }

    /// Sets the write-side password for every entry that doesn't carry its
    /// own. `None` removes encryption on write.
    pub fn set_password(&mut self, password: Option<&str>, method: Option<EncryptionMethod>) {
        self.write_password = password
            .map(|p| (p.to_string(), method.unwrap_or(EncryptionMethod::Aes256)));
        let encrypting = self.write_password.is_some();
        for entry in &mut self.entries {
            if entry.is_directory() {
                continue;
            }
            // entries already stored the way we'd write them can stay on
            // the verbatim copy path
            let encrypted_on_disk =
                matches!(&entry.source, EntrySource::Archive(sp) if sp.is_encrypted());
            if encrypting || encrypted_on_disk {
                entry.payload_dirty = true;
            }
        }
    }

    /// Sets the write-side password of a single entry.
    pub fn set_entry_password(
        &mut self,
        name: &str,
        password: Option<&str>,
        method: Option<EncryptionMethod>,
    ) -> Result<(), Error> {
        let entry = self
            .get_mut(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        entry.set_password(password, method);
        Ok(())
    }

    /// Sets the password used to decrypt reader-bound payloads.
    pub fn set_read_password(&mut self, password: Option<&str>) {
        self.read_password = password.map(str::to_string);
    }

    /// Sets the read password of a single entry, overriding the archive-wide
    /// one.
    pub fn set_entry_read_password(
        &mut self,
        name: &str,
        password: Option<&str>,
    ) -> Result<(), Error> {
        let entry = self
            .get_mut(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        entry.set_read_password(password);
        Ok(())
    }

    /// Enables byte-alignment of stored, unencrypted payloads. `multiple`
    /// must be a power of two; entries named `*.so` align to
    /// [SO_ALIGNMENT] regardless. `None` turns alignment off.
    pub fn set_alignment(&mut self, multiple: Option<u32>) -> Result<(), Error> {
        if let Some(m) = multiple {
            if m == 0 || !m.is_power_of_two() {
                return Err(Error::InvalidArgument(format!(
                    "alignment must be a power of two, got {m}"
                )));
            }
        }
        self.alignment = multiple;
        Ok(())
    }

    /// The configured alignment multiple, if any.
    pub fn alignment(&self) -> Option<u32> {
        self.alignment
    }

    /// A selector for operating on several entries at once, by exact name
    /// or regex.
    pub fn matcher(&mut self) -> EntryMatcher<'_> {
        EntryMatcher::new(self)
    }

    /// Reads an entry's full contents, decrypting and decompressing as
    /// needed.
    ///
    /// Stream-sourced entries are drained into memory the first time, so
    /// repeated reads see the same bytes.
    pub fn read(&mut self, name: &str) -> Result<Vec<u8>, Error> {
        let pos = self
            .entries
            .iter()
            .position(|e| e.name == name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        let entry = &mut self.entries[pos];

        match &mut entry.source {
            EntrySource::Directory => Ok(Vec::new()),
            EntrySource::Bytes(bytes) => Ok(bytes.clone()),
            EntrySource::File(path) => Ok(std::fs::read(path)?),
            EntrySource::Stream(reader) => {
                let mut bytes = Vec::new();
                reader.read_to_end(&mut bytes)?;
                entry.source = EntrySource::Bytes(bytes.clone());
                Ok(bytes)
            }
            EntrySource::Archive(stored) => {
                let stored = stored.clone();
                let password = entry
                    .read_password
                    .clone()
                    .or_else(|| self.read_password.clone());
                let source = self.source.as_deref().ok_or(Error::SourceClosed)?;
                let bytes = reader::fetch_stored_bytes(source, &stored, name)?;
                reader::decode_stored_bytes(&stored, &bytes, password.as_deref(), name)
            }
        }
    }

    /// Restores a single entry to its state at open time. Entries that
    /// didn't exist then are deleted.
    pub fn unchange(&mut self, name: &str) -> Result<(), Error> {
        let snapshot = self
            .snapshot
            .as_ref()
            .ok_or_else(|| Error::InvalidArgument("archive was not opened from a source".into()))?;

        match snapshot.names.iter().position(|n| n == name) {
            Some(idx) => {
                let original = snapshot.rebuild(idx)?;
                self.add(original);
                Ok(())
            }
            None => self.delete(name),
        }
    }

    /// Restores every entry and the archive comment to their state at open
    /// time.
    pub fn unchange_all(&mut self) -> Result<(), Error> {
        let snapshot = self
            .snapshot
            .as_ref()
            .ok_or_else(|| Error::InvalidArgument("archive was not opened from a source".into()))?;

        let mut entries = Vec::with_capacity(snapshot.records.len());
        for idx in 0..snapshot.records.len() {
            entries.push(snapshot.rebuild(idx)?);
        }
        self.comment = snapshot.comment.clone();
        self.entries = entries;
        Ok(())
    }

    /// Restores the archive comment to its state at open time.
    pub fn unchange_comment(&mut self) -> Result<(), Error> {
        let snapshot = self
            .snapshot
            .as_ref()
            .ok_or_else(|| Error::InvalidArgument("archive was not opened from a source".into()))?;
        self.comment = snapshot.comment.clone();
        Ok(())
    }

    /// Serializes the archive into a fresh buffer.
    pub fn save_to_bytes(&mut self) -> Result<Vec<u8>, Error> {
        crate::write::save_to_bytes(self)
    }

    /// Serializes the archive into a writer.
    pub fn save_to_writer<W: std::io::Write>(&mut self, writer: W) -> Result<(), Error> {
        crate::write::save(self, writer)
    }

    /// Serializes the archive to a file, atomically: the bytes land in a
    /// temporary sibling which is renamed over `path` only on success.
    pub fn save_to_file(&mut self, path: impl AsRef<Path>) -> Result<(), Error> {
        crate::write::save_to_file(self, path.as_ref())
    }

    /// Drops the byte source. Any entry whose payload still lives in the
    /// archive fails with [Error::SourceClosed] from here on.
    pub fn close(&mut self) {
        self.source = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_replaces_in_place() {
        let mut zip = ZipArchive::new();
        zip.add_bytes("a.txt", b"one".to_vec()).unwrap();
        zip.add_bytes("b.txt", b"two".to_vec()).unwrap();
        zip.add_bytes("a.txt", b"three".to_vec()).unwrap();

        assert_eq!(zip.len(), 2);
        let names: Vec<_> = zip.entries().map(Entry::name).collect();
        assert_eq!(names, ["a.txt", "b.txt"]);
        assert_eq!(zip.read("a.txt").unwrap(), b"three");
    }

    #[test]
    fn rename_collisions_rejected() {
        let mut zip = ZipArchive::new();
        zip.add_bytes("a.txt", b"".to_vec()).unwrap();
        zip.add_bytes("b.txt", b"".to_vec()).unwrap();

        assert!(matches!(
            zip.rename("a.txt", "b.txt"),
            Err(Error::AlreadyExists(_))
        ));
        assert!(matches!(
            zip.rename("nope.txt", "c.txt"),
            Err(Error::NotFound(_))
        ));
        zip.rename("a.txt", "c.txt").unwrap();
        assert!(zip.contains("c.txt"));
        assert!(!zip.contains("a.txt"));
    }

    #[test]
    fn delete_matching_counts() {
        let mut zip = ZipArchive::new();
        zip.add_bytes("src/a.rs", b"".to_vec()).unwrap();
        zip.add_bytes("src/b.rs", b"".to_vec()).unwrap();
        zip.add_bytes("README.md", b"".to_vec()).unwrap();

        let removed = zip.delete_matching(|e| e.name().ends_with(".rs"));
        assert_eq!(removed, 2);
        assert_eq!(zip.len(), 1);
    }

    #[test]
    fn alignment_must_be_power_of_two() {
        let mut zip = ZipArchive::new();
        assert!(zip.set_alignment(Some(4)).is_ok());
        assert!(zip.set_alignment(Some(4096)).is_ok());
        assert!(zip.set_alignment(None).is_ok());
        assert!(matches!(
            zip.set_alignment(Some(3)),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn oversized_comment_rejected() {
        let mut zip = ZipArchive::new();
        assert!(zip.set_comment(Some("ok".into())).is_ok());
        assert!(matches!(
            zip.set_comment(Some("x".repeat(0x10000))),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn stream_reads_are_repeatable() {
        let mut zip = ZipArchive::new();
        zip.add_stream("s.txt", Box::new(&b"from a stream"[..]))
            .unwrap();
        assert_eq!(zip.read("s.txt").unwrap(), b"from a stream");
        assert_eq!(zip.read("s.txt").unwrap(), b"from a stream");
    }
}
