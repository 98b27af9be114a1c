//! A selector over entries, for doing the same thing to many of them.

use regex::Regex;

use crate::{
    archive::ZipArchive,
    error::Error,
    parse::EncryptionMethod,
};

/// Selects entries by exact name or regex, then applies one operation to
/// the whole selection.
///
/// ```no_run
/// # fn demo(zip: &mut rw_zip::ZipArchive) -> Result<(), rw_zip::Error> {
/// zip.matcher().by_regex(r"\.log$")?.delete();
/// # Ok(())
/// # }
/// ```
pub struct EntryMatcher<'a> {
    archive: &'a mut ZipArchive,
    selected: Vec<String>,
}

impl<'a> EntryMatcher<'a> {
    pub(crate) fn new(archive: &'a mut ZipArchive) -> Self {
        Self {
            archive,
            selected: Vec::new(),
        }
    }

    /// Adds the entry with this exact name to the selection, if it exists.
    pub fn by_name(mut self, name: &str) -> Self {
        if self.archive.contains(name) && !self.selected.iter().any(|n| n == name) {
            self.selected.push(name.to_string());
        }
        self
    }

    /// Adds every entry whose name matches the regex.
    pub fn by_regex(mut self, pattern: &str) -> Result<Self, Error> {
        let re = Regex::new(pattern)
            .map_err(|e| Error::InvalidArgument(format!("bad pattern {pattern:?}: {e}")))?;
        for entry in self.archive.entries() {
            if re.is_match(entry.name()) && !self.selected.iter().any(|n| n == entry.name()) {
                self.selected.push(entry.name().to_string());
            }
        }
        Ok(self)
    }

    /// Selects every entry.
    pub fn all(mut self) -> Self {
        self.selected = self.archive.entries().map(|e| e.name().to_string()).collect();
        self
    }

    /// Names currently selected, in archive order of selection.
    pub fn names(&self) -> &[String] {
        &self.selected
    }

    /// Number of selected entries.
    pub fn count(&self) -> usize {
        self.selected.len()
    }

    /// Deletes every selected entry; returns how many were removed.
    pub fn delete(self) -> usize {
        let mut removed = 0;
        for name in &self.selected {
            if self.archive.delete(name).is_ok() {
                removed += 1;
            }
        }
        removed
    }

    /// Sets the compression level on every selected entry.
    pub fn set_compression_level(self, level: i64) -> Result<(), Error> {
        for name in &self.selected {
            if let Some(entry) = self.archive.get_mut(name) {
                entry.set_compression_level(level)?;
            }
        }
        Ok(())
    }

    /// Sets the write-side password on every selected entry.
    pub fn set_password(
        self,
        password: Option<&str>,
        method: Option<EncryptionMethod>,
    ) -> Result<(), Error> {
        for name in &self.selected {
            self.archive.set_entry_password(name, password, method)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ZipArchive {
        let mut zip = ZipArchive::new();
        zip.add_bytes("logs/app.log", b"".to_vec()).unwrap();
        zip.add_bytes("logs/db.log", b"".to_vec()).unwrap();
        zip.add_bytes("data.bin", b"".to_vec()).unwrap();
        zip
    }

    #[test]
    fn regex_selection_and_delete() {
        let mut zip = sample();
        let removed = zip.matcher().by_regex(r"\.log$").unwrap().delete();
        assert_eq!(removed, 2);
        assert_eq!(zip.len(), 1);
        assert!(zip.contains("data.bin"));
    }

    #[test]
    fn exact_names_do_not_duplicate() {
        let mut zip = sample();
        let matcher = zip
            .matcher()
            .by_name("data.bin")
            .by_name("data.bin")
            .by_name("missing");
        assert_eq!(matcher.count(), 1);
    }

    #[test]
    fn bad_pattern_is_invalid_argument() {
        let mut zip = sample();
        assert!(matches!(
            zip.matcher().by_regex("(["),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn set_level_across_selection() {
        let mut zip = sample();
        zip.matcher().all().set_compression_level(9).unwrap();
        assert!(zip
            .entries()
            .all(|e| e.compression_level() == crate::CompressionLevel::Precise(9)));
    }
}
