//! Extracting archive entries to a directory.
//!
//! Path handling is deliberately conservative: leading slashes are
//! stripped, and `..` segments that would climb out of the destination are
//! refused. Symlinks are only materialized on explicit opt-in; otherwise
//! they're skipped without error. Directory modification times are applied
//! last, deepest first, so writing the files beneath them doesn't clobber
//! them again.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use tracing::trace;

use crate::{
    archive::ZipArchive,
    entry::{Entry, EntryKind},
    error::Error,
};

/// Options for [ZipArchive::extract_to_dir].
#[derive(Default)]
pub struct ExtractOptions {
    /// Materialize entries whose external attributes mark them as Unix
    /// symlinks. Off by default: a hostile archive can point symlinks
    /// anywhere, so extracting them is opt-in.
    pub extract_symlinks: bool,

    /// When set, only entries the filter approves are extracted.
    pub filter: Option<Box<dyn Fn(&Entry) -> bool>>,
}

impl std::fmt::Debug for ExtractOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractOptions")
            .field("extract_symlinks", &self.extract_symlinks)
            .field("filter", &self.filter.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Resolves an entry name to a path relative to the extraction root.
/// Leading slashes are dropped; `..` segments resolve in-tree and error out
/// if they'd escape.
pub(crate) fn normalized_relative_path(name: &str) -> Result<PathBuf, Error> {
    let trimmed = name.trim_start_matches('/');
    let mut out = PathBuf::new();
    for segment in trimmed.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                if !out.pop() {
                    return Err(Error::InvalidName(name.to_string()));
                }
            }
            segment => out.push(segment),
        }
    }
    Ok(out)
}

fn to_system_time(dt: DateTime<Utc>) -> Option<SystemTime> {
    let secs = dt.timestamp();
    if secs < 0 {
        return None;
    }
    Some(UNIX_EPOCH + Duration::from_secs(secs as u64))
}

fn apply_times_and_mode(path: &Path, entry_mode: u32, modified: DateTime<Utc>) -> Result<(), Error> {
    #[cfg(unix)]
    if entry_mode & 0o777 != 0 {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(entry_mode & 0o777))?;
    }
    #[cfg(not(unix))]
    let _ = entry_mode;

    if let Some(time) = to_system_time(modified) {
        let file = std::fs::File::open(path)?;
        file.set_modified(time)?;
    }
    Ok(())
}

impl ZipArchive {
    /// Extracts every entry (or the filtered subset) below `dest`, creating
    /// it if needed. Returns the number of entries materialized.
    pub fn extract_to_dir(
        &mut self,
        dest: impl AsRef<Path>,
        options: &ExtractOptions,
    ) -> Result<usize, Error> {
        let dest = dest.as_ref();
        std::fs::create_dir_all(dest)?;

        let names: Vec<String> = self
            .entries()
            .filter(|e| options.filter.as_ref().map(|f| f(e)).unwrap_or(true))
            .map(|e| e.name().to_string())
            .collect();

        // directory mtimes are applied after everything beneath them exists
        let mut pending_dir_times: Vec<(PathBuf, u32, DateTime<Utc>)> = Vec::new();
        let mut extracted = 0;

        for name in names {
            let (kind, mode, modified) = {
                let entry = self.get(&name).expect("names collected above");
                (entry.kind(), entry.mode().0, entry.modified())
            };
            let rel = normalized_relative_path(&name)?;
            if rel.as_os_str().is_empty() {
                continue;
            }
            let target = dest.join(&rel);

            match kind {
                EntryKind::Symlink => {
                    if !options.extract_symlinks {
                        trace!(%name, "skipping symlink (extract_symlinks is off)");
                        continue;
                    }
                    let link_target = self.read(&name)?;
                    let link_target = String::from_utf8(link_target)
                        .map_err(|_| Error::InvalidName(name.clone()))?;
                    if let Some(parent) = target.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    #[cfg(unix)]
                    {
                        if target.symlink_metadata().is_ok() {
                            std::fs::remove_file(&target)?;
                        }
                        std::os::unix::fs::symlink(&link_target, &target)?;
                        extracted += 1;
                    }
                    #[cfg(not(unix))]
                    {
                        let _ = link_target;
                        trace!(%name, "skipping symlink on non-unix host");
                    }
                }
                EntryKind::Directory => {
                    std::fs::create_dir_all(&target)?;
                    pending_dir_times.push((target, mode, modified));
                    extracted += 1;
                }
                EntryKind::File => {
                    if let Some(parent) = target.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    let contents = self.read(&name)?;
                    std::fs::write(&target, contents)?;
                    apply_times_and_mode(&target, mode, modified)?;
                    extracted += 1;
                }
            }
        }

        // deepest directories first, so touching a child can't reset a
        // parent we already stamped
        pending_dir_times.sort_by_key(|(path, _, _)| std::cmp::Reverse(path.components().count()));
        for (path, mode, modified) in pending_dir_times {
            apply_times_and_mode(&path, mode, modified)?;
        }

        Ok(extracted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_slashes_stripped() {
        assert_eq!(
            normalized_relative_path("/etc/passwd").unwrap(),
            PathBuf::from("etc/passwd")
        );
    }

    #[test]
    fn in_tree_dotdot_resolves() {
        assert_eq!(
            normalized_relative_path("a/b/../c").unwrap(),
            PathBuf::from("a/c")
        );
    }

    #[test]
    fn escaping_dotdot_rejected() {
        assert!(matches!(
            normalized_relative_path("../outside"),
            Err(Error::InvalidName(_))
        ));
        assert!(matches!(
            normalized_relative_path("a/../../outside"),
            Err(Error::InvalidName(_))
        ));
    }
}
