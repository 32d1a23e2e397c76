//! @ai:module:intent Lazily discover submission archives under a scan root
//! @ai:module:layer infrastructure
//! @ai:module:public_api ArchiveScanner, FoundArchive
//! @ai:module:stateless true

use crate::error::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const ARCHIVE_SUFFIX: &str = ".tar.gz";

/// @ai:intent One discovered archive: where it is and its stable dedup key
///
/// The key is the path relative to the scan root with a leading separator
/// (e.g. `/2024/sub1.tar.gz`). Because the root is canonicalized before
/// scanning, the key does not change with how the root was mounted or
/// reached through symlinks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundArchive {
    pub path: PathBuf,
    pub key: String,
}

/// @ai:intent Walks a directory tree yielding candidate archives
pub struct ArchiveScanner {
    root: PathBuf,
}

impl ArchiveScanner {
    /// @ai:intent Create a scanner rooted at the given directory
    /// @ai:pre root exists and is a directory
    /// @ai:effects fs:read
    pub fn new(root: &Path) -> Result<Self> {
        Ok(Self {
            root: root.canonicalize()?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// @ai:intent Lazy, finite iterator over every archive under the root
    ///
    /// Each match appears exactly once; order beyond that is unspecified.
    /// @ai:effects fs:read
    pub fn scan(&self) -> impl Iterator<Item = FoundArchive> + '_ {
        WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::debug!("skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| {
                entry.file_type().is_file()
                    && entry
                        .file_name()
                        .to_str()
                        .map(|name| name.ends_with(ARCHIVE_SUFFIX))
                        .unwrap_or(false)
            })
            .filter_map(move |entry| {
                let path = entry.path().to_path_buf();
                let rel = path.strip_prefix(&self.root).ok()?;
                Some(FoundArchive {
                    key: format!("/{}", rel.display()),
                    path,
                })
            })
    }
}
