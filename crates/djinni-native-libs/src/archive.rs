//! Discovery of native libraries embedded in the application's archive.
//!
//! The archive is a ZIP container. By default it is the running executable
//! itself, which can carry a ZIP payload appended to the binary; the ZIP
//! reader finds the central directory from the end of the file, so the
//! executable bytes in front of it are ignored.

use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use zip::ZipArchive;

/// An opened application archive.
pub struct EmbeddedArchive {
    path: PathBuf,
    pub(crate) zip: ZipArchive<File>,
}

/// Location of a file or directory inside an [`EmbeddedArchive`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmbeddedEntry {
    name: String,
}

/// Outcome of scanning a directory inside the application archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveScan {
    /// The application is not running from a ZIP container.
    NotPackaged,
    /// The container holds nothing under the requested directory.
    DirectoryMissing,
    /// Immediate children of the directory, in container order.
    Entries(Vec<EmbeddedEntry>),
}

impl EmbeddedEntry {
    /// Create an entry from its archive-relative name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Full archive-relative name, e.g. `resources/djinni_native_libs/libfoo.so`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Final path segment, e.g. `libfoo.so`.
    pub fn display_name(&self) -> &str {
        let trimmed = self.name.trim_end_matches('/');
        trimmed.rsplit('/').next().unwrap_or(trimmed)
    }

    /// Directory entries end with a slash in ZIP central directories.
    pub fn is_dir(&self) -> bool {
        self.name.ends_with('/')
    }
}

impl ArchiveScan {
    /// Entries found, empty for the not-found variants.
    pub fn entries(&self) -> &[EmbeddedEntry] {
        match self {
            ArchiveScan::Entries(entries) => entries,
            ArchiveScan::NotPackaged | ArchiveScan::DirectoryMissing => &[],
        }
    }

    /// Consume the scan, yielding its entries in container order.
    pub fn into_entries(self) -> Vec<EmbeddedEntry> {
        match self {
            ArchiveScan::Entries(entries) => entries,
            ArchiveScan::NotPackaged | ArchiveScan::DirectoryMissing => Vec::new(),
        }
    }
}

impl EmbeddedArchive {
    /// Open `path` as an application archive.
    ///
    /// Returns `None` when `path` cannot be opened or read as a ZIP
    /// container. Embedding is optional, so none of these are errors.
    pub fn open(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();

        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) => {
                tracing::trace!("Cannot open archive {}: {}", path.display(), e);
                return None;
            }
        };

        match ZipArchive::new(file) {
            Ok(zip) => Some(Self {
                path: path.to_path_buf(),
                zip,
            }),
            Err(e) => {
                tracing::trace!("{} is not a packaged archive: {}", path.display(), e);
                None
            }
        }
    }

    /// Open the running executable as an application archive.
    ///
    /// Returns `None` when the executable's location cannot be resolved.
    pub fn open_current_exe() -> Option<Self> {
        match std::env::current_exe() {
            Ok(exe) => Self::open(exe),
            Err(e) => {
                tracing::trace!("Cannot resolve the current executable: {}", e);
                None
            }
        }
    }

    /// Location of the archive on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// List the immediate children of `dir`.
    ///
    /// Nested directories are reported once each (with a trailing slash)
    /// and never descended into.
    pub fn scan(&self, dir: &str) -> ArchiveScan {
        let prefix = format!("{}/", dir.trim_matches('/'));
        let mut found_dir = false;
        let mut seen = HashSet::new();
        let mut entries = Vec::new();

        for index in 0..self.zip.len() {
            let Some(name) = self.zip.name_for_index(index) else {
                continue;
            };
            let Some(rest) = name.strip_prefix(&prefix) else {
                continue;
            };
            found_dir = true;

            if rest.is_empty() {
                continue;
            }

            let child = match rest.find('/') {
                Some(slash) => &name[..prefix.len() + slash + 1],
                None => name,
            };
            if seen.insert(child.to_string()) {
                entries.push(EmbeddedEntry::new(child));
            }
        }

        if found_dir {
            ArchiveScan::Entries(entries)
        } else {
            ArchiveScan::DirectoryMissing
        }
    }
}

/// Open the configured archive (or the current executable) and scan `dir`.
pub fn scan_archive(
    archive_path: Option<&Path>,
    dir: &str,
) -> (Option<EmbeddedArchive>, ArchiveScan) {
    let archive = match archive_path {
        Some(path) => EmbeddedArchive::open(path),
        None => EmbeddedArchive::open_current_exe(),
    };

    match archive {
        Some(archive) => {
            let scan = archive.scan(dir);
            (Some(archive), scan)
        }
        None => (None, ArchiveScan::NotPackaged),
    }
}
