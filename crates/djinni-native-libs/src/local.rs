//! Candidate discovery on the host filesystem.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Outcome of scanning one configured search path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalScan {
    /// Nothing exists at the path.
    Missing,
    /// The path names a single file.
    File(PathBuf),
    /// Regular files directly inside the directory, in listing order.
    Directory(Vec<PathBuf>),
}

impl LocalScan {
    /// Flatten into the list of files to offer the loader.
    pub fn into_candidates(self) -> Vec<PathBuf> {
        match self {
            LocalScan::Missing => Vec::new(),
            LocalScan::File(path) => vec![path],
            LocalScan::Directory(paths) => paths,
        }
    }
}

/// Scan `path`, a file or a directory.
///
/// Returned paths are absolute. Subdirectories are never descended into.
pub fn scan_local_path(path: &Path) -> Result<LocalScan> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(LocalScan::Missing),
        Err(e) => return Err(e.into()),
    };

    let root = std::path::absolute(path)?;
    if !metadata.is_dir() {
        return Ok(LocalScan::File(root));
    }

    tracing::debug!("Loading all libs in {}", root.display());
    let mut files = Vec::new();
    for entry in fs::read_dir(&root)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }

    Ok(LocalScan::Directory(files))
}
