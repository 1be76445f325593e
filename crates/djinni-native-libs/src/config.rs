//! Locations and settings consulted when discovering native libraries.
//!
//! Settings come from the process environment. The search path setting is
//! looked up under its dotted key first and then under its environment
//! variable spelling, so both `djinni.native_libs_dirs=...` and
//! `DJINNI_NATIVE_LIBS_DIRS=...` work.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Archive-relative directory holding bundled native libraries.
pub const EMBEDDED_LIBS_DIR: &str = "resources/djinni_native_libs";

/// Comma-separated list of files or directories to load libraries from.
pub const NATIVE_LIBS_DIRS_KEY: &str = "djinni.native_libs_dirs";

/// Environment variable spelling of [`NATIVE_LIBS_DIRS_KEY`].
pub const NATIVE_LIBS_DIRS_ENV: &str = "DJINNI_NATIVE_LIBS_DIRS";

/// Overrides the archive scanned for embedded libraries (defaults to the
/// running executable).
pub const NATIVE_LIBS_ARCHIVE_ENV: &str = "DJINNI_NATIVE_LIBS_ARCHIVE";

/// Loader settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Raw comma-separated search paths.
    pub native_libs_dirs: Option<String>,

    /// Archive to scan instead of the current executable.
    pub archive_path: Option<PathBuf>,

    /// Directory for extracted libraries; the OS temp dir when unset.
    pub temp_dir: Option<PathBuf>,
}

impl LoaderConfig {
    /// Create empty settings: no search paths, current executable as the
    /// archive, OS temp dir for extraction.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read settings from the process environment.
    pub fn from_env() -> Self {
        Self {
            native_libs_dirs: native_libs_dirs_from_env(),
            archive_path: std::env::var_os(NATIVE_LIBS_ARCHIVE_ENV).map(PathBuf::from),
            temp_dir: None,
        }
    }

    /// Set the comma-separated search paths.
    pub fn with_native_libs_dirs(mut self, dirs: impl Into<String>) -> Self {
        self.native_libs_dirs = Some(dirs.into());
        self
    }

    /// Scan `path` for embedded libraries instead of the current executable.
    pub fn with_archive_path(mut self, path: impl AsRef<Path>) -> Self {
        self.archive_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Extract embedded libraries into `dir`.
    pub fn with_temp_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.temp_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Configured search paths, in the order given.
    pub fn search_paths(&self) -> Vec<PathBuf> {
        self.native_libs_dirs
            .as_deref()
            .map(split_search_paths)
            .unwrap_or_default()
    }
}

/// Split a comma-separated path list.
///
/// Whitespace around each path is trimmed and empty segments are dropped.
pub fn split_search_paths(value: &str) -> Vec<PathBuf> {
    value
        .split(',')
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
        .collect()
}

fn native_libs_dirs_from_env() -> Option<String> {
    std::env::var(NATIVE_LIBS_DIRS_KEY)
        .or_else(|_| std::env::var(NATIVE_LIBS_DIRS_ENV))
        .ok()
}
