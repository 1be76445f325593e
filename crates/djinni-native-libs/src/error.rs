//! Error types for native library discovery and loading.

use std::io;
use std::path::PathBuf;

use crate::config::{NATIVE_LIBS_DIRS_ENV, NATIVE_LIBS_DIRS_KEY};

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Fatal loader failures.
///
/// Missing locations and unusable candidates are not errors; they show up as
/// explicit empty or skipped outcomes on the scan and extraction types.
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    /// The environment refused to let us create a temporary file.
    #[error(
        "Permission denied while creating a temporary file: {}\n\n\
         If you cannot grant this process permission to create temporary files, \
         install the native libraries manually and provide the installation path(s) \
         with the `{}` setting (environment variable `{}`)",
        .source,
        NATIVE_LIBS_DIRS_KEY,
        NATIVE_LIBS_DIRS_ENV
    )]
    TempFileDenied {
        #[source]
        source: io::Error,
    },

    /// Reading, writing or listing files failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A recognized archive could not be read.
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// The OS loader rejected a library.
    #[error("Failed to load native library {}: {}", .path.display(), .source)]
    LoadFailed {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },
}

impl LoaderError {
    /// Classify a failure to create a temporary file.
    pub(crate) fn temp_file(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::PermissionDenied {
            LoaderError::TempFileDenied { source: err }
        } else {
            LoaderError::Io(err)
        }
    }
}
