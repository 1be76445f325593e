//! Materializes archive entries as real files the OS loader can map.

use std::io;
use std::path::{Path, PathBuf};

use parking_lot::{const_mutex, Mutex, Once};
use tempfile::TempPath;
use zip::result::ZipError;

use crate::archive::{EmbeddedArchive, EmbeddedEntry};
use crate::error::{LoaderError, Result};

/// An archive entry copied to a temporary file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFile {
    original_entry_name: String,
    temporary_file_path: PathBuf,
}

impl ExtractedFile {
    /// Archive-relative name of the source entry.
    pub fn original_entry_name(&self) -> &str {
        &self.original_entry_name
    }

    /// Where the bytes were written.
    pub fn temporary_file_path(&self) -> &Path {
        &self.temporary_file_path
    }
}

/// Outcome of extracting one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Extracted(ExtractedFile),
    /// The entry has no readable byte stream (stale name or a directory).
    Skipped,
}

/// Text after the last `.` in `name`, if there is one.
pub fn derive_suffix(name: &str) -> Option<&str> {
    name.rfind('.').map(|dot| &name[dot + 1..])
}

/// Copy `entry` out of `archive` into a fresh temporary file.
///
/// The temporary file name starts with the entry's file name and keeps its
/// extension, e.g. `libfoo.so` becomes `/tmp/libfoo.soXXXXXX.so`. The file
/// is removed when the process exits, whether or not the copy succeeded.
pub fn extract_entry(
    archive: &mut EmbeddedArchive,
    entry: &EmbeddedEntry,
    temp_dir: Option<&Path>,
) -> Result<Extraction> {
    if entry.is_dir() {
        tracing::trace!("Skipping archive directory {}", entry.name());
        return Ok(Extraction::Skipped);
    }

    let mut source = match archive.zip.by_name(entry.name()) {
        Ok(file) if file.is_file() => file,
        Ok(_) => return Ok(Extraction::Skipped),
        Err(ZipError::Io(e)) => return Err(e.into()),
        Err(e @ ZipError::InvalidArchive(_)) => return Err(e.into()),
        Err(e) => {
            tracing::trace!("Skipping unreadable archive entry {}: {}", entry.name(), e);
            return Ok(Extraction::Skipped);
        }
    };

    let display_name = entry.display_name();
    let suffix = derive_suffix(display_name)
        .filter(|suffix| !suffix.is_empty())
        .map(|suffix| format!(".{suffix}"));

    let mut builder = tempfile::Builder::new();
    builder.prefix(display_name);
    if let Some(suffix) = &suffix {
        builder.suffix(suffix);
    }
    let temp = match temp_dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .map_err(LoaderError::temp_file)?;

    let (mut file, temp_path) = temp.into_parts();
    let temporary_file_path = temp_path.to_path_buf();
    delete_on_exit(temp_path);

    tracing::debug!(
        "Copying archive lib {} to {}",
        entry.name(),
        temporary_file_path.display()
    );
    io::copy(&mut source, &mut file)?;
    file.sync_all()?;

    Ok(Extraction::Extracted(ExtractedFile {
        original_entry_name: entry.name().to_string(),
        temporary_file_path,
    }))
}

// Extracted libraries stay mapped until exit, so their files are only
// removed from an atexit hook.
static PENDING_DELETES: Mutex<Vec<TempPath>> = const_mutex(Vec::new());
static INSTALL_HOOK: Once = Once::new();

fn delete_on_exit(path: TempPath) {
    INSTALL_HOOK.call_once(|| {
        // SAFETY: `delete_pending` is a plain `extern "C"` function that
        // never unwinds.
        let rc = unsafe { libc::atexit(delete_pending) };
        if rc != 0 {
            tracing::warn!("Could not register exit hook; extracted libraries will be left behind");
        }
    });
    PENDING_DELETES.lock().push(path);
}

extern "C" fn delete_pending() {
    let pending = std::mem::take(&mut *PENDING_DELETES.lock());
    for path in pending {
        // Best effort: Windows refuses to delete a DLL that is still mapped.
        let _ = path.close();
    }
}

#[cfg(test)]
pub(crate) fn is_scheduled_for_delete(path: &Path) -> bool {
    PENDING_DELETES
        .lock()
        .iter()
        .any(|pending| &**pending == path)
}
