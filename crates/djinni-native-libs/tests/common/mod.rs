//! Shared fixtures for the loader integration tests.

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use djinni_native_libs::{LibraryLoader, LoaderError};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Records load requests instead of touching the dynamic linker.
#[derive(Debug, Default)]
pub struct RecordingLoader {
    pub loaded: Vec<PathBuf>,
    /// Fail when asked to load a file with this name.
    pub fail_on: Option<String>,
}

impl LibraryLoader for RecordingLoader {
    fn load(&mut self, path: &Path) -> djinni_native_libs::Result<()> {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if self.fail_on.as_deref() == Some(name) {
            return Err(LoaderError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("refusing {name}"),
            )));
        }
        self.loaded.push(path.to_path_buf());
        Ok(())
    }
}

/// Root bypasses permission bits, so permission tests cannot observe a
/// denial. Reports the skip on stderr so it shows up with `--nocapture`.
#[cfg(unix)]
pub fn skip_as_root(test: &str) -> bool {
    // SAFETY: geteuid has no preconditions.
    let root = unsafe { libc::geteuid() } == 0;
    if root {
        eprintln!("skipped {test}: running as root, permission bits are not enforced");
    }
    root
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Write a ZIP archive; names ending in `/` become directory entries.
pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let file = std::fs::File::create(path).unwrap();
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, bytes) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            writer.write_all(bytes).unwrap();
        }
    }
    writer.finish().unwrap();
}

/// In-memory log sink for `tracing_subscriber::fmt`.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
