//! Startup loading of djinni native libraries.
//!
//! Native libraries can ship in two places:
//!
//! - inside the application archive, under [`EMBEDDED_LIBS_DIR`]
//!   (`resources/djinni_native_libs`). The archive is a ZIP container,
//!   normally appended to the executable. Entries are copied to temporary
//!   files first because the dynamic linker can only map real files.
//! - anywhere on the host filesystem, listed in the `djinni.native_libs_dirs`
//!   setting (or `DJINNI_NATIVE_LIBS_DIRS`) as comma-separated files or
//!   directories.
//!
//! Only files carrying the platform's library extension (`dll`, `dylib` or
//! `so`) are loaded. Call [`load_libs`] once, early in `main`:
//!
//! ```rust,no_run
//! fn main() -> Result<(), djinni_native_libs::LoaderError> {
//!     djinni_native_libs::load_libs()?;
//!     Ok(())
//! }
//! ```
//!
//! Loading mutates process-global linker state, so loads are serialized
//! internally. Run the pipeline from a single thread anyway.

pub mod archive;
pub mod config;
pub mod error;
pub mod extract;
pub mod loader;
pub mod local;
pub mod platform;

pub use archive::{scan_archive, ArchiveScan, EmbeddedArchive, EmbeddedEntry};
pub use config::{
    LoaderConfig, EMBEDDED_LIBS_DIR, NATIVE_LIBS_ARCHIVE_ENV, NATIVE_LIBS_DIRS_ENV,
    NATIVE_LIBS_DIRS_KEY,
};
pub use error::{LoaderError, Result};
pub use extract::{derive_suffix, extract_entry, ExtractedFile, Extraction};
pub use loader::{LibraryLoader, LoadOutcome, NativeLibLoader, SystemLoader};
pub use local::{scan_local_path, LocalScan};
pub use platform::{OsFamily, PlatformProfile};

/// Load embedded libraries, then libraries from the configured search
/// paths, using settings from the process environment.
pub fn load_libs() -> Result<Vec<LoadOutcome>> {
    NativeLibLoader::from_env().load_libs()
}
