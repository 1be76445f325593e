//! Loading native libraries into the process.
//!
//! [`NativeLibLoader`] runs the whole pipeline: libraries embedded in the
//! application archive are extracted and loaded first, then every path from
//! the `djinni.native_libs_dirs` setting is scanned and loaded in order.
//!
//! The first load failure aborts the run. Libraries loaded before the
//! failure stay loaded.

use std::path::{Path, PathBuf};

use libloading::Library;
use parking_lot::{const_mutex, Mutex};

use crate::archive::{scan_archive, EmbeddedArchive, EmbeddedEntry};
use crate::config::{LoaderConfig, EMBEDDED_LIBS_DIR};
use crate::error::{LoaderError, Result};
use crate::extract::{extract_entry, Extraction};
use crate::local::{scan_local_path, LocalScan};
use crate::platform::PlatformProfile;

/// The OS-level load operation.
pub trait LibraryLoader {
    /// Map the library at `path` into the process for good.
    fn load(&mut self, path: &Path) -> Result<()>;
}

impl<L: LibraryLoader + ?Sized> LibraryLoader for &mut L {
    fn load(&mut self, path: &Path) -> Result<()> {
        (**self).load(path)
    }
}

/// Loads libraries through the platform's dynamic linker.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLoader;

// The dynamic linker's state is process-global.
static LOAD_LOCK: Mutex<()> = const_mutex(());

impl LibraryLoader for SystemLoader {
    fn load(&mut self, path: &Path) -> Result<()> {
        let _guard = LOAD_LOCK.lock();

        // SAFETY: loading a library runs its initializers. Callers opt into
        // that by placing the library in an archive or search path.
        let library = unsafe { Library::new(path) }.map_err(|source| LoaderError::LoadFailed {
            path: path.to_path_buf(),
            source,
        })?;

        // Dropping the handle would unload the library.
        std::mem::forget(library);
        Ok(())
    }
}

/// Result of offering one candidate to the loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    /// Absolute path handed to the OS loader. For archive entries that were
    /// filtered out before extraction this is the archive path joined with
    /// the entry name, e.g. `/app/bundle/resources/djinni_native_libs/readme.txt`.
    pub path: PathBuf,
    /// `false` when the file name lacked the platform library extension.
    pub loaded: bool,
}

/// Discovers and loads native libraries.
pub struct NativeLibLoader<L = SystemLoader> {
    config: LoaderConfig,
    profile: PlatformProfile,
    loader: L,
}

impl NativeLibLoader<SystemLoader> {
    /// Create a loader that uses the platform's dynamic linker.
    pub fn new(config: LoaderConfig) -> Self {
        Self::with_loader(config, SystemLoader)
    }

    /// Loader configured from the process environment.
    pub fn from_env() -> Self {
        Self::new(LoaderConfig::from_env())
    }
}

impl<L: LibraryLoader> NativeLibLoader<L> {
    /// Create a loader that hands libraries to `loader`, for the host
    /// platform's profile.
    pub fn with_loader(config: LoaderConfig, loader: L) -> Self {
        Self {
            config,
            profile: PlatformProfile::current(),
            loader,
        }
    }

    /// Override the detected platform.
    pub fn with_profile(mut self, profile: PlatformProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Settings this loader was created with.
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Platform used to filter candidates.
    pub fn profile(&self) -> PlatformProfile {
        self.profile
    }

    /// Get the underlying OS loader.
    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Consume this loader, returning the underlying OS loader.
    pub fn into_loader(self) -> L {
        self.loader
    }

    /// Load embedded libraries, then libraries from the configured paths.
    pub fn load_libs(&mut self) -> Result<Vec<LoadOutcome>> {
        let mut outcomes = self.load_libs_from_archive_path(EMBEDDED_LIBS_DIR)?;

        let search_paths = self.config.search_paths();
        if !search_paths.is_empty() {
            tracing::debug!("Loading local native libs");
        }
        for path in &search_paths {
            outcomes.extend(self.load_libs_from_local_path(path)?);
        }

        Ok(outcomes)
    }

    /// Load the library at `path`, or every file directly inside it when
    /// it is a directory. A missing path loads nothing.
    pub fn load_libs_from_local_path(&mut self, path: &Path) -> Result<Vec<LoadOutcome>> {
        match scan_local_path(path)? {
            LocalScan::Missing => Ok(Vec::new()),
            LocalScan::File(file) => Ok(vec![self.load_library(&file)?]),
            LocalScan::Directory(files) => files
                .iter()
                .map(|file| self.load_library(file))
                .collect(),
        }
    }

    /// Extract and load every library directly inside the archive
    /// directory `dir`.
    ///
    /// Returns nothing when the application is not packaged or the
    /// directory is absent.
    pub fn load_libs_from_archive_path(&mut self, dir: &str) -> Result<Vec<LoadOutcome>> {
        let (archive, scan) = scan_archive(self.config.archive_path.as_deref(), dir);
        let Some(mut archive) = archive else {
            return Ok(Vec::new());
        };

        let entries = scan.into_entries();
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!(
            "Loading native libs from archive path {} in {}",
            dir,
            archive.path().display()
        );
        let mut outcomes = Vec::new();
        for entry in &entries {
            if let Some(outcome) = self.load_lib_from_archive_entry(&mut archive, entry)? {
                outcomes.push(outcome);
            }
        }

        Ok(outcomes)
    }

    /// Extract one archive entry and load it.
    ///
    /// An entry whose name lacks the platform library extension is not
    /// extracted and yields an outcome with `loaded == false`, like any other
    /// filtered candidate. Returns `None` when the entry has no readable
    /// bytes (a stale name or a directory).
    pub fn load_lib_from_archive_entry(
        &mut self,
        archive: &mut EmbeddedArchive,
        entry: &EmbeddedEntry,
    ) -> Result<Option<LoadOutcome>> {
        if !self.profile.can_load(Path::new(entry.display_name())) {
            return Ok(Some(LoadOutcome {
                path: std::path::absolute(archive.path())?.join(entry.name()),
                loaded: false,
            }));
        }

        match extract_entry(archive, entry, self.config.temp_dir.as_deref())? {
            Extraction::Skipped => Ok(None),
            Extraction::Extracted(file) => self.load_library(file.temporary_file_path()).map(Some),
        }
    }

    /// Load one file if its extension matches the platform.
    pub fn load_library(&mut self, path: &Path) -> Result<LoadOutcome> {
        let path = std::path::absolute(path)?;
        if !self.profile.can_load(&path) {
            return Ok(LoadOutcome {
                path,
                loaded: false,
            });
        }

        self.loader.load(&path)?;
        tracing::info!("Loaded {}", path.display());

        Ok(LoadOutcome { path, loaded: true })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::test_support::write_zip;
    use crate::platform::OsFamily;

    #[derive(Default)]
    struct Recorder {
        loaded: Vec<PathBuf>,
    }

    impl LibraryLoader for Recorder {
        fn load(&mut self, path: &Path) -> Result<()> {
            self.loaded.push(path.to_path_buf());
            Ok(())
        }
    }

    fn unix_loader(config: LoaderConfig) -> NativeLibLoader<Recorder> {
        NativeLibLoader::with_loader(config, Recorder::default())
            .with_profile(PlatformProfile::for_family(OsFamily::OtherUnix))
    }

    #[test]
    fn test_extension_mismatch_never_reaches_os_loader() {
        let tmp = tempfile::tempdir().unwrap();
        let mut loader = unix_loader(LoaderConfig::new());

        for name in ["readme.txt", "libfoo.dylib", "foo.dll", "libfoo.so.1", "libfoo"] {
            let path = tmp.path().join(name);
            std::fs::write(&path, b"x").unwrap();
            let outcome = loader.load_library(&path).unwrap();
            assert!(!outcome.loaded, "{name}");
        }

        assert!(loader.loader().loaded.is_empty());
    }

    #[test]
    fn test_load_library_makes_path_absolute() {
        let mut loader = unix_loader(LoaderConfig::new());
        let outcome = loader.load_library(Path::new("relative/libfoo.so")).unwrap();

        assert!(outcome.loaded);
        assert!(outcome.path.is_absolute());
        assert!(outcome.path.ends_with("relative/libfoo.so"));
        assert_eq!(loader.into_loader().loaded, vec![outcome.path]);
    }

    #[test]
    fn test_double_load_is_not_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let lib = tmp.path().join("libfoo.so");
        std::fs::write(&lib, b"x").unwrap();

        let mut loader = unix_loader(LoaderConfig::new());
        loader.load_library(&lib).unwrap();
        loader.load_library(&lib).unwrap();
        assert_eq!(loader.loader().loaded.len(), 2);
    }

    #[test]
    fn test_archive_entry_with_wrong_extension_is_not_extracted() {
        let tmp = tempfile::tempdir().unwrap();
        let zip_path = tmp.path().join("app.zip");
        let scratch = tmp.path().join("scratch");
        std::fs::create_dir(&scratch).unwrap();
        write_zip(&zip_path, &[("resources/djinni_native_libs/readme.txt", b"docs")]);

        let mut archive = EmbeddedArchive::open(&zip_path).unwrap();
        let mut loader = unix_loader(LoaderConfig::new().with_temp_dir(&scratch));
        let outcome = loader
            .load_lib_from_archive_entry(
                &mut archive,
                &EmbeddedEntry::new("resources/djinni_native_libs/readme.txt"),
            )
            .unwrap();

        let outcome = outcome.expect("filtered entries are still reported");
        assert!(!outcome.loaded);
        assert!(outcome.path.is_absolute());
        assert!(outcome
            .path
            .ends_with("app.zip/resources/djinni_native_libs/readme.txt"));
        assert_eq!(std::fs::read_dir(&scratch).unwrap().count(), 0);
        assert!(loader.loader().loaded.is_empty());
    }

    #[test]
    fn test_missing_archive_directory_loads_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let zip_path = tmp.path().join("app.zip");
        write_zip(&zip_path, &[("unrelated/libfoo.so", b"foo")]);

        let mut loader = unix_loader(LoaderConfig::new().with_archive_path(&zip_path));
        assert!(loader
            .load_libs_from_archive_path(EMBEDDED_LIBS_DIR)
            .unwrap()
            .is_empty());
        assert!(loader.loader().loaded.is_empty());
    }

    #[test]
    fn test_stale_archive_entry_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let zip_path = tmp.path().join("app.zip");
        write_zip(&zip_path, &[("resources/djinni_native_libs/libfoo.so", b"foo")]);

        let mut archive = EmbeddedArchive::open(&zip_path).unwrap();
        let mut loader = unix_loader(LoaderConfig::new().with_temp_dir(tmp.path()));
        let outcome = loader
            .load_lib_from_archive_entry(
                &mut archive,
                &EmbeddedEntry::new("resources/djinni_native_libs/libgone.so"),
            )
            .unwrap();

        assert!(outcome.is_none());
        assert!(loader.loader().loaded.is_empty());
    }

    /// Shared objects that ship with glibc and have no load-time side effects.
    #[cfg(target_os = "linux")]
    fn system_shared_object() -> Option<PathBuf> {
        let dirs = [
            "/lib/x86_64-linux-gnu",
            "/usr/lib/x86_64-linux-gnu",
            "/lib/aarch64-linux-gnu",
            "/usr/lib/aarch64-linux-gnu",
            "/lib64",
            "/usr/lib64",
            "/lib",
            "/usr/lib",
        ];
        let names = ["libBrokenLocale.so.1", "libm.so.6"];

        dirs.iter()
            .flat_map(|dir| names.iter().map(move |name| Path::new(dir).join(name)))
            .find(|path| path.is_file())
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_system_loader_loads_embedded_shared_object() {
        let Some(system_lib) = system_shared_object() else {
            eprintln!("skipped: no system shared object found to embed");
            return;
        };

        let tmp = tempfile::tempdir().unwrap();
        let zip_path = tmp.path().join("app.zip");
        let bytes = std::fs::read(&system_lib).unwrap();
        write_zip(
            &zip_path,
            &[("resources/djinni_native_libs/libsystemcopy.so", &bytes)],
        );

        let mut loader = NativeLibLoader::new(
            LoaderConfig::new()
                .with_archive_path(&zip_path)
                .with_temp_dir(tmp.path()),
        )
        .with_profile(PlatformProfile::for_family(OsFamily::OtherUnix));
        let outcomes = loader.load_libs_from_archive_path(EMBEDDED_LIBS_DIR).unwrap();

        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].loaded);
        let name = outcomes[0].path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("libsystemcopy.so"), "{name}");
        assert_eq!(std::fs::read(&outcomes[0].path).unwrap(), bytes);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_system_loader_rejects_garbage() {
        let tmp = tempfile::tempdir().unwrap();
        let bogus = tmp.path().join("libbogus.so");
        std::fs::write(&bogus, b"definitely not an ELF object").unwrap();

        let err = SystemLoader.load(&bogus).unwrap_err();
        match err {
            LoaderError::LoadFailed { path, .. } => assert_eq!(path, bogus),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
