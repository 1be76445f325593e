//! Host platform detection for native library file names.

use std::path::Path;

use once_cell::sync::Lazy;

/// Operating system families that differ in their shared library extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsFamily {
    Windows,
    MacOs,
    /// Linux, the BSDs and anything else we don't recognize.
    OtherUnix,
}

impl OsFamily {
    /// File extension (without the dot) used for shared libraries.
    pub fn library_extension(&self) -> &'static str {
        match self {
            OsFamily::Windows => "dll",
            OsFamily::MacOs => "dylib",
            OsFamily::OtherUnix => "so",
        }
    }
}

static CURRENT: Lazy<PlatformProfile> =
    Lazy::new(|| PlatformProfile::from_os_name(std::env::consts::OS));

/// Resolved mapping from the running OS family to its library extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformProfile {
    os_family: OsFamily,
    expected_extension: &'static str,
}

impl PlatformProfile {
    /// Profile of the host, computed once per process.
    pub fn current() -> Self {
        *CURRENT
    }

    /// Classify an OS identification string.
    ///
    /// Matching is case-insensitive and substring based: anything containing
    /// `win` is Windows, anything containing `mac` is macOS, and every other
    /// name (including empty or unknown ones) falls back to the unix `so`
    /// extension.
    pub fn from_os_name(os_name: &str) -> Self {
        let os_name = os_name.to_lowercase();
        let os_family = if os_name.contains("win") {
            OsFamily::Windows
        } else if os_name.contains("mac") {
            OsFamily::MacOs
        } else {
            OsFamily::OtherUnix
        };
        Self::for_family(os_family)
    }

    /// Profile for a known OS family.
    pub fn for_family(os_family: OsFamily) -> Self {
        Self {
            os_family,
            expected_extension: os_family.library_extension(),
        }
    }

    /// Get the classified OS family.
    pub fn os_family(&self) -> OsFamily {
        self.os_family
    }

    /// Library extension, without the dot.
    pub fn expected_extension(&self) -> &'static str {
        self.expected_extension
    }

    /// Whether `path` carries this platform's library extension.
    ///
    /// Only the file name is inspected; the file's contents are never read.
    pub fn can_load(&self, path: &Path) -> bool {
        path.extension()
            .is_some_and(|ext| ext == self.expected_extension)
    }
}
