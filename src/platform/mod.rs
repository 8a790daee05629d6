#[cfg(unix)]
pub mod unix;
#[cfg(target_os = "windows")]
pub mod windows;

use crate::error::{Error, Result};
use crate::model::IdentityKey;
use std::path::Path;

/// Maps a path to the stable identity of the physical file behind it.
///
/// Implementations fail with [`Error::IdentityUnavailable`] when the file cannot
/// be opened or the filesystem has no stable per-file identifier.
pub trait IdentityProvider: Send + Sync {
    fn identity_of(&self, path: &Path) -> Result<IdentityKey>;
}

/// Provider for platforms without a stable file identifier. Every lookup fails,
/// so every file is skipped.
#[derive(Debug, Default)]
pub struct UnsupportedIdentityProvider;

impl IdentityProvider for UnsupportedIdentityProvider {
    fn identity_of(&self, path: &Path) -> Result<IdentityKey> {
        Err(Error::identity_unavailable(
            path,
            "no stable file identifier on this platform",
        ))
    }
}

#[cfg(target_os = "windows")]
pub fn default_identity_provider() -> Box<dyn IdentityProvider> {
    Box::new(windows::NtfsIdentityProvider)
}

#[cfg(unix)]
pub fn default_identity_provider() -> Box<dyn IdentityProvider> {
    Box::new(unix::InodeIdentityProvider)
}

#[cfg(not(any(unix, target_os = "windows")))]
pub fn default_identity_provider() -> Box<dyn IdentityProvider> {
    Box::new(UnsupportedIdentityProvider)
}
