use super::IdentityProvider;
use crate::error::{Error, Result};
use crate::model::IdentityKey;
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

/// `(st_dev, st_ino)` identity. Stable across renames within one filesystem.
#[derive(Debug, Default)]
pub struct InodeIdentityProvider;

impl IdentityProvider for InodeIdentityProvider {
    fn identity_of(&self, path: &Path) -> Result<IdentityKey> {
        let metadata = fs::symlink_metadata(path)
            .map_err(|e| Error::identity_unavailable(path, e.to_string()))?;
        if !metadata.is_file() {
            return Err(Error::identity_unavailable(path, "not a regular file"));
        }
        Ok(IdentityKey::new(metadata.ino(), metadata.dev()))
    }
}
