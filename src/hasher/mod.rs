pub mod digest;

pub use digest::Blake3Hasher;

use crate::error::Result;
use std::path::Path;

/// Computes the hex-encoded content digest of a file.
pub trait ContentHasher: Send + Sync {
    fn hash_of(&self, path: &Path) -> Result<String>;
}
