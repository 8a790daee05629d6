use super::ContentHasher;
use crate::error::{Error, Result};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::trace;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Streaming BLAKE3 over the whole file.
#[derive(Debug, Default, Clone, Copy)]
pub struct Blake3Hasher;

impl ContentHasher for Blake3Hasher {
    fn hash_of(&self, path: &Path) -> Result<String> {
        let hash = hash_file(path).map_err(|source| Error::Hash {
            path: path.to_path_buf(),
            source,
        })?;
        trace!("Hashed {}: {}", path.display(), hash);
        Ok(hash)
    }
}

pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_file_hash_matches_in_memory_hash() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let data = vec![0x5au8; READ_BUFFER_SIZE * 2 + 17];
        file.write_all(&data).unwrap();
        file.flush().unwrap();

        let hash = Blake3Hasher.hash_of(file.path()).unwrap();
        assert_eq!(hash, blake3::hash(&data).to_hex().to_string());
        assert_eq!(hash.len(), 64);
    }

    #[test]
    fn test_missing_file_is_hash_error() {
        let err = Blake3Hasher
            .hash_of(Path::new("/no/such/past-files/input"))
            .unwrap_err();
        assert!(matches!(err, Error::Hash { .. }));
    }
}
