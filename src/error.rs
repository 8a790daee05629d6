use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Database connection error: {0}")]
    Connection(#[from] diesel::ConnectionError),

    #[error("Migration error: {0}")]
    Migration(String),

    /// No stable identity could be obtained for the path. Callers skip the file.
    #[error("Identity unavailable for {}: {reason}", path.display())]
    IdentityUnavailable { path: PathBuf, reason: String },

    #[error("Failed to hash {}: {source}", path.display())]
    Hash {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn identity_unavailable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::IdentityUnavailable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True for errors that mean "skip this file", as opposed to a processing failure.
    pub fn is_skip(&self) -> bool {
        matches!(self, Error::IdentityUnavailable { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
