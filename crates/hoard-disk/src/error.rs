//! Error types for the disk cache
//!
//! All cache errors are represented by the CacheError enum, which carries
//! enough context (path, reason) to diagnose a failure after the fact.

use std::error::Error;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Disk cache error types with detailed context
#[derive(Debug)]
pub enum CacheError {
    /// I/O operation failed
    Io {
        /// The file path where the error occurred
        path: Option<PathBuf>,
        /// The underlying I/O error kind
        kind: io::ErrorKind,
        /// Human-readable description
        message: String,
    },

    /// Journal file is malformed and cannot be replayed
    CorruptJournal {
        /// Path to the corrupt journal
        path: PathBuf,
        /// Description of what failed to parse
        reason: String,
    },

    /// Cache was closed; no further operations are permitted
    Closed,

    /// Key does not match `[a-z0-9_-]{1,120}`
    InvalidKey {
        /// The offending key
        key: String,
    },

    /// An operation was attempted in a state that forbids it
    IllegalState {
        /// Description of the violated expectation
        message: String,
    },

    /// Editor method called after the editor committed or aborted,
    /// or after the cache revoked the edit
    EditorFinished,
}

impl CacheError {
    /// Build an `Io` variant with path context.
    pub(crate) fn io(path: &Path, what: &str, err: io::Error) -> Self {
        CacheError::Io {
            path: Some(path.to_path_buf()),
            kind: err.kind(),
            message: format!("{}: {}", what, err),
        }
    }

    pub(crate) fn illegal(message: impl Into<String>) -> Self {
        CacheError::IllegalState { message: message.into() }
    }
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Io { path, kind, message } => {
                if let Some(path) = path {
                    write!(f, "I/O error in {}: {} ({})", path.display(), message, kind)
                } else {
                    write!(f, "I/O error: {} ({})", message, kind)
                }
            }

            CacheError::CorruptJournal { path, reason } => {
                write!(f, "corrupt journal {}: {}", path.display(), reason)
            }

            CacheError::Closed => write!(f, "cache is closed"),

            CacheError::InvalidKey { key } => {
                write!(f, "key {:?} must match [a-z0-9_-]{{1,120}}", key)
            }

            CacheError::IllegalState { message } => {
                write!(f, "illegal state: {}", message)
            }

            CacheError::EditorFinished => {
                write!(f, "editor already committed or aborted")
            }
        }
    }
}

impl Error for CacheError {}

impl From<io::Error> for CacheError {
    fn from(err: io::Error) -> Self {
        CacheError::Io {
            path: None,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for disk cache operations
pub type CacheResult<T> = Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CacheError::CorruptJournal {
            path: PathBuf::from("/tmp/cache/journal"),
            reason: "unknown record on line 7".to_string(),
        };

        let display = format!("{}", err);
        assert!(display.contains("corrupt journal"));
        assert!(display.contains("line 7"));
    }

    #[test]
    fn test_invalid_key_display() {
        let err = CacheError::InvalidKey { key: "Not Valid".to_string() };
        let display = format!("{}", err);
        assert!(display.contains("Not Valid"));
        assert!(display.contains("[a-z0-9_-]"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: CacheError = io_err.into();

        match err {
            CacheError::Io { kind, .. } => assert_eq!(kind, io::ErrorKind::NotFound),
            _ => panic!("Expected Io error"),
        }
    }
}
