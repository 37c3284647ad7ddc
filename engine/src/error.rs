//! Error types for the transfer engine.
//!
//! `TransferError` is the single taxonomy surfaced to callers: every backend,
//! validator and configuration loader reports one of its three kinds.
//! Filesystem leaf operations report the richer `FsError`, which carries the
//! offending path and converts into `TransferError::Protocol` at the backend
//! boundary.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The class of a transfer failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A precondition failed before any byte moved
    Validation,
    /// The transfer itself failed (possibly after partial data movement)
    Protocol,
    /// The external settings source was malformed or unreadable
    Configuration,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::Protocol => write!(f, "protocol"),
            ErrorKind::Configuration => write!(f, "configuration"),
        }
    }
}

/// Errors surfaced by the engine to its callers.
///
/// Validation errors are always raised before any data is transferred and are
/// safe to retry once the underlying condition is fixed. Protocol errors may
/// follow partial data movement; nothing is rolled back.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Missing source, unwritable destination, insufficient space,
    /// unreachable remote endpoint, missing tooling or credentials
    #[error("{0}")]
    Validation(String),

    /// Failure during or wrapping the transfer
    #[error("{0}")]
    Protocol(String),

    /// Malformed or unreadable configuration
    #[error("{0}")]
    Configuration(String),
}

impl TransferError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// The kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Protocol(_) => ErrorKind::Protocol,
            Self::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// The human-readable message without the kind.
    pub fn message(&self) -> &str {
        match self {
            Self::Validation(m) | Self::Protocol(m) | Self::Configuration(m) => m,
        }
    }
}

/// Result alias used throughout the engine.
pub type Result<T, E = TransferError> = std::result::Result<T, E>;

/// Low-level filesystem failures raised while mirroring files and trees.
#[derive(Debug, Error)]
pub enum FsError {
    /// Failed to read from a source file or its metadata
    #[error("failed to read {}: {source}", path.display())]
    ReadError { path: PathBuf, source: io::Error },

    /// Failed to write to a destination file
    #[error("failed to write {}: {source}", path.display())]
    WriteError { path: PathBuf, source: io::Error },

    /// Failed to enumerate a source directory
    #[error("failed to enumerate directory {}: {source}", path.display())]
    EnumerationFailed { path: PathBuf, source: io::Error },

    /// Failed to create a destination directory
    #[error("failed to create directory {}: {source}", path.display())]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    /// Failed to recreate a symbolic link
    #[error("failed to create symlink {}: {source}", path.display())]
    SymlinkFailed { path: PathBuf, source: io::Error },

    /// Source and destination are the same file
    #[error("{} and its destination are the same file", path.display())]
    SameFile { path: PathBuf },

    /// Failed to apply timestamps or permissions
    #[error("failed to preserve metadata on {}: {source}", path.display())]
    MetadataFailed { path: PathBuf, source: io::Error },
}

impl From<FsError> for TransferError {
    fn from(err: FsError) -> Self {
        TransferError::Protocol(format!("local copy failed: {}", err))
    }
}
