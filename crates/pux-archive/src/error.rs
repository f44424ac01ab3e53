//! Error types for archive operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading, filtering or writing an export archive.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP archive error
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Source is not a readable container
    #[error("cannot open archive: {0}")]
    ArchiveOpen(String),

    /// Required JSON property missing or of the wrong type
    #[error("malformed archive: {0}")]
    MalformedArchive(String),

    /// Identifier or name repeated where it must be unique
    #[error("duplicate identifier: {0}")]
    DuplicateIdentifier(String),

    /// Named entry absent from the container
    #[error("entry not found in archive: {0}")]
    EntryNotFound(String),

    /// Refusing to overwrite an existing output
    #[error("destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),

    /// Same entry name written twice to one destination
    #[error("entry written twice to destination: {0}")]
    DuplicateEntry(String),
}

impl ArchiveError {
    /// Stable snake_case name of the error kind, for machine-readable output.
    pub fn kind(&self) -> &'static str {
        match self {
            ArchiveError::Io(_) => "io",
            ArchiveError::Zip(_) => "zip",
            ArchiveError::Json(_) => "json",
            ArchiveError::ArchiveOpen(_) => "archive_open",
            ArchiveError::MalformedArchive(_) => "malformed_archive",
            ArchiveError::DuplicateIdentifier(_) => "duplicate_identifier",
            ArchiveError::EntryNotFound(_) => "entry_not_found",
            ArchiveError::DestinationExists(_) => "destination_exists",
            ArchiveError::DuplicateEntry(_) => "duplicate_entry",
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        ArchiveError::MalformedArchive(message.into())
    }

    pub(crate) fn duplicate(message: impl Into<String>) -> Self {
        ArchiveError::DuplicateIdentifier(message.into())
    }
}

/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;
