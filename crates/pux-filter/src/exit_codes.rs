//! Exit codes for the filter-1pux CLI.
//!
//! Exit codes communicate the outcome without requiring output parsing.
//!
//! Exit code ranges:
//! - 0: Success
//! - 10-19: User/input errors (recoverable by user action)
//! - 20-29: Internal and I/O errors

use pux_archive::ArchiveError;

/// Exit codes for filter-1pux operations.
///
/// These codes are a stable contract for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success
    Clean = 0,

    // ========================================================================
    // User / Input Errors (10-19)
    // ========================================================================
    /// Invalid arguments or configuration
    ArgsError = 10,

    /// Output path already exists
    DestinationExists = 11,

    /// Export JSON malformed or an identifier repeated
    MalformedArchive = 12,

    /// Input is not a container or lacks a required entry
    ContainerError = 13,

    // ========================================================================
    // Internal Errors (20-29)
    // ========================================================================
    /// Internal error (bug - please report)
    InternalError = 20,

    /// I/O error
    IoError = 21,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the error code name as a string constant (for JSON output).
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::DestinationExists => "ERR_DESTINATION_EXISTS",
            ExitCode::MalformedArchive => "ERR_MALFORMED",
            ExitCode::ContainerError => "ERR_CONTAINER",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }
}

impl From<&ArchiveError> for ExitCode {
    fn from(error: &ArchiveError) -> Self {
        match error {
            ArchiveError::DestinationExists(_) => ExitCode::DestinationExists,
            ArchiveError::MalformedArchive(_)
            | ArchiveError::DuplicateIdentifier(_)
            | ArchiveError::Json(_) => ExitCode::MalformedArchive,
            ArchiveError::ArchiveOpen(_) | ArchiveError::EntryNotFound(_) => {
                ExitCode::ContainerError
            }
            ArchiveError::Zip(zip::result::ZipError::Io(_)) | ArchiveError::Io(_) => {
                ExitCode::IoError
            }
            ArchiveError::Zip(_) => ExitCode::ContainerError,
            ArchiveError::DuplicateEntry(_) => ExitCode::InternalError,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}
