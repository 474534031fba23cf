//! Error types and error code constants for pyopt.
//!
//! This module provides a unified error type (`PyoptError`) that the CLI
//! renders as JSON. Subsystem errors (parse errors, I/O failures while reading
//! input) are bridged into it with `From` impls in the root crate.
//!
//! ## Error Code Mapping
//!
//! - `2`: Invalid arguments (bad input from caller)
//! - `3`: Resolution errors (input path not found)
//! - `4`: Apply errors (failed to write a refactored file)
//! - `6`: Parse errors (source does not parse)
//! - `10`: Internal errors (bugs, unexpected state)

use std::fmt;

use thiserror::Error;

// ============================================================================
// Output Error Codes
// ============================================================================

/// Error codes for JSON output.
///
/// These codes map to CLI exit codes and appear in JSON error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// Invalid arguments from caller (bad input, malformed request).
    InvalidArguments = 2,
    /// Resolution errors (input file or directory not found).
    ResolutionError = 3,
    /// Apply errors (failed to write changes).
    ApplyError = 4,
    /// The analyzed source does not parse.
    ParseError = 6,
    /// Internal errors (bugs, unexpected state).
    InternalError = 10,
}

impl OutputErrorCode {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for OutputErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error type for CLI output.
#[derive(Debug, Error)]
pub enum PyoptError {
    /// Invalid arguments from caller.
    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    /// Input file or directory not found.
    #[error("file not found: {path}")]
    FileNotFound { path: String },

    /// Source failed to parse.
    #[error("{}parse error at {line}:{column}: {message}", file.as_deref().map(|f| format!("{}: ", f)).unwrap_or_default())]
    Parse {
        file: Option<String>,
        line: u32,
        column: u32,
        message: String,
    },

    /// Failed to write results.
    #[error("apply error: {message}")]
    ApplyError {
        message: String,
        file: Option<String>,
    },

    /// Internal error (bug or unexpected state).
    #[error("internal error: {message}")]
    InternalError { message: String },
}

// ============================================================================
// Error Code Mapping
// ============================================================================

impl From<&PyoptError> for OutputErrorCode {
    fn from(err: &PyoptError) -> Self {
        match err {
            PyoptError::InvalidArguments { .. } => OutputErrorCode::InvalidArguments,
            PyoptError::FileNotFound { .. } => OutputErrorCode::ResolutionError,
            PyoptError::Parse { .. } => OutputErrorCode::ParseError,
            PyoptError::ApplyError { .. } => OutputErrorCode::ApplyError,
            PyoptError::InternalError { .. } => OutputErrorCode::InternalError,
        }
    }
}

impl From<PyoptError> for OutputErrorCode {
    fn from(err: PyoptError) -> Self {
        OutputErrorCode::from(&err)
    }
}

// ============================================================================
// Convenience Constructors
// ============================================================================

impl PyoptError {
    /// Create an invalid arguments error.
    pub fn invalid_args(message: impl Into<String>) -> Self {
        PyoptError::InvalidArguments {
            message: message.into(),
        }
    }

    /// Create a file not found error.
    pub fn file_not_found(path: impl Into<String>) -> Self {
        PyoptError::FileNotFound { path: path.into() }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        PyoptError::InternalError {
            message: message.into(),
        }
    }

    /// Attach a file name to a parse error; other variants are returned as-is.
    pub fn in_file(self, path: impl Into<String>) -> Self {
        match self {
            PyoptError::Parse {
                line,
                column,
                message,
                ..
            } => PyoptError::Parse {
                file: Some(path.into()),
                line,
                column,
                message,
            },
            other => other,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> OutputErrorCode {
        OutputErrorCode::from(self)
    }
}

// ============================================================================
// Tests
// ============================================================================
