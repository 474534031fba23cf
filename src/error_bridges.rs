//! Error bridge implementations.
//!
//! This module provides `impl From<X> for PyoptError` conversions from the
//! parser's and the input layer's error types to the unified `PyoptError`.
//! They live in the root crate because `pyopt-core` does not depend on the
//! parser.

use pyopt_core::error::PyoptError;

use crate::cli::InputError;

// Bridge: ParseError -> PyoptError lives in pyopt-cst (orphan rule).

// ============================================================================
// Bridge: InputError -> PyoptError
// ============================================================================

impl From<InputError> for PyoptError {
    fn from(err: InputError) -> Self {
        match err {
            InputError::NotFound { path } => PyoptError::file_not_found(path),
            InputError::NotAFile { .. } => PyoptError::invalid_args(err.to_string()),
            InputError::Read { .. } | InputError::Walk(_) => PyoptError::internal(err.to_string()),
        }
    }
}
