//! pyopt: static complexity analysis and safe loop refactoring for Python.
//!
//! The CLI front door. The analysis itself lives in `pyopt-analysis`; this
//! crate reads input files, renders reports, and maps failures to stable
//! exit codes.

// Core infrastructure - re-exported from pyopt-core
pub use pyopt_core::error;
pub use pyopt_core::output;

pub use pyopt_analysis as analysis;

pub mod cli;

// Error bridges - converts parser and input errors to PyoptError
mod error_bridges;
