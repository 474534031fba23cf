//! Core infrastructure for pyopt.
//!
//! This crate provides language-agnostic infrastructure shared by the parser,
//! the analysis engine, and the CLI:
//! - Byte spans for source positions
//! - Text utilities for byte offset and line:column conversion
//! - Error types and stable output error codes
//! - JSON output envelope for CLI responses

pub mod error;
pub mod output;
pub mod span;
pub mod text;

pub use error::{OutputErrorCode, PyoptError};
pub use span::Span;
pub use text::LineIndex;
