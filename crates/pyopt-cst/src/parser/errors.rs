// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use thiserror::Error;

use crate::tokenizer::{TokError, TokType, Token};

/// A tokenizer or grammar failure.
///
/// Positions are 1-indexed; `column` counts characters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at line {line}, column {column}")]
pub struct ParseError {
    pub line: u32,
    pub column: u32,
    /// Byte offset of the error position.
    pub offset: usize,
    pub message: String,
}

impl From<TokError> for ParseError {
    fn from(err: TokError) -> Self {
        ParseError {
            line: err.line,
            column: err.column,
            offset: err.offset,
            message: err.kind.to_string(),
        }
    }
}

impl From<ParseError> for pyopt_core::error::PyoptError {
    fn from(err: ParseError) -> Self {
        pyopt_core::error::PyoptError::Parse {
            file: None,
            line: err.line,
            column: err.column,
            message: err.message,
        }
    }
}

impl ParseError {
    /// Build a syntax error from a failed grammar match.
    pub(crate) fn from_peg(tokens: &[Token<'_>], err: peg::error::ParseError<usize>) -> Self {
        let Some(tok) = tokens.get(err.location).or_else(|| tokens.last()) else {
            return ParseError {
                line: 1,
                column: 1,
                offset: 0,
                message: format!("invalid syntax (expected {})", err.expected),
            };
        };
        let found = match tok.kind {
            TokType::EndMarker => "end of file".to_string(),
            TokType::Newline => "end of line".to_string(),
            TokType::Indent => "indent".to_string(),
            TokType::Dedent => "dedent".to_string(),
            _ => format!("'{}'", tok.text),
        };
        ParseError {
            line: tok.line,
            column: tok.col,
            offset: tok.span.start,
            message: format!("invalid syntax: unexpected {} (expected {})", found, err.expected),
        }
    }
}
