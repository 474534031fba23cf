// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Tokenizer for the supported Python subset.
//!
//! The tokenizer produces a flat token vector consumed by the peg grammar.
//! Layout is made explicit: logical line ends become `Newline` tokens, and
//! indentation changes become `Indent` / `Dedent` tokens. Comments and
//! line continuations produce no tokens.

pub(crate) mod core;

#[cfg(test)]
mod tests;

pub use self::core::{tokenize, TokError, TokErrorKind, TokType, Token};
