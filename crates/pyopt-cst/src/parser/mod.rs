// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

mod errors;
mod grammar;

pub use errors::ParseError;

use crate::nodes::{Expression, Module};
use crate::tokenizer::Token;

pub(crate) fn parse_tokens(tokens: &[Token<'_>]) -> Result<Module, ParseError> {
    grammar::python::file(tokens, tokens).map_err(|err| ParseError::from_peg(tokens, err))
}

pub(crate) fn parse_expression_tokens(tokens: &[Token<'_>]) -> Result<Expression, ParseError> {
    grammar::python::expression_input(tokens, tokens)
        .map_err(|err| ParseError::from_peg(tokens, err))
}
