// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Syntax tree node types and serialization.
//!
//! The tree is abstract: comments, blank lines, and redundant parentheses are
//! dropped during parsing. Every statement and expression carries the byte
//! [`Span`] of the source text it was parsed from.

pub mod codegen;
pub mod expression;
pub mod op;
pub mod statement;

pub use codegen::{
    expression_to_source, module_to_source, statement_to_source, Codegen, CodegenState, Prec,
};
pub use expression::{Argument, Comprehension, Constant, DictItem, ExprKind, Expression};
pub use op::{BinaryOp, BoolOp, CompOp, UnaryOp};
pub use pyopt_core::Span;
pub use statement::{
    ClassDef, ExceptHandler, For, FunctionDef, If, ImportAlias, ImportNames, Module, Param,
    Parameters, StarParam, Statement, StatementKind, Try, While, With, WithItem,
};

/// Alias used by analysis code for the root of a parsed file.
pub type SyntaxTree = Module;
