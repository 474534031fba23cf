// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Serialization of syntax trees back to source text.
//!
//! Output is normalized: four-space indentation, single spaces around binary
//! operators, and parentheses only where operator precedence requires them
//! (plus around every walrus expression). String and number literals are
//! emitted verbatim. Comments are not part of the tree and are not emitted.
//!
//! Serialization is a fixpoint after one round: serializing a re-parse of
//! serialized output yields the same text.

use std::fmt;

use super::expression::{Argument, Comprehension, DictItem, ExprKind, Expression};
use super::op::{BinaryOp, BoolOp, UnaryOp};
use super::statement::{
    ExceptHandler, ImportAlias, ImportNames, Module, Param, Parameters, StarParam, Statement,
    StatementKind,
};

// ============================================================================
// Codegen state
// ============================================================================

/// Accumulates generated source text.
#[derive(Debug)]
pub struct CodegenState {
    tokens: String,
    indent_level: usize,
    /// Text for one indentation level.
    pub indent_str: &'static str,
}

impl Default for CodegenState {
    fn default() -> Self {
        CodegenState {
            tokens: String::new(),
            indent_level: 0,
            indent_str: "    ",
        }
    }
}

impl CodegenState {
    pub fn add_token(&mut self, tok: &str) {
        self.tokens.push_str(tok);
    }

    /// Emit indentation for the current level.
    pub fn add_indent(&mut self) {
        for _ in 0..self.indent_level {
            self.tokens.push_str(self.indent_str);
        }
    }

    pub fn add_newline(&mut self) {
        self.tokens.push('\n');
    }

    pub fn indent(&mut self) {
        self.indent_level += 1;
    }

    pub fn dedent(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
    }
}

impl fmt::Display for CodegenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tokens)
    }
}

/// Types that can be serialized to source text.
pub trait Codegen {
    fn codegen(&self, state: &mut CodegenState);
}

/// Serialize a module.
pub fn module_to_source(module: &Module) -> String {
    let mut state = CodegenState::default();
    module.codegen(&mut state);
    state.to_string()
}

/// Serialize one statement (and its nested blocks) at indentation level zero.
pub fn statement_to_source(stmt: &Statement) -> String {
    let mut state = CodegenState::default();
    stmt.codegen(&mut state);
    state.to_string()
}

/// Serialize an expression. Tuples are emitted without parentheses.
pub fn expression_to_source(expr: &Expression) -> String {
    let mut state = CodegenState::default();
    expr.codegen(&mut state);
    state.to_string()
}

// ============================================================================
// Precedence
// ============================================================================

/// Binding strength of an expression, weakest first.
///
/// An expression is parenthesized when its precedence is lower than the
/// precedence its context requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Prec {
    Yield,
    Tuple,
    Test,
    Or,
    And,
    Not,
    Cmp,
    BOr,
    BXor,
    BAnd,
    Shift,
    Arith,
    Term,
    Factor,
    Power,
    Await,
    Atom,
}

impl Prec {
    fn next(self) -> Prec {
        match self {
            Prec::Yield => Prec::Tuple,
            Prec::Tuple => Prec::Test,
            Prec::Test => Prec::Or,
            Prec::Or => Prec::And,
            Prec::And => Prec::Not,
            Prec::Not => Prec::Cmp,
            Prec::Cmp => Prec::BOr,
            Prec::BOr => Prec::BXor,
            Prec::BXor => Prec::BAnd,
            Prec::BAnd => Prec::Shift,
            Prec::Shift => Prec::Arith,
            Prec::Arith => Prec::Term,
            Prec::Term => Prec::Factor,
            Prec::Factor => Prec::Power,
            Prec::Power => Prec::Await,
            Prec::Await | Prec::Atom => Prec::Atom,
        }
    }
}

fn binop_prec(op: BinaryOp) -> Prec {
    match op {
        BinaryOp::BitOr => Prec::BOr,
        BinaryOp::BitXor => Prec::BXor,
        BinaryOp::BitAnd => Prec::BAnd,
        BinaryOp::LShift | BinaryOp::RShift => Prec::Shift,
        BinaryOp::Add | BinaryOp::Sub => Prec::Arith,
        BinaryOp::Mult | BinaryOp::MatMult | BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Mod => {
            Prec::Term
        }
        BinaryOp::Pow => Prec::Power,
    }
}

impl Expression {
    pub fn precedence(&self) -> Prec {
        match &self.kind {
            ExprKind::Tuple(items) if !items.is_empty() => Prec::Tuple,
            ExprKind::Yield(_) | ExprKind::YieldFrom(_) => Prec::Yield,
            ExprKind::Lambda { .. } | ExprKind::IfExp { .. } | ExprKind::Starred(_) => Prec::Test,
            ExprKind::BoolOp { op: BoolOp::Or, .. } => Prec::Or,
            ExprKind::BoolOp { op: BoolOp::And, .. } => Prec::And,
            ExprKind::UnaryOp {
                op: UnaryOp::Not, ..
            } => Prec::Not,
            ExprKind::UnaryOp { .. } => Prec::Factor,
            ExprKind::Compare { .. } => Prec::Cmp,
            ExprKind::BinOp { op, .. } => binop_prec(*op),
            ExprKind::Await(_) => Prec::Await,
            _ => Prec::Atom,
        }
    }

    /// Emit this expression in a context requiring at least `ctx` precedence.
    pub fn codegen_in(&self, state: &mut CodegenState, ctx: Prec) {
        let parens =
            self.precedence() < ctx || matches!(self.kind, ExprKind::NamedExpr { .. });
        if parens {
            state.add_token("(");
        }
        self.codegen_bare(state);
        if parens {
            state.add_token(")");
        }
    }

    fn codegen_bare(&self, state: &mut CodegenState) {
        match &self.kind {
            ExprKind::Name(id) => state.add_token(id),
            ExprKind::Constant(c) => state.add_token(c.as_str()),
            ExprKind::Number(raw) => state.add_token(raw),
            ExprKind::Str(pieces) => {
                for (i, piece) in pieces.iter().enumerate() {
                    if i > 0 {
                        state.add_token(" ");
                    }
                    state.add_token(piece);
                }
            }
            ExprKind::List(items) => {
                state.add_token("[");
                comma_separated(state, items, Prec::Test);
                state.add_token("]");
            }
            ExprKind::Tuple(items) => match items.as_slice() {
                [] => state.add_token("()"),
                [only] => {
                    only.codegen_in(state, Prec::Test);
                    state.add_token(",");
                }
                _ => comma_separated(state, items, Prec::Test),
            },
            ExprKind::Set(items) => {
                state.add_token("{");
                comma_separated(state, items, Prec::Test);
                state.add_token("}");
            }
            ExprKind::Dict(items) => {
                state.add_token("{");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        state.add_token(", ");
                    }
                    match item {
                        DictItem::Pair(key, value) => {
                            key.codegen_in(state, Prec::Test);
                            state.add_token(": ");
                            value.codegen_in(state, Prec::Test);
                        }
                        DictItem::Unpack(value) => {
                            state.add_token("**");
                            value.codegen_in(state, Prec::BOr);
                        }
                    }
                }
                state.add_token("}");
            }
            ExprKind::ListComp { elt, generators } => {
                state.add_token("[");
                comprehension_body(state, elt, generators);
                state.add_token("]");
            }
            ExprKind::SetComp { elt, generators } => {
                state.add_token("{");
                comprehension_body(state, elt, generators);
                state.add_token("}");
            }
            ExprKind::GeneratorExp { elt, generators } => {
                state.add_token("(");
                comprehension_body(state, elt, generators);
                state.add_token(")");
            }
            ExprKind::DictComp {
                key,
                value,
                generators,
            } => {
                state.add_token("{");
                key.codegen_in(state, Prec::Test);
                state.add_token(": ");
                value.codegen_in(state, Prec::Test);
                comprehension_clauses(state, generators);
                state.add_token("}");
            }
            ExprKind::Attribute { value, attr } => {
                if matches!(value.kind, ExprKind::Number(_)) {
                    state.add_token("(");
                    value.codegen_bare(state);
                    state.add_token(")");
                } else {
                    value.codegen_in(state, Prec::Atom);
                }
                state.add_token(".");
                state.add_token(attr);
            }
            ExprKind::Subscript { value, index } => {
                value.codegen_in(state, Prec::Atom);
                state.add_token("[");
                index.codegen_in(state, Prec::Tuple);
                state.add_token("]");
            }
            ExprKind::Slice { lower, upper, step } => {
                if let Some(lower) = lower {
                    lower.codegen_in(state, Prec::Test);
                }
                state.add_token(":");
                if let Some(upper) = upper {
                    upper.codegen_in(state, Prec::Test);
                }
                if let Some(step) = step {
                    state.add_token(":");
                    step.codegen_in(state, Prec::Test);
                }
            }
            ExprKind::Call { func, args } => {
                func.codegen_in(state, Prec::Atom);
                state.add_token("(");
                match args.as_slice() {
                    [Argument::Positional(Expression {
                        kind: ExprKind::GeneratorExp { elt, generators },
                        ..
                    })] => comprehension_body(state, elt, generators),
                    _ => arguments(state, args),
                }
                state.add_token(")");
            }
            ExprKind::UnaryOp { op, operand } => {
                state.add_token(op.as_str());
                let ctx = if *op == UnaryOp::Not {
                    Prec::Not
                } else {
                    Prec::Factor
                };
                operand.codegen_in(state, ctx);
            }
            ExprKind::BinOp { left, op, right } => {
                let prec = binop_prec(*op);
                let (left_ctx, right_ctx) = if *op == BinaryOp::Pow {
                    (Prec::Await, Prec::Factor)
                } else {
                    (prec, prec.next())
                };
                left.codegen_in(state, left_ctx);
                state.add_token(" ");
                state.add_token(op.as_str());
                state.add_token(" ");
                right.codegen_in(state, right_ctx);
            }
            ExprKind::BoolOp { op, values } => {
                let ctx = match op {
                    BoolOp::Or => Prec::And,
                    BoolOp::And => Prec::Not,
                };
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        state.add_token(" ");
                        state.add_token(op.as_str());
                        state.add_token(" ");
                    }
                    value.codegen_in(state, ctx);
                }
            }
            ExprKind::Compare { left, comparisons } => {
                left.codegen_in(state, Prec::BOr);
                for (op, right) in comparisons {
                    state.add_token(" ");
                    state.add_token(op.as_str());
                    state.add_token(" ");
                    right.codegen_in(state, Prec::BOr);
                }
            }
            ExprKind::IfExp { test, body, orelse } => {
                body.codegen_in(state, Prec::Or);
                state.add_token(" if ");
                test.codegen_in(state, Prec::Or);
                state.add_token(" else ");
                orelse.codegen_in(state, Prec::Test);
            }
            ExprKind::Lambda { params, body } => {
                state.add_token("lambda");
                if !params.all().is_empty() || params.star == StarParam::Bare {
                    state.add_token(" ");
                    params.codegen(state);
                }
                state.add_token(": ");
                body.codegen_in(state, Prec::Test);
            }
            ExprKind::Starred(value) => {
                state.add_token("*");
                value.codegen_in(state, Prec::BOr);
            }
            ExprKind::NamedExpr { target, value } => {
                state.add_token(target);
                state.add_token(" := ");
                value.codegen_in(state, Prec::Test);
            }
            ExprKind::Yield(value) => {
                state.add_token("yield");
                if let Some(value) = value {
                    state.add_token(" ");
                    value.codegen_in(state, Prec::Tuple);
                }
            }
            ExprKind::YieldFrom(value) => {
                state.add_token("yield from ");
                value.codegen_in(state, Prec::Test);
            }
            ExprKind::Await(value) => {
                state.add_token("await ");
                value.codegen_in(state, Prec::Atom);
            }
        }
    }
}

impl Codegen for Expression {
    fn codegen(&self, state: &mut CodegenState) {
        self.codegen_in(state, Prec::Yield);
    }
}

fn comma_separated(state: &mut CodegenState, items: &[Expression], ctx: Prec) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            state.add_token(", ");
        }
        item.codegen_in(state, ctx);
    }
}

fn comprehension_body(state: &mut CodegenState, elt: &Expression, generators: &[Comprehension]) {
    elt.codegen_in(state, Prec::Test);
    comprehension_clauses(state, generators);
}

fn comprehension_clauses(state: &mut CodegenState, generators: &[Comprehension]) {
    for comp in generators {
        state.add_token(if comp.is_async { " async for " } else { " for " });
        comp.target.codegen_in(state, Prec::Tuple);
        state.add_token(" in ");
        comp.iter.codegen_in(state, Prec::Or);
        for cond in &comp.ifs {
            state.add_token(" if ");
            cond.codegen_in(state, Prec::Or);
        }
    }
}

fn arguments(state: &mut CodegenState, args: &[Argument]) {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            state.add_token(", ");
        }
        match arg {
            Argument::Positional(value) => value.codegen_in(state, Prec::Test),
            Argument::Keyword { name, value } => {
                state.add_token(name);
                state.add_token("=");
                value.codegen_in(state, Prec::Test);
            }
            Argument::Star(value) => {
                state.add_token("*");
                value.codegen_in(state, Prec::Test);
            }
            Argument::DoubleStar(value) => {
                state.add_token("**");
                value.codegen_in(state, Prec::Test);
            }
        }
    }
}

// ============================================================================
// Parameters
// ============================================================================

impl Codegen for Param {
    fn codegen(&self, state: &mut CodegenState) {
        state.add_token(&self.name);
        if let Some(annotation) = &self.annotation {
            state.add_token(": ");
            annotation.codegen_in(state, Prec::Test);
        }
        if let Some(default) = &self.default {
            state.add_token(if self.annotation.is_some() { " = " } else { "=" });
            default.codegen_in(state, Prec::Test);
        }
    }
}

impl Codegen for Parameters {
    fn codegen(&self, state: &mut CodegenState) {
        let mut first = true;
        let mut sep = |state: &mut CodegenState| {
            if !first {
                state.add_token(", ");
            }
            first = false;
        };
        for param in &self.posonly {
            sep(state);
            param.codegen(state);
        }
        if !self.posonly.is_empty() {
            sep(state);
            state.add_token("/");
        }
        for param in &self.params {
            sep(state);
            param.codegen(state);
        }
        match &self.star {
            StarParam::Absent => {}
            StarParam::Bare => {
                sep(state);
                state.add_token("*");
            }
            StarParam::Named(param) => {
                sep(state);
                state.add_token("*");
                param.codegen(state);
            }
        }
        for param in &self.kwonly {
            sep(state);
            param.codegen(state);
        }
        if let Some(param) = &self.kwargs {
            sep(state);
            state.add_token("**");
            param.codegen(state);
        }
    }
}

// ============================================================================
// Statements
// ============================================================================

impl Codegen for Module {
    fn codegen(&self, state: &mut CodegenState) {
        codegen_statements(state, &self.body, 2);
    }
}

fn is_definition(stmt: &Statement) -> bool {
    matches!(
        stmt.kind,
        StatementKind::FunctionDef(_) | StatementKind::ClassDef(_)
    )
}

/// Emit a statement sequence, separating definitions from their neighbors
/// with `blank_lines` empty lines.
fn codegen_statements(state: &mut CodegenState, stmts: &[Statement], blank_lines: usize) {
    for (i, stmt) in stmts.iter().enumerate() {
        if i > 0 && (is_definition(stmt) || is_definition(&stmts[i - 1])) {
            for _ in 0..blank_lines {
                state.add_newline();
            }
        }
        stmt.codegen(state);
    }
}

/// Emit `:` followed by an indented block.
fn codegen_block(state: &mut CodegenState, stmts: &[Statement]) {
    state.add_token(":");
    state.add_newline();
    state.indent();
    if stmts.is_empty() {
        state.add_indent();
        state.add_token("pass");
        state.add_newline();
    } else {
        codegen_statements(state, stmts, 1);
    }
    state.dedent();
}

fn codegen_else(state: &mut CodegenState, keyword: &str, stmts: &[Statement]) {
    if stmts.is_empty() {
        return;
    }
    state.add_indent();
    state.add_token(keyword);
    codegen_block(state, stmts);
}

fn codegen_decorators(state: &mut CodegenState, decorators: &[Expression]) {
    for decorator in decorators {
        state.add_indent();
        state.add_token("@");
        decorator.codegen_in(state, Prec::Test);
        state.add_newline();
    }
}

fn import_alias(state: &mut CodegenState, alias: &ImportAlias) {
    state.add_token(&alias.name);
    if let Some(asname) = &alias.asname {
        state.add_token(" as ");
        state.add_token(asname);
    }
}

fn import_aliases(state: &mut CodegenState, aliases: &[ImportAlias]) {
    for (i, alias) in aliases.iter().enumerate() {
        if i > 0 {
            state.add_token(", ");
        }
        import_alias(state, alias);
    }
}

impl Codegen for ExceptHandler {
    fn codegen(&self, state: &mut CodegenState) {
        state.add_indent();
        state.add_token("except");
        if let Some(typ) = &self.typ {
            state.add_token(" ");
            typ.codegen_in(state, Prec::Test);
            if let Some(name) = &self.name {
                state.add_token(" as ");
                state.add_token(name);
            }
        }
        codegen_block(state, &self.body);
    }
}

impl Codegen for Statement {
    fn codegen(&self, state: &mut CodegenState) {
        match &self.kind {
            StatementKind::If(node) => {
                state.add_indent();
                state.add_token("if ");
                node.test.codegen_in(state, Prec::Test);
                codegen_block(state, &node.body);
                let mut orelse = node.orelse.as_slice();
                // Fold `else: if` chains into `elif`.
                while let [Statement {
                    kind: StatementKind::If(inner),
                    ..
                }] = orelse
                {
                    state.add_indent();
                    state.add_token("elif ");
                    inner.test.codegen_in(state, Prec::Test);
                    codegen_block(state, &inner.body);
                    orelse = inner.orelse.as_slice();
                }
                codegen_else(state, "else", orelse);
                return;
            }
            StatementKind::For(node) => {
                state.add_indent();
                state.add_token(if node.is_async { "async for " } else { "for " });
                node.target.codegen_in(state, Prec::Tuple);
                state.add_token(" in ");
                node.iter.codegen_in(state, Prec::Tuple);
                codegen_block(state, &node.body);
                codegen_else(state, "else", &node.orelse);
                return;
            }
            StatementKind::While(node) => {
                state.add_indent();
                state.add_token("while ");
                node.test.codegen_in(state, Prec::Test);
                codegen_block(state, &node.body);
                codegen_else(state, "else", &node.orelse);
                return;
            }
            StatementKind::FunctionDef(node) => {
                codegen_decorators(state, &node.decorators);
                state.add_indent();
                state.add_token(if node.is_async { "async def " } else { "def " });
                state.add_token(&node.name);
                state.add_token("(");
                node.params.codegen(state);
                state.add_token(")");
                if let Some(returns) = &node.returns {
                    state.add_token(" -> ");
                    returns.codegen_in(state, Prec::Test);
                }
                codegen_block(state, &node.body);
                return;
            }
            StatementKind::ClassDef(node) => {
                codegen_decorators(state, &node.decorators);
                state.add_indent();
                state.add_token("class ");
                state.add_token(&node.name);
                if !node.bases.is_empty() {
                    state.add_token("(");
                    arguments(state, &node.bases);
                    state.add_token(")");
                }
                codegen_block(state, &node.body);
                return;
            }
            StatementKind::Try(node) => {
                state.add_indent();
                state.add_token("try");
                codegen_block(state, &node.body);
                for handler in &node.handlers {
                    handler.codegen(state);
                }
                codegen_else(state, "else", &node.orelse);
                codegen_else(state, "finally", &node.finalbody);
                return;
            }
            StatementKind::With(node) => {
                state.add_indent();
                state.add_token(if node.is_async { "async with " } else { "with " });
                for (i, item) in node.items.iter().enumerate() {
                    if i > 0 {
                        state.add_token(", ");
                    }
                    item.context.codegen_in(state, Prec::Test);
                    if let Some(target) = &item.target {
                        state.add_token(" as ");
                        target.codegen_in(state, Prec::Test);
                    }
                }
                codegen_block(state, &node.body);
                return;
            }
            _ => {}
        }

        state.add_indent();
        match &self.kind {
            StatementKind::Expr(value) => value.codegen_in(state, Prec::Yield),
            StatementKind::Assign { targets, value } => {
                for target in targets {
                    target.codegen_in(state, Prec::Tuple);
                    state.add_token(" = ");
                }
                value.codegen_in(state, Prec::Yield);
            }
            StatementKind::AugAssign { target, op, value } => {
                target.codegen_in(state, Prec::Test);
                state.add_token(" ");
                state.add_token(op.as_str());
                state.add_token("= ");
                value.codegen_in(state, Prec::Yield);
            }
            StatementKind::AnnAssign {
                target,
                annotation,
                value,
            } => {
                target.codegen_in(state, Prec::Test);
                state.add_token(": ");
                annotation.codegen_in(state, Prec::Test);
                if let Some(value) = value {
                    state.add_token(" = ");
                    value.codegen_in(state, Prec::Yield);
                }
            }
            StatementKind::Pass => state.add_token("pass"),
            StatementKind::Break => state.add_token("break"),
            StatementKind::Continue => state.add_token("continue"),
            StatementKind::Return(value) => {
                state.add_token("return");
                if let Some(value) = value {
                    state.add_token(" ");
                    value.codegen_in(state, Prec::Tuple);
                }
            }
            StatementKind::Raise { exc, cause } => {
                state.add_token("raise");
                if let Some(exc) = exc {
                    state.add_token(" ");
                    exc.codegen_in(state, Prec::Test);
                    if let Some(cause) = cause {
                        state.add_token(" from ");
                        cause.codegen_in(state, Prec::Test);
                    }
                }
            }
            StatementKind::Global(names) | StatementKind::Nonlocal(names) => {
                let keyword = if matches!(self.kind, StatementKind::Global(_)) {
                    "global "
                } else {
                    "nonlocal "
                };
                state.add_token(keyword);
                state.add_token(&names.join(", "));
            }
            StatementKind::Del(targets) => {
                state.add_token("del ");
                comma_separated(state, targets, Prec::Test);
            }
            StatementKind::Assert { test, msg } => {
                state.add_token("assert ");
                test.codegen_in(state, Prec::Test);
                if let Some(msg) = msg {
                    state.add_token(", ");
                    msg.codegen_in(state, Prec::Test);
                }
            }
            StatementKind::Import(aliases) => {
                state.add_token("import ");
                import_aliases(state, aliases);
            }
            StatementKind::ImportFrom {
                level,
                module,
                names,
            } => {
                state.add_token("from ");
                state.add_token(&".".repeat(*level as usize));
                if let Some(module) = module {
                    state.add_token(module);
                }
                state.add_token(" import ");
                match names {
                    ImportNames::Star => state.add_token("*"),
                    ImportNames::Aliases(aliases) => import_aliases(state, aliases),
                }
            }
            StatementKind::If(_)
            | StatementKind::For(_)
            | StatementKind::While(_)
            | StatementKind::FunctionDef(_)
            | StatementKind::ClassDef(_)
            | StatementKind::Try(_)
            | StatementKind::With(_) => {}
        }
        state.add_newline();
    }
}
