// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Statement nodes and the module root.

use pyopt_core::Span;

use super::expression::{Argument, Expression};
use super::op::BinaryOp;

/// The root of a parsed source file.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub body: Vec<Statement>,
    pub span: Span,
}

/// A statement with its source span.
///
/// Compound statement spans run from the first keyword (or decorator) to the
/// last token of the final nested block.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    Expr(Expression),
    /// `a = b = value`; one target per `=`.
    Assign {
        targets: Vec<Expression>,
        value: Expression,
    },
    AugAssign {
        target: Expression,
        op: BinaryOp,
        value: Expression,
    },
    AnnAssign {
        target: Expression,
        annotation: Expression,
        value: Option<Expression>,
    },
    Pass,
    Break,
    Continue,
    Return(Option<Expression>),
    Raise {
        exc: Option<Expression>,
        cause: Option<Expression>,
    },
    Global(Vec<String>),
    Nonlocal(Vec<String>),
    Del(Vec<Expression>),
    Assert {
        test: Expression,
        msg: Option<Expression>,
    },
    Import(Vec<ImportAlias>),
    ImportFrom {
        level: u32,
        module: Option<String>,
        names: ImportNames,
    },
    If(If),
    For(For),
    While(While),
    FunctionDef(FunctionDef),
    ClassDef(ClassDef),
    Try(Try),
    With(With),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportAlias {
    pub name: String,
    pub asname: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportNames {
    Star,
    Aliases(Vec<ImportAlias>),
}

/// `if` statement. An `elif` chain is a single nested `If` in `orelse`.
#[derive(Debug, Clone, PartialEq)]
pub struct If {
    pub test: Expression,
    pub body: Vec<Statement>,
    pub orelse: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct For {
    pub target: Expression,
    pub iter: Expression,
    pub body: Vec<Statement>,
    pub orelse: Vec<Statement>,
    pub is_async: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct While {
    pub test: Expression,
    pub body: Vec<Statement>,
    pub orelse: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Parameters,
    pub returns: Option<Expression>,
    pub body: Vec<Statement>,
    pub decorators: Vec<Expression>,
    pub is_async: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    pub name: String,
    pub bases: Vec<Argument>,
    pub body: Vec<Statement>,
    pub decorators: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Try {
    pub body: Vec<Statement>,
    pub handlers: Vec<ExceptHandler>,
    pub orelse: Vec<Statement>,
    pub finalbody: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExceptHandler {
    pub typ: Option<Expression>,
    pub name: Option<String>,
    pub body: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct With {
    pub items: Vec<WithItem>,
    pub body: Vec<Statement>,
    pub is_async: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WithItem {
    pub context: Expression,
    pub target: Option<Expression>,
}

// ============================================================================
// Parameters
// ============================================================================

/// A single parameter. `annotation` is always `None` for lambdas.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub annotation: Option<Expression>,
    pub default: Option<Expression>,
}

impl Param {
    pub fn new(name: impl Into<String>) -> Self {
        Param {
            name: name.into(),
            annotation: None,
            default: None,
        }
    }
}

/// The `*` slot of a parameter list.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum StarParam {
    #[default]
    Absent,
    /// Bare `*` separating keyword-only parameters.
    Bare,
    /// `*args`
    Named(Param),
}

/// Parameter list of a function or lambda.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Parameters {
    /// Parameters before `/`.
    pub posonly: Vec<Param>,
    pub params: Vec<Param>,
    pub star: StarParam,
    pub kwonly: Vec<Param>,
    pub kwargs: Option<Param>,
}

impl Parameters {
    /// All parameters in declaration order.
    pub fn all(&self) -> Vec<&Param> {
        let mut out: Vec<&Param> = self.posonly.iter().chain(self.params.iter()).collect();
        if let StarParam::Named(p) = &self.star {
            out.push(p);
        }
        out.extend(self.kwonly.iter());
        out.extend(self.kwargs.iter());
        out
    }

    /// Names bound by the parameter list.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.all().into_iter().map(|p| p.name.as_str())
    }

    /// Default value expressions in declaration order.
    pub fn defaults(&self) -> Vec<&Expression> {
        self.all()
            .into_iter()
            .filter_map(|p| p.default.as_ref())
            .collect()
    }

    pub fn defaults_mut(&mut self) -> Vec<&mut Expression> {
        self.all_mut()
            .into_iter()
            .filter_map(|p| p.default.as_mut())
            .collect()
    }

    fn all_mut(&mut self) -> Vec<&mut Param> {
        let mut out: Vec<&mut Param> = self
            .posonly
            .iter_mut()
            .chain(self.params.iter_mut())
            .collect();
        if let StarParam::Named(p) = &mut self.star {
            out.push(p);
        }
        out.extend(self.kwonly.iter_mut());
        out.extend(self.kwargs.iter_mut());
        out
    }

    /// Annotations and defaults, per parameter in declaration order.
    pub fn expressions(&self) -> Vec<&Expression> {
        let mut out = Vec::new();
        for p in self.all() {
            out.extend(p.annotation.iter());
            out.extend(p.default.iter());
        }
        out
    }

    pub fn expressions_mut(&mut self) -> Vec<&mut Expression> {
        let mut out = Vec::new();
        for p in self.all_mut() {
            out.extend(p.annotation.iter_mut());
            out.extend(p.default.iter_mut());
        }
        out
    }
}

impl Statement {
    pub fn new(kind: StatementKind, span: Span) -> Self {
        Statement { kind, span }
    }

    /// True for compound statements (those owning nested blocks).
    pub fn is_compound(&self) -> bool {
        matches!(
            self.kind,
            StatementKind::If(_)
                | StatementKind::For(_)
                | StatementKind::While(_)
                | StatementKind::FunctionDef(_)
                | StatementKind::ClassDef(_)
                | StatementKind::Try(_)
                | StatementKind::With(_)
        )
    }

    /// Nested statement blocks in source order.
    ///
    /// Function and class bodies are included; callers that treat them as
    /// separate scopes check the statement kind first.
    pub fn blocks(&self) -> Vec<&[Statement]> {
        match &self.kind {
            StatementKind::If(s) => vec![s.body.as_slice(), s.orelse.as_slice()],
            StatementKind::For(s) => vec![s.body.as_slice(), s.orelse.as_slice()],
            StatementKind::While(s) => vec![s.body.as_slice(), s.orelse.as_slice()],
            StatementKind::FunctionDef(s) => vec![s.body.as_slice()],
            StatementKind::ClassDef(s) => vec![s.body.as_slice()],
            StatementKind::Try(s) => {
                let mut out = vec![s.body.as_slice()];
                out.extend(s.handlers.iter().map(|h| h.body.as_slice()));
                out.push(s.orelse.as_slice());
                out.push(s.finalbody.as_slice());
                out
            }
            StatementKind::With(s) => vec![s.body.as_slice()],
            _ => Vec::new(),
        }
    }

    /// Mutable nested blocks, in the same order as [`Statement::blocks`].
    pub fn blocks_mut(&mut self) -> Vec<&mut Vec<Statement>> {
        match &mut self.kind {
            StatementKind::If(s) => vec![&mut s.body, &mut s.orelse],
            StatementKind::For(s) => vec![&mut s.body, &mut s.orelse],
            StatementKind::While(s) => vec![&mut s.body, &mut s.orelse],
            StatementKind::FunctionDef(s) => vec![&mut s.body],
            StatementKind::ClassDef(s) => vec![&mut s.body],
            StatementKind::Try(s) => {
                let mut out: Vec<&mut Vec<Statement>> = vec![&mut s.body];
                out.extend(s.handlers.iter_mut().map(|h| &mut h.body));
                out.push(&mut s.orelse);
                out.push(&mut s.finalbody);
                out
            }
            StatementKind::With(s) => vec![&mut s.body],
            _ => Vec::new(),
        }
    }

    /// Expressions owned directly by this statement (not those inside nested
    /// blocks), in source order.
    pub fn expressions(&self) -> Vec<&Expression> {
        let mut out: Vec<&Expression> = Vec::new();
        match &self.kind {
            StatementKind::Expr(e) => out.push(e),
            StatementKind::Assign { targets, value } => {
                out.extend(targets.iter());
                out.push(value);
            }
            StatementKind::AugAssign { target, value, .. } => {
                out.push(target);
                out.push(value);
            }
            StatementKind::AnnAssign {
                target,
                annotation,
                value,
            } => {
                out.push(target);
                out.push(annotation);
                out.extend(value.iter());
            }
            StatementKind::Pass
            | StatementKind::Break
            | StatementKind::Continue
            | StatementKind::Global(_)
            | StatementKind::Nonlocal(_)
            | StatementKind::Import(_)
            | StatementKind::ImportFrom { .. } => {}
            StatementKind::Return(value) => out.extend(value.iter()),
            StatementKind::Raise { exc, cause } => {
                out.extend(exc.iter());
                out.extend(cause.iter());
            }
            StatementKind::Del(targets) => out.extend(targets.iter()),
            StatementKind::Assert { test, msg } => {
                out.push(test);
                out.extend(msg.iter());
            }
            StatementKind::If(s) => out.push(&s.test),
            StatementKind::For(s) => {
                out.push(&s.target);
                out.push(&s.iter);
            }
            StatementKind::While(s) => out.push(&s.test),
            StatementKind::FunctionDef(s) => {
                out.extend(s.decorators.iter());
                out.extend(s.params.expressions());
                out.extend(s.returns.iter());
            }
            StatementKind::ClassDef(s) => {
                out.extend(s.decorators.iter());
                out.extend(s.bases.iter().map(Argument::value));
            }
            StatementKind::Try(s) => {
                out.extend(s.handlers.iter().filter_map(|h| h.typ.as_ref()));
            }
            StatementKind::With(s) => {
                for item in &s.items {
                    out.push(&item.context);
                    out.extend(item.target.iter());
                }
            }
        }
        out
    }

    /// Mutable counterpart of [`Statement::expressions`].
    pub fn expressions_mut(&mut self) -> Vec<&mut Expression> {
        let mut out: Vec<&mut Expression> = Vec::new();
        match &mut self.kind {
            StatementKind::Expr(e) => out.push(e),
            StatementKind::Assign { targets, value } => {
                out.extend(targets.iter_mut());
                out.push(value);
            }
            StatementKind::AugAssign { target, value, .. } => {
                out.push(target);
                out.push(value);
            }
            StatementKind::AnnAssign {
                target,
                annotation,
                value,
            } => {
                out.push(target);
                out.push(annotation);
                out.extend(value.iter_mut());
            }
            StatementKind::Pass
            | StatementKind::Break
            | StatementKind::Continue
            | StatementKind::Global(_)
            | StatementKind::Nonlocal(_)
            | StatementKind::Import(_)
            | StatementKind::ImportFrom { .. } => {}
            StatementKind::Return(value) => out.extend(value.iter_mut()),
            StatementKind::Raise { exc, cause } => {
                out.extend(exc.iter_mut());
                out.extend(cause.iter_mut());
            }
            StatementKind::Del(targets) => out.extend(targets.iter_mut()),
            StatementKind::Assert { test, msg } => {
                out.push(test);
                out.extend(msg.iter_mut());
            }
            StatementKind::If(s) => out.push(&mut s.test),
            StatementKind::For(s) => {
                out.push(&mut s.target);
                out.push(&mut s.iter);
            }
            StatementKind::While(s) => out.push(&mut s.test),
            StatementKind::FunctionDef(s) => {
                out.extend(s.decorators.iter_mut());
                out.extend(s.params.expressions_mut());
                out.extend(s.returns.iter_mut());
            }
            StatementKind::ClassDef(s) => {
                out.extend(s.decorators.iter_mut());
                out.extend(s.bases.iter_mut().map(Argument::value_mut));
            }
            StatementKind::Try(s) => {
                out.extend(s.handlers.iter_mut().filter_map(|h| h.typ.as_mut()));
            }
            StatementKind::With(s) => {
                for item in &mut s.items {
                    out.push(&mut item.context);
                    out.extend(item.target.iter_mut());
                }
            }
        }
        out
    }
}
