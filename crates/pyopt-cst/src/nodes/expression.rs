// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Expression nodes.

use pyopt_core::Span;

use super::op::{BinaryOp, BoolOp, CompOp, UnaryOp};
use super::statement::Parameters;

/// An expression with its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExprKind,
    pub span: Span,
}

/// The singleton constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constant {
    True,
    False,
    None,
    Ellipsis,
}

impl Constant {
    pub fn as_str(self) -> &'static str {
        match self {
            Constant::True => "True",
            Constant::False => "False",
            Constant::None => "None",
            Constant::Ellipsis => "...",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Name(String),
    Constant(Constant),
    /// Numeric literal, verbatim.
    Number(String),
    /// String literal pieces (implicit concatenation), each verbatim with
    /// prefix and quotes.
    Str(Vec<String>),
    List(Vec<Expression>),
    Tuple(Vec<Expression>),
    Set(Vec<Expression>),
    Dict(Vec<DictItem>),
    ListComp {
        elt: Box<Expression>,
        generators: Vec<Comprehension>,
    },
    SetComp {
        elt: Box<Expression>,
        generators: Vec<Comprehension>,
    },
    GeneratorExp {
        elt: Box<Expression>,
        generators: Vec<Comprehension>,
    },
    DictComp {
        key: Box<Expression>,
        value: Box<Expression>,
        generators: Vec<Comprehension>,
    },
    Attribute {
        value: Box<Expression>,
        attr: String,
    },
    Subscript {
        value: Box<Expression>,
        index: Box<Expression>,
    },
    /// `lower:upper:step`, only valid inside a subscript.
    Slice {
        lower: Option<Box<Expression>>,
        upper: Option<Box<Expression>>,
        step: Option<Box<Expression>>,
    },
    Call {
        func: Box<Expression>,
        args: Vec<Argument>,
    },
    UnaryOp {
        op: UnaryOp,
        operand: Box<Expression>,
    },
    BinOp {
        left: Box<Expression>,
        op: BinaryOp,
        right: Box<Expression>,
    },
    BoolOp {
        op: BoolOp,
        values: Vec<Expression>,
    },
    Compare {
        left: Box<Expression>,
        comparisons: Vec<(CompOp, Expression)>,
    },
    IfExp {
        test: Box<Expression>,
        body: Box<Expression>,
        orelse: Box<Expression>,
    },
    Lambda {
        params: Box<Parameters>,
        body: Box<Expression>,
    },
    Starred(Box<Expression>),
    NamedExpr {
        target: String,
        value: Box<Expression>,
    },
    Yield(Option<Box<Expression>>),
    YieldFrom(Box<Expression>),
    Await(Box<Expression>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DictItem {
    Pair(Expression, Expression),
    /// `**mapping`
    Unpack(Expression),
}

/// A call argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Positional(Expression),
    Keyword { name: String, value: Expression },
    Star(Expression),
    DoubleStar(Expression),
}

impl Argument {
    /// The argument's value expression.
    pub fn value(&self) -> &Expression {
        match self {
            Argument::Positional(e)
            | Argument::Star(e)
            | Argument::DoubleStar(e)
            | Argument::Keyword { value: e, .. } => e,
        }
    }

    pub fn value_mut(&mut self) -> &mut Expression {
        match self {
            Argument::Positional(e)
            | Argument::Star(e)
            | Argument::DoubleStar(e)
            | Argument::Keyword { value: e, .. } => e,
        }
    }
}

/// One `for ... in ... if ...` clause of a comprehension.
#[derive(Debug, Clone, PartialEq)]
pub struct Comprehension {
    pub target: Expression,
    pub iter: Expression,
    pub ifs: Vec<Expression>,
    pub is_async: bool,
}

impl Expression {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expression { kind, span }
    }

    /// Build a name expression with an empty span.
    pub fn name(id: impl Into<String>) -> Self {
        Expression::new(ExprKind::Name(id.into()), Span::empty(0))
    }

    /// The identifier if this is a bare name.
    pub fn as_name(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Name(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_name(&self, id: &str) -> bool {
        self.as_name() == Some(id)
    }

    /// Dotted path for a name or attribute chain (`a.b.c`).
    pub fn dotted_path(&self) -> Option<String> {
        match &self.kind {
            ExprKind::Name(id) => Some(id.clone()),
            ExprKind::Attribute { value, attr } => {
                value.dotted_path().map(|base| format!("{}.{}", base, attr))
            }
            _ => None,
        }
    }

    /// True for the empty-string literal (`""`, `''`, and prefixed forms
    /// other than bytes).
    pub fn is_empty_string(&self) -> bool {
        match &self.kind {
            ExprKind::Str(pieces) => pieces.iter().all(|piece| {
                let body = piece.trim_start_matches(|c: char| c.is_ascii_alphabetic());
                let prefix = &piece[..piece.len() - body.len()];
                !prefix.to_ascii_lowercase().contains('b')
                    && matches!(body, "\"\"" | "''" | "\"\"\"\"\"\"" | "''''''")
            }),
            _ => false,
        }
    }

    /// True for an empty list display `[]`.
    pub fn is_empty_list(&self) -> bool {
        matches!(&self.kind, ExprKind::List(items) if items.is_empty())
    }

    /// Direct child expressions in source order.
    ///
    /// Lambda parameter defaults are included; comprehension clauses are
    /// flattened (target, iter, ifs).
    pub fn children(&self) -> Vec<&Expression> {
        let mut out: Vec<&Expression> = Vec::new();
        match &self.kind {
            ExprKind::Name(_) | ExprKind::Constant(_) | ExprKind::Number(_) | ExprKind::Str(_) => {}
            ExprKind::List(items) | ExprKind::Tuple(items) | ExprKind::Set(items) => {
                out.extend(items.iter());
            }
            ExprKind::Dict(items) => {
                for item in items {
                    match item {
                        DictItem::Pair(k, v) => {
                            out.push(k);
                            out.push(v);
                        }
                        DictItem::Unpack(v) => out.push(v),
                    }
                }
            }
            ExprKind::ListComp { elt, generators }
            | ExprKind::SetComp { elt, generators }
            | ExprKind::GeneratorExp { elt, generators } => {
                out.push(elt);
                push_generators(&mut out, generators);
            }
            ExprKind::DictComp {
                key,
                value,
                generators,
            } => {
                out.push(key);
                out.push(value);
                push_generators(&mut out, generators);
            }
            ExprKind::Attribute { value, .. } => out.push(value),
            ExprKind::Subscript { value, index } => {
                out.push(value);
                out.push(index);
            }
            ExprKind::Slice { lower, upper, step } => {
                out.extend(lower.iter().map(|b| &**b));
                out.extend(upper.iter().map(|b| &**b));
                out.extend(step.iter().map(|b| &**b));
            }
            ExprKind::Call { func, args } => {
                out.push(func);
                out.extend(args.iter().map(Argument::value));
            }
            ExprKind::UnaryOp { operand, .. } => out.push(operand),
            ExprKind::BinOp { left, right, .. } => {
                out.push(left);
                out.push(right);
            }
            ExprKind::BoolOp { values, .. } => out.extend(values.iter()),
            ExprKind::Compare { left, comparisons } => {
                out.push(left);
                out.extend(comparisons.iter().map(|(_, e)| e));
            }
            ExprKind::IfExp { test, body, orelse } => {
                out.push(body);
                out.push(test);
                out.push(orelse);
            }
            ExprKind::Lambda { params, body } => {
                out.extend(params.defaults());
                out.push(body);
            }
            ExprKind::Starred(value)
            | ExprKind::YieldFrom(value)
            | ExprKind::Await(value)
            | ExprKind::NamedExpr { value, .. } => out.push(value),
            ExprKind::Yield(value) => out.extend(value.iter().map(|b| &**b)),
        }
        out
    }

    /// Mutable direct children, in the same order as [`Expression::children`].
    pub fn children_mut(&mut self) -> Vec<&mut Expression> {
        let mut out: Vec<&mut Expression> = Vec::new();
        match &mut self.kind {
            ExprKind::Name(_) | ExprKind::Constant(_) | ExprKind::Number(_) | ExprKind::Str(_) => {}
            ExprKind::List(items) | ExprKind::Tuple(items) | ExprKind::Set(items) => {
                out.extend(items.iter_mut());
            }
            ExprKind::Dict(items) => {
                for item in items {
                    match item {
                        DictItem::Pair(k, v) => {
                            out.push(k);
                            out.push(v);
                        }
                        DictItem::Unpack(v) => out.push(v),
                    }
                }
            }
            ExprKind::ListComp { elt, generators }
            | ExprKind::SetComp { elt, generators }
            | ExprKind::GeneratorExp { elt, generators } => {
                out.push(elt);
                push_generators_mut(&mut out, generators);
            }
            ExprKind::DictComp {
                key,
                value,
                generators,
            } => {
                out.push(key);
                out.push(value);
                push_generators_mut(&mut out, generators);
            }
            ExprKind::Attribute { value, .. } => out.push(value),
            ExprKind::Subscript { value, index } => {
                out.push(value);
                out.push(index);
            }
            ExprKind::Slice { lower, upper, step } => {
                out.extend(lower.iter_mut().map(|b| &mut **b));
                out.extend(upper.iter_mut().map(|b| &mut **b));
                out.extend(step.iter_mut().map(|b| &mut **b));
            }
            ExprKind::Call { func, args } => {
                out.push(func);
                out.extend(args.iter_mut().map(Argument::value_mut));
            }
            ExprKind::UnaryOp { operand, .. } => out.push(operand),
            ExprKind::BinOp { left, right, .. } => {
                out.push(left);
                out.push(right);
            }
            ExprKind::BoolOp { values, .. } => out.extend(values.iter_mut()),
            ExprKind::Compare { left, comparisons } => {
                out.push(left);
                out.extend(comparisons.iter_mut().map(|(_, e)| e));
            }
            ExprKind::IfExp { test, body, orelse } => {
                out.push(body);
                out.push(test);
                out.push(orelse);
            }
            ExprKind::Lambda { params, body } => {
                out.extend(params.defaults_mut());
                out.push(body);
            }
            ExprKind::Starred(value)
            | ExprKind::YieldFrom(value)
            | ExprKind::Await(value)
            | ExprKind::NamedExpr { value, .. } => out.push(value),
            ExprKind::Yield(value) => out.extend(value.iter_mut().map(|b| &mut **b)),
        }
        out
    }
}

fn push_generators<'e>(out: &mut Vec<&'e Expression>, generators: &'e [Comprehension]) {
    for comp in generators {
        out.push(&comp.target);
        out.push(&comp.iter);
        out.extend(comp.ifs.iter());
    }
}

fn push_generators_mut<'e>(out: &mut Vec<&'e mut Expression>, generators: &'e mut [Comprehension]) {
    for comp in generators {
        out.push(&mut comp.target);
        out.push(&mut comp.iter);
        out.extend(comp.ifs.iter_mut());
    }
}
