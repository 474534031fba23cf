// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! PEG grammar over the token stream.
//!
//! Rules mirror the shape of the reference Python grammar, restricted to the
//! statement and expression forms the node types model. Spans are computed
//! from token positions; trailing layout tokens never widen a span.

use crate::nodes::{
    Argument, BinaryOp, BoolOp, ClassDef, CompOp, Comprehension, Constant, DictItem,
    ExceptHandler, ExprKind, Expression, For, FunctionDef, If, ImportAlias, ImportNames, Module,
    Param, Parameters, StarParam, Statement, StatementKind, Try, UnaryOp, While, With, WithItem,
};
use crate::tokenizer::{TokType, Token};
use pyopt_core::Span;

const KEYWORDS: [&str; 35] = [
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield",
];

fn is_keyword(text: &str) -> bool {
    KEYWORDS.contains(&text)
}

fn is_layout(kind: TokType) -> bool {
    matches!(
        kind,
        TokType::Newline | TokType::Indent | TokType::Dedent | TokType::EndMarker
    )
}

/// Span covering `toks[start..end]`, ignoring trailing layout tokens.
fn span_of(toks: &[Token<'_>], start: usize, end: usize) -> Span {
    let mut last = end.min(toks.len());
    while last > start && is_layout(toks[last - 1].kind) {
        last -= 1;
    }
    if last <= start {
        return Span::empty(toks.get(start).map_or(0, |t| t.span.start));
    }
    Span::new(toks[start].span.start, toks[last - 1].span.end)
}

enum StmtTail {
    Ann(Expression, Option<Expression>),
    Aug(BinaryOp, Expression),
    Assign(Vec<Expression>),
    Bare,
}

enum SeqTail {
    Comp(Vec<Comprehension>),
    Items(Vec<Expression>, bool),
}

enum DictTail {
    Comp(Vec<Comprehension>),
    Items(Vec<DictItem>),
}

enum Trailer {
    Attr(String),
    Call(Vec<Argument>),
    Index(Expression),
}

enum ParamItem {
    Slash,
    Plain(Param),
    Star(Option<Param>),
    KwArgs(Param),
}

fn boxed(e: Expression) -> Box<Expression> {
    Box::new(e)
}

fn with_span(mut e: Expression, span: Span) -> Expression {
    e.span = span;
    e
}

fn is_starred(e: &Expression) -> bool {
    matches!(e.kind, ExprKind::Starred(_))
}

fn tuple_or_single(first: Expression, rest: Vec<Expression>, trailing: bool, span: Span) -> Expression {
    if rest.is_empty() && !trailing {
        return first;
    }
    let mut items = Vec::with_capacity(rest.len() + 1);
    items.push(first);
    items.extend(rest);
    Expression::new(ExprKind::Tuple(items), span)
}

fn binop(left: Expression, op: BinaryOp, right: Expression) -> Expression {
    let span = left.span.cover(&right.span);
    Expression::new(
        ExprKind::BinOp {
            left: boxed(left),
            op,
            right: boxed(right),
        },
        span,
    )
}

fn fold_binops(first: Expression, rest: Vec<(BinaryOp, Expression)>) -> Expression {
    rest.into_iter()
        .fold(first, |left, (op, right)| binop(left, op, right))
}

fn bool_op(op: BoolOp, first: Expression, rest: Vec<Expression>, span: Span) -> Expression {
    if rest.is_empty() {
        return first;
    }
    let mut values = vec![first];
    values.extend(rest);
    Expression::new(ExprKind::BoolOp { op, values }, span)
}

fn apply_trailers(toks: &[Token<'_>], base: Expression, trailers: Vec<(Trailer, usize)>) -> Expression {
    trailers.into_iter().fold(base, |value, (trailer, end)| {
        let span = Span::new(value.span.start, toks[end - 1].span.end);
        let kind = match trailer {
            Trailer::Attr(attr) => ExprKind::Attribute {
                value: boxed(value),
                attr,
            },
            Trailer::Call(args) => ExprKind::Call {
                func: boxed(value),
                args,
            },
            Trailer::Index(index) => ExprKind::Subscript {
                value: boxed(value),
                index: boxed(index),
            },
        };
        Expression::new(kind, span)
    })
}

fn comprehension(
    elt: Expression,
    generators: Vec<Comprehension>,
    span: Span,
    make: fn(Box<Expression>, Vec<Comprehension>) -> ExprKind,
) -> Result<Expression, &'static str> {
    if is_starred(&elt) {
        return Err("expression (iterable unpacking cannot be used in comprehension)");
    }
    Ok(Expression::new(make(boxed(elt), generators), span))
}

fn list_comp(elt: Box<Expression>, generators: Vec<Comprehension>) -> ExprKind {
    ExprKind::ListComp { elt, generators }
}

fn set_comp(elt: Box<Expression>, generators: Vec<Comprehension>) -> ExprKind {
    ExprKind::SetComp { elt, generators }
}

fn generator_exp(elt: Box<Expression>, generators: Vec<Comprehension>) -> ExprKind {
    ExprKind::GeneratorExp { elt, generators }
}

/// Targets of `=`, `for`, `with ... as` and comprehensions.
fn is_assign_target(e: &Expression, allow_star: bool) -> bool {
    match &e.kind {
        ExprKind::Name(_) | ExprKind::Attribute { .. } | ExprKind::Subscript { .. } => true,
        ExprKind::Tuple(items) | ExprKind::List(items) => {
            items.iter().filter(|i| is_starred(i)).count() <= 1
                && items.iter().all(|i| is_assign_target(i, true))
        }
        ExprKind::Starred(inner) => allow_star && is_assign_target(inner, false),
        _ => false,
    }
}

fn validate_target(e: Expression) -> Result<Expression, &'static str> {
    if is_assign_target(&e, false) {
        Ok(e)
    } else {
        Err("valid assignment target")
    }
}

fn is_single_target(e: &Expression) -> bool {
    matches!(
        e.kind,
        ExprKind::Name(_) | ExprKind::Attribute { .. } | ExprKind::Subscript { .. }
    )
}

fn is_del_target(e: &Expression) -> bool {
    match &e.kind {
        ExprKind::Tuple(items) | ExprKind::List(items) => items.iter().all(is_del_target),
        _ => is_single_target(e),
    }
}

fn build_expr_stmt(first: Expression, tail: StmtTail) -> Result<StatementKind, &'static str> {
    match tail {
        StmtTail::Bare => Ok(StatementKind::Expr(first)),
        StmtTail::Ann(annotation, value) => {
            if !is_single_target(&first) {
                return Err("single target for annotation");
            }
            Ok(StatementKind::AnnAssign {
                target: first,
                annotation,
                value,
            })
        }
        StmtTail::Aug(op, value) => {
            if !is_single_target(&first) {
                return Err("single target for augmented assignment");
            }
            Ok(StatementKind::AugAssign {
                target: first,
                op,
                value,
            })
        }
        StmtTail::Assign(mut values) => {
            let Some(value) = values.pop() else {
                return Err("'='");
            };
            let mut targets = vec![first];
            targets.extend(values);
            if !targets.iter().all(|t| is_assign_target(t, false)) {
                return Err("valid assignment target");
            }
            Ok(StatementKind::Assign { targets, value })
        }
    }
}

fn build_parameters(items: Vec<ParamItem>) -> Result<Parameters, &'static str> {
    let mut params = Parameters::default();
    let mut seen_slash = false;
    let mut seen_star = false;
    let mut seen_default = false;
    for item in items {
        if params.kwargs.is_some() {
            return Err("')' (no parameters may follow '**')");
        }
        match item {
            ParamItem::Slash => {
                if seen_slash || seen_star || params.params.is_empty() {
                    return Err("parameter ('/' must follow at least one parameter)");
                }
                params.posonly = std::mem::take(&mut params.params);
                seen_slash = true;
            }
            ParamItem::Plain(p) if seen_star => params.kwonly.push(p),
            ParamItem::Plain(p) => {
                if p.default.is_some() {
                    seen_default = true;
                } else if seen_default {
                    return Err("default value (non-default parameter follows default parameter)");
                }
                params.params.push(p);
            }
            ParamItem::Star(p) => {
                if seen_star {
                    return Err("parameter (only one '*' is allowed)");
                }
                seen_star = true;
                params.star = p.map_or(StarParam::Bare, StarParam::Named);
            }
            ParamItem::KwArgs(p) => params.kwargs = Some(p),
        }
    }
    if params.star == StarParam::Bare && params.kwonly.is_empty() {
        return Err("named parameter after bare '*'");
    }
    Ok(params)
}

fn validate_arguments(args: Vec<Argument>) -> Result<Vec<Argument>, &'static str> {
    let mut seen_keyword = false;
    let mut seen_double_star = false;
    for arg in &args {
        match arg {
            Argument::Positional(_) if seen_keyword || seen_double_star => {
                return Err("keyword argument (positional argument follows keyword argument)");
            }
            Argument::Star(_) if seen_double_star => {
                return Err("keyword argument (iterable unpacking follows keyword unpacking)");
            }
            Argument::Keyword { .. } => seen_keyword = true,
            Argument::DoubleStar(_) => seen_double_star = true,
            _ => {}
        }
    }
    Ok(args)
}

peg::parser! {
    pub(crate) grammar python<'a>(toks: &'a [Token<'a>]) for [Token<'a>] {

        // Tokens

        rule tok(kind: TokType, expected: &'static str) -> Token<'a>
            = [t] {? if t.kind == kind { Ok(t) } else { Err(expected) } }

        rule op(text: &'static str) -> Token<'a>
            = [t] {? if t.kind == TokType::Op && t.text == text { Ok(t) } else { Err(text) } }

        rule kw(text: &'static str) -> Token<'a>
            = [t] {? if t.kind == TokType::Name && t.text == text { Ok(t) } else { Err(text) } }

        rule name() -> String
            = [t] {?
                if t.kind == TokType::Name && !is_keyword(t.text) {
                    Ok(t.text.to_string())
                } else {
                    Err("identifier")
                }
            }

        rule newline() = tok(TokType::Newline, "NEWLINE")
        rule indent() = tok(TokType::Indent, "INDENT")
        rule dedent() = tok(TokType::Dedent, "DEDENT")
        rule end_marker() = tok(TokType::EndMarker, "EOF")

        // Entry points

        pub rule file() -> Module
            = body:statements()? end_marker() {
                Module {
                    body: body.unwrap_or_default(),
                    span: Span::new(0, toks.last().map_or(0, |t| t.span.end)),
                }
            }

        pub rule expression_input() -> Expression
            = e:star_expressions() newline()? end_marker() { e }

        // Statements

        rule statements() -> Vec<Statement>
            = groups:statement()+ { groups.into_iter().flatten().collect() }

        rule statement() -> Vec<Statement>
            = s:compound_stmt() { vec![s] }
            / simple_stmts()

        rule simple_stmts() -> Vec<Statement>
            = stmts:(simple_stmt() ++ op(";")) op(";")? newline() { stmts }

        rule block() -> Vec<Statement>
            = newline() indent() body:statements() dedent() { body }
            / simple_stmts()

        rule simple_stmt() -> Statement
            = s:position!() kind:simple_stmt_kind() e:position!() {
                Statement::new(kind, span_of(toks, s, e))
            }

        rule simple_stmt_kind() -> StatementKind
            = kw("pass") { StatementKind::Pass }
            / kw("break") { StatementKind::Break }
            / kw("continue") { StatementKind::Continue }
            / return_stmt()
            / raise_stmt()
            / kw("global") names:(name() ++ op(",")) { StatementKind::Global(names) }
            / kw("nonlocal") names:(name() ++ op(",")) { StatementKind::Nonlocal(names) }
            / del_stmt()
            / assert_stmt()
            / import_name()
            / import_from()
            / expr_stmt()

        rule return_stmt() -> StatementKind
            = kw("return") value:star_expressions()? { StatementKind::Return(value) }

        rule raise_stmt() -> StatementKind
            = kw("raise") exc:expression() cause:(kw("from") c:expression() { c })? {
                StatementKind::Raise { exc: Some(exc), cause }
            }
            / kw("raise") { StatementKind::Raise { exc: None, cause: None } }

        rule del_stmt() -> StatementKind
            = kw("del") targets:(bitwise_or() ++ op(",")) op(",")? {?
                if targets.iter().all(is_del_target) {
                    Ok(StatementKind::Del(targets))
                } else {
                    Err("valid del target")
                }
            }

        rule assert_stmt() -> StatementKind
            = kw("assert") test:expression() msg:(op(",") m:expression() { m })? {
                StatementKind::Assert { test, msg }
            }

        rule import_name() -> StatementKind
            = kw("import") names:(dotted_as_name() ++ op(",")) { StatementKind::Import(names) }

        rule dotted_as_name() -> ImportAlias
            = n:dotted_name() asname:(kw("as") a:name() { a })? { ImportAlias { name: n, asname } }

        rule dotted_name() -> String
            = parts:(name() ++ op(".")) { parts.join(".") }

        rule import_from() -> StatementKind
            = kw("from") dots:import_dots()* m:dotted_name() kw("import") names:import_targets() {
                StatementKind::ImportFrom { level: dots.iter().sum(), module: Some(m), names }
            }
            / kw("from") dots:import_dots()+ kw("import") names:import_targets() {
                StatementKind::ImportFrom { level: dots.iter().sum(), module: None, names }
            }

        rule import_dots() -> u32
            = op("...") { 3 }
            / op(".") { 1 }

        rule import_targets() -> ImportNames
            = op("(") names:(import_as_name() ++ op(",")) op(",")? op(")") { ImportNames::Aliases(names) }
            / op("*") { ImportNames::Star }
            / names:(import_as_name() ++ op(",")) !op(",") { ImportNames::Aliases(names) }

        rule import_as_name() -> ImportAlias
            = n:name() asname:(kw("as") a:name() { a })? { ImportAlias { name: n, asname } }

        rule expr_stmt() -> StatementKind
            = first:star_expressions_or_yield() tail:expr_stmt_tail() {? build_expr_stmt(first, tail) }

        rule expr_stmt_tail() -> StmtTail
            = op(":") annotation:expression() value:(op("=") v:star_expressions_or_yield() { v })? {
                StmtTail::Ann(annotation, value)
            }
            / o:augassign() value:star_expressions_or_yield() { StmtTail::Aug(o, value) }
            / values:(op("=") v:star_expressions_or_yield() { v })+ { StmtTail::Assign(values) }
            / { StmtTail::Bare }

        rule augassign() -> BinaryOp
            = [t] {?
                if t.kind == TokType::Op {
                    BinaryOp::from_augmented(t.text).ok_or("augmented assignment")
                } else {
                    Err("augmented assignment")
                }
            }

        // Compound statements

        rule compound_stmt() -> Statement
            = s:position!() kind:compound_kind() e:position!() {
                Statement::new(kind, span_of(toks, s, e))
            }

        rule compound_kind() -> StatementKind
            = function_def()
            / class_def()
            / if_stmt()
            / for_stmt()
            / while_stmt()
            / try_stmt()
            / with_stmt()

        rule decorators() -> Vec<Expression>
            = (op("@") d:named_expression() newline() { d })*

        rule function_def() -> StatementKind
            = decos:decorators() is_async:kw("async")? kw("def") n:name()
              op("(") params:params()? op(")") returns:(op("->") r:expression() { r })?
              op(":") body:block() {
                StatementKind::FunctionDef(FunctionDef {
                    name: n,
                    params: params.unwrap_or_default(),
                    returns,
                    body,
                    decorators: decos,
                    is_async: is_async.is_some(),
                })
            }

        rule class_def() -> StatementKind
            = decos:decorators() kw("class") n:name()
              bases:(op("(") a:arguments()? op(")") { a.unwrap_or_default() })?
              op(":") body:block() {
                StatementKind::ClassDef(ClassDef {
                    name: n,
                    bases: bases.unwrap_or_default(),
                    body,
                    decorators: decos,
                })
            }

        rule if_stmt() -> StatementKind
            = kw("if") test:named_expression() op(":") body:block() orelse:elif_or_else()? {
                StatementKind::If(If { test, body, orelse: orelse.unwrap_or_default() })
            }

        rule elif_or_else() -> Vec<Statement>
            = s:position!() kw("elif") test:named_expression() op(":") body:block()
              orelse:elif_or_else()? e:position!() {
                let kind = StatementKind::If(If { test, body, orelse: orelse.unwrap_or_default() });
                vec![Statement::new(kind, span_of(toks, s, e))]
            }
            / else_block()

        rule else_block() -> Vec<Statement>
            = kw("else") op(":") body:block() { body }

        rule for_stmt() -> StatementKind
            = is_async:kw("async")? kw("for") target:star_targets() kw("in")
              iter:star_expressions() op(":") body:block() orelse:else_block()? {
                StatementKind::For(For {
                    target,
                    iter,
                    body,
                    orelse: orelse.unwrap_or_default(),
                    is_async: is_async.is_some(),
                })
            }

        rule while_stmt() -> StatementKind
            = kw("while") test:named_expression() op(":") body:block() orelse:else_block()? {
                StatementKind::While(While { test, body, orelse: orelse.unwrap_or_default() })
            }

        rule try_stmt() -> StatementKind
            = kw("try") op(":") body:block() handlers:except_block()* orelse:else_block()?
              finalbody:(kw("finally") op(":") f:block() { f })? {?
                if handlers.is_empty() && finalbody.is_none() {
                    Err("'except' or 'finally'")
                } else if handlers.is_empty() && orelse.is_some() {
                    Err("'except'")
                } else {
                    Ok(StatementKind::Try(Try {
                        body,
                        handlers,
                        orelse: orelse.unwrap_or_default(),
                        finalbody: finalbody.unwrap_or_default(),
                    }))
                }
            }

        rule except_block() -> ExceptHandler
            = s:position!() kw("except")
              clause:(typ:expression() n:(kw("as") n:name() { n })? { (typ, n) })?
              op(":") body:block() e:position!() {
                let (typ, name) = match clause {
                    Some((typ, n)) => (Some(typ), n),
                    None => (None, None),
                };
                ExceptHandler { typ, name, body, span: span_of(toks, s, e) }
            }

        rule with_stmt() -> StatementKind
            = is_async:kw("async")? kw("with") items:(with_item() ++ op(",")) op(":") body:block() {
                StatementKind::With(With { items, body, is_async: is_async.is_some() })
            }

        rule with_item() -> WithItem
            = context:expression() target:(kw("as") t:star_target() {? validate_target(t) })? {
                WithItem { context, target }
            }

        // Targets

        rule star_targets() -> Expression
            = s:position!() first:star_target() rest:(op(",") t:star_target() { t })*
              trailing:op(",")? e:position!() {?
                validate_target(tuple_or_single(first, rest, trailing.is_some(), span_of(toks, s, e)))
            }

        rule star_target() -> Expression
            = s:position!() op("*") value:bitwise_or() e:position!() {
                Expression::new(ExprKind::Starred(boxed(value)), span_of(toks, s, e))
            }
            / bitwise_or()

        // Expressions

        #[cache]
        rule star_expressions_or_yield() -> Expression
            = yield_expr()
            / star_expressions()

        rule star_expressions() -> Expression
            = s:position!() first:star_expression() rest:(op(",") x:star_expression() { x })*
              trailing:op(",")? e:position!() {
                tuple_or_single(first, rest, trailing.is_some(), span_of(toks, s, e))
            }

        rule star_expression() -> Expression
            = s:position!() op("*") value:bitwise_or() e:position!() {
                Expression::new(ExprKind::Starred(boxed(value)), span_of(toks, s, e))
            }
            / expression()

        rule star_named_expression() -> Expression
            = s:position!() op("*") value:bitwise_or() e:position!() {
                Expression::new(ExprKind::Starred(boxed(value)), span_of(toks, s, e))
            }
            / named_expression()

        rule yield_expr() -> Expression
            = s:position!() kw("yield") kw("from") value:expression() e:position!() {
                Expression::new(ExprKind::YieldFrom(boxed(value)), span_of(toks, s, e))
            }
            / s:position!() kw("yield") value:star_expressions()? e:position!() {
                Expression::new(ExprKind::Yield(value.map(boxed)), span_of(toks, s, e))
            }

        rule named_expression() -> Expression
            = s:position!() target:name() op(":=") value:expression() e:position!() {
                Expression::new(ExprKind::NamedExpr { target, value: boxed(value) }, span_of(toks, s, e))
            }
            / expression()

        #[cache]
        rule expression() -> Expression
            = lambdef()
            / s:position!() body:disjunction()
              cond:(kw("if") test:disjunction() kw("else") orelse:expression() { (test, orelse) })?
              e:position!() {
                match cond {
                    Some((test, orelse)) => Expression::new(
                        ExprKind::IfExp { test: boxed(test), body: boxed(body), orelse: boxed(orelse) },
                        span_of(toks, s, e),
                    ),
                    None => body,
                }
            }

        rule lambdef() -> Expression
            = s:position!() kw("lambda") params:lambda_params()? op(":") body:expression() e:position!() {
                Expression::new(
                    ExprKind::Lambda { params: Box::new(params.unwrap_or_default()), body: boxed(body) },
                    span_of(toks, s, e),
                )
            }

        rule disjunction() -> Expression
            = s:position!() first:conjunction() rest:(kw("or") c:conjunction() { c })* e:position!() {
                bool_op(BoolOp::Or, first, rest, span_of(toks, s, e))
            }

        rule conjunction() -> Expression
            = s:position!() first:inversion() rest:(kw("and") c:inversion() { c })* e:position!() {
                bool_op(BoolOp::And, first, rest, span_of(toks, s, e))
            }

        rule inversion() -> Expression
            = s:position!() kw("not") operand:inversion() e:position!() {
                Expression::new(ExprKind::UnaryOp { op: UnaryOp::Not, operand: boxed(operand) }, span_of(toks, s, e))
            }
            / comparison()

        rule comparison() -> Expression
            = s:position!() left:bitwise_or() rest:(o:comp_op() r:bitwise_or() { (o, r) })* e:position!() {
                if rest.is_empty() {
                    left
                } else {
                    Expression::new(ExprKind::Compare { left: boxed(left), comparisons: rest }, span_of(toks, s, e))
                }
            }

        rule comp_op() -> CompOp
            = op("==") { CompOp::Eq }
            / op("!=") { CompOp::NotEq }
            / op("<=") { CompOp::LtE }
            / op("<") { CompOp::Lt }
            / op(">=") { CompOp::GtE }
            / op(">") { CompOp::Gt }
            / kw("not") kw("in") { CompOp::NotIn }
            / kw("in") { CompOp::In }
            / kw("is") kw("not") { CompOp::IsNot }
            / kw("is") { CompOp::Is }

        rule bitwise_or() -> Expression
            = first:bitwise_xor() rest:(op("|") r:bitwise_xor() { (BinaryOp::BitOr, r) })* {
                fold_binops(first, rest)
            }

        rule bitwise_xor() -> Expression
            = first:bitwise_and() rest:(op("^") r:bitwise_and() { (BinaryOp::BitXor, r) })* {
                fold_binops(first, rest)
            }

        rule bitwise_and() -> Expression
            = first:shift_expr() rest:(op("&") r:shift_expr() { (BinaryOp::BitAnd, r) })* {
                fold_binops(first, rest)
            }

        rule shift_expr() -> Expression
            = first:sum() rest:(o:shift_op() r:sum() { (o, r) })* { fold_binops(first, rest) }

        rule shift_op() -> BinaryOp
            = op("<<") { BinaryOp::LShift }
            / op(">>") { BinaryOp::RShift }

        rule sum() -> Expression
            = first:term() rest:(o:sum_op() r:term() { (o, r) })* { fold_binops(first, rest) }

        rule sum_op() -> BinaryOp
            = op("+") { BinaryOp::Add }
            / op("-") { BinaryOp::Sub }

        rule term() -> Expression
            = first:factor() rest:(o:term_op() r:factor() { (o, r) })* { fold_binops(first, rest) }

        rule term_op() -> BinaryOp
            = op("*") { BinaryOp::Mult }
            / op("/") { BinaryOp::Div }
            / op("//") { BinaryOp::FloorDiv }
            / op("%") { BinaryOp::Mod }
            / op("@") { BinaryOp::MatMult }

        rule factor() -> Expression
            = s:position!() o:unary_op() operand:factor() e:position!() {
                Expression::new(ExprKind::UnaryOp { op: o, operand: boxed(operand) }, span_of(toks, s, e))
            }
            / power()

        rule unary_op() -> UnaryOp
            = op("+") { UnaryOp::Plus }
            / op("-") { UnaryOp::Minus }
            / op("~") { UnaryOp::Invert }

        rule power() -> Expression
            = base:await_primary() exp:(op("**") f:factor() { f })? {
                match exp {
                    Some(exp) => binop(base, BinaryOp::Pow, exp),
                    None => base,
                }
            }

        rule await_primary() -> Expression
            = s:position!() kw("await") value:primary() e:position!() {
                Expression::new(ExprKind::Await(boxed(value)), span_of(toks, s, e))
            }
            / primary()

        rule primary() -> Expression
            = base:atom() trailers:trailer()* { apply_trailers(toks, base, trailers) }

        rule trailer() -> (Trailer, usize)
            = op(".") n:name() e:position!() { (Trailer::Attr(n), e) }
            / op("(") args:arguments()? op(")") e:position!() { (Trailer::Call(args.unwrap_or_default()), e) }
            / op("[") index:slices() op("]") e:position!() { (Trailer::Index(index), e) }

        // Atoms

        rule atom() -> Expression
            = s:position!() n:name() e:position!() {
                Expression::new(ExprKind::Name(n), span_of(toks, s, e))
            }
            / s:position!() c:constant() e:position!() {
                Expression::new(ExprKind::Constant(c), span_of(toks, s, e))
            }
            / s:position!() t:tok(TokType::Number, "number") e:position!() {
                Expression::new(ExprKind::Number(t.text.to_string()), span_of(toks, s, e))
            }
            / s:position!() parts:tok(TokType::String, "string")+ e:position!() {
                let parts = parts.iter().map(|t| t.text.to_string()).collect();
                Expression::new(ExprKind::Str(parts), span_of(toks, s, e))
            }
            / paren_atom()
            / list_atom()
            / brace_atom()

        rule constant() -> Constant
            = kw("True") { Constant::True }
            / kw("False") { Constant::False }
            / kw("None") { Constant::None }
            / op("...") { Constant::Ellipsis }

        rule paren_atom() -> Expression
            = s:position!() op("(") op(")") e:position!() {
                Expression::new(ExprKind::Tuple(vec![]), span_of(toks, s, e))
            }
            / s:position!() op("(") value:yield_expr() op(")") e:position!() {
                with_span(value, span_of(toks, s, e))
            }
            / s:position!() op("(") first:star_named_expression() tail:seq_tail() op(")") e:position!() {?
                let span = span_of(toks, s, e);
                match tail {
                    SeqTail::Comp(generators) => comprehension(first, generators, span, generator_exp),
                    SeqTail::Items(rest, false) if rest.is_empty() => {
                        if is_starred(&first) {
                            Err("expression (cannot use starred expression here)")
                        } else {
                            Ok(with_span(first, span))
                        }
                    }
                    SeqTail::Items(rest, trailing) => Ok(tuple_or_single(first, rest, trailing, span)),
                }
            }

        rule list_atom() -> Expression
            = s:position!() op("[") op("]") e:position!() {
                Expression::new(ExprKind::List(vec![]), span_of(toks, s, e))
            }
            / s:position!() op("[") first:star_named_expression() tail:seq_tail() op("]") e:position!() {?
                let span = span_of(toks, s, e);
                match tail {
                    SeqTail::Comp(generators) => comprehension(first, generators, span, list_comp),
                    SeqTail::Items(rest, _) => {
                        let mut items = vec![first];
                        items.extend(rest);
                        Ok(Expression::new(ExprKind::List(items), span))
                    }
                }
            }

        rule brace_atom() -> Expression
            = s:position!() op("{") op("}") e:position!() {
                Expression::new(ExprKind::Dict(vec![]), span_of(toks, s, e))
            }
            / s:position!() op("{") first:dict_item() tail:dict_tail() op("}") e:position!() {?
                let span = span_of(toks, s, e);
                match (first, tail) {
                    (DictItem::Pair(key, value), DictTail::Comp(generators)) => Ok(Expression::new(
                        ExprKind::DictComp { key: boxed(key), value: boxed(value), generators },
                        span,
                    )),
                    (DictItem::Unpack(_), DictTail::Comp(_)) => {
                        Err("key (dict unpacking cannot be used in dict comprehension)")
                    }
                    (first, DictTail::Items(rest)) => {
                        let mut items = vec![first];
                        items.extend(rest);
                        Ok(Expression::new(ExprKind::Dict(items), span))
                    }
                }
            }
            / s:position!() op("{") first:star_named_expression() tail:seq_tail() op("}") e:position!() {?
                let span = span_of(toks, s, e);
                match tail {
                    SeqTail::Comp(generators) => comprehension(first, generators, span, set_comp),
                    SeqTail::Items(rest, _) => {
                        let mut items = vec![first];
                        items.extend(rest);
                        Ok(Expression::new(ExprKind::Set(items), span))
                    }
                }
            }

        rule dict_item() -> DictItem
            = op("**") value:bitwise_or() { DictItem::Unpack(value) }
            / key:expression() op(":") value:expression() { DictItem::Pair(key, value) }

        rule dict_tail() -> DictTail
            = generators:comp_for()+ { DictTail::Comp(generators) }
            / rest:(op(",") item:dict_item() { item })* op(",")? { DictTail::Items(rest) }

        rule seq_tail() -> SeqTail
            = generators:comp_for()+ { SeqTail::Comp(generators) }
            / rest:(op(",") x:star_named_expression() { x })* trailing:op(",")? {
                SeqTail::Items(rest, trailing.is_some())
            }

        rule comp_for() -> Comprehension
            = is_async:kw("async")? kw("for") target:star_targets() kw("in") iter:disjunction()
              ifs:(kw("if") c:disjunction() { c })* {
                Comprehension { target, iter, ifs, is_async: is_async.is_some() }
            }

        // Subscripts

        rule slices() -> Expression
            = s:position!() first:slice() rest:(op(",") x:slice() { x })* trailing:op(",")? e:position!() {
                tuple_or_single(first, rest, trailing.is_some(), span_of(toks, s, e))
            }

        rule slice() -> Expression
            = s:position!() lower:expression()? op(":") upper:expression()?
              step:(op(":") x:expression()? { x })? e:position!() {
                Expression::new(
                    ExprKind::Slice {
                        lower: lower.map(boxed),
                        upper: upper.map(boxed),
                        step: step.flatten().map(boxed),
                    },
                    span_of(toks, s, e),
                )
            }
            / star_named_expression()

        // Call arguments

        rule arguments() -> Vec<Argument>
            = args:(argument() ++ op(",")) op(",")? {? validate_arguments(args) }

        rule argument() -> Argument
            = op("*") value:expression() { Argument::Star(value) }
            / op("**") value:expression() { Argument::DoubleStar(value) }
            / n:name() op("=") value:expression() { Argument::Keyword { name: n, value } }
            / s:position!() elt:named_expression() generators:comp_for()+ e:position!() {?
                comprehension(elt, generators, span_of(toks, s, e), generator_exp).map(Argument::Positional)
            }
            / value:named_expression() { Argument::Positional(value) }

        // Parameters

        rule params() -> Parameters
            = items:(param_item() ++ op(",")) op(",")? {? build_parameters(items) }

        rule param_item() -> ParamItem
            = op("/") { ParamItem::Slash }
            / op("**") p:param() { ParamItem::KwArgs(p) }
            / op("*") p:param()? { ParamItem::Star(p) }
            / p:param() default:(op("=") d:expression() { d })? {
                ParamItem::Plain(Param { default, ..p })
            }

        rule param() -> Param
            = n:name() annotation:(op(":") a:expression() { a })? {
                Param { name: n, annotation, default: None }
            }

        rule lambda_params() -> Parameters
            = items:(lambda_param_item() ++ op(",")) op(",")? {? build_parameters(items) }

        rule lambda_param_item() -> ParamItem
            = op("/") { ParamItem::Slash }
            / op("**") n:name() { ParamItem::KwArgs(Param::new(n)) }
            / op("*") n:name()? { ParamItem::Star(n.map(Param::new)) }
            / n:name() default:(op("=") d:expression() { d })? {
                ParamItem::Plain(Param { name: n, annotation: None, default })
            }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(src: &str) -> Vec<Token<'_>> {
        crate::tokenizer::tokenize(src).expect("tokenize")
    }

    mod span_tests {
        use super::*;

        #[test]
        fn span_of_skips_trailing_layout() {
            let tokens = toks("x = 1\n");
            let span = span_of(&tokens, 0, tokens.len());
            assert_eq!(span, Span::new(0, 5));
        }

        #[test]
        fn span_of_empty_range_is_empty() {
            let tokens = toks("x\n");
            let span = span_of(&tokens, 1, 1);
            assert!(span.is_empty());
        }
    }

    mod target_tests {
        use super::*;

        #[test]
        fn starred_alone_is_not_a_target() {
            let starred = Expression::new(
                ExprKind::Starred(Box::new(Expression::name("a"))),
                Span::empty(0),
            );
            assert!(!is_assign_target(&starred, false));
            let tuple = Expression::new(
                ExprKind::Tuple(vec![starred, Expression::name("b")]),
                Span::empty(0),
            );
            assert!(is_assign_target(&tuple, false));
        }

        #[test]
        fn calls_are_not_targets() {
            let call = Expression::new(
                ExprKind::Call {
                    func: Box::new(Expression::name("f")),
                    args: vec![],
                },
                Span::empty(0),
            );
            assert!(!is_assign_target(&call, false));
            assert!(!is_del_target(&call));
        }
    }

    mod parameter_tests {
        use super::*;

        #[test]
        fn slash_moves_params_to_posonly() {
            let params = build_parameters(vec![
                ParamItem::Plain(Param::new("a")),
                ParamItem::Slash,
                ParamItem::Plain(Param::new("b")),
            ])
            .unwrap();
            assert_eq!(params.posonly.len(), 1);
            assert_eq!(params.params.len(), 1);
        }

        #[test]
        fn bare_star_requires_keyword_only() {
            assert!(build_parameters(vec![ParamItem::Star(None)]).is_err());
        }

        #[test]
        fn kwargs_must_be_last() {
            let result = build_parameters(vec![
                ParamItem::KwArgs(Param::new("kw")),
                ParamItem::Plain(Param::new("a")),
            ]);
            assert!(result.is_err());
        }
    }
}
