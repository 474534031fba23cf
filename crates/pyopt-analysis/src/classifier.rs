// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Pattern classification.
//!
//! A single pre-order walk over the tree splits it into analysis units (the
//! module plus every function) and records per-unit facts:
//!
//! - [`LoopSite`] with its [`LoopShape`] for every `for` and `while` loop
//! - [`RecursionFact`] for every function
//! - sort call sites, comprehension presence, unbounded loops, and membership
//!   tests against list-bound names
//!
//! Loop nesting depth resets at function boundaries; class bodies belong to
//! the enclosing unit.

use std::collections::{HashMap, HashSet};

use pyopt_cst::visitor::{walk_block, walk_expression, VisitResult, Visitor};
use pyopt_cst::{
    Argument, BinaryOp, CompOp, Constant, ExprKind, Expression, For, FunctionDef, Module,
    Parameters, Span, Statement, StatementKind,
};
use serde::Serialize;

use crate::names::{any_expression_in_block, local_bindings, statement_bindings, target_names};

/// Display name of the module-level analysis unit.
pub const MODULE_UNIT_NAME: &str = "<module>";

// ============================================================================
// Facts
// ============================================================================

/// What a loop body does, when it matches a recognized shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyKind {
    /// `result.append(expr)` as the only statement.
    AppendCall,
    /// `acc += expr` or `acc = acc + expr` on an empty-string accumulator.
    StringConcatAssign,
    /// Counting loop reading `X[i]` only.
    IndexedRead,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoopShape {
    /// `for i in range(len(X))` with a single-name target.
    pub is_counting_loop: bool,
    /// A `for` loop over something other than a `range(...)` call.
    pub is_element_loop: bool,
    /// Enclosing loops including this one, counted within the unit.
    pub nesting_depth: u32,
    pub body_kind: BodyKind,
}

/// A loop together with the block that holds it.
#[derive(Debug, Clone)]
pub struct LoopSite<'t> {
    pub stmt: &'t Statement,
    pub block: &'t [Statement],
    /// Position of `stmt` in `block`.
    pub index: usize,
    pub shape: LoopShape,
    /// The loop runs in class scope.
    pub in_class_body: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RecursionFact {
    pub calls_self: bool,
    pub self_call_count: usize,
}

/// A `sorted(...)` or `<x>.sort(...)` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortCall {
    pub span: Span,
    pub loop_depth: u32,
}

/// `x in NAME` or `x not in NAME` evaluated inside a loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipTest {
    pub span: Span,
    pub container: String,
    pub loop_depth: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Module,
    Function,
}

/// An analysis unit: the module's top-level code or one function body.
#[derive(Debug, Clone)]
pub struct AnalysisUnit<'t> {
    /// `<module>`, or the qualified function name (`Class.method`,
    /// `outer.inner`).
    pub name: String,
    pub kind: UnitKind,
    pub span: Span,
    pub body: &'t [Statement],
    pub params: Option<&'t Parameters>,
    pub is_method: bool,
    pub loops: Vec<LoopSite<'t>>,
    /// `None` for the module unit.
    pub recursion: Option<RecursionFact>,
    pub sort_calls: Vec<SortCall>,
    pub has_comprehension: bool,
    /// Spans of `while True` loops without a reachable exit.
    pub unbounded_loops: Vec<Span>,
    pub membership_tests: Vec<MembershipTest>,
    /// Names bound in this unit only to list values.
    pub list_names: HashSet<String>,
}

impl<'t> AnalysisUnit<'t> {
    fn new(name: String, kind: UnitKind, span: Span, body: &'t [Statement]) -> Self {
        AnalysisUnit {
            name,
            kind,
            span,
            body,
            params: None,
            is_method: false,
            loops: Vec::new(),
            recursion: None,
            sort_calls: Vec::new(),
            has_comprehension: false,
            unbounded_loops: Vec::new(),
            membership_tests: Vec::new(),
            list_names: HashSet::new(),
        }
    }

    /// Deepest loop nesting in the unit (0 without loops).
    pub fn max_loop_depth(&self) -> u32 {
        self.loops
            .iter()
            .map(|l| l.shape.nesting_depth)
            .max()
            .unwrap_or(0)
    }

    pub fn calls_self(&self) -> bool {
        self.recursion.is_some_and(|r| r.calls_self)
    }
}

/// Classified units in pre-order: the module first, then functions.
#[derive(Debug, Clone)]
pub struct Classification<'t> {
    pub units: Vec<AnalysisUnit<'t>>,
}

/// Classify every loop and function of `module`.
pub fn classify(module: &Module) -> Classification<'_> {
    let mut classifier = Classifier::default();
    classifier.units.push(AnalysisUnit::new(
        MODULE_UNIT_NAME.to_string(),
        UnitKind::Module,
        module.span,
        &module.body,
    ));
    let scope = Scope::default();
    classifier.walk_block(0, &module.body, 0, &scope);
    classifier.finish_unit(0);
    tracing::debug!(units = classifier.units.len(), "classified module");
    Classification {
        units: classifier.units,
    }
}

// ============================================================================
// Classifier walk
// ============================================================================

#[derive(Debug, Clone, Default)]
struct Scope {
    /// Qualified-name prefix for definitions in this scope (`Outer.`).
    prefix: String,
    in_class_body: bool,
}

#[derive(Default)]
struct Classifier<'t> {
    units: Vec<AnalysisUnit<'t>>,
    /// Per unit: name → every binding so far produced a list.
    list_bindings: Vec<HashMap<String, bool>>,
}

impl<'t> Classifier<'t> {
    fn bindings(&mut self, unit: usize) -> &mut HashMap<String, bool> {
        if self.list_bindings.len() <= unit {
            self.list_bindings.resize_with(unit + 1, HashMap::new);
        }
        &mut self.list_bindings[unit]
    }

    fn walk_block(&mut self, unit: usize, block: &'t [Statement], depth: u32, scope: &Scope) {
        for (index, stmt) in block.iter().enumerate() {
            self.record_bindings(unit, stmt);
            match &stmt.kind {
                StatementKind::FunctionDef(node) => {
                    self.collect_expression_facts(unit, stmt.expressions(), depth);
                    self.enter_function(stmt, node, scope);
                }
                StatementKind::ClassDef(node) => {
                    self.collect_expression_facts(unit, stmt.expressions(), depth);
                    let inner = Scope {
                        prefix: format!("{}{}.", scope.prefix, node.name),
                        in_class_body: true,
                    };
                    self.walk_block(unit, &node.body, depth, &inner);
                }
                StatementKind::For(node) => {
                    self.collect_expression_facts(unit, vec![&node.target, &node.iter], depth);
                    let shape = for_loop_shape(node, block, index, depth + 1);
                    self.units[unit].loops.push(LoopSite {
                        stmt,
                        block,
                        index,
                        shape,
                        in_class_body: scope.in_class_body,
                    });
                    self.walk_block(unit, &node.body, depth + 1, scope);
                    self.walk_block(unit, &node.orelse, depth, scope);
                }
                StatementKind::While(node) => {
                    self.collect_expression_facts(unit, vec![&node.test], depth + 1);
                    let body_kind = if string_concat(&node.body)
                        .is_some_and(|(acc, _)| empty_string_initializer(block, index, acc).is_some())
                    {
                        BodyKind::StringConcatAssign
                    } else {
                        BodyKind::Other
                    };
                    self.units[unit].loops.push(LoopSite {
                        stmt,
                        block,
                        index,
                        shape: LoopShape {
                            is_counting_loop: false,
                            is_element_loop: false,
                            nesting_depth: depth + 1,
                            body_kind,
                        },
                        in_class_body: scope.in_class_body,
                    });
                    if is_always_true(&node.test) && !has_loop_exit(&node.body, false) {
                        self.units[unit].unbounded_loops.push(stmt.span);
                    }
                    self.walk_block(unit, &node.body, depth + 1, scope);
                    self.walk_block(unit, &node.orelse, depth, scope);
                }
                _ => {
                    self.collect_expression_facts(unit, stmt.expressions(), depth);
                    if let StatementKind::Try(node) = &stmt.kind {
                        for handler in &node.handlers {
                            if let Some(name) = &handler.name {
                                self.bindings(unit).insert(name.clone(), false);
                            }
                        }
                    }
                    for nested in stmt.blocks() {
                        self.walk_block(unit, nested, depth, scope);
                    }
                }
            }
        }
    }

    fn enter_function(&mut self, stmt: &'t Statement, node: &'t FunctionDef, scope: &Scope) {
        let name = format!("{}{}", scope.prefix, node.name);
        let mut unit = AnalysisUnit::new(name.clone(), UnitKind::Function, stmt.span, &node.body);
        unit.params = Some(&node.params);
        unit.is_method = scope.in_class_body;
        let index = self.units.len();
        self.units.push(unit);
        for param in node.params.names() {
            self.bindings(index).insert(param.to_string(), false);
        }

        let inner = Scope {
            prefix: format!("{}.", name),
            in_class_body: false,
        };
        self.walk_block(index, &node.body, 0, &inner);
        self.units[index].recursion = Some(recursion_fact(node, scope.in_class_body));
        self.finish_unit(index);
    }

    fn finish_unit(&mut self, unit: usize) {
        let list_names: HashSet<String> = self
            .bindings(unit)
            .iter()
            .filter(|(_, is_list)| **is_list)
            .map(|(name, _)| name.clone())
            .collect();
        let unit = &mut self.units[unit];
        unit.membership_tests
            .retain(|test| list_names.contains(&test.container));
        unit.list_names = list_names;
    }

    /// Track whether each name in the unit is only ever bound to a list.
    fn record_bindings(&mut self, unit: usize, stmt: &Statement) {
        let bindings = self.bindings(unit);
        let mut mark = |name: String, is_list: bool| {
            bindings
                .entry(name)
                .and_modify(|all_lists| *all_lists &= is_list)
                .or_insert(is_list);
        };
        match &stmt.kind {
            StatementKind::Assign { targets, value } => {
                let is_list = is_list_value(value);
                for target in targets {
                    let simple = target.as_name().is_some();
                    let mut names = Vec::new();
                    target_names(target, &mut names);
                    for name in names {
                        mark(name, simple && is_list);
                    }
                }
            }
            StatementKind::AnnAssign {
                target,
                value: Some(value),
                ..
            } => {
                if let Some(name) = target.as_name() {
                    mark(name.to_string(), is_list_value(value));
                }
            }
            StatementKind::AugAssign { target, value, .. } => {
                if let Some(name) = target.as_name() {
                    if !matches!(value.kind, ExprKind::List(_) | ExprKind::ListComp { .. }) {
                        mark(name.to_string(), false);
                    }
                }
            }
            StatementKind::Global(names) | StatementKind::Nonlocal(names) => {
                for name in names {
                    mark(name.clone(), false);
                }
            }
            _ => {
                let mut names = Vec::new();
                statement_bindings(stmt, &mut names);
                for name in names {
                    mark(name, false);
                }
            }
        }
    }

    fn collect_expression_facts(&mut self, unit: usize, exprs: Vec<&Expression>, depth: u32) {
        let mut facts = ExpressionFacts {
            loop_depth: depth,
            ..ExpressionFacts::default()
        };
        for expr in exprs {
            walk_expression(&mut facts, expr);
        }
        let unit = &mut self.units[unit];
        unit.sort_calls.extend(facts.sort_calls);
        unit.membership_tests.extend(facts.membership_tests);
        unit.has_comprehension |= facts.has_comprehension;
    }
}

/// List displays, list comprehensions and `list(...)` calls.
fn is_list_value(value: &Expression) -> bool {
    match &value.kind {
        ExprKind::List(_) | ExprKind::ListComp { .. } => true,
        ExprKind::Call { func, .. } => func.is_name("list"),
        _ => false,
    }
}

#[derive(Default)]
struct ExpressionFacts {
    loop_depth: u32,
    sort_calls: Vec<SortCall>,
    membership_tests: Vec<MembershipTest>,
    has_comprehension: bool,
}

impl Visitor for ExpressionFacts {
    fn visit_expression(&mut self, node: &Expression) -> VisitResult {
        match &node.kind {
            ExprKind::Call { func, .. } => {
                let is_sort = func.is_name("sorted")
                    || matches!(&func.kind, ExprKind::Attribute { attr, .. } if attr == "sort");
                if is_sort {
                    self.sort_calls.push(SortCall {
                        span: node.span,
                        loop_depth: self.loop_depth,
                    });
                }
            }
            ExprKind::ListComp { .. } | ExprKind::SetComp { .. } | ExprKind::DictComp { .. } => {
                self.has_comprehension = true;
            }
            ExprKind::Compare { comparisons, .. } if self.loop_depth > 0 => {
                for (op, right) in comparisons {
                    if let (CompOp::In | CompOp::NotIn, Some(container)) = (op, right.as_name()) {
                        self.membership_tests.push(MembershipTest {
                            span: node.span,
                            container: container.to_string(),
                            loop_depth: self.loop_depth,
                        });
                    }
                }
            }
            _ => {}
        }
        VisitResult::Continue
    }
}

// ============================================================================
// Loop shapes
// ============================================================================

fn for_loop_shape(node: &For, block: &[Statement], index: usize, nesting_depth: u32) -> LoopShape {
    let counting = range_len_loop(node);
    let is_counting_loop = counting.is_some();
    let is_element_loop = !is_counting_loop && !is_range_call(&node.iter);

    let body_kind = if append_call(&node.body)
        .is_some_and(|(result, _)| last_binding_index(block, index, result).is_some())
    {
        BodyKind::AppendCall
    } else if string_concat(&node.body)
        .is_some_and(|(acc, _)| empty_string_initializer(block, index, acc).is_some())
    {
        BodyKind::StringConcatAssign
    } else if counting.is_some_and(|(var, container)| is_indexed_read(&node.body, var, container)) {
        BodyKind::IndexedRead
    } else {
        BodyKind::Other
    };

    LoopShape {
        is_counting_loop,
        is_element_loop,
        nesting_depth,
        body_kind,
    }
}

fn is_range_call(expr: &Expression) -> bool {
    matches!(&expr.kind, ExprKind::Call { func, .. } if func.is_name("range"))
}

fn single_positional<'a>(args: &'a [Argument]) -> Option<&'a Expression> {
    match args {
        [Argument::Positional(arg)] => Some(arg),
        _ => None,
    }
}

/// `for i in range(len(X))`: returns the loop variable and `X`.
pub(crate) fn range_len_loop(node: &For) -> Option<(&str, &Expression)> {
    let var = node.target.as_name()?;
    let ExprKind::Call { func, args } = &node.iter.kind else {
        return None;
    };
    if !func.is_name("range") {
        return None;
    }
    let ExprKind::Call { func, args } = &single_positional(args)?.kind else {
        return None;
    };
    if !func.is_name("len") {
        return None;
    }
    let container = single_positional(args)?;
    container.dotted_path()?;
    Some((var, container))
}

/// `result.append(expr)` as the only statement: returns `result` and `expr`.
pub(crate) fn append_call(body: &[Statement]) -> Option<(&str, &Expression)> {
    let [stmt] = body else {
        return None;
    };
    let StatementKind::Expr(call) = &stmt.kind else {
        return None;
    };
    let ExprKind::Call { func, args } = &call.kind else {
        return None;
    };
    let ExprKind::Attribute { value, attr } = &func.kind else {
        return None;
    };
    if attr != "append" {
        return None;
    }
    Some((value.as_name()?, single_positional(args)?))
}

/// `acc += expr` or `acc = acc + expr` as the only statement.
pub(crate) fn string_concat(body: &[Statement]) -> Option<(&str, &Expression)> {
    let [stmt] = body else {
        return None;
    };
    match &stmt.kind {
        StatementKind::AugAssign {
            target,
            op: BinaryOp::Add,
            value,
        } => Some((target.as_name()?, value)),
        StatementKind::Assign { targets, value } => {
            let [target] = targets.as_slice() else {
                return None;
            };
            let acc = target.as_name()?;
            match &value.kind {
                ExprKind::BinOp {
                    left,
                    op: BinaryOp::Add,
                    right,
                } if left.is_name(acc) => Some((acc, right)),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Index of the most recent statement before `before` in `block` that binds
/// `name`, looking into nested blocks but not into nested scopes.
pub(crate) fn last_binding_index(block: &[Statement], before: usize, name: &str) -> Option<usize> {
    block[..before]
        .iter()
        .rposition(|stmt| statement_binds(stmt, name))
}

/// Index of `acc = ""` when it is the most recent binding of `acc`.
pub(crate) fn empty_string_initializer(block: &[Statement], before: usize, acc: &str) -> Option<usize> {
    let index = last_binding_index(block, before, acc)?;
    match &block[index].kind {
        StatementKind::Assign { targets, value }
            if targets.len() == 1 && targets[0].is_name(acc) && value.is_empty_string() =>
        {
            Some(index)
        }
        _ => None,
    }
}

fn statement_binds(stmt: &Statement, name: &str) -> bool {
    let mut names = Vec::new();
    statement_bindings(stmt, &mut names);
    if names.iter().any(|n| n == name) {
        return true;
    }
    if let StatementKind::Try(node) = &stmt.kind {
        if node.handlers.iter().any(|h| h.name.as_deref() == Some(name)) {
            return true;
        }
    }
    if matches!(
        stmt.kind,
        StatementKind::FunctionDef(_) | StatementKind::ClassDef(_)
    ) {
        return false;
    }
    stmt.blocks()
        .iter()
        .any(|block| block.iter().any(|s| statement_binds(s, name)))
}

/// The body reads `var` only as the index of `container[var]` loads and
/// rebinds neither.
fn is_indexed_read(body: &[Statement], var: &str, container: &Expression) -> bool {
    let Some(path) = container.dotted_path() else {
        return false;
    };
    let root = path.split('.').next().unwrap_or(&path);

    if body.iter().any(|stmt| stores_into(stmt, &[var, root])) {
        return false;
    }
    if any_expression_in_block(body, |e| matches!(e.kind, ExprKind::Lambda { .. })) {
        return false;
    }

    let mut loads = Vec::new();
    crate::names::loads_in_block(body, &mut loads);
    let var_loads = loads.iter().filter(|e| e.is_name(var)).count();

    let mut counter = IndexedReadCounter {
        var,
        path: &path,
        count: 0,
    };
    walk_block(&mut counter, body);
    counter.count > 0 && counter.count == var_loads
}

/// Counts `container[var]` expressions.
struct IndexedReadCounter<'a> {
    var: &'a str,
    path: &'a str,
    count: usize,
}

impl Visitor for IndexedReadCounter<'_> {
    fn visit_expression(&mut self, node: &Expression) -> VisitResult {
        if let ExprKind::Subscript { value, index } = &node.kind {
            if index.is_name(self.var) && value.dotted_path().as_deref() == Some(self.path) {
                self.count += 1;
            }
        }
        VisitResult::Continue
    }
}

/// True if `stmt` (or anything nested in it) assigns to one of `names`, or
/// to an attribute or element of one, or defines a nested scope.
fn stores_into(stmt: &Statement, names: &[&str]) -> bool {
    let hits = |target: &Expression| names.iter().any(|n| crate::names::mentions_name(target, n));
    let direct = match &stmt.kind {
        StatementKind::Assign { targets, .. } => targets.iter().any(hits),
        StatementKind::AugAssign { target, .. } | StatementKind::AnnAssign { target, .. } => {
            hits(target)
        }
        StatementKind::For(node) => hits(&node.target),
        StatementKind::With(node) => node.items.iter().filter_map(|i| i.target.as_ref()).any(hits),
        StatementKind::Del(targets) => targets.iter().any(hits),
        StatementKind::FunctionDef(_) | StatementKind::ClassDef(_) => true,
        _ => false,
    };
    if direct {
        return true;
    }
    let mut bound = Vec::new();
    statement_bindings(stmt, &mut bound);
    if bound.iter().any(|b| names.contains(&b.as_str())) {
        return true;
    }
    stmt.blocks()
        .iter()
        .any(|block| block.iter().any(|s| stores_into(s, names)))
}

/// `True`, or a non-zero integer literal.
fn is_always_true(test: &Expression) -> bool {
    match &test.kind {
        ExprKind::Constant(Constant::True) => true,
        ExprKind::Number(text) => text.parse::<i64>().is_ok_and(|n| n != 0),
        _ => false,
    }
}

/// A `break` for this loop or a `return` anywhere in `block`.
fn has_loop_exit(block: &[Statement], in_nested_loop: bool) -> bool {
    block.iter().any(|stmt| match &stmt.kind {
        StatementKind::Break => !in_nested_loop,
        StatementKind::Return(_) => true,
        StatementKind::FunctionDef(_) | StatementKind::ClassDef(_) => false,
        StatementKind::For(_) | StatementKind::While(_) => stmt
            .blocks()
            .iter()
            .enumerate()
            // The `else` block runs in the outer loop's context.
            .any(|(i, b)| has_loop_exit(b, in_nested_loop || i == 0)),
        _ => stmt.blocks().iter().any(|b| has_loop_exit(b, in_nested_loop)),
    })
}

// ============================================================================
// Recursion
// ============================================================================

fn recursion_fact(node: &FunctionDef, is_method: bool) -> RecursionFact {
    let mut counter = SelfCallCounter {
        name: &node.name,
        is_method,
        scopes: vec![local_bindings(&node.params, &node.body)],
        count: 0,
    };
    walk_block(&mut counter, &node.body);
    RecursionFact {
        calls_self: counter.count > 0,
        self_call_count: counter.count,
    }
}

/// Counts calls that resolve lexically to the function being analyzed.
///
/// `scopes` holds the local names of every scope between a call and the
/// definition; a bare call is a self call only when no scope shadows it.
struct SelfCallCounter<'a> {
    name: &'a str,
    is_method: bool,
    scopes: Vec<HashSet<String>>,
    count: usize,
}

impl SelfCallCounter<'_> {
    fn is_shadowed(&self) -> bool {
        self.scopes.iter().any(|scope| scope.contains(self.name))
    }
}

fn comprehension_scope(expr: &Expression) -> Option<HashSet<String>> {
    let generators = match &expr.kind {
        ExprKind::ListComp { generators, .. }
        | ExprKind::SetComp { generators, .. }
        | ExprKind::GeneratorExp { generators, .. }
        | ExprKind::DictComp { generators, .. } => generators,
        _ => return None,
    };
    let mut names = Vec::new();
    for generator in generators {
        target_names(&generator.target, &mut names);
    }
    Some(names.into_iter().collect())
}

impl Visitor for SelfCallCounter<'_> {
    fn visit_function_def(&mut self, node: &FunctionDef) -> VisitResult {
        self.scopes.push(local_bindings(&node.params, &node.body));
        VisitResult::Continue
    }

    fn leave_function_def(&mut self, _node: &FunctionDef) {
        self.scopes.pop();
    }

    fn visit_expression(&mut self, node: &Expression) -> VisitResult {
        match &node.kind {
            ExprKind::Call { func, .. } => {
                if func.is_name(self.name) && !self.is_method && !self.is_shadowed() {
                    self.count += 1;
                } else if self.is_method {
                    if let ExprKind::Attribute { value, attr } = &func.kind {
                        if attr == self.name && (value.is_name("self") || value.is_name("cls")) {
                            self.count += 1;
                        }
                    }
                }
            }
            ExprKind::Lambda { params, .. } => {
                self.scopes.push(params.names().map(str::to_string).collect());
            }
            _ => {
                if let Some(scope) = comprehension_scope(node) {
                    self.scopes.push(scope);
                }
            }
        }
        VisitResult::Continue
    }

    fn leave_expression(&mut self, node: &Expression) {
        if matches!(node.kind, ExprKind::Lambda { .. }) || comprehension_scope(node).is_some() {
            self.scopes.pop();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pyopt_cst::parse_module;

    fn first_loop_shape(source: &str) -> LoopShape {
        let module = parse_module(source).unwrap();
        let classification = classify(&module);
        let unit = classification
            .units
            .iter()
            .find(|u| !u.loops.is_empty())
            .expect("no loops found");
        unit.loops[0].shape
    }

    fn units(source: &str) -> Vec<(String, Option<RecursionFact>)> {
        let module = parse_module(source).unwrap();
        classify(&module)
            .units
            .into_iter()
            .map(|u| (u.name, u.recursion))
            .collect()
    }

    mod shape_tests {
        use super::*;

        #[test]
        fn append_call_body() {
            let shape = first_loop_shape("result = []\nfor x in range(10):\n    result.append(x * x)\n");
            assert_eq!(shape.body_kind, BodyKind::AppendCall);
            assert!(!shape.is_counting_loop);
            assert!(!shape.is_element_loop);
            assert_eq!(shape.nesting_depth, 1);
        }

        #[test]
        fn append_requires_earlier_binding() {
            let shape = first_loop_shape("for x in xs:\n    result.append(x)\n");
            assert_eq!(shape.body_kind, BodyKind::Other);
            assert!(shape.is_element_loop);
        }

        #[test]
        fn append_with_extra_statement_is_other() {
            let shape = first_loop_shape(
                "result = []\nfor x in xs:\n    result.append(x)\n    print(x)\n",
            );
            assert_eq!(shape.body_kind, BodyKind::Other);
        }

        #[test]
        fn string_concat_forms() {
            let aug = first_loop_shape("s = ''\nfor w in words:\n    s += w\n");
            assert_eq!(aug.body_kind, BodyKind::StringConcatAssign);
            let plain = first_loop_shape("s = ''\nfor w in words:\n    s = s + w\n");
            assert_eq!(plain.body_kind, BodyKind::StringConcatAssign);
        }

        #[test]
        fn string_concat_requires_empty_string_binding() {
            let shape = first_loop_shape("s = ''\ns = 'x'\nfor w in words:\n    s += w\n");
            assert_eq!(shape.body_kind, BodyKind::Other);
            let shape = first_loop_shape("s = 0\nfor w in words:\n    s += w\n");
            assert_eq!(shape.body_kind, BodyKind::Other);
        }

        #[test]
        fn while_string_concat() {
            let shape = first_loop_shape("s = ''\nwhile cond():\n    s += 'x'\n");
            assert_eq!(shape.body_kind, BodyKind::StringConcatAssign);
        }

        #[test]
        fn counting_loop_with_indexed_reads() {
            let shape = first_loop_shape("for i in range(len(arr)):\n    print(arr[i])\n");
            assert!(shape.is_counting_loop);
            assert!(!shape.is_element_loop);
            assert_eq!(shape.body_kind, BodyKind::IndexedRead);
        }

        #[test]
        fn counting_loop_using_index_directly_is_other() {
            let shape = first_loop_shape("for i in range(len(arr)):\n    print(i, arr[i])\n");
            assert!(shape.is_counting_loop);
            assert_eq!(shape.body_kind, BodyKind::Other);
        }

        #[test]
        fn counting_loop_writing_container_is_other() {
            let shape = first_loop_shape("for i in range(len(arr)):\n    arr[i] = arr[i] + 1\n");
            assert_eq!(shape.body_kind, BodyKind::Other);
        }

        #[test]
        fn attribute_container_counts() {
            let shape =
                first_loop_shape("for i in range(len(self.items)):\n    total(self.items[i])\n");
            assert!(shape.is_counting_loop);
            assert_eq!(shape.body_kind, BodyKind::IndexedRead);
        }

        #[test]
        fn nesting_depth_resets_in_functions() {
            let module = parse_module(
                "for a in xs:\n    for b in ys:\n        pass\ndef f():\n    for c in zs:\n        pass\n",
            )
            .unwrap();
            let classification = classify(&module);
            let depths: Vec<u32> = classification.units[0]
                .loops
                .iter()
                .map(|l| l.shape.nesting_depth)
                .collect();
            assert_eq!(depths, vec![1, 2]);
            assert_eq!(classification.units[1].loops[0].shape.nesting_depth, 1);
        }
    }

    mod unit_tests {
        use super::*;

        #[test]
        fn qualified_unit_names_in_pre_order() {
            let names: Vec<String> = units(
                "def outer():\n    def inner():\n        pass\nclass C:\n    def m(self):\n        pass\n",
            )
            .into_iter()
            .map(|(name, _)| name)
            .collect();
            assert_eq!(names, vec!["<module>", "outer", "outer.inner", "C.m"]);
        }

        #[test]
        fn class_body_loops_belong_to_enclosing_unit() {
            let module = parse_module("class C:\n    for x in xs:\n        pass\n").unwrap();
            let classification = classify(&module);
            assert_eq!(classification.units.len(), 1);
            assert!(classification.units[0].loops[0].in_class_body);
        }

        #[test]
        fn sort_calls_record_loop_depth() {
            let module = parse_module("ys = sorted(xs)\nfor x in xs:\n    x.sort()\n").unwrap();
            let depths: Vec<u32> = classify(&module).units[0]
                .sort_calls
                .iter()
                .map(|c| c.loop_depth)
                .collect();
            assert_eq!(depths, vec![0, 1]);
        }

        #[test]
        fn unbounded_while_true() {
            let module = parse_module("while True:\n    poll()\n").unwrap();
            assert_eq!(classify(&module).units[0].unbounded_loops.len(), 1);

            let module = parse_module("while True:\n    if done():\n        break\n").unwrap();
            assert!(classify(&module).units[0].unbounded_loops.is_empty());

            let module =
                parse_module("while 1:\n    for x in xs:\n        break\n").unwrap();
            assert_eq!(classify(&module).units[0].unbounded_loops.len(), 1);
        }

        #[test]
        fn membership_tests_against_list_names() {
            let module = parse_module(
                "seen = []\nother = set()\nfor x in xs:\n    if x in seen:\n        pass\n    if x in other:\n        pass\n",
            )
            .unwrap();
            let classification = classify(&module);
            let unit = &classification.units[0];
            assert!(unit.list_names.contains("seen"));
            assert_eq!(unit.membership_tests.len(), 1);
            assert_eq!(unit.membership_tests[0].container, "seen");
        }

        #[test]
        fn rebinding_to_non_list_clears_list_name() {
            let module =
                parse_module("seen = []\nseen = set(seen)\nfor x in xs:\n    x in seen\n").unwrap();
            let classification = classify(&module);
            assert!(classification.units[0].membership_tests.is_empty());
        }

        #[test]
        fn comprehension_presence() {
            let module = parse_module("def f(xs):\n    return {x: 1 for x in xs}\n").unwrap();
            assert!(classify(&module).units[1].has_comprehension);
        }
    }

    mod recursion_tests {
        use super::*;

        fn fact(source: &str, unit: &str) -> RecursionFact {
            units(source)
                .into_iter()
                .find(|(name, _)| name == unit)
                .and_then(|(_, fact)| fact)
                .expect("unit not found")
        }

        #[test]
        fn counts_self_call_sites() {
            let f = fact(
                "def fib(n):\n    if n < 2:\n        return n\n    return fib(n - 1) + fib(n - 2)\n",
                "fib",
            );
            assert!(f.calls_self);
            assert_eq!(f.self_call_count, 2);
        }

        #[test]
        fn shadowed_by_parameter() {
            let f = fact("def f(f):\n    return f(1)\n", "f");
            assert!(!f.calls_self);
        }

        #[test]
        fn shadowed_by_inner_definition() {
            let f = fact("def f(n):\n    def f(m):\n        return m\n    return f(n)\n", "f");
            assert!(!f.calls_self);
        }

        #[test]
        fn shadowed_in_inner_scope_only() {
            let source = "def f(n):\n    g = lambda f: f(n)\n    return f(n - 1)\n";
            assert_eq!(fact(source, "f").self_call_count, 1);
        }

        #[test]
        fn call_from_nested_function_counts() {
            let f = fact("def f(n):\n    def g():\n        return f(n - 1)\n    return g()\n", "f");
            assert_eq!(f.self_call_count, 1);
        }

        #[test]
        fn method_self_calls() {
            let source = "class T:\n    def walk(self, node):\n        for c in node.children:\n            self.walk(c)\n";
            let f = fact(source, "T.walk");
            assert!(f.calls_self);
            assert_eq!(f.self_call_count, 1);
        }

        #[test]
        fn bare_call_in_method_is_not_self_call() {
            let f = fact("class T:\n    def run(self):\n        return run()\n", "T.run");
            assert!(!f.calls_self);
        }
    }
}
