// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Name binding and load analysis.
//!
//! Loads and stores are told apart structurally: a bare name in an
//! assignment, `for`, `with`, `del` or comprehension target is a store, while
//! the base and index of an attribute or subscript target are still loads.
//!
//! - [`loads_in_block`] / [`loads_in_expression`]: every name read.
//! - [`local_bindings`]: names a function body binds locally.
//! - [`NameOccurrences`]: every place a name appears, in any context.
//! - [`UniqueNameGenerator`]: fresh identifiers that do not collide with the
//!   names already used in an analysis unit.

use std::collections::{HashMap, HashSet};

use pyopt_cst::visitor::{walk_block, walk_expression, VisitResult, Visitor};
use pyopt_cst::{
    ExceptHandler, ExprKind, Expression, FunctionDef, ImportNames, Parameters, Span, Statement,
    StatementKind,
};

// ============================================================================
// Reserved names
// ============================================================================

/// Builtins that generated names must not shadow.
const PYTHON_BUILTINS: &[&str] = &[
    "abs", "all", "any", "ascii", "bin", "bool", "bytearray", "bytes", "callable", "chr",
    "classmethod", "compile", "complex", "delattr", "dict", "dir", "divmod", "enumerate",
    "eval", "exec", "filter", "float", "format", "frozenset", "getattr", "globals", "hasattr",
    "hash", "help", "hex", "id", "input", "int", "isinstance", "issubclass", "iter", "len",
    "list", "locals", "map", "max", "memoryview", "min", "next", "object", "oct", "open",
    "ord", "pow", "print", "property", "range", "repr", "reversed", "round", "set",
    "setattr", "slice", "sorted", "staticmethod", "str", "sum", "super", "tuple", "type",
    "vars", "zip", "self", "cls",
];

const PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

fn is_keyword(name: &str) -> bool {
    PYTHON_KEYWORDS.contains(&name)
}

// ============================================================================
// Loads
// ============================================================================

/// Every name expression read by `expr`, in source order.
pub fn loads_in_expression<'a>(expr: &'a Expression, out: &mut Vec<&'a Expression>) {
    match &expr.kind {
        ExprKind::Name(_) => out.push(expr),
        ExprKind::ListComp { elt, generators }
        | ExprKind::SetComp { elt, generators }
        | ExprKind::GeneratorExp { elt, generators } => {
            loads_in_expression(elt, out);
            for generator in generators {
                loads_in_target(&generator.target, out);
                loads_in_expression(&generator.iter, out);
                for cond in &generator.ifs {
                    loads_in_expression(cond, out);
                }
            }
        }
        ExprKind::DictComp {
            key,
            value,
            generators,
        } => {
            loads_in_expression(key, out);
            loads_in_expression(value, out);
            for generator in generators {
                loads_in_target(&generator.target, out);
                loads_in_expression(&generator.iter, out);
                for cond in &generator.ifs {
                    loads_in_expression(cond, out);
                }
            }
        }
        _ => {
            for child in expr.children() {
                loads_in_expression(child, out);
            }
        }
    }
}

/// Loads inside an assignment target: the bare names are stores.
pub fn loads_in_target<'a>(target: &'a Expression, out: &mut Vec<&'a Expression>) {
    match &target.kind {
        ExprKind::Name(_) => {}
        ExprKind::Tuple(items) | ExprKind::List(items) => {
            for item in items {
                loads_in_target(item, out);
            }
        }
        ExprKind::Starred(inner) => loads_in_target(inner, out),
        _ => loads_in_expression(target, out),
    }
}

/// Loads in the expressions a statement owns directly (not its nested blocks).
pub fn loads_in_statement<'a>(stmt: &'a Statement, out: &mut Vec<&'a Expression>) {
    match &stmt.kind {
        StatementKind::Assign { targets, value } => {
            for target in targets {
                loads_in_target(target, out);
            }
            loads_in_expression(value, out);
        }
        StatementKind::AnnAssign {
            target,
            annotation,
            value,
        } => {
            loads_in_target(target, out);
            loads_in_expression(annotation, out);
            if let Some(value) = value {
                loads_in_expression(value, out);
            }
        }
        StatementKind::For(node) => {
            loads_in_target(&node.target, out);
            loads_in_expression(&node.iter, out);
        }
        StatementKind::With(node) => {
            for item in &node.items {
                loads_in_expression(&item.context, out);
                if let Some(target) = &item.target {
                    loads_in_target(target, out);
                }
            }
        }
        StatementKind::Del(targets) => {
            for target in targets {
                loads_in_target(target, out);
            }
        }
        // `acc += x` reads `acc`, so the target is a load as well.
        _ => {
            for expr in stmt.expressions() {
                loads_in_expression(expr, out);
            }
        }
    }
}

/// Every load in `block`, descending into nested blocks and function bodies.
pub fn loads_in_block<'a>(block: &'a [Statement], out: &mut Vec<&'a Expression>) {
    for stmt in block {
        loads_in_statement(stmt, out);
        for nested in stmt.blocks() {
            loads_in_block(nested, out);
        }
    }
}

/// Check if `name` is read anywhere in `expr`.
pub fn reads_name(expr: &Expression, name: &str) -> bool {
    let mut loads = Vec::new();
    loads_in_expression(expr, &mut loads);
    loads.iter().any(|e| e.is_name(name))
}

// ============================================================================
// Stores
// ============================================================================

/// Names bound by an assignment target, in source order.
pub fn target_names(target: &Expression, out: &mut Vec<String>) {
    match &target.kind {
        ExprKind::Name(id) => out.push(id.clone()),
        ExprKind::Tuple(items) | ExprKind::List(items) => {
            for item in items {
                target_names(item, out);
            }
        }
        ExprKind::Starred(inner) => target_names(inner, out),
        _ => {}
    }
}

/// Names a statement binds in its own scope, not counting nested blocks.
///
/// Walrus targets inside the statement's expressions are included.
pub fn statement_bindings(stmt: &Statement, out: &mut Vec<String>) {
    match &stmt.kind {
        StatementKind::Assign { targets, .. } => {
            for target in targets {
                target_names(target, out);
            }
        }
        StatementKind::AugAssign { target, .. } | StatementKind::AnnAssign { target, .. } => {
            target_names(target, out)
        }
        StatementKind::For(node) => target_names(&node.target, out),
        StatementKind::With(node) => {
            for item in &node.items {
                if let Some(target) = &item.target {
                    target_names(target, out);
                }
            }
        }
        StatementKind::Del(targets) => {
            for target in targets {
                target_names(target, out);
            }
        }
        StatementKind::Import(aliases) => {
            for alias in aliases {
                let bound = match &alias.asname {
                    Some(asname) => asname.as_str(),
                    None => alias.name.split('.').next().unwrap_or(&alias.name),
                };
                out.push(bound.to_string());
            }
        }
        StatementKind::ImportFrom {
            names: ImportNames::Aliases(aliases),
            ..
        } => {
            for alias in aliases {
                out.push(alias.asname.clone().unwrap_or_else(|| alias.name.clone()));
            }
        }
        StatementKind::FunctionDef(node) => out.push(node.name.clone()),
        StatementKind::ClassDef(node) => out.push(node.name.clone()),
        _ => {}
    }
    for expr in stmt.expressions() {
        walrus_targets(expr, out);
    }
}

fn walrus_targets(expr: &Expression, out: &mut Vec<String>) {
    if let ExprKind::NamedExpr { target, .. } = &expr.kind {
        out.push(target.clone());
    }
    if matches!(expr.kind, ExprKind::Lambda { .. }) {
        return;
    }
    for child in expr.children() {
        walrus_targets(child, out);
    }
}

/// Names bound locally by a function: its parameters plus every binding in
/// its body, excluding nested function and class bodies and names declared
/// `global` or `nonlocal`.
pub fn local_bindings(params: &Parameters, body: &[Statement]) -> HashSet<String> {
    let mut bound = Vec::new();
    let mut declared = Vec::new();
    collect_scope_bindings(body, &mut bound, &mut declared);

    let mut names: HashSet<String> = params.names().map(str::to_string).collect();
    names.extend(bound);
    for name in declared {
        names.remove(&name);
    }
    names
}

fn collect_scope_bindings(block: &[Statement], bound: &mut Vec<String>, declared: &mut Vec<String>) {
    for stmt in block {
        statement_bindings(stmt, bound);
        match &stmt.kind {
            StatementKind::Global(names) | StatementKind::Nonlocal(names) => {
                declared.extend(names.iter().cloned());
            }
            StatementKind::FunctionDef(_) | StatementKind::ClassDef(_) => continue,
            StatementKind::Try(node) => {
                bound.extend(node.handlers.iter().filter_map(|h| h.name.clone()));
            }
            _ => {}
        }
        for nested in stmt.blocks() {
            collect_scope_bindings(nested, bound, declared);
        }
    }
}

// ============================================================================
// Occurrences
// ============================================================================

/// Every place a name occurs in a block, indexed by name.
///
/// Reads, stores, `del` targets and walrus targets are recorded with their
/// expression span. Bindings that have no expression of their own (`global`,
/// `nonlocal`, imports, definitions, `except ... as`) are recorded with the
/// span of the owning statement or handler. Nested scopes are included.
#[derive(Debug, Default)]
pub struct NameOccurrences {
    spans: HashMap<String, Vec<Span>>,
}

impl NameOccurrences {
    pub fn collect(block: &[Statement]) -> Self {
        let mut occurrences = NameOccurrences::default();
        walk_block(&mut occurrences, block);
        occurrences
    }

    fn record(&mut self, name: &str, span: Span) {
        self.spans.entry(name.to_string()).or_default().push(span);
    }

    /// True if any of `names` occurs anywhere not contained in `span`.
    pub fn occurs_outside(&self, names: &[String], span: Span) -> bool {
        names.iter().any(|name| {
            self.spans
                .get(name)
                .is_some_and(|spans| spans.iter().any(|s| !span.contains(s)))
        })
    }
}

impl Visitor for NameOccurrences {
    fn visit_statement(&mut self, node: &Statement) -> VisitResult {
        match &node.kind {
            StatementKind::Global(names) | StatementKind::Nonlocal(names) => {
                for name in names {
                    self.record(name, node.span);
                }
            }
            StatementKind::Import(_)
            | StatementKind::ImportFrom { .. }
            | StatementKind::FunctionDef(_)
            | StatementKind::ClassDef(_) => {
                let mut bound = Vec::new();
                statement_bindings(node, &mut bound);
                for name in &bound {
                    self.record(name, node.span);
                }
            }
            _ => {}
        }
        VisitResult::Continue
    }

    fn visit_except_handler(&mut self, node: &ExceptHandler) -> VisitResult {
        if let Some(name) = &node.name {
            self.record(name, node.span);
        }
        VisitResult::Continue
    }

    fn visit_expression(&mut self, node: &Expression) -> VisitResult {
        match &node.kind {
            ExprKind::Name(id) => self.record(id, node.span),
            ExprKind::NamedExpr { target, .. } => self.record(target, node.span),
            _ => {}
        }
        VisitResult::Continue
    }
}

// ============================================================================
// Searches
// ============================================================================

/// Finds the first expression matching a predicate, stopping early.
struct ExpressionFinder<F> {
    predicate: F,
    found: bool,
}

impl<F: FnMut(&Expression) -> bool> Visitor for ExpressionFinder<F> {
    fn visit_expression(&mut self, node: &Expression) -> VisitResult {
        if (self.predicate)(node) {
            self.found = true;
            return VisitResult::Stop;
        }
        VisitResult::Continue
    }
}

/// Check if any expression in `expr` (itself included) satisfies `predicate`.
pub fn any_expression(expr: &Expression, predicate: impl FnMut(&Expression) -> bool) -> bool {
    let mut finder = ExpressionFinder {
        predicate,
        found: false,
    };
    walk_expression(&mut finder, expr);
    finder.found
}

/// Check if any expression anywhere in `block` satisfies `predicate`.
pub fn any_expression_in_block(
    block: &[Statement],
    predicate: impl FnMut(&Expression) -> bool,
) -> bool {
    let mut finder = ExpressionFinder {
        predicate,
        found: false,
    };
    walk_block(&mut finder, block);
    finder.found
}

/// True if `expr` contains `yield`, `await`, or an assignment expression.
pub fn contains_yield_await_walrus(expr: &Expression) -> bool {
    any_expression(expr, |e| {
        matches!(
            e.kind,
            ExprKind::Yield(_)
                | ExprKind::YieldFrom(_)
                | ExprKind::Await(_)
                | ExprKind::NamedExpr { .. }
        )
    })
}

/// True if `expr` mentions `name` in any context.
pub fn mentions_name(expr: &Expression, name: &str) -> bool {
    any_expression(expr, |e| {
        e.is_name(name) || matches!(&e.kind, ExprKind::NamedExpr { target, .. } if target == name)
    })
}

// ============================================================================
// Used names
// ============================================================================

/// Collects every identifier that appears in a block.
#[derive(Default)]
struct UsedNames {
    names: HashSet<String>,
}

impl UsedNames {
    fn add_params(&mut self, params: &Parameters) {
        self.names.extend(params.names().map(str::to_string));
    }
}

impl Visitor for UsedNames {
    fn visit_statement(&mut self, node: &Statement) -> VisitResult {
        let mut bound = Vec::new();
        statement_bindings(node, &mut bound);
        self.names.extend(bound);
        if let StatementKind::Global(names) | StatementKind::Nonlocal(names) = &node.kind {
            self.names.extend(names.iter().cloned());
        }
        VisitResult::Continue
    }

    fn visit_function_def(&mut self, node: &FunctionDef) -> VisitResult {
        self.add_params(&node.params);
        VisitResult::Continue
    }

    fn visit_except_handler(&mut self, node: &ExceptHandler) -> VisitResult {
        self.names.extend(node.name.iter().cloned());
        VisitResult::Continue
    }

    fn visit_expression(&mut self, node: &Expression) -> VisitResult {
        match &node.kind {
            ExprKind::Name(id) => {
                self.names.insert(id.clone());
            }
            ExprKind::NamedExpr { target, .. } => {
                self.names.insert(target.clone());
            }
            ExprKind::Lambda { params, .. } => self.add_params(params),
            _ => {}
        }
        VisitResult::Continue
    }
}

/// Every identifier used in `block`, nested scopes included.
pub fn used_names(params: Option<&Parameters>, block: &[Statement]) -> HashSet<String> {
    let mut collector = UsedNames::default();
    if let Some(params) = params {
        collector.add_params(params);
    }
    walk_block(&mut collector, block);
    collector.names
}

// ============================================================================
// UniqueNameGenerator
// ============================================================================

/// Generates identifiers that do not collide with names already in use.
///
/// Builtins and keywords are always considered in use.
#[derive(Debug, Clone)]
pub struct UniqueNameGenerator {
    used_names: HashSet<String>,
}

impl UniqueNameGenerator {
    /// Create a generator that avoids `used_names`.
    pub fn new(used_names: impl IntoIterator<Item = String>) -> Self {
        let mut names: HashSet<String> = used_names.into_iter().collect();
        names.extend(PYTHON_BUILTINS.iter().map(|b| b.to_string()));
        UniqueNameGenerator { used_names: names }
    }

    /// Return `base` if it is free, else the first free `base_1`, `base_2`, ...
    pub fn generate(&self, base: &str) -> String {
        if !self.is_in_use(base) {
            return base.to_string();
        }
        let mut i = 1usize;
        loop {
            let candidate = format!("{}_{}", base, i);
            if !self.is_in_use(&candidate) {
                return candidate;
            }
            i += 1;
        }
    }

    /// Check if a name is already in use.
    pub fn is_in_use(&self, name: &str) -> bool {
        is_keyword(name) || self.used_names.contains(name)
    }

    /// Record a generated name so later calls avoid it.
    pub fn mark_used(&mut self, name: &str) {
        self.used_names.insert(name.to_string());
    }
}

/// Derive an element name from a collection name.
///
/// `values` → `value`, `entries` → `entry`; names that are not recognizably
/// plural get an `_item` suffix. Dotted paths use their last segment.
pub fn singular(name: &str) -> String {
    let last = name.rsplit('.').next().unwrap_or(name);
    let candidate = if let Some(stem) = last.strip_suffix("ies") {
        format!("{}y", stem)
    } else if last.ends_with('s') && !last.ends_with("ss") {
        last[..last.len() - 1].to_string()
    } else {
        String::new()
    };
    let valid = candidate
        .chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && candidate != "y"
        && !is_keyword(&candidate);
    if valid {
        candidate
    } else {
        format!("{}_item", last)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pyopt_cst::{parse_expression, parse_module};

    fn load_names(source: &str) -> Vec<String> {
        let module = parse_module(source).unwrap();
        let mut loads = Vec::new();
        loads_in_block(&module.body, &mut loads);
        loads
            .iter()
            .filter_map(|e| e.as_name().map(str::to_string))
            .collect()
    }

    mod load_tests {
        use super::*;

        #[test]
        fn assignment_target_is_not_a_load() {
            assert_eq!(load_names("x = y\n"), vec!["y"]);
        }

        #[test]
        fn subscript_target_loads_its_parts() {
            assert_eq!(load_names("a[i] = v\n"), vec!["a", "i", "v"]);
        }

        #[test]
        fn augmented_target_is_a_load() {
            assert_eq!(load_names("acc += w\n"), vec!["acc", "w"]);
        }

        #[test]
        fn comprehension_target_is_a_store() {
            assert_eq!(load_names("r = [x for x in xs]\n"), vec!["x", "xs"]);
        }

        #[test]
        fn for_target_and_nested_blocks() {
            assert_eq!(
                load_names("for a, b in pairs:\n    print(a)\n"),
                vec!["pairs", "print", "a"]
            );
        }

        #[test]
        fn reads_name_in_expression() {
            let expr = parse_expression("f(x) + y.z").unwrap();
            assert!(reads_name(&expr, "x"));
            assert!(reads_name(&expr, "y"));
            assert!(!reads_name(&expr, "z"));
        }
    }

    mod binding_tests {
        use super::*;

        fn function_locals(source: &str) -> HashSet<String> {
            let module = parse_module(source).unwrap();
            match &module.body[0].kind {
                StatementKind::FunctionDef(f) => local_bindings(&f.params, &f.body),
                other => panic!("expected function, got {:?}", other),
            }
        }

        #[test]
        fn collects_params_and_body_bindings() {
            let names = function_locals(
                "def f(a, *rest, k=1):\n    b = 1\n    for c in a:\n        pass\n    import os.path\n    from m import n as alias\n",
            );
            for expected in ["a", "rest", "k", "b", "c", "os", "alias"] {
                assert!(names.contains(expected), "missing {}", expected);
            }
        }

        #[test]
        fn inner_definitions_bind_their_name_only() {
            let names = function_locals("def f():\n    def g(x):\n        y = 1\n");
            assert!(names.contains("g"));
            assert!(!names.contains("x"));
            assert!(!names.contains("y"));
        }

        #[test]
        fn global_declarations_are_not_local() {
            let names = function_locals("def f():\n    global total\n    total = 1\n");
            assert!(!names.contains("total"));
        }

        #[test]
        fn walrus_and_except_names_bind() {
            let names = function_locals(
                "def f():\n    if (n := g()):\n        pass\n    try:\n        pass\n    except E as err:\n        pass\n",
            );
            assert!(names.contains("n"));
            assert!(names.contains("err"));
        }
    }

    mod occurrence_tests {
        use super::*;

        fn occurs_outside_loop(source: &str, name: &str) -> bool {
            let module = parse_module(source).unwrap();
            let loop_span = module
                .body
                .iter()
                .chain(module.body.iter().flat_map(|s| s.blocks().into_iter().flatten()))
                .find(|s| matches!(s.kind, StatementKind::For(_)))
                .map(|s| s.span)
                .unwrap();
            NameOccurrences::collect(&module.body).occurs_outside(&[name.to_string()], loop_span)
        }

        #[test]
        fn names_inside_the_span_do_not_count() {
            assert!(!occurs_outside_loop("for x in xs:\n    f(x)\n", "x"));
        }

        #[test]
        fn del_and_store_count() {
            assert!(occurs_outside_loop("for x in xs:\n    f(x)\ndel x\n", "x"));
            assert!(occurs_outside_loop("for x in xs:\n    f(x)\nx = 1\n", "x"));
        }

        #[test]
        fn declarations_and_bindings_count() {
            assert!(occurs_outside_loop(
                "def g():\n    global x\n    for x in xs:\n        f(x)\n",
                "x"
            ));
            assert!(occurs_outside_loop("import x\nfor x in xs:\n    f(x)\n", "x"));
            assert!(occurs_outside_loop(
                "for x in xs:\n    f(x)\ntry:\n    pass\nexcept E as x:\n    pass\n",
                "x"
            ));
        }

        #[test]
        fn nested_scopes_count() {
            assert!(occurs_outside_loop(
                "for x in xs:\n    f(x)\ndef g():\n    return x\n",
                "x"
            ));
        }
    }

    mod search_tests {
        use super::*;

        #[test]
        fn detects_yield_await_and_walrus() {
            assert!(contains_yield_await_walrus(&parse_expression("(yield x)").unwrap()));
            assert!(contains_yield_await_walrus(&parse_expression("f(await g())").unwrap()));
            assert!(contains_yield_await_walrus(&parse_expression("[(y := 1)]").unwrap()));
            assert!(!contains_yield_await_walrus(&parse_expression("x * x").unwrap()));
        }

        #[test]
        fn mentions_name_includes_stores() {
            let expr = parse_expression("[r for r in rows]").unwrap();
            assert!(mentions_name(&expr, "r"));
            assert!(!mentions_name(&expr, "result"));
        }
    }

    mod generator_tests {
        use super::*;

        #[test]
        fn free_name_is_returned_unchanged() {
            let generator = UniqueNameGenerator::new(vec!["a".to_string()]);
            assert_eq!(generator.generate("value"), "value");
        }

        #[test]
        fn taken_names_get_numeric_suffixes() {
            let mut generator =
                UniqueNameGenerator::new(vec!["value".to_string(), "value_1".to_string()]);
            assert_eq!(generator.generate("value"), "value_2");
            generator.mark_used("value_2");
            assert_eq!(generator.generate("value"), "value_3");
        }

        #[test]
        fn builtins_and_keywords_are_reserved() {
            let generator = UniqueNameGenerator::new(Vec::new());
            assert_eq!(generator.generate("list"), "list_1");
            assert_eq!(generator.generate("in"), "in_1");
        }

        #[test]
        fn used_names_cover_nested_scopes() {
            let module = parse_module("def f(a):\n    g = lambda q: q\n    item = 1\n").unwrap();
            let names = used_names(None, &module.body);
            for expected in ["f", "a", "g", "q", "item"] {
                assert!(names.contains(expected), "missing {}", expected);
            }
        }

        #[test]
        fn singular_forms() {
            assert_eq!(singular("values"), "value");
            assert_eq!(singular("entries"), "entry");
            assert_eq!(singular("self.items"), "item");
            assert_eq!(singular("arr"), "arr_item");
            assert_eq!(singular("class"), "class_item");
            assert_eq!(singular("s"), "s_item");
        }
    }
}
