// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Anti-pattern detection.
//!
//! Each matcher inspects one loop or one analysis unit and either produces a
//! [`Finding`] or nothing. Preconditions that cannot be verified suppress the
//! finding (or its suggestion) rather than failing the request.
//!
//! Suggestions are built as syntax trees and printed with the canonical
//! serializer, so every `suggested_text` parses.

use std::collections::HashSet;

use pyopt_core::LineIndex;
use pyopt_cst::visitor::{transform_block, Transformer};
use pyopt_cst::{
    statement_to_source, Argument, BinaryOp, Comprehension, ExprKind, Expression, For, Span,
    Statement, StatementKind,
};
use serde::Serialize;

use crate::classifier::{
    append_call, empty_string_initializer, range_len_loop, string_concat, AnalysisUnit, BodyKind,
    Classification, LoopSite,
};
use crate::names::{
    any_expression, contains_yield_await_walrus, mentions_name, singular, target_names,
    used_names, NameOccurrences, UniqueNameGenerator,
};
use crate::rules::{rule, Matcher, RuleId, Severity, RULES};

// ============================================================================
// Findings
// ============================================================================

/// Where a finding applies. `line` and `column` are 1-indexed and point at
/// `span.start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
    pub span: Span,
}

/// A detected anti-pattern. Identified by `(rule_id, location)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub rule_id: RuleId,
    pub location: Location,
    pub severity: Severity,
    pub message: String,
    /// Replacement for the statements covered by `location.span`.
    pub suggested_text: Option<String>,
    /// The rule's auto-apply preconditions hold for this instance.
    pub auto_applicable: bool,
}

/// Per-unit state shared by the matchers.
pub struct DetectionContext<'a> {
    pub unit: &'a AnalysisUnit<'a>,
    lines: &'a LineIndex<'a>,
    occurrences: NameOccurrences,
}

impl DetectionContext<'_> {
    fn location(&self, span: Span) -> Location {
        let (line, mut column) = self.lines.position(span.start);
        if line == 1 && column > 1 && self.lines.text().starts_with('\u{feff}') {
            column -= 1;
        }
        Location { line, column, span }
    }

    fn finding(&self, id: RuleId, span: Span, message: String) -> Finding {
        Finding {
            rule_id: id,
            location: self.location(span),
            severity: rule(id).severity,
            message,
            suggested_text: None,
            auto_applicable: false,
        }
    }

    /// True if a rewrite that scopes `names` to `span` could be observed:
    /// any of them occurs in the unit outside `span`, in any context.
    fn escapes(&self, names: &[String], span: Span) -> bool {
        self.occurrences.occurs_outside(names, span)
    }
}

/// Run every rule over every unit.
///
/// Findings are ordered by source position, then rule priority, with
/// duplicate `(rule_id, location)` pairs removed.
pub fn detect(classification: &Classification<'_>, source: &str) -> Vec<Finding> {
    let lines = LineIndex::new(source);
    let mut findings = Vec::new();

    for unit in &classification.units {
        let ctx = DetectionContext {
            unit,
            lines: &lines,
            occurrences: NameOccurrences::collect(unit.body),
        };
        for site in &unit.loops {
            let mut matched_exclusive = false;
            for descriptor in RULES.iter() {
                let Matcher::Loop(matcher) = descriptor.matcher else {
                    continue;
                };
                if descriptor.exclusive && matched_exclusive {
                    continue;
                }
                if let Some(finding) = matcher(&ctx, site) {
                    matched_exclusive |= descriptor.exclusive;
                    findings.push(finding);
                }
            }
        }
        for descriptor in RULES.iter() {
            if let Matcher::Unit(matcher) = descriptor.matcher {
                findings.extend(matcher(&ctx));
            }
        }
    }

    findings.sort_by_key(|f| (f.location.span.start, rule(f.rule_id).priority));
    let mut seen = HashSet::new();
    findings.retain(|f| seen.insert((f.rule_id, f.location)));
    tracing::debug!(count = findings.len(), "detected findings");
    findings
}

// ============================================================================
// Suggestion helpers
// ============================================================================

fn synthetic(kind: ExprKind) -> Expression {
    Expression::new(kind, Span::empty(0))
}

/// Print a statement as a suggestion, without the trailing newline.
fn suggestion(stmt: &Statement) -> String {
    statement_to_source(stmt).trim_end().to_string()
}

fn single_generator(node: &For) -> Vec<Comprehension> {
    vec![Comprehension {
        target: node.target.clone(),
        iter: node.iter.clone(),
        ifs: Vec::new(),
        is_async: false,
    }]
}

/// A target made only of names (possibly in tuples, lists, or starred).
fn is_name_target(target: &Expression) -> bool {
    match &target.kind {
        ExprKind::Name(_) => true,
        ExprKind::Tuple(items) | ExprKind::List(items) => items.iter().all(is_name_target),
        ExprKind::Starred(inner) => inner.as_name().is_some(),
        _ => false,
    }
}

fn loop_variables(node: &For) -> Vec<String> {
    let mut names = Vec::new();
    target_names(&node.target, &mut names);
    names
}

/// True if a lambda inside `expr` closes over one of `names`.
fn closes_over(expr: &Expression, names: &[String]) -> bool {
    any_expression(expr, |e| {
        matches!(e.kind, ExprKind::Lambda { .. }) && names.iter().any(|n| mentions_name(e, n))
    })
}

// ============================================================================
// Loop rules
// ============================================================================

/// `result = []` followed by `for ...: result.append(expr)`.
pub fn append_in_loop(ctx: &DetectionContext<'_>, site: &LoopSite<'_>) -> Option<Finding> {
    if site.shape.body_kind != BodyKind::AppendCall || site.in_class_body {
        return None;
    }
    let StatementKind::For(node) = &site.stmt.kind else {
        return None;
    };
    if node.is_async || !node.orelse.is_empty() || !is_name_target(&node.target) {
        return None;
    }
    let (result, expr) = append_call(&node.body)?;

    let init = &site.block[site.index.checked_sub(1)?];
    match &init.kind {
        StatementKind::Assign { targets, value }
            if targets.len() == 1 && targets[0].is_name(result) && value.is_empty_list() => {}
        _ => return None,
    }

    if mentions_name(expr, result)
        || mentions_name(&node.iter, result)
        || contains_yield_await_walrus(expr)
        || contains_yield_await_walrus(&node.iter)
    {
        return None;
    }
    let variables = loop_variables(node);
    if variables.iter().any(|v| v == result)
        || closes_over(expr, &variables)
        || ctx.escapes(&variables, site.stmt.span)
    {
        return None;
    }

    let comprehension = synthetic(ExprKind::ListComp {
        elt: Box::new(expr.clone()),
        generators: single_generator(node),
    });
    let replacement = Statement::new(
        StatementKind::Assign {
            targets: vec![Expression::name(result)],
            value: comprehension,
        },
        Span::empty(0),
    );

    let mut finding = ctx.finding(
        RuleId::AppendInLoop,
        init.span.cover(&site.stmt.span),
        format!(
            "`{}` is built by calling append() in a loop; a list comprehension is clearer and faster",
            result
        ),
    );
    finding.suggested_text = Some(suggestion(&replacement));
    finding.auto_applicable = true;
    Some(finding)
}

/// `acc = ""` followed by a loop doing `acc += expr`.
pub fn string_concat_in_loop(ctx: &DetectionContext<'_>, site: &LoopSite<'_>) -> Option<Finding> {
    if site.shape.body_kind != BodyKind::StringConcatAssign {
        return None;
    }
    let (body, for_node) = match &site.stmt.kind {
        StatementKind::For(node) => (&node.body, Some(node)),
        StatementKind::While(node) => (&node.body, None),
        _ => return None,
    };
    let (acc, expr) = string_concat(body)?;
    let init_index = empty_string_initializer(site.block, site.index, acc)?;

    let message = format!(
        "string `{}` is concatenated in a loop, copying it on every step (O(n^2)); use \"\".join(...)",
        acc
    );
    let mut finding = ctx.finding(RuleId::StringConcatInLoop, site.stmt.span, message);

    let Some(node) = for_node else {
        return Some(finding);
    };
    if mentions_name(expr, acc)
        || mentions_name(&node.iter, acc)
        || contains_yield_await_walrus(expr)
        || contains_yield_await_walrus(&node.iter)
        || !is_name_target(&node.target)
    {
        return Some(finding);
    }

    let join = synthetic(ExprKind::Call {
        func: Box::new(synthetic(ExprKind::Attribute {
            value: Box::new(synthetic(ExprKind::Str(vec!["\"\"".to_string()]))),
            attr: "join".to_string(),
        })),
        args: vec![Argument::Positional(synthetic(ExprKind::GeneratorExp {
            elt: Box::new(expr.clone()),
            generators: single_generator(node),
        }))],
    });

    let immediate = init_index + 1 == site.index;
    let (replacement, span) = if immediate {
        let kind = StatementKind::Assign {
            targets: vec![Expression::name(acc)],
            value: join,
        };
        (kind, site.block[init_index].span.cover(&site.stmt.span))
    } else {
        let kind = StatementKind::AugAssign {
            target: Expression::name(acc),
            op: BinaryOp::Add,
            value: join,
        };
        (kind, site.stmt.span)
    };
    finding.location = ctx.location(span);
    finding.suggested_text = Some(suggestion(&Statement::new(replacement, Span::empty(0))));

    let variables = loop_variables(node);
    finding.auto_applicable = node
        .target
        .as_name()
        .is_some_and(|var| is_simple_projection(expr, var))
        && node.orelse.is_empty()
        && !node.is_async
        && !site.in_class_body
        && !closes_over(expr, &variables)
        && !ctx.escapes(&variables, site.stmt.span);
    Some(finding)
}

/// `v`, an attribute chain on `v`, a constant subscript of one of those, or
/// `str(...)` of one of those.
fn is_simple_projection(expr: &Expression, var: &str) -> bool {
    match &expr.kind {
        ExprKind::Call { func, args } if func.is_name("str") => match args.as_slice() {
            [Argument::Positional(inner)] => is_plain_projection(inner, var),
            _ => false,
        },
        _ => is_plain_projection(expr, var),
    }
}

fn is_plain_projection(expr: &Expression, var: &str) -> bool {
    match &expr.kind {
        ExprKind::Name(id) => id == var,
        ExprKind::Attribute { value, .. } => is_plain_projection(value, var),
        ExprKind::Subscript { value, index } => {
            matches!(index.kind, ExprKind::Number(_) | ExprKind::Str(_))
                && is_plain_projection(value, var)
        }
        _ => false,
    }
}

/// `for i in range(len(X))` reading only `X[i]`.
pub fn range_len_indexing(ctx: &DetectionContext<'_>, site: &LoopSite<'_>) -> Option<Finding> {
    if !site.shape.is_counting_loop || site.shape.body_kind != BodyKind::IndexedRead {
        return None;
    }
    let StatementKind::For(node) = &site.stmt.kind else {
        return None;
    };
    let (var, container) = range_len_loop(node)?;
    let path = container.dotted_path()?;

    let generator = UniqueNameGenerator::new(used_names(ctx.unit.params, ctx.unit.body));
    let item = generator.generate(&singular(&path));

    let mut replacer = IndexReplacer {
        var,
        path: &path,
        item: &item,
    };
    let mut rewritten = node.clone();
    rewritten.target = Expression::name(item.as_str());
    rewritten.iter = container.clone();
    rewritten.body = transform_block(&mut replacer, rewritten.body);
    let replacement = Statement::new(StatementKind::For(rewritten), site.stmt.span);

    let mut finding = ctx.finding(
        RuleId::RangeLenIndexing,
        site.stmt.span,
        format!(
            "loop over range(len({path})) only reads {path}[{var}]; iterate over {path} directly (use enumerate() if the index is needed)"
        ),
    );
    finding.suggested_text = Some(suggestion(&replacement));
    Some(finding)
}

/// Replaces `X[i]` with the element name.
struct IndexReplacer<'a> {
    var: &'a str,
    path: &'a str,
    item: &'a str,
}

impl Transformer for IndexReplacer<'_> {
    fn transform_expression(&mut self, node: Expression) -> Expression {
        let is_indexed_read = matches!(
            &node.kind,
            ExprKind::Subscript { value, index }
                if index.is_name(self.var) && value.dotted_path().as_deref() == Some(self.path)
        );
        if is_indexed_read {
            Expression::new(ExprKind::Name(self.item.to_string()), node.span)
        } else {
            node
        }
    }
}

/// Every loop nested two or more deep.
pub fn high_nesting(ctx: &DetectionContext<'_>, site: &LoopSite<'_>) -> Option<Finding> {
    let depth = site.shape.nesting_depth;
    if depth < 2 {
        return None;
    }
    Some(ctx.finding(
        RuleId::HighNesting,
        site.stmt.span,
        format!(
            "loop is nested {} levels deep (about O(n^{}) iterations); consider a lookup table or restructuring",
            depth, depth
        ),
    ))
}

// ============================================================================
// Unit rules
// ============================================================================

pub fn recursion_detected(ctx: &DetectionContext<'_>) -> Vec<Finding> {
    let Some(fact) = ctx.unit.recursion.filter(|r| r.calls_self) else {
        return Vec::new();
    };
    let sites = if fact.self_call_count == 1 {
        "1 call site".to_string()
    } else {
        format!("{} call sites", fact.self_call_count)
    };
    vec![ctx.finding(
        RuleId::RecursionDetected,
        ctx.unit.span,
        format!(
            "function `{}` calls itself ({}); without memoization recursion can grow exponentially",
            ctx.unit.name, sites
        ),
    )]
}

pub fn sort_in_loop(ctx: &DetectionContext<'_>) -> Vec<Finding> {
    ctx.unit
        .sort_calls
        .iter()
        .filter(|call| call.loop_depth > 0)
        .map(|call| {
            ctx.finding(
                RuleId::SortInLoop,
                call.span,
                "sorting inside a loop costs O(n log n) per iteration; sort once outside the loop"
                    .to_string(),
            )
        })
        .collect()
}

pub fn list_membership_in_loop(ctx: &DetectionContext<'_>) -> Vec<Finding> {
    ctx.unit
        .membership_tests
        .iter()
        .map(|test| {
            ctx.finding(
                RuleId::ListMembershipInLoop,
                test.span,
                format!(
                    "membership test against list `{}` inside a loop is O(n) per check; convert it to a set",
                    test.container
                ),
            )
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
