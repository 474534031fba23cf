// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Applying finding suggestions to a syntax tree.
//!
//! Candidate replacements are validated against the original tree, then
//! spliced in a single transform pass. A replacement that cannot be applied
//! is skipped and reported; it never fails the whole request.

use std::collections::BTreeSet;

use pyopt_cst::visitor::{transform_module, Transform, Transformer};
use pyopt_cst::{parse_statements, Module, Span, Statement};
use serde::Serialize;
use thiserror::Error;

use crate::detector::{Finding, Location};
use crate::rules::{rule, RuleId};

// ============================================================================
// Errors and results
// ============================================================================

/// Why a single replacement was not applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefactorApplicationError {
    /// The replacement overlaps one that was already accepted.
    #[error("overlaps another rewrite at {}..{}", span.start, span.end)]
    Overlap { span: Span },

    /// The suggested text does not parse as statements.
    #[error("suggested text is not valid: {message}")]
    InvalidSuggestion { message: String },

    /// No run of sibling statements covers exactly the finding's span.
    #[error("no statements cover {}..{}", span.start, span.end)]
    TargetNotFound { span: Span },
}

/// A finding that was selected but not applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRewrite {
    pub rule_id: RuleId,
    pub location: Location,
    pub reason: String,
}

impl SkippedRewrite {
    fn new(finding: &Finding, err: RefactorApplicationError) -> Self {
        tracing::debug!(rule = %finding.rule_id, reason = %err, "skipped rewrite");
        SkippedRewrite {
            rule_id: finding.rule_id,
            location: finding.location,
            reason: err.to_string(),
        }
    }
}

/// Outcome of the public `refactor` entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefactorResult {
    pub original_text: String,
    pub rewritten_text: String,
    pub applied_rule_ids: BTreeSet<RuleId>,
    /// The rewritten text went through an external formatter.
    pub formatted: bool,
    pub skipped: Vec<SkippedRewrite>,
}

impl RefactorResult {
    pub fn changed(&self) -> bool {
        self.original_text != self.rewritten_text
    }
}

/// The tree produced by [`RefactorEngine::apply`].
#[derive(Debug, Clone)]
pub struct AppliedRefactor {
    pub tree: Module,
    pub applied_rule_ids: BTreeSet<RuleId>,
    pub skipped: Vec<SkippedRewrite>,
}

// ============================================================================
// Engine
// ============================================================================

struct Replacement {
    span: Span,
    statements: Vec<Statement>,
}

pub struct RefactorEngine;

impl RefactorEngine {
    /// Apply every eligible finding whose rule is in `apply_only`.
    ///
    /// Eligible findings are auto-applicable, carry a suggestion, and belong
    /// to a rule whose policy allows auto-apply. Later findings are
    /// considered first, so an overlap keeps the replacement nearer the end.
    pub fn apply(tree: &Module, findings: &[Finding], apply_only: &BTreeSet<RuleId>) -> AppliedRefactor {
        let mut candidates: Vec<&Finding> = findings
            .iter()
            .filter(|f| apply_only.contains(&f.rule_id))
            .filter(|f| rule(f.rule_id).auto_apply.permits_auto_apply())
            .filter(|f| f.auto_applicable && f.suggested_text.is_some())
            .collect();
        candidates.sort_by(|a, b| {
            b.location
                .span
                .start
                .cmp(&a.location.span.start)
                .then(rule(a.rule_id).priority.cmp(&rule(b.rule_id).priority))
        });

        let mut accepted: Vec<Replacement> = Vec::new();
        let mut applied_rule_ids = BTreeSet::new();
        let mut skipped = Vec::new();

        for finding in candidates {
            match Self::prepare(tree, finding, &accepted) {
                Ok(replacement) => {
                    applied_rule_ids.insert(finding.rule_id);
                    accepted.push(replacement);
                }
                Err(err) => skipped.push(SkippedRewrite::new(finding, err)),
            }
        }

        let tree = if accepted.is_empty() {
            tree.clone()
        } else {
            let mut splicer = Splicer {
                replacements: accepted,
            };
            transform_module(&mut splicer, tree.clone())
        };
        tracing::debug!(
            applied = applied_rule_ids.len(),
            skipped = skipped.len(),
            "applied rewrites"
        );

        AppliedRefactor {
            tree,
            applied_rule_ids,
            skipped,
        }
    }

    fn prepare(
        tree: &Module,
        finding: &Finding,
        accepted: &[Replacement],
    ) -> Result<Replacement, RefactorApplicationError> {
        let span = finding.location.span;
        if accepted.iter().any(|r| r.span.overlaps(&span)) {
            return Err(RefactorApplicationError::Overlap { span });
        }

        let text = finding.suggested_text.as_deref().unwrap_or_default();
        let statements =
            parse_statements(text).map_err(|e| RefactorApplicationError::InvalidSuggestion {
                message: e.to_string(),
            })?;
        if statements.is_empty() {
            return Err(RefactorApplicationError::InvalidSuggestion {
                message: "empty replacement".to_string(),
            });
        }

        if !covers_exactly(&tree.body, span) {
            return Err(RefactorApplicationError::TargetNotFound { span });
        }
        Ok(Replacement { span, statements })
    }
}

/// True if some block holds a contiguous run of statements starting at
/// `span.start` and ending at `span.end`.
fn covers_exactly(block: &[Statement], span: Span) -> bool {
    if let Some(first) = block.iter().position(|s| s.span.start == span.start) {
        let run_ends_at_span = block[first..]
            .iter()
            .take_while(|s| s.span.start < span.end)
            .last()
            .is_some_and(|last| last.span.end == span.end);
        if run_ends_at_span {
            return true;
        }
    }
    block
        .iter()
        .filter(|s| s.span.contains(&span))
        .flat_map(|s| s.blocks())
        .any(|inner| covers_exactly(inner, span))
}

/// Replaces each covered run: the first statement becomes the replacement,
/// the rest of the run is removed.
struct Splicer {
    replacements: Vec<Replacement>,
}

impl Transformer for Splicer {
    fn transform_statement(&mut self, node: Statement) -> Transform<Statement> {
        let Some(index) = self
            .replacements
            .iter()
            .position(|r| r.span.contains(&node.span))
        else {
            return Transform::Keep(node);
        };
        if node.span.start == self.replacements[index].span.start {
            let statements = std::mem::take(&mut self.replacements[index].statements);
            Transform::Flatten(statements)
        } else {
            Transform::Remove
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
