// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Complexity estimation, anti-pattern detection and safe refactors.
//!
//! The pipeline is: parse, [`classifier::classify`], then
//! [`complexity::estimate`] and [`detector::detect`] over the same
//! classification. [`refactor`] additionally splices the selected suggestions
//! into the tree and serializes it.
//!
//! ```
//! let report = pyopt_analysis::analyze(
//!     "result = []\nfor x in range(10):\n    result.append(x * x)\n",
//! )
//! .expect("parse error");
//! assert_eq!(report.findings[0].rule_id.as_str(), "append-in-loop");
//! assert_eq!(report.complexity.time.as_str(), "O(n)");
//! ```

pub mod classifier;
pub mod complexity;
pub mod detector;
pub mod formatter;
pub mod names;
pub mod refactor;
pub mod rules;

use std::collections::BTreeSet;

use pyopt_cst::{module_to_source, parse_module, ParseError};
use serde::Serialize;

pub use complexity::{ComplexityLabel, ComplexityReport, UnitComplexity};
pub use detector::{Finding, Location};
pub use formatter::{
    format_best_effort, ExternalFormatter, FormatterConfig, FormatterError, SourceFormatter,
};
pub use refactor::{RefactorApplicationError, RefactorEngine, RefactorResult, SkippedRewrite};
pub use rules::{rule, rules, AutoApply, RuleDescriptor, RuleId, Severity};

/// Result of [`analyze`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub complexity: ComplexityReport,
    pub findings: Vec<Finding>,
}

/// Estimate complexity and detect anti-patterns in `source`.
#[tracing::instrument(skip(source), fields(len = source.len()))]
pub fn analyze(source: &str) -> Result<AnalysisReport, ParseError> {
    let module = parse_module(source)?;
    let classification = classifier::classify(&module);
    let complexity = complexity::estimate(&classification);
    let findings = detector::detect(&classification, source);
    tracing::debug!(findings = findings.len(), "analysis complete");
    Ok(AnalysisReport {
        complexity,
        findings,
    })
}

/// Apply the selected rules' suggestions to `source`.
///
/// `selected` names rules by identifier; `None` selects the rules whose
/// policy is [`AutoApply::Default`]. With `use_formatter`, an external
/// formatter is discovered on PATH and run best effort.
pub fn refactor(
    source: &str,
    selected: Option<&[&str]>,
    use_formatter: bool,
) -> Result<RefactorResult, ParseError> {
    let formatter = if use_formatter {
        match ExternalFormatter::discover(&FormatterConfig::default()) {
            Ok(formatter) => Some(formatter),
            Err(err) => {
                tracing::warn!(error = %err, "no formatter available");
                None
            }
        }
    } else {
        None
    };
    refactor_with_formatter(
        source,
        selected,
        formatter.as_ref().map(|f| f as &dyn SourceFormatter),
    )
}

/// [`refactor`] with an explicit formatter.
#[tracing::instrument(skip(source, formatter), fields(len = source.len()))]
pub fn refactor_with_formatter(
    source: &str,
    selected: Option<&[&str]>,
    formatter: Option<&dyn SourceFormatter>,
) -> Result<RefactorResult, ParseError> {
    let apply_only = selected_rules(selected);
    let module = parse_module(source)?;
    let findings = detector::detect(&classifier::classify(&module), source);
    let applied = RefactorEngine::apply(&module, &findings, &apply_only);

    if applied.applied_rule_ids.is_empty() {
        return Ok(RefactorResult {
            original_text: source.to_string(),
            rewritten_text: source.to_string(),
            applied_rule_ids: applied.applied_rule_ids,
            formatted: false,
            skipped: applied.skipped,
        });
    }

    let serialized = module_to_source(&applied.tree);
    let (rewritten_text, formatted) = match formatter {
        Some(formatter) => format_best_effort(formatter, &serialized),
        None => (serialized, false),
    };
    tracing::info!(
        applied = ?applied.applied_rule_ids,
        formatted,
        "refactored source"
    );

    Ok(RefactorResult {
        original_text: source.to_string(),
        rewritten_text,
        applied_rule_ids: applied.applied_rule_ids,
        formatted,
        skipped: applied.skipped,
    })
}

fn selected_rules(selected: Option<&[&str]>) -> BTreeSet<RuleId> {
    match selected {
        None => rules()
            .iter()
            .filter(|r| r.auto_apply == AutoApply::Default)
            .map(|r| r.id)
            .collect(),
        Some(ids) => ids
            .iter()
            .filter_map(|id| {
                let parsed = RuleId::parse(id);
                if parsed.is_none() {
                    tracing::warn!(rule = *id, "ignoring unknown rule id");
                }
                parsed
            })
            .collect(),
    }
}
