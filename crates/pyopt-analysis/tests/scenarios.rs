// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! End-to-end scenarios through the public `analyze` and `refactor` API.

use pyopt_analysis::{
    analyze, refactor, refactor_with_formatter, ComplexityLabel, Finding, FormatterError, RuleId,
    SourceFormatter,
};

fn ids(findings: &[Finding]) -> Vec<RuleId> {
    findings.iter().map(|f| f.rule_id).collect()
}

// =============================================================================
// Analysis
// =============================================================================

#[test]
fn append_loop_is_detected_and_rewritten() {
    let source = "result = []\nfor x in range(10):\n    result.append(x * x)\n";
    let report = analyze(source).unwrap();
    assert_eq!(ids(&report.findings), vec![RuleId::AppendInLoop]);
    assert_eq!(report.complexity.time, ComplexityLabel::Linear);
    assert_eq!(report.complexity.space, ComplexityLabel::Linear);

    let result = refactor(source, None, false).unwrap();
    assert_eq!(result.rewritten_text, "result = [x * x for x in range(10)]\n");
    assert!(result.applied_rule_ids.contains(&RuleId::AppendInLoop));
    assert!(!result.formatted);
    assert!(result.skipped.is_empty());
}

#[test]
fn string_concat_applies_only_when_selected() {
    let source = "s = \"\"\nfor w in [\"a\", \"b\", \"c\"]:\n    s += w\n";
    let report = analyze(source).unwrap();
    assert_eq!(ids(&report.findings), vec![RuleId::StringConcatInLoop]);
    assert!(report.findings[0].auto_applicable);

    let unchanged = refactor(source, None, false).unwrap();
    assert_eq!(unchanged.rewritten_text, source);
    assert!(unchanged.applied_rule_ids.is_empty());

    let applied = refactor(source, Some(&["string-concat-in-loop"]), false).unwrap();
    assert_eq!(
        applied.rewritten_text,
        "s = \"\".join(w for w in [\"a\", \"b\", \"c\"])\n"
    );
}

#[test]
fn range_len_indexing_is_advisory() {
    let source = "arr = [10, 20, 30]\nfor i in range(len(arr)):\n    print(arr[i])\n";
    let report = analyze(source).unwrap();
    assert_eq!(ids(&report.findings), vec![RuleId::RangeLenIndexing]);
    let finding = &report.findings[0];
    assert!(!finding.auto_applicable);
    assert_eq!(
        finding.suggested_text.as_deref(),
        Some("for arr_item in arr:\n    print(arr_item)")
    );
    assert_eq!(report.complexity.time, ComplexityLabel::Linear);

    let result = refactor(source, Some(&["range-len-indexing"]), false).unwrap();
    assert_eq!(result.rewritten_text, source);
}

#[test]
fn nested_loops_are_flagged_but_not_rewritten() {
    let source = "for i in range(3):\n    for j in range(3):\n        print(i, j)\n";
    let report = analyze(source).unwrap();
    assert_eq!(ids(&report.findings), vec![RuleId::HighNesting]);
    assert_eq!(report.findings[0].location.line, 2);
    assert_eq!(report.complexity.time, ComplexityLabel::Quadratic);
    assert!(report.findings.iter().all(|f| !f.auto_applicable));
}

#[test]
fn unbalanced_syntax_reports_position() {
    let err = analyze("x = (1,\ny = 2\n").unwrap_err();
    assert!(err.line >= 1);
    assert!(err.column >= 1);
    assert!(!err.message.is_empty());
    assert!(refactor("for x in range(10:\n    pass\n", None, false).is_err());
}

#[test]
fn double_recursion_is_exponential() {
    let source = "def fib(n):\n    if n < 2:\n        return n\n    return fib(n - 1) + fib(n - 2)\n";
    let report = analyze(source).unwrap();
    assert_eq!(ids(&report.findings), vec![RuleId::RecursionDetected]);
    assert_eq!(report.complexity.time, ComplexityLabel::Exponential);
    assert_eq!(report.complexity.unit("fib").unwrap().space, ComplexityLabel::Linear);
}

#[test]
fn sort_and_list_membership_inside_loops() {
    let source = "seen = []\nfor x in xs:\n    if x in seen:\n        continue\n    ys = sorted(xs)\n";
    let report = analyze(source).unwrap();
    let found = ids(&report.findings);
    assert!(found.contains(&RuleId::ListMembershipInLoop), "{:?}", found);
    assert!(found.contains(&RuleId::SortInLoop), "{:?}", found);
    assert_eq!(report.complexity.time, ComplexityLabel::Quadratic);
}

// =============================================================================
// Refactoring
// =============================================================================

#[test]
fn refactor_is_idempotent() {
    let source = "def squares(xs):\n    out = []\n    for x in xs:\n        out.append(x * x)\n    return out\n";
    let first = refactor(source, None, false).unwrap();
    assert!(first.changed());

    let report = analyze(&first.rewritten_text).unwrap();
    assert!(!ids(&report.findings).contains(&RuleId::AppendInLoop));

    let second = refactor(&first.rewritten_text, None, false).unwrap();
    assert!(!second.changed());
}

#[test]
fn append_not_suggested_with_loop_control() {
    for source in [
        "r = []\nfor x in xs:\n    r.append(x)\n    break\n",
        "r = []\nfor x in xs:\n    if x:\n        continue\n    r.append(x)\n",
        "r = []\nfor x in xs:\n    r.append(x)\n    print(x)\n",
    ] {
        let report = analyze(source).unwrap();
        assert!(
            !ids(&report.findings).contains(&RuleId::AppendInLoop),
            "{}",
            source
        );
        assert_eq!(refactor(source, None, false).unwrap().rewritten_text, source);
    }
}

#[test]
fn append_not_rewritten_when_loop_variable_outlives_the_loop() {
    for source in [
        "result = []\nfor x in xs:\n    result.append(x)\ndel x\n",
        "def f(xs):\n    global x\n    r = []\n    for x in xs:\n        r.append(x)\n    return r\n",
        "r = []\nfor x in xs:\n    r.append(lambda: x)\nx = 99\n",
    ] {
        let result = refactor(source, None, false).unwrap();
        assert_eq!(result.rewritten_text, source);
        assert!(result.applied_rule_ids.is_empty(), "{}", source);
    }
}

#[test]
fn statements_outside_the_rewrite_keep_their_meaning() {
    let source = "import math\nresult = []\nfor x in xs:\n    result.append(math.sqrt(x))\nprint(result)\n";
    let result = refactor(source, None, false).unwrap();
    assert_eq!(
        result.rewritten_text,
        "import math\nresult = [math.sqrt(x) for x in xs]\nprint(result)\n"
    );
}

// =============================================================================
// Formatting
// =============================================================================

struct Uppercase;

impl SourceFormatter for Uppercase {
    fn name(&self) -> &str {
        "uppercase"
    }

    fn format(&self, text: &str) -> Result<String, FormatterError> {
        Ok(text.replace("result", "RESULT"))
    }
}

struct Failing;

impl SourceFormatter for Failing {
    fn name(&self) -> &str {
        "failing"
    }

    fn format(&self, _text: &str) -> Result<String, FormatterError> {
        Err(FormatterError::Timeout {
            timeout: std::time::Duration::from_millis(1),
        })
    }
}

#[test]
fn formatter_output_is_used_when_it_parses() {
    let source = "result = []\nfor x in xs:\n    result.append(x)\n";
    let result = refactor_with_formatter(source, None, Some(&Uppercase)).unwrap();
    assert_eq!(result.rewritten_text, "RESULT = [x for x in xs]\n");
    assert!(result.formatted);
}

#[test]
fn formatter_failure_keeps_the_rewrite() {
    let source = "result = []\nfor x in xs:\n    result.append(x)\n";
    let result = refactor_with_formatter(source, None, Some(&Failing)).unwrap();
    assert_eq!(result.rewritten_text, "result = [x for x in xs]\n");
    assert!(!result.formatted);
}

#[test]
fn formatter_is_not_run_when_nothing_changes() {
    let source = "x = 1\n";
    let result = refactor_with_formatter(source, None, Some(&Uppercase)).unwrap();
    assert_eq!(result.rewritten_text, source);
    assert!(!result.formatted);
}
