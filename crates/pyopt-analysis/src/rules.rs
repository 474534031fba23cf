// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! The rule table.
//!
//! Every detection rule is described once in the immutable [`RULES`] array.
//! Rules with a [`Matcher::Loop`] run once per loop; rules with a
//! [`Matcher::Unit`] run once per analysis unit. Among the exclusive loop
//! rules the first match (in table order) wins.

use std::fmt;

use serde::Serialize;

use crate::classifier::LoopSite;
use crate::detector::{self, DetectionContext, Finding};

// ============================================================================
// Identifiers and policies
// ============================================================================

/// Stable rule identifiers, in table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleId {
    AppendInLoop,
    StringConcatInLoop,
    RangeLenIndexing,
    HighNesting,
    RecursionDetected,
    SortInLoop,
    ListMembershipInLoop,
}

impl RuleId {
    pub const ALL: [RuleId; 7] = [
        RuleId::AppendInLoop,
        RuleId::StringConcatInLoop,
        RuleId::RangeLenIndexing,
        RuleId::HighNesting,
        RuleId::RecursionDetected,
        RuleId::SortInLoop,
        RuleId::ListMembershipInLoop,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RuleId::AppendInLoop => "append-in-loop",
            RuleId::StringConcatInLoop => "string-concat-in-loop",
            RuleId::RangeLenIndexing => "range-len-indexing",
            RuleId::HighNesting => "high-nesting",
            RuleId::RecursionDetected => "recursion-detected",
            RuleId::SortInLoop => "sort-in-loop",
            RuleId::ListMembershipInLoop => "list-membership-in-loop",
        }
    }

    /// Look up a rule by its identifier string.
    pub fn parse(id: &str) -> Option<RuleId> {
        RuleId::ALL.into_iter().find(|rule| rule.as_str() == id)
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
        })
    }
}

/// When a rule's suggestion may be applied by the refactor engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AutoApply {
    /// Applied when no rules are selected explicitly.
    Default,
    /// Applied only when selected.
    OptIn,
    /// Advisory; never applied.
    Never,
}

impl AutoApply {
    pub fn permits_auto_apply(self) -> bool {
        !matches!(self, AutoApply::Never)
    }
}

// ============================================================================
// Descriptors
// ============================================================================

pub type LoopMatcher = fn(&DetectionContext<'_>, &LoopSite<'_>) -> Option<Finding>;
pub type UnitMatcher = fn(&DetectionContext<'_>) -> Vec<Finding>;

#[derive(Clone, Copy)]
pub enum Matcher {
    Loop(LoopMatcher),
    Unit(UnitMatcher),
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Loop(_) => f.write_str("Matcher::Loop"),
            Matcher::Unit(_) => f.write_str("Matcher::Unit"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RuleDescriptor {
    pub id: RuleId,
    /// Tie-breaker when findings start at the same offset (lower first).
    pub priority: u8,
    pub severity: Severity,
    pub auto_apply: AutoApply,
    /// Loop rule in the first-match-wins group.
    pub exclusive: bool,
    pub summary: &'static str,
    #[serde(skip)]
    pub matcher: Matcher,
}

pub static RULES: [RuleDescriptor; 7] = [
    RuleDescriptor {
        id: RuleId::AppendInLoop,
        priority: 1,
        severity: Severity::Info,
        auto_apply: AutoApply::Default,
        exclusive: true,
        summary: "list built with append() in a loop; use a list comprehension",
        matcher: Matcher::Loop(detector::append_in_loop),
    },
    RuleDescriptor {
        id: RuleId::StringConcatInLoop,
        priority: 2,
        severity: Severity::Warning,
        auto_apply: AutoApply::OptIn,
        exclusive: true,
        summary: "string built with += in a loop; use str.join()",
        matcher: Matcher::Loop(detector::string_concat_in_loop),
    },
    RuleDescriptor {
        id: RuleId::RangeLenIndexing,
        priority: 3,
        severity: Severity::Info,
        auto_apply: AutoApply::Never,
        exclusive: true,
        summary: "range(len(x)) loop that only reads x[i]; iterate x directly",
        matcher: Matcher::Loop(detector::range_len_indexing),
    },
    RuleDescriptor {
        id: RuleId::HighNesting,
        priority: 4,
        severity: Severity::Warning,
        auto_apply: AutoApply::Never,
        exclusive: false,
        summary: "loop nested two or more levels deep",
        matcher: Matcher::Loop(detector::high_nesting),
    },
    RuleDescriptor {
        id: RuleId::RecursionDetected,
        priority: 5,
        severity: Severity::Info,
        auto_apply: AutoApply::Never,
        exclusive: false,
        summary: "function calls itself",
        matcher: Matcher::Unit(detector::recursion_detected),
    },
    RuleDescriptor {
        id: RuleId::SortInLoop,
        priority: 6,
        severity: Severity::Warning,
        auto_apply: AutoApply::Never,
        exclusive: false,
        summary: "sorted() or .sort() called inside a loop",
        matcher: Matcher::Unit(detector::sort_in_loop),
    },
    RuleDescriptor {
        id: RuleId::ListMembershipInLoop,
        priority: 7,
        severity: Severity::Info,
        auto_apply: AutoApply::Never,
        exclusive: false,
        summary: "membership test against a list inside a loop; use a set",
        matcher: Matcher::Unit(detector::list_membership_in_loop),
    },
];

/// The full rule table.
pub fn rules() -> &'static [RuleDescriptor] {
    &RULES
}

/// The descriptor for `id`.
pub fn rule(id: RuleId) -> &'static RuleDescriptor {
    &RULES[id.index()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_indexed_by_rule_id() {
        for (i, descriptor) in RULES.iter().enumerate() {
            assert_eq!(descriptor.id.index(), i);
            assert_eq!(rule(descriptor.id).id, descriptor.id);
        }
    }

    #[test]
    fn priorities_are_unique_and_ordered() {
        let priorities: Vec<u8> = RULES.iter().map(|r| r.priority).collect();
        let mut sorted = priorities.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(priorities, sorted);
    }

    #[test]
    fn parse_round_trips_identifiers() {
        for id in RuleId::ALL {
            assert_eq!(RuleId::parse(id.as_str()), Some(id));
        }
        assert_eq!(RuleId::parse("no-such-rule"), None);
    }

    #[test]
    fn only_append_in_loop_applies_by_default() {
        let defaults: Vec<RuleId> = RULES
            .iter()
            .filter(|r| r.auto_apply == AutoApply::Default)
            .map(|r| r.id)
            .collect();
        assert_eq!(defaults, vec![RuleId::AppendInLoop]);
        assert!(!rule(RuleId::RangeLenIndexing).auto_apply.permits_auto_apply());
        assert!(rule(RuleId::StringConcatInLoop).auto_apply.permits_auto_apply());
    }

    #[test]
    fn serializes_kebab_case_identifiers() {
        let json = serde_json::to_value(rule(RuleId::StringConcatInLoop)).unwrap();
        assert_eq!(json["id"], "string-concat-in-loop");
        assert_eq!(json["severity"], "warning");
        assert_eq!(json["auto_apply"], "opt-in");
        assert!(json.get("matcher").is_none());
    }
}
