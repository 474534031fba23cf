// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Heuristic time and space complexity estimates per analysis unit.

use std::cmp::Ordering;
use std::fmt;

use pyopt_cst::Span;
use serde::Serialize;

use crate::classifier::{AnalysisUnit, BodyKind, Classification, UnitKind};

// ============================================================================
// ComplexityLabel
// ============================================================================

/// Big-O class of an estimate.
///
/// Known labels are totally ordered from `O(1)` to `O(2^n)`. `Unknown` is
/// incomparable with every other label and absorbs them when combined with
/// [`ComplexityLabel::worst`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ComplexityLabel {
    #[serde(rename = "O(1)")]
    Constant,
    #[serde(rename = "O(log n)")]
    Logarithmic,
    #[serde(rename = "O(n)")]
    Linear,
    #[serde(rename = "O(n log n)")]
    Linearithmic,
    #[serde(rename = "O(n^2)")]
    Quadratic,
    #[serde(rename = "O(2^n)")]
    Exponential,
    Unknown,
}

impl ComplexityLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            ComplexityLabel::Constant => "O(1)",
            ComplexityLabel::Logarithmic => "O(log n)",
            ComplexityLabel::Linear => "O(n)",
            ComplexityLabel::Linearithmic => "O(n log n)",
            ComplexityLabel::Quadratic => "O(n^2)",
            ComplexityLabel::Exponential => "O(2^n)",
            ComplexityLabel::Unknown => "Unknown",
        }
    }

    fn rank(self) -> Option<u8> {
        match self {
            ComplexityLabel::Constant => Some(0),
            ComplexityLabel::Logarithmic => Some(1),
            ComplexityLabel::Linear => Some(2),
            ComplexityLabel::Linearithmic => Some(3),
            ComplexityLabel::Quadratic => Some(4),
            ComplexityLabel::Exponential => Some(5),
            ComplexityLabel::Unknown => None,
        }
    }

    /// The larger of two labels; `Unknown` wins over everything.
    pub fn worst(self, other: ComplexityLabel) -> ComplexityLabel {
        match (self.rank(), other.rank()) {
            (Some(a), Some(b)) => {
                if a >= b {
                    self
                } else {
                    other
                }
            }
            _ => ComplexityLabel::Unknown,
        }
    }
}

impl PartialOrd for ComplexityLabel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.rank(), other.rank()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            (None, None) => Some(Ordering::Equal),
            _ => None,
        }
    }
}

impl fmt::Display for ComplexityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Reports
// ============================================================================

/// Estimate for a single analysis unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitComplexity {
    pub name: String,
    pub kind: UnitKind,
    pub span: Span,
    pub time: ComplexityLabel,
    pub space: ComplexityLabel,
}

/// Overall estimate plus the per-unit breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplexityReport {
    pub time: ComplexityLabel,
    pub space: ComplexityLabel,
    pub units: Vec<UnitComplexity>,
}

impl ComplexityReport {
    /// Look up a unit by name.
    pub fn unit(&self, name: &str) -> Option<&UnitComplexity> {
        self.units.iter().find(|u| u.name == name)
    }
}

/// Estimate every unit and combine them into the overall labels.
pub fn estimate(classification: &Classification<'_>) -> ComplexityReport {
    let units: Vec<UnitComplexity> = classification
        .units
        .iter()
        .map(|unit| UnitComplexity {
            name: unit.name.clone(),
            kind: unit.kind,
            span: unit.span,
            time: unit_time(unit),
            space: unit_space(unit),
        })
        .collect();

    let time = units
        .iter()
        .fold(ComplexityLabel::Constant, |acc, u| acc.worst(u.time));
    let space = units
        .iter()
        .fold(ComplexityLabel::Constant, |acc, u| acc.worst(u.space));
    tracing::debug!(%time, %space, units = units.len(), "estimated complexity");

    ComplexityReport { time, space, units }
}

// ============================================================================
// Estimation rules
// ============================================================================

/// Time estimate for one unit. Rules that disagree resolve to the larger label.
pub fn unit_time(unit: &AnalysisUnit<'_>) -> ComplexityLabel {
    let depth = unit.max_loop_depth();
    let mut label = match depth {
        0 => ComplexityLabel::Constant,
        1 => ComplexityLabel::Linear,
        _ => ComplexityLabel::Quadratic,
    };

    if let Some(fact) = unit.recursion.filter(|r| r.calls_self) {
        let recursive = if depth > 0 {
            ComplexityLabel::Quadratic
        } else if fact.self_call_count >= 2 {
            ComplexityLabel::Exponential
        } else {
            ComplexityLabel::Linear
        };
        label = label.worst(recursive);
    }

    for call in &unit.sort_calls {
        let sort = if call.loop_depth > 0 {
            ComplexityLabel::Quadratic
        } else {
            ComplexityLabel::Linearithmic
        };
        label = label.worst(sort);
    }

    if !unit.unbounded_loops.is_empty() {
        label = label.worst(ComplexityLabel::Unknown);
    }
    label
}

/// Space estimate for one unit.
pub fn unit_space(unit: &AnalysisUnit<'_>) -> ComplexityLabel {
    let grows = unit.loops.iter().any(|l| {
        matches!(
            l.shape.body_kind,
            BodyKind::AppendCall | BodyKind::StringConcatAssign
        )
    });
    if grows || unit.has_comprehension || unit.calls_self() {
        ComplexityLabel::Linear
    } else {
        ComplexityLabel::Constant
    }
}

// ============================================================================
// Tests
// ============================================================================
