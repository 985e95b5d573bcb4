//! Validation report types.
//!
//! A report is the complete outcome of one run: the rule-set version it
//! was produced under, every violation found, and a per-kind summary.
//! Reports serialize to JSON for downstream tooling.

use std::collections::BTreeMap;

use serde::Serialize;

/// What kind of constraint (or failure) a violation records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    OnlyAllow,
    Forbid,
    Combinations,
    SameValue,
    Sequence,
    Conditional,
    Validate,
    /// A `validate` expression could not be evaluated for this assignment.
    EvaluationError,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::OnlyAllow => "only_allow",
            ViolationKind::Forbid => "forbid",
            ViolationKind::Combinations => "combinations",
            ViolationKind::SameValue => "same_value",
            ViolationKind::Sequence => "sequence",
            ViolationKind::Conditional => "conditional",
            ViolationKind::Validate => "validate",
            ViolationKind::EvaluationError => "evaluation_error",
        }
    }
}

/// One role → group-index binding of a violation's assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleBinding {
    pub role: String,
    /// Zero-based index of the bound group in the input sequence.
    pub group: usize,
}

/// A single constraint violation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub kind: ViolationKind,
    /// Name of the violated constraint.
    pub rule: String,
    /// The groups involved, with their role names.
    pub roles: Vec<RoleBinding>,
    /// The offending field, when the check targets one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Observed values relevant to the failure, in role order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub observed: Vec<String>,
    /// The allowed or forbidden values the check declared, when it has a
    /// value list (only_allow, forbid, conditional).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub expected: Vec<String>,
    /// Human-readable explanation.
    pub message: String,
}

/// The outcome of validating a group sequence against one rule set.
#[derive(Debug, Serialize)]
pub struct Report {
    /// The rule-set version the run used.
    pub version: String,
    /// Number of groups in the validated sequence.
    pub group_count: usize,
    pub passed: bool,
    pub violations: Vec<Violation>,
    /// Violation counts keyed by kind.
    pub summary: BTreeMap<String, usize>,
}

impl Report {
    pub fn new(version: String, group_count: usize, violations: Vec<Violation>) -> Self {
        let mut summary = BTreeMap::new();
        for v in &violations {
            *summary.entry(v.kind.as_str().to_string()).or_insert(0) += 1;
        }
        Report {
            version,
            group_count,
            passed: violations.is_empty(),
            violations,
            summary,
        }
    }
}
