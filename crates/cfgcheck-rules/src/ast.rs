//! AST types for rule sets: single-group constraints, multi-group
//! constraints, topologies, and check bodies.
//!
//! Every rule kind is a closed tagged variant carrying only the fields its
//! semantics require; the engine never probes for optional keys at
//! evaluation time.

use std::fmt;

use serde::Serialize;

use crate::expr::Expr;
use crate::version::VersionId;

// =============================================================================
// Predicates
// =============================================================================

/// A field predicate used by `when` gates and associative `where` filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// Exact string-normalized equality.
    Equals(String),
    /// `"*"` in YAML: the field must be present, any value.
    Present,
}

impl Predicate {
    pub fn from_value(s: &str) -> Self {
        if s == "*" {
            Predicate::Present
        } else {
            Predicate::Equals(s.to_string())
        }
    }

    /// Test the predicate against a field lookup result.
    pub fn matches(&self, actual: Option<&str>) -> bool {
        match self {
            Predicate::Present => actual.is_some(),
            Predicate::Equals(expected) => actual == Some(expected.as_str()),
        }
    }
}

/// One field → predicate entry of a `when`/`where` clause (all must match).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Condition {
    pub field: String,
    pub predicate: Predicate,
}

// =============================================================================
// Single-group constraints
// =============================================================================

/// Allowed or forbidden values for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldValues {
    pub field: String,
    pub values: Vec<String>,
}

/// The enforcement mode of a single-group constraint (exactly one per rule).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementMode {
    /// Each listed field, when present, must hold one of its allowed values.
    OnlyAllow(Vec<FieldValues>),
    /// Each listed field, when present, must not hold a forbidden value.
    Forbid(Vec<FieldValues>),
    /// The full field tuple must equal one of the allowed combinations.
    OnlyAllowCombinations(Vec<Vec<(String, String)>>),
}

/// A constraint applied independently to every group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SingleConstraint {
    pub name: String,
    pub description: Option<String>,
    /// Gate: the constraint applies only to groups matching all conditions.
    pub when: Vec<Condition>,
    pub mode: EnforcementMode,
}

// =============================================================================
// Multi-group constraints
// =============================================================================

/// How role assignments are produced for a multi-group constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// Sliding window of N consecutive groups, roles `group0..group{N-1}`.
    Window { group_count: usize },
    /// Predicate-filtered roles joined on shared field values.
    Associative(AssociateBy),
}

/// Associative topology: role definitions plus equality links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssociateBy {
    /// Up to three roles named `src1..src3`, in declared order.
    pub roles: Vec<RoleSpec>,
    pub links: Vec<Link>,
}

/// One associative role: a name and its candidate filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleSpec {
    pub name: String,
    #[serde(rename = "where")]
    pub where_: Vec<Condition>,
}

/// An equality join between two roles over one or more field pairs.
///
/// `left_fields[i]` of the left role's group must equal `right_fields[i]`
/// of the right role's group; the field lists have equal length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub left_role: String,
    pub left_fields: Vec<String>,
    pub right_role: String,
    pub right_fields: Vec<String>,
}

/// A reference to a role inside a check body.
///
/// Rule files may use positional indices (`0` → `group0`) for window
/// constraints or role names (`src1`) for associative ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleRef {
    Named(String),
    Positional(usize),
}

impl RoleRef {
    /// The role-assignment key this reference resolves to.
    pub fn role_name(&self) -> String {
        match self {
            RoleRef::Named(name) => name.clone(),
            RoleRef::Positional(i) => format!("group{i}"),
        }
    }
}

impl fmt::Display for RoleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoleRef::Named(name) => write!(f, "{name}"),
            RoleRef::Positional(i) => write!(f, "group{i}"),
        }
    }
}

/// Declared ordering for a `sequence` check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SequenceOrder {
    Increasing,
    Decreasing,
}

impl SequenceOrder {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "increasing" => Some(SequenceOrder::Increasing),
            "decreasing" => Some(SequenceOrder::Decreasing),
            _ => None,
        }
    }
}

/// The consequence side of a `conditional` check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionalMode {
    OnlyAllow(Vec<String>),
    Forbid(Vec<String>),
}

/// One allowed combination: per-role field/value tuples, in role order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Combination {
    pub roles: Vec<RoleFields>,
}

/// Field/value expectations for one role within a [`Combination`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleFields {
    pub role: String,
    pub fields: Vec<(String, String)>,
}

/// A `validate` expression with its source text and failure message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidateExpr {
    pub source: String,
    pub expr: Expr,
    pub message: String,
}

/// One check within a multi-group constraint body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Check {
    /// The field must hold the same value across the listed roles
    /// (all roles when `roles` is empty).
    SameValue { field: String, roles: Vec<RoleRef> },
    /// The field's numeric values must be strictly monotonic across the
    /// listed roles in order (all roles when `roles` is empty).
    Sequence {
        field: String,
        order: SequenceOrder,
        roles: Vec<RoleRef>,
    },
    /// When `when_role.when_field == when_value`, `then_role.then_field`
    /// must satisfy the allow/forbid list.
    Conditional {
        when_role: RoleRef,
        when_field: String,
        when_value: String,
        then_role: RoleRef,
        then_field: String,
        mode: ConditionalMode,
    },
    /// The actual per-role field tuple must equal one allowed combination.
    Combinations { allow: Vec<Combination> },
    /// Boolean expressions over the role assignment; false or an
    /// evaluation error is a violation.
    Validate { exprs: Vec<ValidateExpr> },
}

/// A constraint over several (window-adjacent or associated) groups.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiConstraint {
    pub name: String,
    pub description: Option<String>,
    pub topology: Topology,
    pub checks: Vec<Check>,
}

// =============================================================================
// Rule set
// =============================================================================

/// One versioned, immutable rule set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleSet {
    pub version: VersionId,
    pub single_constraints: Vec<SingleConstraint>,
    pub multi_constraints: Vec<MultiConstraint>,
}

impl RuleSet {
    /// An empty rule set under the given version.
    pub fn empty(version: VersionId) -> Self {
        RuleSet {
            version,
            single_constraints: Vec::new(),
            multi_constraints: Vec::new(),
        }
    }

    /// Total number of constraints.
    pub fn len(&self) -> usize {
        self.single_constraints.len() + self.multi_constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
