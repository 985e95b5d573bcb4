//! Parser and AST for versioned configuration-constraint rule sets.
//!
//! Rule sets are YAML documents describing constraints over configuration
//! groups extracted from device logs: single-group value restrictions,
//! sliding-window relationships between consecutive groups, and associative
//! relationships between groups matched by role and linked field values.
//! Each rule set carries a version id (`1.2.0_20240601`); a [`RuleStore`]
//! holds every loaded version and resolves the active one.
//!
//! All configuration defects surface at load time: unknown check types,
//! ambiguous enforcement modes, unlinked associative roles, and malformed
//! `validate` expressions are rejected before any group is evaluated.
//!
//! # Example
//!
//! ```
//! use cfgcheck_rules::parse_rules_yaml;
//!
//! let yaml = r#"
//! version: 1.0.0_20240601
//! single_constraints:
//!   - name: debug-level-range
//!     when:
//!       opSch.systemMode: "1"
//!     only_allow:
//!       opSch.debugLevel: ["0", "1", "2"]
//! "#;
//!
//! let store = parse_rules_yaml(yaml).unwrap();
//! let rules = store.latest().unwrap();
//! assert_eq!(rules.single_constraints.len(), 1);
//! ```
//!
//! The `validate` expression language is deliberately restricted: literals,
//! role-qualified field paths, comparisons, boolean connectives, and basic
//! arithmetic. Anything else (calls, indexing, assignment) fails at parse
//! time; see [`parse_expr`].

mod ast;
mod error;
mod expr;
mod parser;
mod version;

pub use ast::{
    AssociateBy, Check, Combination, Condition, ConditionalMode, EnforcementMode, FieldValues,
    Link, MultiConstraint, Predicate, RoleFields, RoleRef, RoleSpec, RuleSet, SequenceOrder,
    SingleConstraint, Topology, ValidateExpr,
};
pub use error::{Result, RuleParseError};
pub use expr::{parse_expr, BinaryOp, Expr, UnaryOp};
pub use parser::{parse_rules_directory, parse_rules_file, parse_rules_yaml};
pub use version::{RuleStore, VersionId};
