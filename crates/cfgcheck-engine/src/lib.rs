//! # cfgcheck-engine
//!
//! Validation engine for configuration-group constraint rules.
//!
//! This crate consumes the AST produced by [`cfgcheck_rules`] and applies
//! it to a sequence of configuration groups extracted from device logs.
//!
//! ## Architecture
//!
//! - **Single-group constraints** run against every group independently:
//!   `when`-gated value allow/forbid lists and allowed field combinations.
//! - **Multi-group constraints** run against role assignments: sliding
//!   windows of consecutive groups, or associative matches joined on
//!   shared field values (a hash equi-join, never a cross product).
//! - **`validate` expressions** evaluate over an assignment with no
//!   truthiness and no escape hatches; failures degrade to
//!   `evaluation_error` violations inside the report.
//!
//! ## Quick Start
//!
//! ```rust
//! use cfgcheck_rules::parse_rules_yaml;
//! use cfgcheck_engine::{groups_from_json, validate_with_store};
//!
//! let store = parse_rules_yaml(r#"
//! version: 1.0.0_20240601
//! single_constraints:
//!   - name: debug-level-range
//!     when:
//!       opSch.systemMode: "1"
//!     only_allow:
//!       opSch.debugLevel: ["0", "1", "2"]
//! "#).unwrap();
//!
//! let groups = groups_from_json(r#"[
//!     {"opSch": {"systemMode": "1", "debugLevel": "7"}}
//! ]"#).unwrap();
//!
//! let report = validate_with_store(&groups, &store, None).unwrap();
//! assert!(!report.passed);
//! assert_eq!(report.violations[0].rule, "debug-level-range");
//! ```

mod assignment;
mod associate;
mod checks;
mod error;
mod eval;
mod group;
mod report;
mod validator;
mod window;

pub use assignment::RoleAssignment;
pub use associate::assignments;
pub use error::{EngineError, EvalFailure, Result};
pub use eval::{evaluate, Value};
pub use group::{groups_from_json, Group};
pub use report::{Report, RoleBinding, Violation, ViolationKind};
pub use validator::{validate, validate_with_store};
pub use window::windows;
