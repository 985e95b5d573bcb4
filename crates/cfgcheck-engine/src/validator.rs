//! Top-level validation runs.

use cfgcheck_rules::{RuleSet, RuleStore, Topology};

use crate::associate;
use crate::checks::{check_assignment, check_single};
use crate::error::Result;
use crate::group::Group;
use crate::report::Report;
use crate::window::windows;

/// Validate a group sequence against one rule set.
///
/// Constraints run in declaration order: single-group constraints against
/// every group, then multi-group constraints against every assignment
/// their topology produces. Sequences too short for a window, or inputs
/// where an associative join finds nothing, simply yield no assignments;
/// that is a pass, not an error.
pub fn validate(groups: &[Group], rules: &RuleSet) -> Report {
    let mut violations = Vec::new();

    for constraint in &rules.single_constraints {
        for group in groups {
            check_single(constraint, group, &mut violations);
        }
    }

    for constraint in &rules.multi_constraints {
        match &constraint.topology {
            Topology::Window { group_count } => {
                for assignment in windows(groups, *group_count) {
                    check_assignment(constraint, &assignment, &mut violations);
                }
            }
            Topology::Associative(assoc) => {
                for assignment in associate::assignments(groups, assoc) {
                    check_assignment(constraint, &assignment, &mut violations);
                }
            }
        }
    }

    Report::new(rules.version.to_string(), groups.len(), violations)
}

/// Validate against a store, resolving the active version first.
///
/// `version` selects explicitly; `None` takes the highest available.
pub fn validate_with_store(
    groups: &[Group],
    store: &RuleStore,
    version: Option<&str>,
) -> Result<Report> {
    let rules = store.select(version)?;
    Ok(validate(groups, rules))
}
