//! Constraint check evaluation.
//!
//! Single-group constraints run against each group independently;
//! multi-group checks run against role assignments produced by the window
//! or associative topology. All checks push violations instead of
//! returning errors: one failing assignment never stops the run.

use cfgcheck_rules::{
    Check, Combination, ConditionalMode, EnforcementMode, MultiConstraint, SequenceOrder,
    SingleConstraint,
};

use crate::assignment::RoleAssignment;
use crate::error::EvalFailure;
use crate::eval::evaluate;
use crate::group::Group;
use crate::report::{RoleBinding, Violation, ViolationKind};

const ABSENT: &str = "<absent>";

// =============================================================================
// Single-group constraints
// =============================================================================

/// Apply a single-group constraint to one group.
///
/// The `when` gate must fully match before any enforcement runs. For
/// `only_allow` and `forbid`, an absent field is unconstrained; for
/// `only_allow_combinations`, the whole tuple must match one allowed
/// combination, so absence counts against every candidate.
pub fn check_single(constraint: &SingleConstraint, group: &Group, out: &mut Vec<Violation>) {
    let gated = constraint
        .when
        .iter()
        .all(|c| c.predicate.matches(group.get(&c.field)));
    if !gated {
        return;
    }

    let binding = vec![RoleBinding {
        role: "group".to_string(),
        group: group.index,
    }];

    match &constraint.mode {
        EnforcementMode::OnlyAllow(fields) => {
            for fv in fields {
                let Some(actual) = group.get(&fv.field) else {
                    continue;
                };
                if !fv.values.iter().any(|v| v == actual) {
                    out.push(Violation {
                        kind: ViolationKind::OnlyAllow,
                        rule: constraint.name.clone(),
                        roles: binding.clone(),
                        field: Some(fv.field.clone()),
                        observed: vec![actual.to_string()],
                        expected: fv.values.clone(),
                        message: format!(
                            "field '{}' is '{}', allowed values are [{}]",
                            fv.field,
                            actual,
                            fv.values.join(", ")
                        ),
                    });
                }
            }
        }
        EnforcementMode::Forbid(fields) => {
            for fv in fields {
                let Some(actual) = group.get(&fv.field) else {
                    continue;
                };
                if fv.values.iter().any(|v| v == actual) {
                    out.push(Violation {
                        kind: ViolationKind::Forbid,
                        rule: constraint.name.clone(),
                        roles: binding.clone(),
                        field: Some(fv.field.clone()),
                        observed: vec![actual.to_string()],
                        expected: fv.values.clone(),
                        message: format!(
                            "field '{}' holds forbidden value '{}'",
                            fv.field, actual
                        ),
                    });
                }
            }
        }
        EnforcementMode::OnlyAllowCombinations(combos) => {
            // Absent fields compare as "" here, so they only satisfy an
            // expectation that is itself empty.
            let matched = combos.iter().any(|combo| {
                combo
                    .iter()
                    .all(|(field, value)| group.get(field).unwrap_or("") == value)
            });
            if !matched {
                // Report the observed tuple over the union of referenced fields.
                let mut fields: Vec<&str> =
                    combos.iter().flatten().map(|(f, _)| f.as_str()).collect();
                fields.sort_unstable();
                fields.dedup();
                let observed: Vec<String> = fields
                    .iter()
                    .map(|f| format!("{f}={}", group.get(f).unwrap_or(ABSENT)))
                    .collect();
                out.push(Violation {
                    kind: ViolationKind::Combinations,
                    rule: constraint.name.clone(),
                    roles: binding,
                    field: None,
                    expected: Vec::new(),
                    message: format!(
                        "field combination [{}] is not among the {} allowed combinations",
                        observed.join(", "),
                        combos.len()
                    ),
                    observed,
                });
            }
        }
    }
}

// =============================================================================
// Multi-group checks
// =============================================================================

/// Apply every check of a multi-group constraint to one role assignment.
pub fn check_assignment(
    constraint: &MultiConstraint,
    assignment: &RoleAssignment<'_>,
    out: &mut Vec<Violation>,
) {
    for check in &constraint.checks {
        match check {
            Check::SameValue { field, roles } => {
                check_same_value(constraint, assignment, field, roles, out)
            }
            Check::Sequence {
                field,
                order,
                roles,
            } => check_sequence(constraint, assignment, field, *order, roles, out),
            Check::Conditional {
                when_role,
                when_field,
                when_value,
                then_role,
                then_field,
                mode,
            } => {
                let when = assignment
                    .get(&when_role.role_name())
                    .and_then(|g| g.get(when_field))
                    .unwrap_or("");
                if when != when_value {
                    continue;
                }
                let then = assignment
                    .get(&then_role.role_name())
                    .and_then(|g| g.get(then_field))
                    .unwrap_or("");
                let listed = match mode {
                    ConditionalMode::OnlyAllow(values) => {
                        if values.iter().any(|v| v == then) {
                            continue;
                        }
                        values
                    }
                    ConditionalMode::Forbid(values) => {
                        if !values.iter().any(|v| v == then) {
                            continue;
                        }
                        values
                    }
                };
                let verb = match mode {
                    ConditionalMode::OnlyAllow(_) => "must be one of",
                    ConditionalMode::Forbid(_) => "must not be one of",
                };
                out.push(Violation {
                    kind: ViolationKind::Conditional,
                    rule: constraint.name.clone(),
                    roles: bindings(assignment),
                    field: Some(then_field.clone()),
                    observed: vec![then.to_string()],
                    expected: listed.clone(),
                    message: format!(
                        "when {when_role}.{when_field} is '{when_value}', \
                         {then_role}.{then_field} {verb} [{}], found '{then}'",
                        listed.join(", ")
                    ),
                });
            }
            Check::Combinations { allow } => {
                check_combinations(constraint, assignment, allow, out)
            }
            Check::Validate { exprs } => {
                for ve in exprs {
                    match evaluate(&ve.expr, assignment) {
                        Ok(true) => {}
                        Ok(false) => out.push(Violation {
                            kind: ViolationKind::Validate,
                            rule: constraint.name.clone(),
                            roles: bindings(assignment),
                            field: None,
                            observed: Vec::new(),
                            expected: Vec::new(),
                            message: format!("{} ({})", ve.message, ve.source),
                        }),
                        Err(failure) => out.push(evaluation_error(constraint, assignment, ve.source.as_str(), failure)),
                    }
                }
            }
        }
    }
}

fn check_same_value(
    constraint: &MultiConstraint,
    assignment: &RoleAssignment<'_>,
    field: &str,
    roles: &[cfgcheck_rules::RoleRef],
    out: &mut Vec<Violation>,
) {
    // Empty role list means "all bound roles".
    let targets: Vec<String> = if roles.is_empty() {
        assignment.iter().map(|(r, _)| r.to_string()).collect()
    } else {
        roles.iter().map(|r| r.role_name()).collect()
    };

    let values: Vec<Option<&str>> = targets
        .iter()
        .map(|role| assignment.get(role).and_then(|g| g.get(field)))
        .collect();

    // Distinct-set semantics: absence is a value of its own, so an
    // all-absent window agrees with itself, while absent-next-to-present
    // does not.
    let agree = values.windows(2).all(|pair| pair[0] == pair[1]);
    if agree {
        return;
    }

    let observed: Vec<String> = values
        .iter()
        .map(|v| v.unwrap_or(ABSENT).to_string())
        .collect();
    out.push(Violation {
        kind: ViolationKind::SameValue,
        rule: constraint.name.clone(),
        roles: bindings(assignment),
        field: Some(field.to_string()),
        expected: Vec::new(),
        message: format!(
            "field '{field}' must agree across [{}], found [{}]",
            targets.join(", "),
            observed.join(", ")
        ),
        observed,
    });
}

fn check_sequence(
    constraint: &MultiConstraint,
    assignment: &RoleAssignment<'_>,
    field: &str,
    order: SequenceOrder,
    roles: &[cfgcheck_rules::RoleRef],
    out: &mut Vec<Violation>,
) {
    // Empty role list means "all bound roles".
    let targets: Vec<String> = if roles.is_empty() {
        assignment.iter().map(|(r, _)| r.to_string()).collect()
    } else {
        roles.iter().map(|r| r.role_name()).collect()
    };

    let mut values = Vec::new();
    for role in &targets {
        let Some(raw) = assignment.get(role).and_then(|g| g.get(field)) else {
            out.push(Violation {
                kind: ViolationKind::EvaluationError,
                rule: constraint.name.clone(),
                roles: bindings(assignment),
                field: Some(field.to_string()),
                observed: Vec::new(),
                expected: Vec::new(),
                message: format!("sequence field '{field}' is absent on {role}"),
            });
            return;
        };
        let Ok(num) = raw.trim().parse::<f64>() else {
            out.push(Violation {
                kind: ViolationKind::EvaluationError,
                rule: constraint.name.clone(),
                roles: bindings(assignment),
                field: Some(field.to_string()),
                observed: vec![raw.to_string()],
                expected: Vec::new(),
                message: format!("sequence field '{field}' is not numeric on {role}: '{raw}'"),
            });
            return;
        };
        values.push((raw, num));
    }

    let monotonic = values.windows(2).all(|pair| match order {
        SequenceOrder::Increasing => pair[0].1 < pair[1].1,
        SequenceOrder::Decreasing => pair[0].1 > pair[1].1,
    });
    if monotonic {
        return;
    }

    let direction = match order {
        SequenceOrder::Increasing => "strictly increasing",
        SequenceOrder::Decreasing => "strictly decreasing",
    };
    let observed: Vec<String> = values.iter().map(|(raw, _)| raw.to_string()).collect();
    out.push(Violation {
        kind: ViolationKind::Sequence,
        rule: constraint.name.clone(),
        roles: bindings(assignment),
        field: Some(field.to_string()),
        expected: Vec::new(),
        message: format!(
            "field '{field}' must be {direction}, found [{}]",
            observed.join(", ")
        ),
        observed,
    });
}

fn check_combinations(
    constraint: &MultiConstraint,
    assignment: &RoleAssignment<'_>,
    allow: &[Combination],
    out: &mut Vec<Violation>,
) {
    let matched = allow.iter().any(|combo| {
        combo.roles.iter().all(|rf| {
            let Some(group) = assignment.get(&rf.role) else {
                return false;
            };
            rf.fields
                .iter()
                .all(|(field, value)| group.get(field) == Some(value.as_str()))
        })
    });
    if matched {
        return;
    }

    // Observed tuple over the union of fields the combinations reference.
    let mut seen: Vec<(String, String)> = Vec::new();
    for combo in allow {
        for rf in &combo.roles {
            for (field, _) in &rf.fields {
                let key = (rf.role.clone(), field.clone());
                if seen.iter().any(|k| (&k.0, &k.1) == (&key.0, &key.1)) {
                    continue;
                }
                seen.push(key);
            }
        }
    }
    let observed: Vec<String> = seen
        .iter()
        .map(|(role, field)| {
            let value = assignment
                .get(role)
                .and_then(|g| g.get(field))
                .unwrap_or(ABSENT);
            format!("{role}.{field}={value}")
        })
        .collect();
    out.push(Violation {
        kind: ViolationKind::Combinations,
        rule: constraint.name.clone(),
        roles: bindings(assignment),
        field: None,
        expected: Vec::new(),
        message: format!(
            "combination [{}] is not among the {} allowed combinations",
            observed.join(", "),
            allow.len()
        ),
        observed,
    });
}

fn evaluation_error(
    constraint: &MultiConstraint,
    assignment: &RoleAssignment<'_>,
    source: &str,
    failure: EvalFailure,
) -> Violation {
    Violation {
        kind: ViolationKind::EvaluationError,
        rule: constraint.name.clone(),
        roles: bindings(assignment),
        field: None,
        observed: Vec::new(),
        expected: Vec::new(),
        message: format!("cannot evaluate '{source}': {failure}"),
    }
}

fn bindings(assignment: &RoleAssignment<'_>) -> Vec<RoleBinding> {
    assignment
        .iter()
        .map(|(role, group)| RoleBinding {
            role: role.to_string(),
            group: group.index,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfgcheck_rules::parse_rules_yaml;
    use std::collections::BTreeMap;

    fn group(index: usize, fields: &[(&str, &str)]) -> Group {
        let map: BTreeMap<String, String> = fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Group::new(index, map)
    }

    fn single(yaml: &str) -> SingleConstraint {
        let store = parse_rules_yaml(yaml).unwrap();
        store.latest().unwrap().single_constraints[0].clone()
    }

    fn multi(yaml: &str) -> MultiConstraint {
        let store = parse_rules_yaml(yaml).unwrap();
        store.latest().unwrap().multi_constraints[0].clone()
    }

    fn window_pair<'a>(g0: &'a Group, g1: &'a Group) -> RoleAssignment<'a> {
        RoleAssignment::new(vec![("group0".into(), g0), ("group1".into(), g1)])
    }

    #[test]
    fn test_only_allow_gated_by_when() {
        let constraint = single(
            r#"
version: 1.0.0_20240601
single_constraints:
  - name: debug-level-range
    when:
      opSch.systemMode: "1"
    only_allow:
      opSch.debugLevel: ["0", "1", "2"]
"#,
        );

        // Gate closed: out-of-range value passes.
        let mut out = Vec::new();
        let idle = group(0, &[("opSch.systemMode", "0"), ("opSch.debugLevel", "9")]);
        check_single(&constraint, &idle, &mut out);
        assert!(out.is_empty());

        // Gate open: same value violates.
        let active = group(1, &[("opSch.systemMode", "1"), ("opSch.debugLevel", "9")]);
        check_single(&constraint, &active, &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, ViolationKind::OnlyAllow);
        assert_eq!(out[0].roles[0].group, 1);
        assert_eq!(out[0].observed, vec!["9"]);
        assert_eq!(out[0].expected, vec!["0", "1", "2"]);
    }

    #[test]
    fn test_only_allow_absent_field_unconstrained() {
        let constraint = single(
            r#"
version: 1.0.0_20240601
single_constraints:
  - name: level-range
    only_allow:
      opSch.debugLevel: ["0", "1"]
"#,
        );
        let mut out = Vec::new();
        check_single(&constraint, &group(0, &[("opSch.other", "x")]), &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_forbid() {
        let constraint = single(
            r#"
version: 1.0.0_20240601
single_constraints:
  - name: no-legacy-modes
    forbid:
      opSch.mode: ["8", "9"]
"#,
        );
        let mut out = Vec::new();
        check_single(&constraint, &group(0, &[("opSch.mode", "9")]), &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, ViolationKind::Forbid);
        assert_eq!(out[0].expected, vec!["8", "9"]);

        out.clear();
        check_single(&constraint, &group(1, &[("opSch.mode", "2")]), &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_single_combinations_full_tuple() {
        let constraint = single(
            r#"
version: 1.0.0_20240601
single_constraints:
  - name: mode-pairings
    only_allow_combinations:
      - opSch.mode: "1"
        opSch.level: "0"
      - opSch.mode: "2"
        opSch.level: "3"
"#,
        );
        let mut out = Vec::new();
        check_single(
            &constraint,
            &group(0, &[("opSch.mode", "1"), ("opSch.level", "0")]),
            &mut out,
        );
        assert!(out.is_empty());

        // Cross-pairing of two allowed tuples is still a violation.
        check_single(
            &constraint,
            &group(1, &[("opSch.mode", "1"), ("opSch.level", "3")]),
            &mut out,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, ViolationKind::Combinations);
    }

    #[test]
    fn test_same_value_absent_is_mismatch() {
        let constraint = multi(
            r#"
version: 1.0.0_20240601
multi_constraints:
  - name: stable-mode
    group_count: 2
    rules:
      - type: same_value
        field: opSch.mode
"#,
        );
        let g0 = group(0, &[("opSch.mode", "1")]);
        let g1 = group(1, &[]);
        let mut out = Vec::new();
        check_assignment(&constraint, &window_pair(&g0, &g1), &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, ViolationKind::SameValue);
        assert_eq!(out[0].observed, vec!["1", "<absent>"]);
    }

    #[test]
    fn test_same_value_all_absent_agrees() {
        let constraint = multi(
            r#"
version: 1.0.0_20240601
multi_constraints:
  - name: stable-mode
    group_count: 2
    rules:
      - type: same_value
        field: opSch.mode
"#,
        );
        // Absence on every role is a single distinct value, not a mismatch.
        let g0 = group(0, &[("opSch.other", "x")]);
        let g1 = group(1, &[]);
        let mut out = Vec::new();
        check_assignment(&constraint, &window_pair(&g0, &g1), &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_sequence_non_numeric_is_evaluation_error() {
        let constraint = multi(
            r#"
version: 1.0.0_20240601
multi_constraints:
  - name: rising-priority
    group_count: 2
    rules:
      - type: sequence
        field: opSch.priority
"#,
        );
        let g0 = group(0, &[("opSch.priority", "high")]);
        let g1 = group(1, &[("opSch.priority", "2")]);
        let mut out = Vec::new();
        check_assignment(&constraint, &window_pair(&g0, &g1), &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, ViolationKind::EvaluationError);
    }

    #[test]
    fn test_sequence_narrowed_to_listed_groups() {
        let constraint = multi(
            r#"
version: 1.0.0_20240601
multi_constraints:
  - name: rising-endpoints
    group_count: 3
    rules:
      - type: sequence
        field: opSch.priority
        order: increasing
        groups: [0, 2]
"#,
        );
        // The middle group sits outside the narrowed list; its value never
        // participates, numeric or not.
        let g0 = group(0, &[("opSch.priority", "1")]);
        let g1 = group(1, &[("opSch.priority", "high")]);
        let g2 = group(2, &[("opSch.priority", "5")]);
        let triple = RoleAssignment::new(vec![
            ("group0".into(), &g0),
            ("group1".into(), &g1),
            ("group2".into(), &g2),
        ]);
        let mut out = Vec::new();
        check_assignment(&constraint, &triple, &mut out);
        assert!(out.is_empty());

        // An out-of-order narrowed pair still violates.
        let g2_low = group(2, &[("opSch.priority", "0")]);
        let triple = RoleAssignment::new(vec![
            ("group0".into(), &g0),
            ("group1".into(), &g1),
            ("group2".into(), &g2_low),
        ]);
        check_assignment(&constraint, &triple, &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, ViolationKind::Sequence);
        assert_eq!(out[0].observed, vec!["1", "0"]);
    }

    #[test]
    fn test_sequence_strictness() {
        let constraint = multi(
            r#"
version: 1.0.0_20240601
multi_constraints:
  - name: rising-priority
    group_count: 2
    rules:
      - type: sequence
        field: opSch.priority
        order: increasing
"#,
        );
        let g0 = group(0, &[("opSch.priority", "2")]);
        let g1 = group(1, &[("opSch.priority", "2")]);
        let mut out = Vec::new();
        // Equal values break strict monotonicity.
        check_assignment(&constraint, &window_pair(&g0, &g1), &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, ViolationKind::Sequence);
    }

    #[test]
    fn test_conditional_absent_normalizes_to_empty() {
        let constraint = multi(
            r#"
version: 1.0.0_20240601
multi_constraints:
  - name: cond
    group_count: 2
    rules:
      - type: conditional
        when_group: 0
        when_field: opSch.mode
        when_value: ""
        then_group: 1
        then_field: opSch.level
        only_allow: ["0"]
"#,
        );
        // when_field absent → normalized to "" → gate fires; then_field
        // absent → "" not in ["0"] → violation.
        let g0 = group(0, &[]);
        let g1 = group(1, &[]);
        let mut out = Vec::new();
        check_assignment(&constraint, &window_pair(&g0, &g1), &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, ViolationKind::Conditional);
        assert_eq!(out[0].expected, vec!["0"]);
    }

    #[test]
    fn test_conditional_forbid() {
        let constraint = multi(
            r#"
version: 1.0.0_20240601
multi_constraints:
  - name: no-debug-after-prod
    group_count: 2
    rules:
      - type: conditional
        when_group: 0
        when_field: opSch.mode
        when_value: "prod"
        then_group: 1
        then_field: opSch.debug
        forbid: ["on"]
"#,
        );
        let g0 = group(0, &[("opSch.mode", "prod")]);
        let g1 = group(1, &[("opSch.debug", "on")]);
        let mut out = Vec::new();
        check_assignment(&constraint, &window_pair(&g0, &g1), &mut out);
        assert_eq!(out.len(), 1);

        out.clear();
        let g1_ok = group(1, &[("opSch.debug", "off")]);
        check_assignment(&constraint, &window_pair(&g0, &g1_ok), &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_validate_false_and_error_are_distinct_kinds() {
        let constraint = multi(
            r#"
version: 1.0.0_20240601
multi_constraints:
  - name: budget
    group_count: 2
    validate:
      - expr: "group0.opSch.x >= group1.opSch.y"
        message: x must dominate y
"#,
        );
        let mut out = Vec::new();
        let g0 = group(0, &[("opSch.x", "1")]);
        let g1 = group(1, &[("opSch.y", "5")]);
        check_assignment(&constraint, &window_pair(&g0, &g1), &mut out);
        assert_eq!(out[0].kind, ViolationKind::Validate);
        assert!(out[0].message.contains("x must dominate y"));

        out.clear();
        let g1_missing = group(1, &[]);
        check_assignment(&constraint, &window_pair(&g0, &g1_missing), &mut out);
        assert_eq!(out[0].kind, ViolationKind::EvaluationError);
    }

    #[test]
    fn test_multi_combinations() {
        let constraint = multi(
            r#"
version: 1.0.0_20240601
multi_constraints:
  - name: handshake
    group_count: 2
    only_allow_combinations:
      - group0:
          opSch.state: "req"
        group1:
          opSch.state: "ack"
"#,
        );
        let mut out = Vec::new();
        let g0 = group(0, &[("opSch.state", "req")]);
        let g1 = group(1, &[("opSch.state", "ack")]);
        check_assignment(&constraint, &window_pair(&g0, &g1), &mut out);
        assert!(out.is_empty());

        let g1_bad = group(1, &[("opSch.state", "req")]);
        check_assignment(&constraint, &window_pair(&g0, &g1_bad), &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, ViolationKind::Combinations);
    }
}
