//! YAML → AST parser for versioned rule sets.
//!
//! Handles:
//! - Single- and multi-document YAML (one rule set per document)
//! - Directory loading of versioned rule files (`v1.2.0_20240601.yaml`)
//! - Single-constraint parsing (`when` gate + one enforcement mode)
//! - Multi-constraint parsing (window / associative topology + checks)
//! - Load-time validation: every configuration defect is rejected here,
//!   before any group is evaluated, with the offending constraint named.

use std::path::Path;

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::ast::*;
use crate::error::{Result, RuleParseError};
use crate::expr::parse_expr;
use crate::version::{RuleStore, VersionId};

// =============================================================================
// Public API
// =============================================================================

/// Parse a YAML string containing one or more rule-set documents.
///
/// Each document must carry a `version` field.
pub fn parse_rules_yaml(yaml: &str) -> Result<RuleStore> {
    let mut store = RuleStore::new();
    for doc in serde_yaml::Deserializer::from_str(yaml) {
        let value = Value::deserialize(doc)?;
        if value.is_null() {
            continue;
        }
        store.insert(parse_rule_set(&value, None)?);
    }
    Ok(store)
}

/// Parse one rule file. Documents without an explicit `version` take it
/// from the file stem (`v1.2.0_20240601.yaml`).
pub fn parse_rules_file(path: &Path) -> Result<RuleStore> {
    let content = std::fs::read_to_string(path)?;
    let fallback = path
        .file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| VersionId::parse(s).ok());

    let mut store = RuleStore::new();
    for doc in serde_yaml::Deserializer::from_str(&content) {
        let value = Value::deserialize(doc)?;
        if value.is_null() {
            continue;
        }
        store.insert(parse_rule_set(&value, fallback.clone())?);
    }
    Ok(store)
}

/// Load every versioned rule file (`v<semver>_<date>.yaml`) from a directory.
///
/// Files whose names do not parse as a version are ignored; defects inside
/// a recognized file abort the load.
pub fn parse_rules_directory(dir: &Path) -> Result<RuleStore> {
    let mut store = RuleStore::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file()
            || !matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("yml" | "yaml")
            )
        {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if !stem.starts_with('v') || VersionId::parse(stem).is_err() {
            continue;
        }
        let sub = parse_rules_file(&path)?;
        for version in sub.versions().cloned().collect::<Vec<_>>() {
            if let Some(rs) = sub.get(&version) {
                store.insert(rs.clone());
            }
        }
    }
    Ok(store)
}

// =============================================================================
// Rule set parsing
// =============================================================================

/// Parse a single rule-set document.
fn parse_rule_set(value: &Value, fallback_version: Option<VersionId>) -> Result<RuleSet> {
    let m = value
        .as_mapping()
        .ok_or_else(|| RuleParseError::invalid("<document>", "rule set must be a YAML mapping"))?;

    let version = match get_str(m, "version") {
        Some(v) => VersionId::parse(v)?,
        None => fallback_version.ok_or_else(|| RuleParseError::MissingField("version".into()))?,
    };

    let single_constraints = match m.get(val_key("single_constraints")) {
        Some(Value::Sequence(seq)) => seq
            .iter()
            .map(parse_single_constraint)
            .collect::<Result<Vec<_>>>()?,
        Some(Value::Null) | None => Vec::new(),
        Some(_) => {
            return Err(RuleParseError::invalid(
                "<document>",
                "single_constraints must be a list",
            ));
        }
    };

    let multi_constraints = match m.get(val_key("multi_constraints")) {
        Some(Value::Sequence(seq)) => seq
            .iter()
            .map(parse_multi_constraint)
            .collect::<Result<Vec<_>>>()?,
        Some(Value::Null) | None => Vec::new(),
        Some(_) => {
            return Err(RuleParseError::invalid(
                "<document>",
                "multi_constraints must be a list",
            ));
        }
    };

    Ok(RuleSet {
        version,
        single_constraints,
        multi_constraints,
    })
}

// =============================================================================
// Single constraints
// =============================================================================

fn parse_single_constraint(value: &Value) -> Result<SingleConstraint> {
    let m = value.as_mapping().ok_or_else(|| {
        RuleParseError::invalid("<unnamed>", "single constraint must be a mapping")
    })?;

    let name = get_str(m, "name")
        .ok_or_else(|| RuleParseError::MissingField("name".into()))?
        .to_string();
    let description = get_str(m, "description").map(|s| s.to_string());
    let when = parse_conditions(m.get(val_key("when")), &name)?;

    // Exactly one enforcement mode per constraint.
    let mut modes: Vec<EnforcementMode> = Vec::new();
    if let Some(v) = m.get(val_key("only_allow")) {
        modes.push(EnforcementMode::OnlyAllow(parse_field_values(v, &name)?));
    }
    if let Some(v) = m.get(val_key("forbid")) {
        modes.push(EnforcementMode::Forbid(parse_field_values(v, &name)?));
    }
    if let Some(v) = m.get(val_key("only_allow_combinations")) {
        modes.push(EnforcementMode::OnlyAllowCombinations(
            parse_single_combinations(v, &name)?,
        ));
    }

    let mode = match modes.len() {
        1 => modes.pop().unwrap(),
        0 => {
            return Err(RuleParseError::invalid(
                &name,
                "expected one of only_allow, forbid, only_allow_combinations",
            ));
        }
        _ => {
            return Err(RuleParseError::invalid(
                &name,
                "more than one enforcement mode declared",
            ));
        }
    };

    Ok(SingleConstraint {
        name,
        description,
        when,
        mode,
    })
}

/// Parse a `field: [values...]` mapping (only_allow / forbid bodies).
fn parse_field_values(value: &Value, name: &str) -> Result<Vec<FieldValues>> {
    let m = value
        .as_mapping()
        .ok_or_else(|| RuleParseError::invalid(name, "expected a field → value-list mapping"))?;

    let mut out = Vec::new();
    for (k, v) in m {
        let field = k
            .as_str()
            .ok_or_else(|| RuleParseError::invalid(name, "field names must be strings"))?
            .to_string();
        require_prefixed(&field, name)?;
        let values = match v {
            Value::Sequence(seq) => seq.iter().map(scalar_to_string).collect::<Option<_>>(),
            other => scalar_to_string(other).map(|s| vec![s]),
        }
        .ok_or_else(|| RuleParseError::invalid(name, format!("invalid values for '{field}'")))?;
        out.push(FieldValues { field, values });
    }
    if out.is_empty() {
        return Err(RuleParseError::invalid(name, "empty enforcement body"));
    }
    Ok(out)
}

/// Parse single-group `only_allow_combinations`: a list of full field tuples.
fn parse_single_combinations(value: &Value, name: &str) -> Result<Vec<Vec<(String, String)>>> {
    let seq = value
        .as_sequence()
        .ok_or_else(|| RuleParseError::invalid(name, "only_allow_combinations must be a list"))?;

    let mut combos = Vec::new();
    for item in seq {
        let m = item
            .as_mapping()
            .ok_or_else(|| RuleParseError::invalid(name, "each combination must be a mapping"))?;
        let mut tuple = Vec::new();
        for (k, v) in m {
            let field = k
                .as_str()
                .ok_or_else(|| RuleParseError::invalid(name, "field names must be strings"))?;
            require_prefixed(field, name)?;
            let val = scalar_to_string(v)
                .ok_or_else(|| RuleParseError::invalid(name, "combination values must be scalars"))?;
            tuple.push((field.to_string(), val));
        }
        if tuple.is_empty() {
            return Err(RuleParseError::invalid(name, "empty combination"));
        }
        combos.push(tuple);
    }
    if combos.is_empty() {
        return Err(RuleParseError::invalid(name, "empty combination list"));
    }
    Ok(combos)
}

// =============================================================================
// Multi constraints
// =============================================================================

fn parse_multi_constraint(value: &Value) -> Result<MultiConstraint> {
    let m = value
        .as_mapping()
        .ok_or_else(|| RuleParseError::invalid("<unnamed>", "multi constraint must be a mapping"))?;

    let name = get_str(m, "name")
        .ok_or_else(|| RuleParseError::MissingField("name".into()))?
        .to_string();
    let description = get_str(m, "description").map(|s| s.to_string());

    let topology = parse_topology(m, &name)?;

    let mut checks = Vec::new();
    match m.get(val_key("rules")) {
        Some(Value::Sequence(seq)) => {
            for item in seq {
                checks.push(parse_check(item, &name)?);
            }
        }
        Some(Value::Null) | None => {}
        Some(_) => {
            return Err(RuleParseError::invalid(&name, "rules must be a list"));
        }
    }
    // Top-level shorthands desugar into checks.
    if let Some(v) = m.get(val_key("only_allow_combinations")) {
        checks.push(Check::Combinations {
            allow: parse_multi_combinations(v, &name)?,
        });
    }
    if let Some(v) = m.get(val_key("validate")) {
        checks.push(Check::Validate {
            exprs: parse_validate_exprs(v, &name)?,
        });
    }

    if checks.is_empty() {
        return Err(RuleParseError::invalid(&name, "empty rule body"));
    }

    let constraint = MultiConstraint {
        name,
        description,
        topology,
        checks,
    };
    validate_role_refs(&constraint)?;
    Ok(constraint)
}

fn parse_topology(m: &Mapping, name: &str) -> Result<Topology> {
    let group_count = m.get(val_key("group_count"));
    let associate_by = m.get(val_key("associate_by"));

    match (group_count, associate_by) {
        (Some(_), Some(_)) => Err(RuleParseError::invalid(
            name,
            "group_count and associate_by are mutually exclusive",
        )),
        (Some(v), None) => {
            let n = v.as_u64().ok_or_else(|| {
                RuleParseError::invalid(name, "group_count must be an integer")
            })? as usize;
            if !(2..=3).contains(&n) {
                return Err(RuleParseError::invalid(
                    name,
                    format!("group_count must be 2 or 3, got {n}"),
                ));
            }
            Ok(Topology::Window { group_count: n })
        }
        (None, Some(v)) => Ok(Topology::Associative(parse_associate_by(v, name)?)),
        (None, None) => Err(RuleParseError::invalid(
            name,
            "expected group_count or associate_by",
        )),
    }
}

/// Parse an `associate_by` section: role definitions plus links.
///
/// Role keys are `src1..src3`; everything is validated here so the
/// matcher can assume a well-formed join graph.
fn parse_associate_by(value: &Value, name: &str) -> Result<AssociateBy> {
    let m = value
        .as_mapping()
        .ok_or_else(|| RuleParseError::invalid(name, "associate_by must be a mapping"))?;

    let mut roles = Vec::new();
    for role_name in ["src1", "src2", "src3"] {
        let Some(role_val) = m.get(val_key(role_name)) else {
            continue;
        };
        let rm = role_val.as_mapping().ok_or_else(|| {
            RuleParseError::invalid(name, format!("role '{role_name}' must be a mapping"))
        })?;
        let where_ = parse_conditions(rm.get(val_key("where")), name)?;
        if where_.is_empty() {
            return Err(RuleParseError::invalid(
                name,
                format!("role '{role_name}' has an empty where clause"),
            ));
        }
        roles.push(RoleSpec {
            name: role_name.to_string(),
            where_,
        });
    }
    if roles.is_empty() {
        return Err(RuleParseError::invalid(
            name,
            "associate_by defines no roles (src1..src3)",
        ));
    }

    let links = match m.get(val_key("links")) {
        Some(Value::Sequence(seq)) => seq
            .iter()
            .map(|l| parse_link(l, &roles, name))
            .collect::<Result<Vec<_>>>()?,
        Some(Value::Null) | None => Vec::new(),
        Some(_) => {
            return Err(RuleParseError::invalid(name, "links must be a list"));
        }
    };

    let assoc = AssociateBy { roles, links };
    validate_join_graph(&assoc, name)?;
    Ok(assoc)
}

/// Parse one link entry: a mapping with exactly two role keys, each
/// holding a field name or list of field names.
fn parse_link(value: &Value, roles: &[RoleSpec], name: &str) -> Result<Link> {
    let m = value
        .as_mapping()
        .ok_or_else(|| RuleParseError::invalid(name, "each link must be a mapping"))?;

    let mut sides: Vec<(String, Vec<String>)> = Vec::new();
    for (k, v) in m {
        let role = k
            .as_str()
            .ok_or_else(|| RuleParseError::invalid(name, "link keys must be role names"))?;
        if !roles.iter().any(|r| r.name == role) {
            return Err(RuleParseError::invalid(
                name,
                format!("link references undeclared role '{role}'"),
            ));
        }
        let fields = match v {
            Value::Sequence(seq) => seq
                .iter()
                .map(|f| f.as_str().map(|s| s.to_string()))
                .collect::<Option<Vec<_>>>(),
            Value::String(s) => Some(vec![s.clone()]),
            _ => None,
        }
        .ok_or_else(|| {
            RuleParseError::invalid(name, format!("invalid link fields for role '{role}'"))
        })?;
        for field in &fields {
            require_prefixed(field, name)?;
        }
        sides.push((role.to_string(), fields));
    }

    if sides.len() != 2 {
        return Err(RuleParseError::invalid(
            name,
            format!("a link must connect exactly 2 roles, got {}", sides.len()),
        ));
    }

    // Normalize side order to role declaration order.
    let pos = |r: &str| roles.iter().position(|spec| spec.name == r).unwrap();
    if pos(&sides[0].0) > pos(&sides[1].0) {
        sides.swap(0, 1);
    }
    let (left_role, left_fields) = sides.remove(0);
    let (right_role, right_fields) = sides.remove(0);

    if left_fields.len() != right_fields.len() || left_fields.is_empty() {
        return Err(RuleParseError::invalid(
            name,
            format!("link between '{left_role}' and '{right_role}' has mismatched field lists"),
        ));
    }

    Ok(Link {
        left_role,
        left_fields,
        right_role,
        right_fields,
    })
}

/// Every role after the first must be linked to an earlier role, so the
/// matcher's hash-join never degenerates into a cross product.
fn validate_join_graph(assoc: &AssociateBy, name: &str) -> Result<()> {
    for (i, role) in assoc.roles.iter().enumerate().skip(1) {
        let earlier = &assoc.roles[..i];
        let linked = assoc.links.iter().any(|l| {
            (l.right_role == role.name && earlier.iter().any(|e| e.name == l.left_role))
                || (l.left_role == role.name && earlier.iter().any(|e| e.name == l.right_role))
        });
        if !linked {
            return Err(RuleParseError::UnlinkedRole {
                name: name.to_string(),
                role: role.name.clone(),
            });
        }
    }
    Ok(())
}

// =============================================================================
// Check bodies
// =============================================================================

fn parse_check(value: &Value, name: &str) -> Result<Check> {
    let m = value
        .as_mapping()
        .ok_or_else(|| RuleParseError::invalid(name, "each rule entry must be a mapping"))?;

    let check_type = get_str(m, "type")
        .ok_or_else(|| RuleParseError::invalid(name, "rule entry missing 'type'"))?;

    match check_type {
        "same_value" => {
            let field = require_str(m, "field", name)?;
            require_prefixed(&field, name)?;
            let roles = parse_role_list(m, name)?;
            Ok(Check::SameValue { field, roles })
        }
        "sequence" => {
            let field = require_str(m, "field", name)?;
            require_prefixed(&field, name)?;
            let order_str = get_str(m, "order").unwrap_or("increasing");
            let order = SequenceOrder::from_str(order_str).ok_or_else(|| {
                RuleParseError::invalid(name, format!("unknown sequence order '{order_str}'"))
            })?;
            let roles = parse_role_list(m, name)?;
            Ok(Check::Sequence {
                field,
                order,
                roles,
            })
        }
        "conditional" => {
            let when_role = m
                .get(val_key("when_group"))
                .map(|v| parse_role_ref(v, name))
                .transpose()?
                .unwrap_or(RoleRef::Positional(0));
            let then_role = m
                .get(val_key("then_group"))
                .map(|v| parse_role_ref(v, name))
                .transpose()?
                .unwrap_or(RoleRef::Positional(1));
            let when_field = require_str(m, "when_field", name)?;
            require_prefixed(&when_field, name)?;
            let when_value = m
                .get(val_key("when_value"))
                .and_then(scalar_to_string)
                .ok_or_else(|| RuleParseError::invalid(name, "conditional missing when_value"))?;
            let then_field = require_str(m, "then_field", name)?;
            require_prefixed(&then_field, name)?;

            let only_allow = m.get(val_key("only_allow"));
            let forbid = m.get(val_key("forbid"));
            let mode = match (only_allow, forbid) {
                (Some(v), None) => ConditionalMode::OnlyAllow(parse_string_list(v, name)?),
                (None, Some(v)) => ConditionalMode::Forbid(parse_string_list(v, name)?),
                _ => {
                    return Err(RuleParseError::invalid(
                        name,
                        "conditional requires exactly one of only_allow, forbid",
                    ));
                }
            };

            Ok(Check::Conditional {
                when_role,
                when_field,
                when_value,
                then_role,
                then_field,
                mode,
            })
        }
        "combinations" => {
            let allow = m
                .get(val_key("allow"))
                .ok_or_else(|| RuleParseError::invalid(name, "combinations missing 'allow'"))?;
            Ok(Check::Combinations {
                allow: parse_multi_combinations(allow, name)?,
            })
        }
        "validate" => {
            // Either a single expr/message pair or a list under `exprs`.
            if let Some(exprs_val) = m.get(val_key("exprs")) {
                Ok(Check::Validate {
                    exprs: parse_validate_exprs(exprs_val, name)?,
                })
            } else {
                let source = require_str(m, "expr", name)?;
                let message = get_str(m, "message")
                    .unwrap_or("expression validation failed")
                    .to_string();
                let expr = parse_expr(&source).map_err(|e| RuleParseError::Expression {
                    name: name.to_string(),
                    reason: e.to_string(),
                })?;
                Ok(Check::Validate {
                    exprs: vec![ValidateExpr {
                        source,
                        expr,
                        message,
                    }],
                })
            }
        }
        other => Err(RuleParseError::UnknownCheckType {
            name: name.to_string(),
            check_type: other.to_string(),
        }),
    }
}

/// Parse multi-role combinations: each entry maps role → field/value tuples.
fn parse_multi_combinations(value: &Value, name: &str) -> Result<Vec<Combination>> {
    let seq = value
        .as_sequence()
        .ok_or_else(|| RuleParseError::invalid(name, "allow must be a list"))?;

    let mut combos = Vec::new();
    for item in seq {
        let m = item
            .as_mapping()
            .ok_or_else(|| RuleParseError::invalid(name, "each combination must be a mapping"))?;
        let mut roles = Vec::new();
        for (k, v) in m {
            let role = k
                .as_str()
                .ok_or_else(|| RuleParseError::invalid(name, "combination keys must be roles"))?
                .to_string();
            let fm = v.as_mapping().ok_or_else(|| {
                RuleParseError::invalid(name, format!("combination for '{role}' must be a mapping"))
            })?;
            let mut fields = Vec::new();
            for (fk, fv) in fm {
                let field = fk.as_str().ok_or_else(|| {
                    RuleParseError::invalid(name, "field names must be strings")
                })?;
                require_prefixed(field, name)?;
                let val = scalar_to_string(fv).ok_or_else(|| {
                    RuleParseError::invalid(name, "combination values must be scalars")
                })?;
                fields.push((field.to_string(), val));
            }
            roles.push(RoleFields { role, fields });
        }
        if roles.is_empty() {
            return Err(RuleParseError::invalid(name, "empty combination"));
        }
        combos.push(Combination { roles });
    }
    if combos.is_empty() {
        return Err(RuleParseError::invalid(name, "empty combination list"));
    }
    Ok(combos)
}

/// Parse a `validate` expression list: strings or `{expr, message}` entries.
fn parse_validate_exprs(value: &Value, name: &str) -> Result<Vec<ValidateExpr>> {
    let seq = value
        .as_sequence()
        .ok_or_else(|| RuleParseError::invalid(name, "validate must be a list"))?;

    let mut out = Vec::new();
    for item in seq {
        let (source, message) = match item {
            Value::String(s) => (s.clone(), "expression validation failed".to_string()),
            Value::Mapping(em) => {
                let source = get_str(em, "expr")
                    .ok_or_else(|| RuleParseError::invalid(name, "validate entry missing expr"))?
                    .to_string();
                let message = get_str(em, "message")
                    .unwrap_or("expression validation failed")
                    .to_string();
                (source, message)
            }
            _ => {
                return Err(RuleParseError::invalid(
                    name,
                    "validate entries must be strings or mappings",
                ));
            }
        };
        let expr = parse_expr(&source).map_err(|e| RuleParseError::Expression {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        out.push(ValidateExpr {
            source,
            expr,
            message,
        });
    }
    if out.is_empty() {
        return Err(RuleParseError::invalid(name, "empty validate list"));
    }
    Ok(out)
}

/// Parse an optional `groups:` role narrowing list.
fn parse_role_list(m: &Mapping, name: &str) -> Result<Vec<RoleRef>> {
    match m.get(val_key("groups")) {
        Some(Value::Sequence(seq)) => seq
            .iter()
            .map(|v| parse_role_ref(v, name))
            .collect::<Result<Vec<_>>>(),
        Some(Value::Null) | None => Ok(Vec::new()),
        Some(_) => Err(RuleParseError::invalid(name, "groups must be a list")),
    }
}

/// Parse a role reference: integer index or role-name string.
fn parse_role_ref(value: &Value, name: &str) -> Result<RoleRef> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(|i| RoleRef::Positional(i as usize))
            .ok_or_else(|| RuleParseError::invalid(name, "role index must be a non-negative int")),
        Value::String(s) => Ok(RoleRef::Named(s.clone())),
        _ => Err(RuleParseError::invalid(
            name,
            "role references must be integers or role names",
        )),
    }
}

/// Check that every role reference in a constraint's checks resolves to a
/// role its topology can actually bind.
fn validate_role_refs(constraint: &MultiConstraint) -> Result<()> {
    let valid_roles: Vec<String> = match &constraint.topology {
        Topology::Window { group_count } => (0..*group_count).map(|i| format!("group{i}")).collect(),
        Topology::Associative(assoc) => assoc.roles.iter().map(|r| r.name.clone()).collect(),
    };
    let check_ref = |r: &RoleRef| -> Result<()> {
        let resolved = r.role_name();
        if valid_roles.contains(&resolved) {
            Ok(())
        } else {
            Err(RuleParseError::invalid(
                &constraint.name,
                format!("unknown role reference '{r}'"),
            ))
        }
    };

    for check in &constraint.checks {
        match check {
            Check::SameValue { roles, .. } | Check::Sequence { roles, .. } => {
                for r in roles {
                    check_ref(r)?;
                }
            }
            Check::Conditional {
                when_role,
                then_role,
                ..
            } => {
                check_ref(when_role)?;
                check_ref(then_role)?;
            }
            Check::Combinations { allow } => {
                for combo in allow {
                    for rf in &combo.roles {
                        check_ref(&RoleRef::Named(rf.role.clone()))?;
                    }
                }
            }
            Check::Validate { exprs } => {
                for ve in exprs {
                    for role in expr_roles(&ve.expr) {
                        if !valid_roles.contains(&role) {
                            return Err(RuleParseError::invalid(
                                &constraint.name,
                                format!("expression references unknown role '{role}'"),
                            ));
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

/// Collect the role names referenced by an expression's paths.
fn expr_roles(expr: &crate::expr::Expr) -> Vec<String> {
    use crate::expr::Expr;
    let mut out = Vec::new();
    let mut stack = vec![expr];
    while let Some(e) = stack.pop() {
        match e {
            Expr::Path { role, .. } => out.push(role.clone()),
            Expr::Unary { expr, .. } => stack.push(expr),
            Expr::Binary { lhs, rhs, .. } => {
                stack.push(lhs);
                stack.push(rhs);
            }
            _ => {}
        }
    }
    out
}

// =============================================================================
// Shared helpers
// =============================================================================

/// Parse a `when`/`where` mapping into ordered conditions.
fn parse_conditions(value: Option<&Value>, name: &str) -> Result<Vec<Condition>> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    if value.is_null() {
        return Ok(Vec::new());
    }
    let m = value
        .as_mapping()
        .ok_or_else(|| RuleParseError::invalid(name, "conditions must be a mapping"))?;

    let mut out = Vec::new();
    for (k, v) in m {
        let field = k
            .as_str()
            .ok_or_else(|| RuleParseError::invalid(name, "condition fields must be strings"))?
            .to_string();
        require_prefixed(&field, name)?;
        let value = scalar_to_string(v)
            .ok_or_else(|| RuleParseError::invalid(name, "condition values must be scalars"))?;
        out.push(Condition {
            field,
            predicate: Predicate::from_value(&value),
        });
    }
    Ok(out)
}

fn parse_string_list(value: &Value, name: &str) -> Result<Vec<String>> {
    match value {
        Value::Sequence(seq) => seq
            .iter()
            .map(scalar_to_string)
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| RuleParseError::invalid(name, "list entries must be scalars")),
        other => scalar_to_string(other)
            .map(|s| vec![s])
            .ok_or_else(|| RuleParseError::invalid(name, "expected a scalar or list")),
    }
}

/// Normalize a YAML scalar to its comparison string.
fn scalar_to_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn require_str(m: &Mapping, key: &str, name: &str) -> Result<String> {
    get_str(m, key)
        .map(|s| s.to_string())
        .ok_or_else(|| RuleParseError::invalid(name, format!("missing '{key}'")))
}

/// Rule bodies must address groups by prefixed field names
/// (`section.field`); a bare name can never match a flattened group, so
/// it is a defect rather than a constraint that silently always passes.
fn require_prefixed(field: &str, name: &str) -> Result<()> {
    if field.contains('.') {
        Ok(())
    } else {
        Err(RuleParseError::invalid(
            name,
            format!("field '{field}' is not a prefixed field name (expected 'section.field')"),
        ))
    }
}

fn get_str<'a>(m: &'a Mapping, key: &str) -> Option<&'a str> {
    m.get(val_key(key)).and_then(|v| v.as_str())
}

fn val_key(key: &str) -> Value {
    Value::String(key.to_string())
}

// =============================================================================
// Tests
// =============================================================================
