//! Associative role assignments via hash equi-joins.
//!
//! Roles are bound in declared order. The first role's candidates seed the
//! partial assignments; each later role is joined in through a hash map
//! keyed by its link-field values, so matching stays linear in the number
//! of candidates instead of enumerating the cross product. Every link is
//! applied exactly once, when the later of its two roles is bound.

use std::collections::HashMap;

use cfgcheck_rules::{AssociateBy, Link};

use crate::assignment::RoleAssignment;
use crate::group::Group;

/// Produce every complete role assignment the associative topology admits.
///
/// A group qualifies as a candidate for a role when it matches all of the
/// role's `where` conditions. Two roles agree on a link when the linked
/// fields are present, non-empty, and pairwise equal; an empty string is
/// never join-compatible, not even with another empty string. One group
/// never fills two roles of the same assignment.
pub fn assignments<'a>(groups: &'a [Group], assoc: &AssociateBy) -> Vec<RoleAssignment<'a>> {
    // Candidate pools per role, in declared order.
    let candidates: Vec<Vec<&Group>> = assoc
        .roles
        .iter()
        .map(|role| {
            groups
                .iter()
                .filter(|g| role.where_.iter().all(|c| c.predicate.matches(g.get(&c.field))))
                .collect()
        })
        .collect();

    // Partial assignments hold one bound group per already-processed role.
    let mut partials: Vec<Vec<&Group>> = candidates[0].iter().map(|g| vec![*g]).collect();

    for (role_idx, role) in assoc.roles.iter().enumerate().skip(1) {
        // Links that attach this role to an earlier one, in declared order.
        let joining: Vec<&Link> = assoc
            .links
            .iter()
            .filter(|l| {
                let later = |r: &str| r == role.name;
                let earlier = |r: &str| {
                    assoc.roles[..role_idx].iter().any(|spec| spec.name == r)
                };
                (later(&l.right_role) && earlier(&l.left_role))
                    || (later(&l.left_role) && earlier(&l.right_role))
            })
            .collect();

        // Index this role's candidates by their side of the join key.
        let mut by_key: HashMap<Vec<&str>, Vec<&Group>> = HashMap::new();
        'candidate: for g in &candidates[role_idx] {
            let mut key = Vec::new();
            for link in &joining {
                let fields = if link.right_role == role.name {
                    &link.right_fields
                } else {
                    &link.left_fields
                };
                for field in fields {
                    match g.get(field) {
                        Some(v) if !v.is_empty() => key.push(v),
                        _ => continue 'candidate,
                    }
                }
            }
            by_key.entry(key).or_default().push(g);
        }

        let mut extended = Vec::new();
        'partial: for partial in &partials {
            let mut key = Vec::new();
            for link in &joining {
                let (other_role, fields) = if link.right_role == role.name {
                    (&link.left_role, &link.left_fields)
                } else {
                    (&link.right_role, &link.right_fields)
                };
                let pos = assoc.roles[..role_idx]
                    .iter()
                    .position(|spec| spec.name == *other_role)
                    .expect("joining link targets a bound role");
                for field in fields {
                    match partial[pos].get(field) {
                        Some(v) if !v.is_empty() => key.push(v),
                        _ => continue 'partial,
                    }
                }
            }
            let Some(matches) = by_key.get(&key) else {
                continue;
            };
            for g in matches {
                // Distinct groups per assignment.
                if partial.iter().any(|bound| bound.index == g.index) {
                    continue;
                }
                let mut next = partial.clone();
                next.push(g);
                extended.push(next);
            }
        }
        partials = extended;
        if partials.is_empty() {
            break;
        }
    }

    partials
        .into_iter()
        .map(|bound| {
            RoleAssignment::new(
                assoc
                    .roles
                    .iter()
                    .zip(bound)
                    .map(|(spec, g)| (spec.name.clone(), g))
                    .collect(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfgcheck_rules::{parse_rules_yaml, Topology};
    use std::collections::BTreeMap;

    fn group(index: usize, fields: &[(&str, &str)]) -> Group {
        let map: BTreeMap<String, String> = fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Group::new(index, map)
    }

    fn assoc_from_yaml(yaml: &str) -> AssociateBy {
        let store = parse_rules_yaml(yaml).unwrap();
        let binding = store.latest().unwrap().clone();
        match &binding.multi_constraints[0].topology {
            Topology::Associative(a) => a.clone(),
            other => panic!("expected associative topology, got {other:?}"),
        }
    }

    const PAIRING: &str = r#"
version: 1.0.0_20240601
multi_constraints:
  - name: channel-pairing
    associate_by:
      src1:
        where:
          opSch.opType: "dma"
      src2:
        where:
          opSch.opType: "compute"
      links:
        - src1: opSch.channelId
          src2: opSch.channelId
    rules:
      - type: same_value
        field: opSch.systemMode
"#;

    #[test]
    fn test_pairs_on_link_value() {
        let assoc = assoc_from_yaml(PAIRING);
        let groups = vec![
            group(0, &[("opSch.opType", "dma"), ("opSch.channelId", "7")]),
            group(1, &[("opSch.opType", "compute"), ("opSch.channelId", "7")]),
            group(2, &[("opSch.opType", "compute"), ("opSch.channelId", "9")]),
        ];
        let found = assignments(&groups, &assoc);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get("src1").unwrap().index, 0);
        assert_eq!(found[0].get("src2").unwrap().index, 1);
    }

    #[test]
    fn test_all_matching_pairs_enumerated() {
        let assoc = assoc_from_yaml(PAIRING);
        let groups = vec![
            group(0, &[("opSch.opType", "dma"), ("opSch.channelId", "7")]),
            group(1, &[("opSch.opType", "compute"), ("opSch.channelId", "7")]),
            group(2, &[("opSch.opType", "compute"), ("opSch.channelId", "7")]),
        ];
        let found = assignments(&groups, &assoc);
        let mut pairs: Vec<(usize, usize)> = found
            .iter()
            .map(|a| (a.get("src1").unwrap().index, a.get("src2").unwrap().index))
            .collect();
        pairs.sort();
        assert_eq!(pairs, vec![(0, 1), (0, 2)]);
    }

    #[test]
    fn test_empty_link_value_never_matches() {
        let assoc = assoc_from_yaml(PAIRING);
        let groups = vec![
            group(0, &[("opSch.opType", "dma"), ("opSch.channelId", "")]),
            group(1, &[("opSch.opType", "compute"), ("opSch.channelId", "")]),
        ];
        assert!(assignments(&groups, &assoc).is_empty());
    }

    #[test]
    fn test_absent_link_field_never_matches() {
        let assoc = assoc_from_yaml(PAIRING);
        let groups = vec![
            group(0, &[("opSch.opType", "dma")]),
            group(1, &[("opSch.opType", "compute")]),
        ];
        assert!(assignments(&groups, &assoc).is_empty());
    }

    #[test]
    fn test_one_group_cannot_fill_two_roles() {
        let yaml = r#"
version: 1.0.0_20240601
multi_constraints:
  - name: self-pair
    associate_by:
      src1:
        where:
          opSch.channelId: "*"
      src2:
        where:
          opSch.channelId: "*"
      links:
        - src1: opSch.channelId
          src2: opSch.channelId
    rules:
      - type: same_value
        field: opSch.mode
"#;
        let assoc = assoc_from_yaml(yaml);
        let groups = vec![group(0, &[("opSch.channelId", "7")])];
        assert!(assignments(&groups, &assoc).is_empty());
    }

    #[test]
    fn test_three_role_chain_join() {
        let yaml = r#"
version: 1.0.0_20240601
multi_constraints:
  - name: triple
    associate_by:
      src1:
        where:
          opSch.opType: "dma"
      src2:
        where:
          opSch.opType: "compute"
      src3:
        where:
          opSch.opType: "barrier"
      links:
        - src1: opSch.channelId
          src2: opSch.channelId
        - src2: opSch.queueId
          src3: opSch.queueId
    rules:
      - type: same_value
        field: opSch.mode
"#;
        let assoc = assoc_from_yaml(yaml);
        let groups = vec![
            group(0, &[("opSch.opType", "dma"), ("opSch.channelId", "7")]),
            group(
                1,
                &[
                    ("opSch.opType", "compute"),
                    ("opSch.channelId", "7"),
                    ("opSch.queueId", "q1"),
                ],
            ),
            group(2, &[("opSch.opType", "barrier"), ("opSch.queueId", "q1")]),
            group(3, &[("opSch.opType", "barrier"), ("opSch.queueId", "q2")]),
        ];
        let found = assignments(&groups, &assoc);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].group_indices(), vec![0, 1, 2]);
    }

    #[test]
    fn test_multi_field_link_requires_all_fields_equal() {
        let yaml = r#"
version: 1.0.0_20240601
multi_constraints:
  - name: two-field
    associate_by:
      src1:
        where:
          opSch.opType: "dma"
      src2:
        where:
          opSch.opType: "compute"
      links:
        - src1: ["opSch.a", "opSch.b"]
          src2: ["opSch.a", "opSch.b"]
    rules:
      - type: same_value
        field: opSch.mode
"#;
        let assoc = assoc_from_yaml(yaml);
        let groups = vec![
            group(0, &[("opSch.opType", "dma"), ("opSch.a", "1"), ("opSch.b", "2")]),
            group(1, &[("opSch.opType", "compute"), ("opSch.a", "1"), ("opSch.b", "2")]),
            group(2, &[("opSch.opType", "compute"), ("opSch.a", "1"), ("opSch.b", "9")]),
        ];
        let found = assignments(&groups, &assoc);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get("src2").unwrap().index, 1);
    }

    #[test]
    fn test_order_insensitive_by_index_set() {
        // Shuffling the input changes assignment discovery order but not
        // the set of matched index tuples.
        let assoc = assoc_from_yaml(PAIRING);
        let forward = vec![
            group(0, &[("opSch.opType", "dma"), ("opSch.channelId", "7")]),
            group(1, &[("opSch.opType", "compute"), ("opSch.channelId", "7")]),
        ];
        let mut found: Vec<Vec<usize>> = assignments(&forward, &assoc)
            .iter()
            .map(|a| a.group_indices())
            .collect();
        found.sort();

        let reversed = vec![
            group(0, &[("opSch.opType", "compute"), ("opSch.channelId", "7")]),
            group(1, &[("opSch.opType", "dma"), ("opSch.channelId", "7")]),
        ];
        let mut found_rev: Vec<Vec<usize>> = assignments(&reversed, &assoc)
            .iter()
            .map(|a| a.group_indices())
            .collect();
        found_rev.sort();

        assert_eq!(found, vec![vec![0, 1]]);
        assert_eq!(found_rev, vec![vec![1, 0]]);
    }
}
