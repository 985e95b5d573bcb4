//! Role assignments: a binding of role names to groups.
//!
//! Window topologies bind `group0..group{N-1}` to consecutive groups;
//! associative topologies bind declared role names (`src1..src3`) to the
//! groups the join produced. Checks only ever see an assignment, so the
//! same check code runs under either topology.

use crate::group::Group;

/// An ordered role → group binding for one check application.
#[derive(Debug, Clone)]
pub struct RoleAssignment<'a> {
    entries: Vec<(String, &'a Group)>,
}

impl<'a> RoleAssignment<'a> {
    pub fn new(entries: Vec<(String, &'a Group)>) -> Self {
        RoleAssignment { entries }
    }

    /// Resolve a role name to its bound group.
    pub fn get(&self, role: &str) -> Option<&'a Group> {
        self.entries
            .iter()
            .find(|(name, _)| name == role)
            .map(|(_, g)| *g)
    }

    /// Roles in binding order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &'a Group)> {
        self.entries.iter().map(|(name, g)| (name.as_str(), *g))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Group indices in binding order, for violation reporting.
    pub fn group_indices(&self) -> Vec<usize> {
        self.entries.iter().map(|(_, g)| g.index).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn group(index: usize, field: &str, value: &str) -> Group {
        let mut fields = BTreeMap::new();
        fields.insert(field.to_string(), value.to_string());
        Group::new(index, fields)
    }

    #[test]
    fn test_get_and_order() {
        let g0 = group(4, "opSch.mode", "1");
        let g1 = group(7, "opSch.mode", "2");
        let a = RoleAssignment::new(vec![("src1".into(), &g0), ("src2".into(), &g1)]);

        assert_eq!(a.get("src1").unwrap().index, 4);
        assert_eq!(a.get("src2").unwrap().index, 7);
        assert_eq!(a.get("src3"), None);
        assert_eq!(a.group_indices(), vec![4, 7]);

        let roles: Vec<&str> = a.iter().map(|(r, _)| r).collect();
        assert_eq!(roles, vec!["src1", "src2"]);
    }
}
