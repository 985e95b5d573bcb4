//! Sliding-window role assignments over the group sequence.

use crate::assignment::RoleAssignment;
use crate::group::Group;

/// Iterate all windows of `group_count` consecutive groups, binding roles
/// `group0..group{N-1}` in sequence order.
///
/// A sequence of length `L` yields `L - N + 1` windows, or none when
/// `L < N`. A zero-width window matches nothing. Windows are produced
/// lazily.
pub fn windows(groups: &[Group], group_count: usize) -> impl Iterator<Item = RoleAssignment<'_>> {
    let take = if group_count == 0 { 0 } else { usize::MAX };
    // `slice::windows` panics on zero width, so clamp and cut instead.
    groups.windows(group_count.max(1)).take(take).map(|w| {
        RoleAssignment::new(
            w.iter()
                .enumerate()
                .map(|(i, g)| (format!("group{i}"), g))
                .collect(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn groups(n: usize) -> Vec<Group> {
        (0..n)
            .map(|i| {
                let mut fields = BTreeMap::new();
                fields.insert("opSch.seq".to_string(), i.to_string());
                Group::new(i, fields)
            })
            .collect()
    }

    #[test]
    fn test_window_count() {
        assert_eq!(windows(&groups(5), 2).count(), 4);
        assert_eq!(windows(&groups(5), 3).count(), 3);
        assert_eq!(windows(&groups(2), 2).count(), 1);
    }

    #[test]
    fn test_short_sequence_yields_nothing() {
        assert_eq!(windows(&groups(1), 2).count(), 0);
        assert_eq!(windows(&groups(2), 3).count(), 0);
        assert_eq!(windows(&groups(0), 2).count(), 0);
    }

    #[test]
    fn test_zero_width_yields_nothing() {
        assert_eq!(windows(&groups(3), 0).count(), 0);
        assert_eq!(windows(&groups(0), 0).count(), 0);
    }

    #[test]
    fn test_roles_bind_in_sequence_order() {
        let gs = groups(4);
        let second = windows(&gs, 3).nth(1).unwrap();
        assert_eq!(second.get("group0").unwrap().index, 1);
        assert_eq!(second.get("group1").unwrap().index, 2);
        assert_eq!(second.get("group2").unwrap().index, 3);
    }
}
