//! Priority assignment (C4): bottom-up fan-in weighting within a Simple
//! build group, used only to break dispatch ties.

use std::collections::{BTreeSet, HashMap};

use crate::recipe::RecipeId;

/// Assign each member of a Simple group an integer priority.
///
/// `priority[v] = 10` initially. Vertices with no remaining dependents within
/// the group (`by(v)` empty, restricted to what's left) are retired one pass
/// at a time; retiring `v` adds `priority[v]` onto every `u ∈ on(v)`. Because
/// the group is acyclic, each pass retires at least one vertex.
#[must_use]
pub fn assign_priorities(
    members: &[RecipeId],
    on: &HashMap<RecipeId, BTreeSet<RecipeId>>,
    by: &HashMap<RecipeId, BTreeSet<RecipeId>>,
) -> HashMap<RecipeId, i64> {
    let mut priority: HashMap<RecipeId, i64> = members.iter().map(|&id| (id, 10)).collect();
    let mut remaining: BTreeSet<RecipeId> = members.iter().copied().collect();

    while !remaining.is_empty() {
        let free: Vec<RecipeId> = remaining
            .iter()
            .copied()
            .filter(|id| {
                by.get(id)
                    .is_none_or(|dependents| dependents.is_disjoint(&remaining))
            })
            .collect();

        debug_assert!(
            !free.is_empty(),
            "a Simple group must be acyclic; every pass retires at least one member"
        );
        if free.is_empty() {
            // Defensive: an undeclared cycle slipped past the grouper somehow.
            // Assign remaining members their base priority and stop rather
            // than loop forever.
            break;
        }

        for &v in &free {
            let contribution = priority[&v];
            if let Some(deps) = on.get(&v) {
                for &u in deps {
                    if let Some(p) = priority.get_mut(&u) {
                        *p += contribution;
                    }
                }
            }
            let _ = remaining.remove(&v);
        }
    }

    priority
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet as Set;

    #[test]
    fn linear_chain() {
        let members = vec![RecipeId(0), RecipeId(1), RecipeId(2)];
        let mut on = HashMap::new();
        let mut by = HashMap::new();
        on.insert(RecipeId(0), Set::new());
        on.insert(RecipeId(1), Set::from([RecipeId(0)]));
        on.insert(RecipeId(2), Set::from([RecipeId(1)]));
        by.insert(RecipeId(0), Set::from([RecipeId(1)]));
        by.insert(RecipeId(1), Set::from([RecipeId(2)]));
        by.insert(RecipeId(2), Set::new());

        let priority = assign_priorities(&members, &on, &by);
        assert_eq!(priority[&RecipeId(0)], 30);
        assert_eq!(priority[&RecipeId(1)], 20);
        assert_eq!(priority[&RecipeId(2)], 10);
    }

    #[test]
    fn fan_out() {
        let members = vec![RecipeId(0), RecipeId(1), RecipeId(2), RecipeId(3)];
        let mut on = HashMap::new();
        let mut by = HashMap::new();
        on.insert(RecipeId(0), Set::new());
        on.insert(RecipeId(1), Set::from([RecipeId(0)]));
        on.insert(RecipeId(2), Set::from([RecipeId(0)]));
        on.insert(RecipeId(3), Set::from([RecipeId(0)]));
        by.insert(RecipeId(0), Set::from([RecipeId(1), RecipeId(2), RecipeId(3)]));
        by.insert(RecipeId(1), Set::new());
        by.insert(RecipeId(2), Set::new());
        by.insert(RecipeId(3), Set::new());

        let priority = assign_priorities(&members, &on, &by);
        assert_eq!(priority[&RecipeId(0)], 40);
        assert_eq!(priority[&RecipeId(1)], 10);
        assert_eq!(priority[&RecipeId(2)], 10);
        assert_eq!(priority[&RecipeId(3)], 10);
    }

    #[test]
    fn independent_singleton() {
        let members = vec![RecipeId(0)];
        let on = HashMap::from([(RecipeId(0), Set::new())]);
        let by = HashMap::from([(RecipeId(0), Set::new())]);

        let priority = assign_priorities(&members, &on, &by);
        assert_eq!(priority[&RecipeId(0)], 10);
    }
}
