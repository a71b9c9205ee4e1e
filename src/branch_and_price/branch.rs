use std::fmt::{Display, Formatter};

use crate::error::Result;
use crate::instance::ItemId;
use crate::master::ColumnId;
use crate::misc::HashMap;
use crate::node::{item_pair, ItemPair, Node};
use crate::settings::Tolerances;

/// Ryan-Foster decision on an item pair
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BranchDecision {
    /// both items share a bin, the second is merged into the first
    Merge(ItemId, ItemId),
    /// the items never share a bin
    Conflict(ItemId, ItemId),
}

impl BranchDecision {
    pub fn pair(&self) -> ItemPair {
        match *self {
            BranchDecision::Merge(a, b) | BranchDecision::Conflict(a, b) => item_pair(a, b),
        }
    }
}

impl Display for BranchDecision {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BranchDecision::Merge(a, b) => write!(f, "{a} with {b}"),
            BranchDecision::Conflict(a, b) => write!(f, "{a} apart from {b}"),
        }
    }
}

/// Pick the item pair whose co-occurrence is fractional and closest to 0.5.
///
/// Returns `Ok(None)` if every co-occurrence is integral.
pub fn select_branching_pair(
    node: &Node,
    column_x: &[(f64, ColumnId)],
    tolerances: &Tolerances,
) -> Result<Option<ItemPair>> {
    node.pairs.verify(&node.rmp)?;

    let values: HashMap<ColumnId, f64> = column_x.iter().map(|&(v, id)| (id, v)).collect();

    let mut best: Option<(f64, ItemPair)> = None;
    for (pair, columns) in node.pairs.co_occurring() {
        let together: f64 = columns.iter().map(|id| values.get(id).copied().unwrap_or(0.0)).sum();
        if tolerances.is_integer(together) {
            continue;
        }

        let distance = (together - 0.5).abs();
        if distance <= tolerances.integer {
            return Ok(Some(pair));
        }
        if best.map_or(true, |(d, _)| distance < d) {
            best = Some((distance, pair));
        }
    }

    Ok(best.map(|(_, pair)| pair))
}

/// Both children of a node for the given pair, merge child first.
///
/// Each child starts from its own deep copy of the parent. The merge child
/// receives the later id, so depth first search dives into it first.
pub fn create_children(parent: &Node, pair: ItemPair, parent_obj: f64, mut next_id: impl FnMut() -> u32) -> Result<[Node; 2]> {
    let (a, b) = pair;
    let conflict_id = next_id();
    let merge_id = next_id();
    let merge = apply_decision(parent, BranchDecision::Merge(a, b), merge_id, parent_obj)?;
    let conflict = apply_decision(parent, BranchDecision::Conflict(a, b), conflict_id, parent_obj)?;
    Ok([merge, conflict])
}

pub fn apply_decision(parent: &Node, decision: BranchDecision, id: u32, parent_obj: f64) -> Result<Node> {
    let mut child = parent.create_child(id, parent_obj, decision);

    match decision {
        BranchDecision::Merge(keep, retire) => {
            // columns packing only one of the two can no longer be used
            for column in child.pairs.apart(keep, retire) {
                child.remove_column(column);
            }

            child.rmp.merge_items(keep, retire)?;

            for column in child.rmp.remove_infeasible_columns() {
                child.pairs.retract_column(column);
            }

            // the item set changed, every pair involving `keep` is stale
            child.rebuild_pairs();
        }
        BranchDecision::Conflict(u, v) => {
            child.rmp.graph_mut().add_edge(u, v);
            for column in child.pairs.together(u, v) {
                child.remove_column(column);
            }
        }
    }

    child.restore_coverage();

    #[cfg(feature = "validity_assertions")]
    {
        assert!(child.rmp.columns().all(|c| child.rmp.is_feasible(c)));
        child.pairs.verify(&child.rmp)?;
    }

    Ok(child)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{Instance, Item};
    use crate::master::RestrictedMasterProblem;

    fn node() -> Node {
        let instance = Instance::new(10, vec![Item::new(1, 4), Item::new(2, 4), Item::new(3, 4)]);
        let mut node = Node::root(0, RestrictedMasterProblem::with_columns(&instance, Vec::new(), None));
        node.add_column(&[ItemId(1), ItemId(2)]);
        node.add_column(&[ItemId(1), ItemId(3)]);
        node.add_column(&[ItemId(2), ItemId(3)]);
        node
    }

    fn x(node: &Node, values: &[(&[u32], f64)]) -> Vec<(f64, ColumnId)> {
        node.rmp
            .columns()
            .map(|c| {
                let value = values
                    .iter()
                    .find(|(ids, _)| c.items == ids.iter().map(|&i| ItemId(i)).collect::<Vec<_>>())
                    .map_or(0.0, |(_, v)| *v);
                (value, c.id)
            })
            .collect()
    }

    #[test]
    fn selects_half_fractional_pair() {
        let node = node();
        let column_x = x(&node, &[(&[1, 2][..], 0.5), (&[1, 3][..], 0.5), (&[2, 3][..], 0.5)]);
        let pair = select_branching_pair(&node, &column_x, &Tolerances::default()).unwrap();
        assert_eq!(pair, Some((ItemId(1), ItemId(2))));
    }

    #[test]
    fn integral_co_occurrence_yields_no_pair() {
        let node = node();
        let column_x = x(&node, &[(&[1, 2][..], 1.0), (&[3][..], 1.0)]);
        assert_eq!(select_branching_pair(&node, &column_x, &Tolerances::default()).unwrap(), None);
    }

    #[test]
    fn children_split_the_pair() {
        let parent = node();
        let mut ids = 1..;
        let [merge, conflict] =
            create_children(&parent, (ItemId(1), ItemId(2)), 1.5, || ids.next().unwrap()).unwrap();

        // merge: 2 is gone, every remaining column packs both originals or neither
        assert!(merge.rmp.item(ItemId(2)).is_none());
        for column in merge.rmp.columns() {
            assert_eq!(column.items.contains(&ItemId(1)), column.items.contains(&ItemId(2)));
        }
        assert!(merge.rmp.columns().any(|c| c.items == vec![ItemId(1), ItemId(2)]));

        // conflict: no column packs both, items still covered
        assert!(conflict.rmp.graph().has_edge(ItemId(1), ItemId(2)));
        for column in conflict.rmp.columns() {
            assert!(!(column.items.contains(&ItemId(1)) && column.items.contains(&ItemId(2))));
        }
        for item in conflict.rmp.items() {
            assert!(conflict.rmp.columns().any(|c| conflict.rmp.contains(c, item)));
        }

        assert!(merge.id > conflict.id);
        for child in [&merge, &conflict] {
            assert_eq!(child.depth, 1);
            assert_eq!(child.bound, 1.5);
            assert!(child.pairs.verify(&child.rmp).is_ok());
        }

        // the parent is untouched
        assert_eq!(parent.rmp.num_columns(), 6);
        assert!(!parent.rmp.graph().has_edge(ItemId(1), ItemId(2)));
    }

    #[test]
    fn merge_inherits_conflicts_of_retired_item() {
        let mut parent = node();
        parent.rmp.graph_mut().add_edge(ItemId(2), ItemId(3));
        let columns: Vec<ColumnId> = parent.pairs.together(ItemId(2), ItemId(3));
        for column in columns {
            parent.remove_column(column);
        }

        let child = apply_decision(&parent, BranchDecision::Merge(ItemId(1), ItemId(2)), 7, 1.0).unwrap();
        assert!(child.rmp.graph().has_edge(ItemId(1), ItemId(3)));
        // {1,3} would now put 3 next to the merged item it conflicts with
        assert!(!child.rmp.columns().any(|c| c.items == vec![ItemId(1), ItemId(3)]));
    }

    /// Exact cover search over the original ids of the active items
    fn has_exact_partition(node: &Node) -> bool {
        fn cover(columns: &[Vec<ItemId>], open: &mut Vec<ItemId>) -> bool {
            let Some(&first) = open.first() else {
                return true;
            };
            for column in columns.iter().filter(|c| c.contains(&first)) {
                if column.iter().all(|id| open.contains(id)) {
                    let saved = open.clone();
                    open.retain(|id| !column.contains(id));
                    if cover(columns, open) {
                        return true;
                    }
                    *open = saved;
                }
            }
            false
        }

        let columns: Vec<Vec<ItemId>> = node.rmp.columns().map(|c| c.items.clone()).collect();
        let mut open: Vec<ItemId> = node.rmp.items().iter().flat_map(|i| i.members.iter().copied()).collect();
        open.sort_unstable();
        cover(&columns, &mut open)
    }

    #[test]
    fn conflict_on_a_seeded_bin_keeps_a_partition() {
        let instance = Instance::new(10, (1..=4).map(|i| Item::new(i, 4)).collect());
        let seed = vec![vec![ItemId(1), ItemId(2)], vec![ItemId(3), ItemId(4)]];
        let mut root = Node::root(0, RestrictedMasterProblem::with_columns(&instance, Vec::new(), Some(&seed)));
        root.add_column(&[ItemId(1), ItemId(3)]);

        let child = apply_decision(&root, BranchDecision::Conflict(ItemId(3), ItemId(4)), 1, 2.0).unwrap();

        assert!(!child.rmp.columns().any(|c| c.items == vec![ItemId(3), ItemId(4)]));
        assert!(has_exact_partition(&child));
        for item in child.rmp.items() {
            assert!(child.rmp.columns().any(|c| c.items == item.members));
        }
    }

    #[test]
    fn consecutive_merges_keep_a_partition() {
        let instance = Instance::new(10, (1..=6).map(|i| Item::new(i, 3)).collect());
        let mut root = Node::root(0, RestrictedMasterProblem::with_columns(&instance, Vec::new(), None));
        root.add_column(&[ItemId(1), ItemId(2), ItemId(3)]);
        root.add_column(&[ItemId(3), ItemId(4), ItemId(5)]);

        let child = apply_decision(&root, BranchDecision::Merge(ItemId(1), ItemId(2)), 1, 2.0).unwrap();
        assert!(has_exact_partition(&child));
        let grandchild = apply_decision(&child, BranchDecision::Merge(ItemId(4), ItemId(5)), 2, 2.0).unwrap();

        assert!(has_exact_partition(&grandchild));
        assert!(grandchild.rmp.columns().any(|c| c.items == vec![ItemId(1), ItemId(2)]));
        assert!(grandchild.rmp.columns().any(|c| c.items == vec![ItemId(4), ItemId(5)]));
        assert!(grandchild.pairs.verify(&grandchild.rmp).is_ok());
    }
}
