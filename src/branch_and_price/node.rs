use std::cmp::Ordering;

use compare::Compare;
use itertools::Itertools;

use crate::branch::BranchDecision;
use crate::error::{BnpError, Result};
use crate::instance::ItemId;
use crate::master::{Column, ColumnId, RestrictedMasterProblem};
use crate::misc::{FullHashMap, IntSet};
use crate::settings::SearchStrategy;

/// Unordered pair of active items, smaller id first
pub type ItemPair = (ItemId, ItemId);

pub fn item_pair(a: ItemId, b: ItemId) -> ItemPair {
    if a <= b { (a, b) } else { (b, a) }
}

/// For every item pair, the columns packing both (`p`) and the columns
/// packing exactly one of them (`q`).
///
/// Removing a column must retract it from every entry, not only from the
/// pair that triggered the removal.
#[derive(Clone, Debug, Default)]
pub struct PairIndex {
    p: FullHashMap<ItemPair, IntSet<ColumnId>>,
    q: FullHashMap<ItemPair, IntSet<ColumnId>>,
}

impl PairIndex {
    pub fn build(rmp: &RestrictedMasterProblem) -> Self {
        let mut index = PairIndex::default();
        for column in rmp.columns() {
            index.insert_column(rmp, column);
        }
        index
    }

    pub fn insert_column(&mut self, rmp: &RestrictedMasterProblem, column: &Column) {
        let (inside, outside): (Vec<ItemId>, Vec<ItemId>) = rmp
            .items()
            .iter()
            .map(|item| (item.id, rmp.contains(column, item)))
            .partition_map(|(id, packed)| {
                if packed {
                    itertools::Either::Left(id)
                } else {
                    itertools::Either::Right(id)
                }
            });

        for (&a, &b) in inside.iter().tuple_combinations() {
            self.p.entry(item_pair(a, b)).or_default().insert(column.id);
        }
        for &a in &inside {
            for &b in &outside {
                self.q.entry(item_pair(a, b)).or_default().insert(column.id);
            }
        }
    }

    /// Removes the column from every p and q entry
    pub fn retract_column(&mut self, id: ColumnId) {
        for map in [&mut self.p, &mut self.q] {
            map.retain(|_, columns| {
                columns.remove(&id);
                !columns.is_empty()
            });
        }
    }

    pub fn together(&self, a: ItemId, b: ItemId) -> Vec<ColumnId> {
        self.p.get(&item_pair(a, b)).map(|s| s.iter().copied().sorted().collect()).unwrap_or_default()
    }

    pub fn apart(&self, a: ItemId, b: ItemId) -> Vec<ColumnId> {
        self.q.get(&item_pair(a, b)).map(|s| s.iter().copied().sorted().collect()).unwrap_or_default()
    }

    /// Pairs that share at least one column, in ascending pair order
    pub fn co_occurring(&self) -> impl Iterator<Item = (ItemPair, &IntSet<ColumnId>)> {
        self.p.iter().map(|(pair, columns)| (*pair, columns)).sorted_by_key(|(pair, _)| *pair)
    }

    /// Every referenced column must still exist in the master
    pub fn verify(&self, rmp: &RestrictedMasterProblem) -> Result<()> {
        for columns in self.p.values().chain(self.q.values()) {
            if let Some(&column) = columns.iter().find(|id| !rmp.has_column(**id)) {
                return Err(BnpError::InconsistentBookkeeping { column });
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
/// Primary struct for a node in the branching tree.
///
/// Every node owns its master, conflict graph and pair index by value,
/// children start from a deep copy of their parent.
pub struct Node {
    pub id: u32,
    pub parent: u32,
    pub depth: u32,
    /// relaxation value of the parent, a valid lower bound for this node
    pub bound: f64,
    pub decision: Option<BranchDecision>,
    pub rmp: RestrictedMasterProblem,
    pub pairs: PairIndex,
}

impl Node {
    pub fn root(id: u32, rmp: RestrictedMasterProblem) -> Self {
        let pairs = PairIndex::build(&rmp);
        Node {
            id,
            parent: id,
            depth: 0,
            bound: f64::NEG_INFINITY,
            decision: None,
            rmp,
            pairs,
        }
    }

    /// Unmodified copy one level deeper, ready to receive a decision
    pub fn create_child(&self, id: u32, parent_obj: f64, decision: BranchDecision) -> Self {
        Node {
            id,
            parent: self.id,
            depth: self.depth + 1,
            bound: parent_obj,
            decision: Some(decision),
            rmp: self.rmp.clone(),
            pairs: self.pairs.clone(),
        }
    }

    /// Adds a column over active items to the master and the pair index
    pub fn add_column(&mut self, active: &[ItemId]) -> Option<ColumnId> {
        let id = self.rmp.add_active_column(active)?;
        if let Some(column) = self.rmp.column(id) {
            self.pairs.insert_column(&self.rmp, column);
        }
        Some(id)
    }

    pub fn remove_column(&mut self, id: ColumnId) -> Option<Column> {
        let removed = self.rmp.remove_variable(id)?;
        self.pairs.retract_column(id);
        Some(removed)
    }

    /// Identity columns for active items that lost theirs after a branch
    pub fn restore_coverage(&mut self) {
        for id in self.rmp.ensure_identity_columns() {
            if let Some(column) = self.rmp.column(id) {
                self.pairs.insert_column(&self.rmp, column);
            }
        }
    }

    pub fn rebuild_pairs(&mut self) {
        self.pairs = PairIndex::build(&self.rmp);
    }
}

/// Orders open nodes for the configured strategy.
/// The queue pops the greatest node first.
#[derive(Clone, Copy, Debug)]
pub struct NodeComparator {
    strategy: SearchStrategy,
}

impl NodeComparator {
    pub fn new(strategy: SearchStrategy) -> Self {
        Self { strategy }
    }
}

impl Compare<Node> for NodeComparator {
    fn compare(&self, l: &Node, r: &Node) -> Ordering {
        match self.strategy {
            // newest node first
            SearchStrategy::DepthFirst => l.id.cmp(&r.id),
            SearchStrategy::BreadthFirst => r.id.cmp(&l.id),
            // lowest bound first, deeper node on ties
            SearchStrategy::BestFirst => r.bound.total_cmp(&l.bound).then(l.depth.cmp(&r.depth)),
        }
    }
}
