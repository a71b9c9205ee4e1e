use std::collections::BTreeMap;

use crate::cuts::SubsetRowCut;
use crate::error::{BnpError, Result};
use crate::graph::ConflictGraph;
use crate::instance::{Instance, Item, ItemId, Objective};
use crate::misc::HashMap;
use crate::pricing::{Duals, PricingProblem};
use crate::solvers::{LpColumn, LpProblem, LpSolver, RowBound};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ColumnId(pub u32);

impl std::hash::Hash for ColumnId {
    fn hash<H: std::hash::Hasher>(&self, hasher: &mut H) {
        hasher.write_u32(self.0)
    }
}

impl nohash_hasher::IsEnabled for ColumnId {}

/// One bin: the original items packed together.
/// Columns are never mutated once created, only removed.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub id: ColumnId,
    /// original item ids, ascending
    pub items: Vec<ItemId>,
    pub cost: f64,
}

impl Column {
    pub fn contains_all(&self, originals: &[ItemId]) -> bool {
        originals.iter().all(|id| self.items.binary_search(id).is_ok())
    }

    pub fn contains_any(&self, originals: &[ItemId]) -> bool {
        originals.iter().any(|id| self.items.binary_search(id).is_ok())
    }
}

/// An item of the master problem.
///
/// Merging two items produces one active item that stands for all of
/// their originals and keeps the first identifier.
#[derive(Clone, Debug, PartialEq)]
pub struct ActiveItem {
    pub id: ItemId,
    pub width: u32,
    pub processing_time: u32,
    /// original ids represented by this item, ascending
    pub members: Vec<ItemId>,
}

impl From<&Item> for ActiveItem {
    fn from(item: &Item) -> Self {
        ActiveItem {
            id: item.id,
            width: item.width,
            processing_time: item.processing_time,
            members: vec![item.id],
        }
    }
}

/// Result of the last master solve
#[derive(Clone, Debug, PartialEq)]
pub struct MasterSolution {
    pub objective: f64,
    /// value per column, ascending column id
    pub values: Vec<(f64, ColumnId)>,
    pub duals: Duals,
    pub runtime: f64,
}

/// Restricted master problem: one `= 1` row per active item, one `<= 1`
/// row per subset-row cut and the current column set.
///
/// Owns the conflict graph of its node. Adding or removing anything
/// invalidates the last solution, duals must be read after a new solve.
#[derive(Clone, Debug)]
pub struct RestrictedMasterProblem {
    capacity: u32,
    objective: Objective,
    items: Vec<ActiveItem>,
    originals: HashMap<ItemId, Item>,
    graph: ConflictGraph,
    cuts: Vec<SubsetRowCut>,
    columns: BTreeMap<ColumnId, Column>,
    next_column: u32,
    solution: Option<MasterSolution>,
}

impl RestrictedMasterProblem {
    /// Master over the full item set without any column
    pub fn new(instance: &Instance, cuts: Vec<SubsetRowCut>) -> Self {
        let mut graph = ConflictGraph::new();
        graph.add_nodes_from(instance.items.iter().map(|i| i.id));
        for &(u, v) in &instance.conflicts {
            graph.add_edge(u, v);
        }

        RestrictedMasterProblem {
            capacity: instance.capacity,
            objective: instance.objective,
            items: instance.items.iter().map(ActiveItem::from).collect(),
            originals: instance.items.iter().map(|i| (i.id, i.clone())).collect(),
            graph,
            cuts,
            columns: BTreeMap::new(),
            next_column: 0,
            solution: None,
        }
    }

    /// Master with the given seed columns (original ids) plus the identity
    /// column of every item
    pub fn with_columns(instance: &Instance, cuts: Vec<SubsetRowCut>, seed: Option<&[Vec<ItemId>]>) -> Self {
        let mut rmp = Self::new(instance, cuts);
        for column in seed.unwrap_or_default() {
            rmp.add_column(column.clone());
        }
        rmp.ensure_identity_columns();
        rmp
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    pub fn items(&self) -> &[ActiveItem] {
        &self.items
    }

    pub fn item(&self, id: ItemId) -> Option<&ActiveItem> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn graph(&self) -> &ConflictGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut ConflictGraph {
        self.solution = None;
        &mut self.graph
    }

    pub fn cuts(&self) -> &[SubsetRowCut] {
        &self.cuts
    }

    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.values()
    }

    pub fn column(&self, id: ColumnId) -> Option<&Column> {
        self.columns.get(&id)
    }

    pub fn has_column(&self, id: ColumnId) -> bool {
        self.columns.contains_key(&id)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Whether the column packs the given active item
    pub fn contains(&self, column: &Column, item: &ActiveItem) -> bool {
        column.contains_all(&item.members)
    }

    /// Active items packed in the column, in item order
    pub fn active_items_of<'a>(&'a self, column: &'a Column) -> impl Iterator<Item = &'a ActiveItem> + 'a {
        self.items.iter().filter(move |item| self.contains(column, item))
    }

    pub fn column_weight(&self, column: &Column) -> u32 {
        column.items.iter().filter_map(|id| self.originals.get(id)).map(|i| i.width).sum()
    }

    /// Adds a column over original item ids.
    /// Returns `None` if the same packing already exists.
    pub fn add_column(&mut self, mut items: Vec<ItemId>) -> Option<ColumnId> {
        items.sort_unstable();
        items.dedup();

        if self.columns.values().any(|c| c.items == items) {
            return None;
        }

        #[cfg(feature = "validity_assertions")]
        assert!(self.column_weight(&Column { id: ColumnId(u32::MAX), items: items.clone(), cost: 0.0 }) <= self.capacity);

        let cost = self
            .objective
            .column_cost(items.iter().filter_map(|id| self.originals.get(id)).map(|i| i.processing_time));
        let id = ColumnId(self.next_column);
        self.next_column += 1;
        self.columns.insert(id, Column { id, items, cost });
        self.solution = None;
        Some(id)
    }

    /// Adds a column over active item ids, expanding merged items
    pub fn add_active_column(&mut self, active: &[ItemId]) -> Option<ColumnId> {
        let originals = active
            .iter()
            .filter_map(|id| self.item(*id))
            .flat_map(|item| item.members.iter().copied())
            .collect();
        self.add_column(originals)
    }

    pub fn remove_variable(&mut self, id: ColumnId) -> Option<Column> {
        let removed = self.columns.remove(&id);
        if removed.is_some() {
            self.solution = None;
        }
        removed
    }

    /// Drops the exact row of an item. Its originals are no longer
    /// covered by the master unless another active item takes them over.
    pub fn remove_constraint(&mut self, id: ItemId) -> Option<ActiveItem> {
        let position = self.items.iter().position(|i| i.id == id)?;
        self.solution = None;
        Some(self.items.remove(position))
    }

    /// Collapse `retire` into `keep`: widths add up, originals are united,
    /// conflict edges move over and the row of `retire` disappears.
    pub fn merge_items(&mut self, keep: ItemId, retire: ItemId) -> Result<()> {
        let retired = self
            .remove_constraint(retire)
            .ok_or_else(|| BnpError::Solver(format!("cannot merge unknown item {retire}")))?;
        let kept = self
            .items
            .iter_mut()
            .find(|i| i.id == keep)
            .ok_or_else(|| BnpError::Solver(format!("cannot merge into unknown item {keep}")))?;

        kept.width += retired.width;
        kept.processing_time = kept.processing_time.max(retired.processing_time);
        kept.members.extend(retired.members);
        kept.members.sort_unstable();

        let neighbors: Vec<ItemId> = self.graph.neighbors(retire).collect();
        for neighbor in neighbors {
            self.graph.add_edge(keep, neighbor);
        }
        self.graph.remove_node(retire);
        Ok(())
    }

    /// Capacity, conflict and merge consistency of a column
    pub fn is_feasible(&self, column: &Column) -> bool {
        if self.column_weight(column) > self.capacity {
            return false;
        }

        let mut packed = Vec::new();
        for item in &self.items {
            if self.contains(column, item) {
                packed.push(item.id);
            } else if column.contains_any(&item.members) {
                // splits a merged item
                return false;
            }
        }

        !packed
            .iter()
            .enumerate()
            .any(|(k, &u)| packed[k + 1..].iter().any(|&v| self.graph.has_edge(u, v)))
    }

    /// Removes every column that violates capacity, a conflict edge or a merge
    pub fn remove_infeasible_columns(&mut self) -> Vec<ColumnId> {
        let infeasible: Vec<ColumnId> = self
            .columns
            .values()
            .filter(|c| !self.is_feasible(c))
            .map(|c| c.id)
            .collect();
        for id in &infeasible {
            self.remove_variable(*id);
        }
        infeasible
    }

    /// Adds the single item column of every active item that lacks one.
    /// Together they always form an exact partition, so the set
    /// partitioning relaxation stays feasible after any branching decision.
    pub fn ensure_identity_columns(&mut self) -> Vec<ColumnId> {
        let singletons: Vec<Vec<ItemId>> = self.items.iter().map(|item| item.members.clone()).collect();
        singletons.into_iter().filter_map(|members| self.add_column(members)).collect()
    }

    /// Column-wise LP of the current master
    pub fn build_lp(&self) -> LpProblem {
        let mut lp = LpProblem::default();
        for _ in &self.items {
            lp.add_row(RowBound::Equal(1.0));
        }
        for _ in &self.cuts {
            lp.add_row(RowBound::AtMost(1.0));
        }

        let num_items = self.items.len();
        for column in self.columns.values() {
            let mut entries: Vec<(usize, f64)> = self
                .items
                .iter()
                .enumerate()
                .filter(|(_, item)| self.contains(column, item))
                .map(|(row, _)| (row, 1.0))
                .collect();
            entries.extend(
                self.cuts
                    .iter()
                    .enumerate()
                    .map(|(c, cut)| (num_items + c, cut.coefficient(&column.items)))
                    .filter(|&(_, coef)| coef > 0)
                    .map(|(row, coef)| (row, f64::from(coef))),
            );
            lp.add_column(LpColumn::continuous(column.cost, entries));
        }
        lp
    }

    /// Solve the relaxation.
    ///
    /// Fails with `Infeasible` if no column combination covers every item.
    pub fn solve<S: LpSolver>(&mut self, solver: &mut S) -> Result<&MasterSolution> {
        if self.items.is_empty() {
            self.solution = Some(MasterSolution {
                objective: 0.0,
                values: Vec::new(),
                duals: Duals { exact: Vec::new(), cuts: vec![0.0; self.cuts.len()] },
                runtime: 0.0,
            });
        } else {
            let lp = self.build_lp();
            let solution = solver.solve(&lp)?;
            let num_items = self.items.len();

            let mut row_duals = solution.row_duals;
            row_duals.resize(lp.rows.len(), 0.0);
            let cuts = row_duals.split_off(num_items);

            self.solution = Some(MasterSolution {
                objective: solution.objective,
                values: solution.primal.into_iter().zip(self.columns.keys().copied()).collect(),
                duals: Duals { exact: row_duals, cuts },
                runtime: solution.runtime,
            });
        }
        self.solution.as_ref().ok_or(BnpError::Infeasible)
    }

    pub fn last_solution(&self) -> Option<&MasterSolution> {
        self.solution.as_ref()
    }

    /// Duals of the last solve, `None` after any modification
    pub fn dual_values(&self) -> Option<&Duals> {
        self.solution.as_ref().map(|s| &s.duals)
    }

    pub fn objective_value(&self) -> Option<f64> {
        self.solution.as_ref().map(|s| s.objective)
    }

    pub fn current_solution(&self) -> Option<&[(f64, ColumnId)]> {
        self.solution.as_ref().map(|s| s.values.as_slice())
    }

    /// View handed to the pricing oracle
    pub fn pricing_problem(&self) -> PricingProblem<'_> {
        PricingProblem {
            capacity: self.capacity,
            objective: self.objective,
            items: &self.items,
            graph: &self.graph,
            cuts: &self.cuts,
        }
    }
}
