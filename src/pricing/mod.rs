pub mod label_setting;
pub mod mip;

use crate::cuts::SubsetRowCut;
use crate::error::Result;
use crate::graph::ConflictGraph;
use crate::instance::{ItemId, Objective};
use crate::master::ActiveItem;
use crate::settings::Tolerances;

pub use label_setting::{Label, LabelSetting};
pub use mip::MipPricing;

/// Dual values of the master, in the order the rows were created
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Duals {
    /// one per active item (miu)
    pub exact: Vec<f64>,
    /// one per subset-row cut (lamb), non positive
    pub cuts: Vec<f64>,
}

/// Everything the oracle needs to know about the current node
#[derive(Clone, Copy)]
pub struct PricingProblem<'a> {
    pub capacity: u32,
    pub objective: Objective,
    pub items: &'a [ActiveItem],
    pub graph: &'a ConflictGraph,
    pub cuts: &'a [SubsetRowCut],
}

impl<'a> PricingProblem<'a> {
    /// `count[c][i]` is the number of originals of item `i` inside cut `c`
    pub fn cut_membership(&self) -> Vec<Vec<u8>> {
        self.cuts
            .iter()
            .map(|cut| self.items.iter().map(|item| cut.count(&item.members)).collect())
            .collect()
    }

    /// Reduced cost of packing the items at the given indices together
    pub fn reduced_cost(&self, indices: &[usize], duals: &Duals) -> f64 {
        let cost = self
            .objective
            .column_cost(indices.iter().map(|&i| self.items[i].processing_time));
        let exact: f64 = indices.iter().map(|&i| duals.exact[i]).sum();
        let cuts: f64 = self
            .cuts
            .iter()
            .zip(&duals.cuts)
            .map(|(cut, lamb)| {
                let count: u8 = indices.iter().map(|&i| cut.count(&self.items[i].members)).sum();
                f64::from(count / 2) * lamb
            })
            .sum();
        cost - exact - cuts
    }

    /// Capacity and conflict feasibility of a candidate column
    pub fn is_feasible(&self, indices: &[usize]) -> bool {
        let weight: u32 = indices.iter().map(|&i| self.items[i].width).sum();
        weight <= self.capacity
            && indices.iter().enumerate().all(|(k, &i)| {
                indices[k + 1..]
                    .iter()
                    .all(|&j| !self.graph.has_edge(self.items[i].id, self.items[j].id))
            })
    }
}

/// A candidate column found by an oracle
#[derive(Clone, Debug, PartialEq)]
pub struct PricedColumn {
    pub reduced_cost: f64,
    /// active item ids packed together
    pub items: Vec<ItemId>,
}

/// Primary trait for the pricing problem.
///
/// Given the duals of the current master, return up to `max_columns`
/// columns with reduced cost below `-tolerances.reduced_cost`, cheapest
/// first. An empty result proves the master relaxation optimal.
pub trait PricingSolver: Send {
    fn solve(
        &mut self,
        problem: &PricingProblem<'_>,
        duals: &Duals,
        max_columns: usize,
        tolerances: &Tolerances,
    ) -> Result<Vec<PricedColumn>>;
}
