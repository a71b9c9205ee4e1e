use crate::error::Result;
use crate::instance::Objective;
use crate::pricing::{Duals, PricedColumn, PricingProblem, PricingSolver};
use crate::settings::Tolerances;
use crate::solvers::{LpColumn, LpProblem, LpSolver, RowBound};

/// Pricing as an explicit 0/1 program solved by a MIP backend.
///
/// Slower than the label setting, but independent of it, which makes it
/// useful to cross-check on small instances.
pub struct MipPricing<S: LpSolver> {
    solver: S,
}

impl<S: LpSolver> MipPricing<S> {
    pub fn new(solver: S) -> Self {
        MipPricing { solver }
    }

    /// `y[i]` packs item `i`, `w[c]` pays the dual of cut `c` once two of
    /// its members are packed, `t` is the batch duration
    fn build(problem: &PricingProblem<'_>, duals: &Duals) -> LpProblem {
        let mut mip = LpProblem::default();
        let items = problem.items;
        let n = items.len();

        let capacity = mip.add_row(RowBound::AtMost(f64::from(problem.capacity)));

        let mut conflicts: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
        for i in 0..n {
            for j in i + 1..n {
                if problem.graph.has_edge(items[i].id, items[j].id) {
                    let row = mip.add_row(RowBound::AtMost(1.0));
                    conflicts[i].push((row, 1.0));
                    conflicts[j].push((row, 1.0));
                }
            }
        }

        // sum of member counts - 2 w <= 1
        let membership = problem.cut_membership();
        let cut_rows: Vec<usize> = membership.iter().map(|_| mip.add_row(RowBound::AtMost(1.0))).collect();

        let batch = problem.objective == Objective::BatchProcessingTime;
        let batch_rows: Vec<usize> = if batch {
            (0..n).map(|_| mip.add_row(RowBound::AtMost(0.0))).collect()
        } else {
            Vec::new()
        };

        for (i, item) in items.iter().enumerate() {
            let mut entries = vec![(capacity, f64::from(item.width))];
            entries.extend(conflicts[i].iter().copied());
            entries.extend(
                membership
                    .iter()
                    .zip(&cut_rows)
                    .filter(|(members, _)| members[i] > 0)
                    .map(|(members, &row)| (row, f64::from(members[i]))),
            );
            if batch {
                // p_i y_i - t <= 0
                entries.push((batch_rows[i], f64::from(item.processing_time)));
            }
            mip.add_column(LpColumn::binary(-duals.exact[i], entries));
        }

        for (c, &row) in cut_rows.iter().enumerate() {
            let lamb = duals.cuts.get(c).copied().unwrap_or(0.0).min(0.0);
            mip.add_column(LpColumn::binary(-lamb, vec![(row, -2.0)]));
        }

        if batch {
            let entries = batch_rows.iter().map(|&row| (row, -1.0)).collect();
            mip.add_column(LpColumn::continuous(1.0, entries));
        }

        mip
    }
}

impl<S: LpSolver> PricingSolver for MipPricing<S> {
    fn solve(
        &mut self,
        problem: &PricingProblem<'_>,
        duals: &Duals,
        _max_columns: usize,
        tolerances: &Tolerances,
    ) -> Result<Vec<PricedColumn>> {
        if problem.items.is_empty() {
            return Ok(Vec::new());
        }

        let solution = self.solver.solve(&Self::build(problem, duals))?;
        let packed: Vec<usize> = solution.primal[..problem.items.len()]
            .iter()
            .enumerate()
            .filter(|(_, &y)| y > 0.5)
            .map(|(i, _)| i)
            .collect();

        if packed.is_empty() || !problem.is_feasible(&packed) {
            return Ok(Vec::new());
        }

        // recompute exactly instead of trusting the solver objective
        let reduced_cost = problem.reduced_cost(&packed, duals);
        if reduced_cost < -tolerances.reduced_cost {
            Ok(vec![PricedColumn {
                reduced_cost,
                items: packed.iter().map(|&i| problem.items[i].id).collect(),
            }])
        } else {
            Ok(Vec::new())
        }
    }
}
