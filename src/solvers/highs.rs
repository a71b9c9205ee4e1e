use std::time::{Duration, Instant};

use ::highs::{ColProblem, HighsModelStatus, Model, Row, Sense};

use crate::error::{BnpError, Result};
use crate::solvers::{LpProblem, LpSolution, LpSolver, RowBound};

/// LP / MIP backend built on the HiGHS solver
pub struct HighsSolver {
    seed: i32,
    time_limit: Option<Duration>,
}

impl LpSolver for HighsSolver {
    fn new_with_seed(seed: i32) -> Self {
        HighsSolver {
            seed,
            time_limit: None,
        }
    }

    fn set_time_limit(&mut self, limit: Option<Duration>) {
        self.time_limit = limit;
    }

    fn solve(&mut self, problem: &LpProblem) -> Result<LpSolution> {
        let start = Instant::now();

        let mut pb = ColProblem::default();
        let rows: Vec<Row> = problem
            .rows
            .iter()
            .map(|bound| match *bound {
                RowBound::Equal(v) => pb.add_row(v..=v),
                RowBound::AtMost(v) => pb.add_row(..=v),
                RowBound::AtLeast(v) => pb.add_row(v..),
            })
            .collect();

        for column in &problem.columns {
            let factors = column.entries.iter().map(|&(row, coef)| (rows[row], coef));
            if column.integer {
                pb.add_integer_column(column.cost, column.lower..=column.upper, factors);
            } else {
                pb.add_column(column.cost, column.lower..=column.upper, factors);
            }
        }

        let mut model = Model::new(pb);
        model.make_quiet();
        model.set_option("parallel", "off");
        model.set_option("threads", 1);
        model.set_option("random_seed", self.seed);
        // pricing needs the true optimum, not one within the default gap
        model.set_option("mip_rel_gap", 0.0);
        if let Some(limit) = self.time_limit {
            model.set_option("time_limit", limit.as_secs_f64());
        }
        model.set_sense(if problem.maximise { Sense::Maximise } else { Sense::Minimise });

        let solved = model
            .try_solve()
            .map_err(|status| BnpError::Solver(format!("{status:?}")))?;

        match solved.status() {
            HighsModelStatus::Optimal => {}
            // presolve may not tell the two apart, our programs are never unbounded
            HighsModelStatus::Infeasible | HighsModelStatus::UnboundedOrInfeasible => return Err(BnpError::Infeasible),
            HighsModelStatus::ReachedTimeLimit => return Err(BnpError::SolverTimeout),
            status => return Err(BnpError::Solver(format!("unhandled HiGHS status {status:?}"))),
        }

        let solution = solved.get_solution();
        let primal = solution.columns().to_vec();
        let objective = problem
            .columns
            .iter()
            .zip(&primal)
            .map(|(column, x)| column.cost * x)
            .sum();

        let has_integers = problem.columns.iter().any(|c| c.integer);

        Ok(LpSolution {
            objective,
            primal,
            row_duals: if has_integers { Vec::new() } else { solution.dual_rows().to_vec() },
            runtime: start.elapsed().as_secs_f64(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solvers::LpColumn;

    #[test]
    fn solves_small_partition_lp_with_duals() {
        // two rows, identity columns plus one column covering both
        let mut problem = LpProblem::default();
        let r0 = problem.add_row(RowBound::Equal(1.0));
        let r1 = problem.add_row(RowBound::Equal(1.0));
        problem.add_column(LpColumn::continuous(1.0, vec![(r0, 1.0)]));
        problem.add_column(LpColumn::continuous(1.0, vec![(r1, 1.0)]));
        problem.add_column(LpColumn::continuous(1.0, vec![(r0, 1.0), (r1, 1.0)]));

        let mut solver = HighsSolver::new_with_seed(0);
        let solution = solver.solve(&problem).unwrap();

        assert!((solution.objective - 1.0).abs() < 1e-6);
        assert!((solution.primal[2] - 1.0).abs() < 1e-6);
        assert_eq!(solution.row_duals.len(), 2);
        let dual_sum: f64 = solution.row_duals.iter().sum();
        assert!((dual_sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn reports_infeasibility() {
        let mut problem = LpProblem::default();
        let r0 = problem.add_row(RowBound::Equal(1.0));
        let r1 = problem.add_row(RowBound::AtMost(0.5));
        problem.add_column(LpColumn::continuous(1.0, vec![(r0, 1.0), (r1, 1.0)]));

        let mut solver = HighsSolver::new_with_seed(0);
        assert_eq!(solver.solve(&problem), Err(BnpError::Infeasible));
    }
}
