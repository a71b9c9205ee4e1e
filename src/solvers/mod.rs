#[cfg(feature = "highs")]
pub mod highs;

use std::time::Duration;

use crate::error::Result;

/// Bound of a single row
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RowBound {
    Equal(f64),
    AtMost(f64),
    AtLeast(f64),
}

/// A column of the constraint matrix, stored sparsely
#[derive(Clone, Debug, PartialEq)]
pub struct LpColumn {
    pub cost: f64,
    pub lower: f64,
    pub upper: f64,
    pub integer: bool,
    /// (row index, coefficient)
    pub entries: Vec<(usize, f64)>,
}

impl LpColumn {
    /// Continuous non-negative column
    pub fn continuous(cost: f64, entries: Vec<(usize, f64)>) -> Self {
        LpColumn {
            cost,
            lower: 0.0,
            upper: f64::INFINITY,
            integer: false,
            entries,
        }
    }

    pub fn binary(cost: f64, entries: Vec<(usize, f64)>) -> Self {
        LpColumn {
            cost,
            lower: 0.0,
            upper: 1.0,
            integer: true,
            entries,
        }
    }
}

/// Column-wise description of a linear (or mixed integer) program.
///
/// The master problem rebuilds this from its own bookkeeping before every
/// solve, so adding and removing columns or rows never touches solver state.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct LpProblem {
    pub maximise: bool,
    pub rows: Vec<RowBound>,
    pub columns: Vec<LpColumn>,
}

impl LpProblem {
    pub fn add_row(&mut self, bound: RowBound) -> usize {
        self.rows.push(bound);
        self.rows.len() - 1
    }

    pub fn add_column(&mut self, column: LpColumn) -> usize {
        self.columns.push(column);
        self.columns.len() - 1
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LpSolution {
    pub objective: f64,
    /// Value per column, in column order
    pub primal: Vec<f64>,
    /// Dual value per row, in row order. Empty for integer programs.
    pub row_duals: Vec<f64>,
    /// Wall clock seconds spent in the solver
    pub runtime: f64,
}

/// Trait for a linear programming backend.
///
/// Duals follow the convention `reduced cost = cost - A^T dual`.
pub trait LpSolver: Send + Sized {
    fn new_with_seed(seed: i32) -> Self;
    fn set_time_limit(&mut self, limit: Option<Duration>);

    /// Solve to optimality.
    /// Fails with `Infeasible`, `SolverTimeout` or `Solver`.
    fn solve(&mut self, problem: &LpProblem) -> Result<LpSolution>;
}
