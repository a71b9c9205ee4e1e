use thiserror::Error;

use crate::master::ColumnId;

/// All conditions the branch and price engine surfaces to its caller.
///
/// `Infeasible`, `NoBranchingCandidate` and `InconsistentBookkeeping`
/// are structural and abort the search. `SolverTimeout` is recovered
/// inside the search by discarding the node it occurred in.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BnpError {
    #[error("restricted master relaxation is infeasible")]
    Infeasible,

    #[error("node {node} has a fractional solution but no fractional item pair to branch on")]
    NoBranchingCandidate { node: u32 },

    #[error("external solver exceeded its time budget")]
    SolverTimeout,

    #[error("pair index references column {column:?} which is not in the master problem")]
    InconsistentBookkeeping { column: ColumnId },

    #[error("invalid instance: {0}")]
    InvalidInstance(String),

    #[error("solver failure: {0}")]
    Solver(String),
}

pub type Result<T> = std::result::Result<T, BnpError>;
