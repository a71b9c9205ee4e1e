#![warn(warnings)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(non_upper_case_globals)]
#![allow(clippy::needless_return)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
#![allow(clippy::module_name_repetitions, clippy::must_use_candidate, clippy::missing_errors_doc)]

//! Branch & Price for one-dimensional bin packing with conflicts and for
//! single-machine batch scheduling.
//!
//! The engine explores a Ryan-Foster branching tree. Every node runs a
//! column generation over a set partitioning master, priced by a label
//! setting dynamic program (or a MIP), optionally strengthened by
//! subset-row cuts over item triples.

pub mod error;
pub mod graph;
pub mod heuristics;
pub mod instance;
pub mod misc;
pub mod settings;
pub mod solvers;

mod branch_and_price;
pub mod pricing;
mod ui;

pub use branch_and_price::*;
pub use error::{BnpError, Result};
pub use instance::{Instance, Item, ItemId, Objective};
pub use settings::{CutSelection, PricingKind, SearchStrategy, Settings, Tolerances};
pub use ui::*;
