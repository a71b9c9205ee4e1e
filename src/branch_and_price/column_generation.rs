use std::time::Instant;

use crate::error::Result;
use crate::master::ColumnId;
use crate::node::Node;
use crate::pricing::PricingSolver;
use crate::settings::Settings;
use crate::solvers::LpSolver;
use crate::ui::{LPSolveIterationUIState, PricingProblemUIState, UISender, UIUserMessage};

/// Internal struct storing the results of the column generation of one node
#[derive(Clone, Debug, PartialEq)]
pub struct ColGenResult {
    /// value of the last master solve
    pub obj: f64,
    pub column_x: Vec<(f64, ColumnId)>,
    pub iterations: usize,
    pub columns_added: usize,
    /// master objective after every solve
    pub objective_trace: Vec<f64>,
    /// best Lagrangian bound seen, equals `obj` once pricing found nothing
    pub dual_bound: f64,
    /// pricing proved the master optimal
    pub converged: bool,
    pub iteration_limit_reached: bool,
    pub time_limit_reached: bool,
    /// the dual bound already reached the incumbent
    pub cut_off: bool,
}

/// Main loop running the column generation on a node.
///
/// Stops once pricing finds no column with negative reduced cost, and
/// early (without convergence) on the iteration cap, the deadline or a
/// dual bound that cannot beat `incumbent`.
pub fn run_column_generation<S: LpSolver>(
    node: &mut Node,
    lp: &mut S,
    pricing: &mut dyn PricingSolver,
    settings: &Settings,
    incumbent: f64,
    deadline: Option<Instant>,
    ui: &UISender,
) -> Result<ColGenResult> {
    let tolerances = &settings.tolerances;
    let objective = node.rmp.objective();

    let mut result = ColGenResult {
        obj: f64::INFINITY,
        column_x: Vec::new(),
        iterations: 0,
        columns_added: 0,
        objective_trace: Vec::new(),
        dual_bound: f64::NEG_INFINITY,
        converged: false,
        iteration_limit_reached: false,
        time_limit_reached: false,
        cut_off: false,
    };

    let mut previous_pricing_runtime = 0.0;

    loop {
        let solution = node.rmp.solve(lp)?;
        let master_obj = solution.objective;
        let duals = solution.duals.clone();
        let lp_runtime = solution.runtime;
        result.obj = master_obj;
        result.column_x = solution.values.clone();
        result.objective_trace.push(master_obj);
        result.iterations += 1;

        ui.send(UIUserMessage::LPSolveIterationFinish(LPSolveIterationUIState {
            obj: master_obj,
            best_dual_bound: result.dual_bound.is_finite().then_some(result.dual_bound),
            lp_runtime,
            num_columns: node.rmp.num_columns(),
            num_added_columns: result.columns_added,
            previous_pricing_runtime,
        }));

        let start_pricing = Instant::now();
        let new_columns = pricing.solve(
            &node.rmp.pricing_problem(),
            &duals,
            settings.columns_per_pricing.max(1),
            tolerances,
        )?;
        previous_pricing_runtime = start_pricing.elapsed().as_secs_f64();

        // every integer solution uses at most one bin per item
        let min_reduced_cost = new_columns.first().map_or(0.0, |c| c.reduced_cost.min(0.0));
        let dual_bound = master_obj + node.rmp.items().len() as f64 * min_reduced_cost;
        result.dual_bound = result.dual_bound.max(dual_bound);

        ui.send(UIUserMessage::PricingProblemFinish(PricingProblemUIState {
            runtime: previous_pricing_runtime,
            num_columns: new_columns.len(),
            min_reduced_cost,
            dual_bound,
        }));

        if new_columns.is_empty() {
            result.dual_bound = master_obj;
            result.converged = true;
            break;
        }

        if objective.is_cutoff(result.dual_bound, incumbent, tolerances.comparison) {
            ui.send(UIUserMessage::Log(format!(
                "n{} exit pricing due to best/dual bound {} / {incumbent}",
                node.id, result.dual_bound
            )));
            result.cut_off = true;
            break;
        }

        if settings.max_colgen_iterations.is_some_and(|cap| result.iterations >= cap) {
            ui.send(UIUserMessage::IterationLimitReached { node_id: node.id, iterations: result.iterations });
            result.iteration_limit_reached = true;
            break;
        }

        if deadline.is_some_and(|d| Instant::now() > d) {
            result.time_limit_reached = true;
            break;
        }

        let mut has_new_column = false;
        for column in &new_columns {
            if node.add_column(&column.items).is_some() {
                has_new_column = true;
                result.columns_added += 1;
            }
        }

        if !has_new_column {
            // only known columns priced out, the master cannot improve any further
            ui.send(UIUserMessage::LogS("pricing returned only known columns"));
            result.dual_bound = result.dual_bound.max(master_obj - tolerances.reduced_cost);
            result.converged = true;
            break;
        }
    }

    Ok(result)
}

#[cfg(all(test, feature = "highs"))]
mod tests {
    use super::*;
    use crate::instance::{Instance, Item};
    use crate::master::RestrictedMasterProblem;
    use crate::pricing::LabelSetting;
    use crate::solvers::highs::HighsSolver;
    use crate::ui::UI;

    fn root(instance: &Instance) -> Node {
        Node::root(0, RestrictedMasterProblem::with_columns(instance, Vec::new(), None))
    }

    #[test]
    fn objective_never_increases_and_reaches_lp_bound() {
        // three items of width 4 and capacity 10: two fit together, LP optimum 1.5
        let instance = Instance::new(10, (1..=3).map(|i| Item::new(i, 4)).collect());
        let mut node = root(&instance);
        let ui = UI::quiet();

        let result = run_column_generation(
            &mut node,
            &mut HighsSolver::new_with_seed(0),
            &mut LabelSetting::new(),
            &Settings::default(),
            f64::INFINITY,
            None,
            &ui.get_sender(),
        )
        .unwrap();

        assert!(result.converged);
        assert!(result.columns_added > 0);
        for pair in result.objective_trace.windows(2) {
            assert!(pair[1] <= pair[0] + 1e-9);
        }
        assert!(result.objective_trace.last().unwrap() < result.objective_trace.first().unwrap());
        assert!((result.obj - 1.5).abs() < 1e-6);
        assert!((result.dual_bound - result.obj).abs() < 1e-9);
    }

    #[test]
    fn iteration_cap_is_reported() {
        let instance = Instance::new(10, (1..=6).map(|i| Item::new(i, 2 + i % 3)).collect());
        let mut node = root(&instance);
        let settings = Settings { max_colgen_iterations: Some(1), ..Settings::default() };

        let result = run_column_generation(
            &mut node,
            &mut HighsSolver::new_with_seed(0),
            &mut LabelSetting::new(),
            &settings,
            f64::INFINITY,
            None,
            &UI::quiet().get_sender(),
        )
        .unwrap();

        assert!(result.iteration_limit_reached);
        assert!(!result.converged);
        assert_eq!(result.iterations, 1);
        assert!(result.dual_bound <= result.obj);
    }

    #[test]
    fn no_improving_column_when_items_do_not_fit_together() {
        let instance = Instance::new(5, (1..=5).map(|i| Item::new(i, 3)).collect());
        let mut node = root(&instance);

        let result = run_column_generation(
            &mut node,
            &mut HighsSolver::new_with_seed(0),
            &mut LabelSetting::new(),
            &Settings::default(),
            f64::INFINITY,
            None,
            &UI::quiet().get_sender(),
        )
        .unwrap();

        assert!(result.converged);
        assert_eq!(result.iterations, 1);
        assert_eq!(result.columns_added, 0);
        assert!((result.obj - 5.0).abs() < 1e-6);
        assert!(result.column_x.iter().all(|(v, _)| (v - 1.0).abs() < 1e-6));
        assert!(node.rmp.columns().all(|c| c.items.len() == 1));
    }
}
