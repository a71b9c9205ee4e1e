use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::branch::{create_children, select_branching_pair};
use crate::column_generation::run_column_generation;
use crate::cuts::select_cuts;
use crate::error::{BnpError, Result};
use crate::heuristics::{first_fit_decreasing, packing_cost};
use crate::instance::{Instance, ItemId};
use crate::master::{Column, RestrictedMasterProblem};
use crate::misc::blocking_queue::BlockingQueue;
use crate::node::{Node, NodeComparator};
use crate::pricing::{LabelSetting, MipPricing, PricingSolver};
use crate::settings::{PricingKind, Settings};
use crate::solvers::LpSolver;
use crate::ui::{NodeUIState, UISender, UIUserMessage, UI};

pub mod branch;
pub mod column_generation;
pub mod cuts;
pub mod master;
pub mod node;

#[cfg(feature = "highs")]
pub type HighsBranchAndPrice = BranchAndPrice<crate::solvers::highs::HighsSolver>;

/// Outcome of a whole search
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchResult {
    /// objective of the best packing found, infinite if none
    pub value: f64,
    /// best packing, original item ids per bin
    pub bins: Vec<Vec<ItemId>>,
    /// false if a limit, a solver timeout or an unconverged node cut the search short
    pub proven_optimal: bool,
    pub nodes_explored: usize,
    /// relaxation value of the root node
    pub root_bound: Option<f64>,
    /// every incumbent value in the order they were found
    pub incumbent_history: Vec<f64>,
    pub runtime: f64,
}

/// Best integer solution found so far
#[derive(Clone, Debug)]
pub struct Incumbent {
    pub value: f64,
    pub bins: Vec<Vec<ItemId>>,
    pub history: Vec<f64>,
}

impl Incumbent {
    pub fn empty() -> Self {
        Incumbent {
            value: f64::INFINITY,
            bins: Vec::new(),
            history: Vec::new(),
        }
    }

    /// Replace the incumbent if `value` is strictly better.
    /// Returns whether it was replaced.
    pub fn update(&mut self, value: f64, mut bins: Vec<Vec<ItemId>>, tolerance: f64) -> bool {
        if value < self.value - tolerance {
            bins.sort_unstable();
            self.value = value;
            self.bins = bins;
            self.history.push(value);
            true
        } else {
            false
        }
    }
}

/// State shared between all workers
pub struct SharedState {
    pub best: RwLock<Incumbent>,
    pub open_nodes: BlockingQueue<Node, NodeComparator>,
    next_node_id: AtomicU32,
    nodes_explored: AtomicUsize,
    proven_optimal: AtomicBool,
    error: Mutex<Option<BnpError>>,
    root_bound: Mutex<Option<f64>>,
    duration_root_node: Mutex<Option<Duration>>,
    deadline: Option<Instant>,
    pub ui_sender: UISender,
}

impl SharedState {
    pub fn new(incumbent: Incumbent, comparator: NodeComparator, deadline: Option<Instant>, ui_sender: UISender) -> Self {
        SharedState {
            best: RwLock::new(incumbent),
            open_nodes: BlockingQueue::new(comparator),
            next_node_id: AtomicU32::new(1),
            nodes_explored: AtomicUsize::new(0),
            proven_optimal: AtomicBool::new(true),
            error: Mutex::new(None),
            root_bound: Mutex::new(None),
            duration_root_node: Mutex::new(None),
            deadline,
            ui_sender,
        }
    }

    fn best_value(&self) -> f64 {
        self.best.read().unwrap().value
    }

    /// Terminate every worker, the search is no longer exhaustive
    fn stop(&self, message: UIUserMessage) {
        if !self.open_nodes.is_flushing() {
            self.ui_sender.send(message);
        }
        self.proven_optimal.store(false, Ordering::SeqCst);
        self.open_nodes.flush_and_terminate();
    }

    /// Keeps the first structural error and stops the search
    fn abort(&self, error: BnpError) {
        self.error.lock().unwrap().get_or_insert(error);
        self.proven_optimal.store(false, Ordering::SeqCst);
        self.open_nodes.flush_and_terminate();
    }
}

/// Branch and price search over one instance.
///
/// `S` is the LP backend; every worker owns its own solver instance.
pub struct BranchAndPrice<S: LpSolver> {
    instance: Instance,
    settings: Settings,
    _solver: PhantomData<fn() -> S>,
}

impl<S: LpSolver + 'static> BranchAndPrice<S> {
    pub fn new(instance: Instance, settings: Settings) -> Self {
        BranchAndPrice {
            instance,
            settings,
            _solver: PhantomData,
        }
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn create_pricing_solver(&self, seed: i32) -> Box<dyn PricingSolver> {
        match self.settings.pricing {
            PricingKind::LabelSetting => Box::new(LabelSetting::new()),
            PricingKind::Mip => {
                let mut solver = S::new_with_seed(seed);
                solver.set_time_limit(self.settings.lp_time_limit);
                Box::new(MipPricing::new(solver))
            }
        }
    }

    /// Run the search until the tree is exhausted or a limit is hit.
    ///
    /// Fails on structural errors (infeasible master, missing branching
    /// candidate, inconsistent bookkeeping) and on invalid instances.
    pub fn solve(&self, ui: &UI) -> Result<SearchResult> {
        self.instance.validate()?;

        let start = Instant::now();
        let deadline = self.settings.time_limit.map(|limit| start + limit);
        let tolerances = self.settings.tolerances;

        let ids: Vec<ItemId> = self.instance.items.iter().map(|i| i.id).collect();
        let cuts = select_cuts(self.settings.cuts, &ids);

        let mut incumbent = Incumbent::empty();
        let seed = if self.settings.seed_with_heuristic {
            let bins = first_fit_decreasing(&self.instance);
            incumbent.update(packing_cost(&self.instance, &bins), bins.clone(), tolerances.comparison);
            Some(bins)
        } else {
            None
        };

        let rmp = RestrictedMasterProblem::with_columns(&self.instance, cuts, seed.as_deref());
        let shared = SharedState::new(
            incumbent,
            NodeComparator::new(self.settings.strategy),
            deadline,
            ui.get_sender(),
        );

        shared.ui_sender.send(UIUserMessage::Log(format!(
            "{} items, capacity {}, {} cuts, {:?} search on {} thread(s)",
            self.instance.num_items(),
            self.instance.capacity,
            rmp.cuts().len(),
            self.settings.strategy,
            self.settings.num_threads.max(1)
        )));
        if seed.is_some() {
            shared.ui_sender.send(UIUserMessage::NewBest { obj: shared.best_value(), node_id: 0 });
        }

        shared.open_nodes.add_job(Node::root(0, rmp));

        thread::scope(|s| {
            for i in 0..self.settings.num_threads.max(1) {
                let shared = &shared;
                s.spawn(move || self.run_worker(shared, i as i32));
            }
        });

        shared.ui_sender.send(UIUserMessage::ExitUi {
            root_node: *shared.duration_root_node.lock().unwrap(),
        });

        if let Some(error) = shared.error.lock().unwrap().take() {
            return Err(error);
        }

        let best = shared.best.read().unwrap().clone();
        let root_bound = *shared.root_bound.lock().unwrap();
        Ok(SearchResult {
            value: best.value,
            bins: best.bins,
            proven_optimal: shared.proven_optimal.load(Ordering::SeqCst),
            nodes_explored: shared.nodes_explored.load(Ordering::SeqCst),
            root_bound,
            incumbent_history: best.history,
            runtime: start.elapsed().as_secs_f64(),
        })
    }

    /// Launch the worker's loop
    ///
    /// Worker will pop open nodes and process them
    fn run_worker(&self, shared: &SharedState, seed: i32) {
        let mut lp = S::new_with_seed(seed);
        let mut pricing = self.create_pricing_solver(seed);

        shared.ui_sender.send(UIUserMessage::StartWorker);

        #[cfg(feature = "validity_assertions")]
        shared.ui_sender.send(UIUserMessage::LogS("Validity Assertions Active"));

        while let Some(node) = shared.open_nodes.get_job() {
            let node_id = node.id;
            match self.process_node(shared, node, &mut lp, pricing.as_mut()) {
                Ok(()) => {}
                Err(BnpError::SolverTimeout) => {
                    shared.proven_optimal.store(false, Ordering::SeqCst);
                    shared.ui_sender.send(UIUserMessage::Log(format!("n{node_id} discarded after a solver timeout")));
                }
                Err(error) => {
                    shared.ui_sender.send(UIUserMessage::Log(format!("n{node_id} aborted the search: {error}")));
                    shared.abort(error);
                }
            }
            shared.open_nodes.job_done();
        }
    }

    /// LP budget: the configured one, capped by what is left of the search
    fn lp_time_limit(&self, deadline: Option<Instant>) -> Option<Duration> {
        let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
        match (self.settings.lp_time_limit, remaining) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn node_state(&self, shared: &SharedState, node: &Node, after_obj: Option<f64>, best_obj: f64) -> NodeUIState {
        NodeUIState {
            node_id: node.id,
            parent_id: node.parent,
            depth: node.depth,
            num_items: node.rmp.items().len(),
            num_columns: node.rmp.num_columns(),
            current_open: shared.open_nodes.len(),
            decision: node.decision.map_or_else(|| "-".to_string(), |d| d.to_string()),
            before_obj: node.bound,
            after_obj,
            best_obj,
        }
    }

    fn process_node(&self, shared: &SharedState, mut node: Node, lp: &mut S, pricing: &mut dyn PricingSolver) -> Result<()> {
        let tolerances = &self.settings.tolerances;
        let objective = self.instance.objective;

        if shared.deadline.is_some_and(|d| Instant::now() > d) {
            shared.stop(UIUserMessage::TimeLimitReached);
            return Ok(());
        }
        if self
            .settings
            .node_limit
            .is_some_and(|limit| shared.nodes_explored.load(Ordering::SeqCst) >= limit)
        {
            shared.stop(UIUserMessage::NodeLimitReached);
            return Ok(());
        }

        // test if we can still be better than the best found solution
        let best = shared.best_value();
        if objective.is_cutoff(node.bound, best, tolerances.comparison) {
            shared.ui_sender.send(UIUserMessage::NodePruned { node_id: node.id });
            return Ok(());
        }

        shared.nodes_explored.fetch_add(1, Ordering::SeqCst);
        let start_node = Instant::now();
        lp.set_time_limit(self.lp_time_limit(shared.deadline));

        shared.ui_sender.send(UIUserMessage::NodeStart(self.node_state(shared, &node, None, best)));

        let result = run_column_generation(
            &mut node,
            lp,
            pricing,
            &self.settings,
            best,
            shared.deadline,
            &shared.ui_sender,
        )?;

        if node.depth == 0 {
            *shared.root_bound.lock().unwrap() = Some(if result.converged { result.obj } else { result.dual_bound });
            *shared.duration_root_node.lock().unwrap() = Some(start_node.elapsed());
        }

        shared.ui_sender.send(UIUserMessage::NodeFinish(self.node_state(
            shared,
            &node,
            Some(result.obj),
            shared.best_value(),
        )));

        if result.time_limit_reached {
            shared.stop(UIUserMessage::TimeLimitReached);
            return Ok(());
        }

        let bound = if result.converged {
            result.obj
        } else {
            node.bound.max(result.dual_bound)
        };

        let integral = result.column_x.iter().all(|&(v, _)| tolerances.is_integer(v));
        if integral {
            let used: Vec<&Column> = result
                .column_x
                .iter()
                .filter(|&&(v, _)| v > 0.5)
                .filter_map(|&(_, id)| node.rmp.column(id))
                .collect();
            let value: f64 = used.iter().map(|c| c.cost).sum();
            let bins = used.iter().map(|c| c.items.clone()).collect();

            let improved = shared.best.write().unwrap().update(value, bins, tolerances.comparison);
            if improved {
                shared.ui_sender.send(UIUserMessage::NewBest { obj: value, node_id: node.id });
            }

            if result.converged {
                shared.ui_sender.send(UIUserMessage::NodePruned { node_id: node.id });
                return Ok(());
            }
        }

        if objective.is_cutoff(bound, shared.best_value(), tolerances.comparison) {
            shared.ui_sender.send(UIUserMessage::NodePruned { node_id: node.id });
            return Ok(());
        }

        if integral {
            // the master was not priced out, but there is no pair to branch on
            shared.proven_optimal.store(false, Ordering::SeqCst);
            shared.ui_sender.send(UIUserMessage::Log(format!(
                "n{} dropped with an integral but unconverged master",
                node.id
            )));
            return Ok(());
        }

        let pair = select_branching_pair(&node, &result.column_x, tolerances)?
            .ok_or(BnpError::NoBranchingCandidate { node: node.id })?;

        let children = create_children(&node, pair, bound, || shared.next_node_id.fetch_add(1, Ordering::SeqCst))?;
        for child in children {
            shared.open_nodes.add_job(child);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incumbent_only_improves() {
        let mut incumbent = Incumbent::empty();
        assert!(incumbent.update(5.0, vec![vec![ItemId(2)], vec![ItemId(1)]], 1e-5));
        assert_eq!(incumbent.bins, vec![vec![ItemId(1)], vec![ItemId(2)]]);

        assert!(!incumbent.update(5.0, Vec::new(), 1e-5));
        assert!(!incumbent.update(6.0, Vec::new(), 1e-5));
        assert!(!incumbent.update(5.0 - 1e-7, Vec::new(), 1e-5));
        assert!(incumbent.update(4.0, Vec::new(), 1e-5));

        assert_eq!(incumbent.value, 4.0);
        assert_eq!(incumbent.history, vec![5.0, 4.0]);
    }
}
