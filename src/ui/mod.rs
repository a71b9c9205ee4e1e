use std::fmt::{Display, Formatter};
use std::io::Write;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::{JoinHandle, ThreadId};
use std::time::{Duration, Instant};

#[cfg(feature = "buffered_out")]
use std::io::BufWriter;
#[cfg(feature = "branch-graphviz")]
use std::fs::OpenOptions;

use console::{pad_str_with, style, Alignment};

use crate::misc::HashSet;

/// Struct to hold the UI
/// Particulary the rendering thread fed by the channel
pub struct UI {
    sender: UISender,
    handle: Option<JoinHandle<()>>,
}

#[derive(Clone)]
pub struct UISender {
    sender: Option<Sender<UIMessage>>,
}

impl UISender {
    /// Send typed UIMessage to internal channel.
    /// A closed or quiet UI silently drops the message.
    pub fn send(&self, user_msg: UIUserMessage) {
        if cfg!(feature = "disable_ui") {
            return;
        }
        if let Some(sender) = &self.sender {
            let _ = sender.send(UIMessage {
                thread_id: std::thread::current().id(),
                message: user_msg,
            });
        }
    }
}

impl UI {
    pub fn get_sender(&self) -> UISender {
        self.sender.clone()
    }

    /// Console UI rendering on its own thread
    pub fn new() -> Self {
        let (sender, receiver) = channel();

        #[cfg(not(feature = "disable_ui"))]
        let handle = Some(std::thread::spawn(move || {
            // a broken stdout only ends the rendering
            let _ = render(receiver);
        }));
        #[cfg(feature = "disable_ui")]
        let handle = {
            drop(receiver);
            None
        };

        Self {
            sender: UISender { sender: Some(sender) },
            handle,
        }
    }

    /// UI that drops every message
    pub fn quiet() -> Self {
        Self {
            sender: UISender { sender: None },
            handle: None,
        }
    }

    /// Wait until everything sent before `ExitUi` is written out
    pub fn finish(mut self) {
        self.sender.sender = None;
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Default for UI {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg_attr(feature = "disable_ui", allow(dead_code))]
fn render(receiver: Receiver<UIMessage>) -> std::io::Result<()> {
    #[cfg(feature = "branch-graphviz")]
    let mut graphviz_branch_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open("/tmp/branching_tree.dot")?;

    #[cfg(feature = "branch-graphviz")]
    graphviz_branch_file.write_all(b"digraph {\n")?;

    #[cfg(not(feature = "locked_out"))]
    let stdout = std::io::stdout();
    #[cfg(feature = "locked_out")]
    let stdout = std::io::stdout().lock();

    #[cfg(not(feature = "buffered_out"))]
    let mut buffered_out = stdout;
    #[cfg(feature = "buffered_out")]
    let mut buffered_out = BufWriter::with_capacity(512, stdout);

    let start_time = Instant::now();

    let mut total_pricing_runtime = 0.0;
    let mut total_lp_runtime = 0.0;
    let mut total_columns_priced = 0;

    let mut seen_threads = HashSet::default();
    let mut node_finish_order = 0;

    // ends when every sender is gone or on ExitUi
    while let Ok(UIMessage { thread_id, message }) = receiver.recv() {
        let time = start_time.elapsed().as_secs_f64();
        match message {
            UIUserMessage::NodePruned { node_id } => {
                #[cfg(feature = "branch-graphviz")]
                graphviz_branch_file
                    .write_all(format!("{node_id} [style=\"filled\" fillcolor=\"lightyellow\"];\n").as_bytes())?;
                #[cfg(not(feature = "branch-graphviz"))]
                let _ = node_id;
            }
            UIUserMessage::TimeLimitReached => {
                writeln!(&mut buffered_out, "{}", style("Time Limit Reached").yellow().bold())?
            }
            UIUserMessage::NodeLimitReached => {
                writeln!(&mut buffered_out, "{}", style("Node Limit Reached").yellow().bold())?
            }
            UIUserMessage::IterationLimitReached { node_id, iterations } => writeln!(
                &mut buffered_out,
                "[{thread_id:?}] {time:>6.2}  {}",
                style(format!("n{node_id} column generation stopped after {iterations} iterations")).yellow()
            )?,
            UIUserMessage::Log(msg) => writeln!(&mut buffered_out, "[{thread_id:?}] {time:>6.2}  {msg}")?,
            UIUserMessage::LogS(msg) => writeln!(&mut buffered_out, "[{thread_id:?}] {time:>6.2}  {msg}")?,
            UIUserMessage::StartWorker => {
                seen_threads.insert(thread_id);
                writeln!(
                    &mut buffered_out,
                    "{}",
                    style(format!("Worker #{} activated", seen_threads.len())).yellow().bold()
                )?;
            }
            UIUserMessage::ExitUi { root_node } => {
                writeln!(&mut buffered_out, "{}", pad_str_with("Statistics", 30, Alignment::Center, None, '⎯'))?;
                writeln!(
                    &mut buffered_out,
                    "total_lp_time: {total_lp_runtime:>8.2}s / total_pricing_time: {total_pricing_runtime:>8.2}s"
                )?;
                writeln!(&mut buffered_out, "nodes: {node_finish_order} / priced columns: {total_columns_priced}")?;
                if let Some(root) = root_node {
                    writeln!(&mut buffered_out, "root node: {:>8.2}s", root.as_secs_f64())?;
                }
                if total_lp_runtime + total_pricing_runtime > 0.0 {
                    writeln!(
                        &mut buffered_out,
                        "{:>3.1}% spent in pricing vs lp",
                        total_pricing_runtime / (total_lp_runtime + total_pricing_runtime) * 100.0
                    )?;
                }
                writeln!(&mut buffered_out, "{}", "⎯".repeat(30))?;
                break;
            }
            UIUserMessage::NodeStart(node_state) => {
                writeln!(&mut buffered_out, "[{thread_id:?}] {time:>6.2} started   node {node_state}")?;
                buffered_out.flush()?;

                #[cfg(feature = "branch-graphviz")]
                graphviz_branch_file.write_all(
                    format!(
                        "{id} [shape=\"box\" label=\"{id}\\n{decision}\\n{before_obj:.2} → ?\"];\n {parent} -> {id};\n",
                        id = node_state.node_id,
                        parent = node_state.parent_id,
                        decision = node_state.decision,
                        before_obj = node_state.before_obj,
                    )
                    .as_bytes(),
                )?;
            }
            UIUserMessage::NodeFinish(node_state) => {
                writeln!(&mut buffered_out, "[{thread_id:?}] {time:>6.2} completed node {node_state}")?;
                node_finish_order += 1;

                #[cfg(feature = "branch-graphviz")]
                graphviz_branch_file.write_all(
                    format!(
                        "{id} [shape=\"box\" label=\"{id} #{node_finish_order}\\n{decision}\\n{before_obj:.2} → {after_obj}\"];\n",
                        id = node_state.node_id,
                        decision = node_state.decision,
                        before_obj = node_state.before_obj,
                        after_obj = node_state.after_obj.map_or_else(|| "-".to_string(), |v| format!("{v:.5}")),
                    )
                    .as_bytes(),
                )?;
            }
            UIUserMessage::LPSolveIterationFinish(state) => {
                total_lp_runtime += state.lp_runtime;
                writeln!(
                    &mut buffered_out,
                    "{}",
                    style(format!("[{thread_id:?}] {time:>6.2} lp iteration {state}")).dim()
                )?
            }
            UIUserMessage::PricingProblemFinish(state) => {
                total_pricing_runtime += state.runtime;
                total_columns_priced += state.num_columns;
                writeln!(
                    &mut buffered_out,
                    "{}",
                    style(format!("[{thread_id:?}] {time:>6.2} pricing iteration {state}")).dim()
                )?;
            }
            UIUserMessage::NewBest { node_id, obj } => {
                writeln!(
                    &mut buffered_out,
                    "[{thread_id:?}] {time:>6.2}  {} {}",
                    style("Has new best:").black().on_green().bold(),
                    style(obj.to_string()).bold()
                )?;
                buffered_out.flush()?;

                #[cfg(feature = "branch-graphviz")]
                graphviz_branch_file
                    .write_all(format!("{node_id} [style=\"filled\" fillcolor=\"lightgreen\"];\n").as_bytes())?;
                #[cfg(not(feature = "branch-graphviz"))]
                let _ = node_id;
            }
        }
    }

    #[cfg(feature = "branch-graphviz")]
    graphviz_branch_file.write_all(b"}\n")?;

    buffered_out.flush()
}

#[derive(Clone, Debug)]
pub struct NodeUIState {
    pub node_id: u32,
    pub parent_id: u32,
    pub depth: u32,
    pub num_items: usize,
    pub num_columns: usize,
    pub current_open: usize,
    pub decision: String,
    pub before_obj: f64,
    /// not set in node start
    pub after_obj: Option<f64>,
    pub best_obj: f64,
}

impl Display for NodeUIState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "n{id}  parent=<{parent}> depth=<{depth}> open=<{open}> items=<{items}> cols=<{cols}> last=<{decision}> obj_before=<{before}> obj_now=<{after}> obj*=<{best}>",
            id = self.node_id,
            parent = self.parent_id,
            depth = self.depth,
            open = self.current_open,
            items = self.num_items,
            cols = self.num_columns,
            decision = self.decision,
            before = self.before_obj,
            after = self.after_obj.map_or_else(|| "-".to_string(), |v| v.to_string()),
            best = self.best_obj,
        )
    }
}

#[derive(Clone, Debug)]
/// Holds all state updates that can influence the UI
pub enum UIUserMessage {
    LogS(&'static str),
    Log(String),
    TimeLimitReached,
    NodeLimitReached,
    IterationLimitReached { node_id: u32, iterations: usize },
    ExitUi { root_node: Option<Duration> },
    StartWorker,

    NodeStart(NodeUIState),
    NodeFinish(NodeUIState),
    NodePruned { node_id: u32 },

    LPSolveIterationFinish(LPSolveIterationUIState),
    PricingProblemFinish(PricingProblemUIState),

    NewBest { obj: f64, node_id: u32 },
}

#[derive(Clone, Debug)]
pub struct PricingProblemUIState {
    pub runtime: f64,
    pub num_columns: usize,
    pub min_reduced_cost: f64,
    pub dual_bound: f64,
}

impl Display for PricingProblemUIState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "pricing_runtime=<{:>5.2}> num_cols=<{}> min_rc=<{:.6}> dual_bound=<{}>",
            self.runtime, self.num_columns, self.min_reduced_cost, self.dual_bound
        )
    }
}

#[derive(Clone, Debug)]
pub struct LPSolveIterationUIState {
    pub obj: f64,
    pub best_dual_bound: Option<f64>,
    pub lp_runtime: f64,
    pub num_columns: usize,
    pub num_added_columns: usize,
    pub previous_pricing_runtime: f64,
}

impl Display for LPSolveIterationUIState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "obj=<{:>10.8}> bound=<{}>: lp_runtime=<{:>5.2}> prev_pricing_runtime=<{:>5.2}> cols=<{}/{}>",
            self.obj,
            self.best_dual_bound.map_or_else(|| "-".to_string(), |db| format!("{db:>10.8}")),
            self.lp_runtime,
            self.previous_pricing_runtime,
            self.num_columns,
            self.num_added_columns
        )
    }
}

#[derive(Clone, Debug)]
pub struct UIMessage {
    pub thread_id: ThreadId,
    pub message: UIUserMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_ui_accepts_messages() {
        let ui = UI::quiet();
        let sender = ui.get_sender();
        sender.send(UIUserMessage::LogS("dropped"));
        sender.send(UIUserMessage::ExitUi { root_node: None });
        ui.finish();
    }

    #[test]
    fn node_state_renders_missing_objective() {
        let state = NodeUIState {
            node_id: 3,
            parent_id: 1,
            depth: 2,
            num_items: 4,
            num_columns: 9,
            current_open: 0,
            decision: "#1 with #2".to_string(),
            before_obj: 1.5,
            after_obj: None,
            best_obj: 2.0,
        };
        let rendered = state.to_string();
        assert!(rendered.starts_with("n3"));
        assert!(rendered.contains("obj_now=<->"));
        assert!(rendered.contains("last=<#1 with #2>"));
    }
}
