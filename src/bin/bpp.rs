use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use bnp_binpacking::{
    CutSelection, HighsBranchAndPrice, Instance, Objective, PricingKind, SearchStrategy, Settings, UI,
};
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(name = "bpp", about = "Branch & Price for bin packing and batch scheduling")]
struct Args {
    /// JSON instance, read from stdin if omitted
    #[structopt(parse(from_os_str))]
    path: Option<PathBuf>,

    /// dfs, bfs or best
    #[structopt(short, long, default_value = "dfs")]
    strategy: String,

    /// Use the MIP pricing instead of the label setting
    #[structopt(long)]
    mip_pricing: bool,

    /// none, separate, complete or random
    #[structopt(long, default_value = "none")]
    cuts: String,

    /// Number of random cuts, with `--cuts random`
    #[structopt(long, default_value = "10")]
    random_cuts: usize,

    #[structopt(long, default_value = "0")]
    seed: u64,

    /// Minimise total batch processing time instead of the number of bins
    #[structopt(long)]
    batch: bool,

    /// Columns added per pricing round
    #[structopt(short = "d", long, default_value = "1")]
    columns_per_pricing: usize,

    /// Wall clock budget of the search in seconds
    #[structopt(short, long)]
    time_limit: Option<f64>,

    #[structopt(long)]
    node_limit: Option<usize>,

    #[structopt(long)]
    max_colgen_iterations: Option<usize>,

    #[structopt(short = "j", long, default_value = "1")]
    threads: usize,

    /// Seed the root with first fit decreasing
    #[structopt(long)]
    heuristic: bool,

    /// Do not print progress
    #[structopt(short, long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::from_args();

    let mut input = String::new();
    match &args.path {
        Some(path) => BufReader::new(File::open(path).with_context(|| format!("opening {}", path.display()))?)
            .read_to_string(&mut input)?,
        None => std::io::stdin().read_to_string(&mut input)?,
    };

    let mut instance = Instance::from_json(&input)?;
    if args.batch {
        instance.objective = Objective::BatchProcessingTime;
    }

    let strategy = match args.strategy.as_str() {
        "dfs" => SearchStrategy::DepthFirst,
        "bfs" => SearchStrategy::BreadthFirst,
        "best" => SearchStrategy::BestFirst,
        other => anyhow::bail!("unknown search strategy {other}"),
    };
    let cuts = match args.cuts.as_str() {
        "none" => CutSelection::None,
        "separate" => CutSelection::Separate,
        "complete" => CutSelection::Complete,
        "random" => CutSelection::Random {
            count: args.random_cuts,
            seed: args.seed,
        },
        other => anyhow::bail!("unknown cut selection {other}"),
    };

    let settings = Settings {
        strategy,
        cuts,
        pricing: if args.mip_pricing { PricingKind::Mip } else { PricingKind::LabelSetting },
        columns_per_pricing: args.columns_per_pricing,
        time_limit: args.time_limit.map(Duration::from_secs_f64),
        node_limit: args.node_limit,
        max_colgen_iterations: args.max_colgen_iterations,
        num_threads: args.threads,
        seed_with_heuristic: args.heuristic,
        ..Settings::default()
    };

    let ui = if args.quiet { UI::quiet() } else { UI::new() };
    let result = HighsBranchAndPrice::new(instance, settings).solve(&ui)?;
    ui.finish();

    let mut stdout = std::io::stdout();
    serde_json::to_writer_pretty(&mut stdout, &result)?;
    writeln!(stdout)?;

    Ok(())
}
