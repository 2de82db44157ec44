use std::{fs::File, io::BufReader, path::PathBuf};

use anyhow::{bail, Context};
use clap::Parser;
use log::info;
use vrptw_planner::{
    bnb,
    colgen::{ColumnGeneration, VehicleBounds},
    extsolvers::highs::HighsSolverInstance,
    PricingMode, SolverConfig,
};
use vrptw_structs::{solomon, Instance, Solution};

mod report;

#[derive(Parser)]
#[clap(author, version, about = "VRPTW column generation with vehicle-count branching", long_about = None)]
struct Cli {
    /// Solomon instance file, or a JSON instance when the name ends in .json
    instance: PathBuf,

    /// Pricing algorithm
    #[arg(short, long)]
    mode: Option<PricingMode>,

    /// Branch on the number of vehicles until it is integral
    #[arg(short, long)]
    branch: bool,

    /// Keep only the first N customers
    #[arg(short = 'n', long)]
    customers: Option<usize>,

    /// JSON solver configuration; flags given here take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Worker threads for branch-and-bound
    #[arg(short, long)]
    threads: Option<usize>,

    /// Truncate arc costs and times to one decimal
    #[arg(long)]
    round: bool,

    /// Write the final restricted master LP to this file
    #[arg(long)]
    write_lp: Option<PathBuf>,

    /// Print the solution as JSON
    #[arg(long)]
    json: bool,

    /// More logging; repeat for trace output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn load_instance(cli: &Cli) -> anyhow::Result<Instance> {
    let is_json = cli
        .instance
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let instance = if is_json {
        if cli.customers.is_some() {
            bail!("--customers is only supported for Solomon instance files");
        }
        let f = File::open(&cli.instance)
            .with_context(|| format!("could not open {}", cli.instance.display()))?;
        let mut instance: Instance = serde_json::from_reader(BufReader::new(f))
            .with_context(|| format!("could not parse {}", cli.instance.display()))?;
        instance.ensure_matrices();
        instance
    } else {
        solomon::from_file(&cli.instance, cli.customers)
            .with_context(|| format!("could not load {}", cli.instance.display()))?
    };

    Ok(if cli.round {
        instance.with_rounding()
    } else {
        instance
    })
}

fn load_config(cli: &Cli) -> anyhow::Result<SolverConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("could not read {}", path.display()))?;
            SolverConfig::from_json(&json)
                .with_context(|| format!("invalid configuration in {}", path.display()))?
        }
        None => SolverConfig::default(),
    };

    if let Some(mode) = cli.mode {
        config.pricing.mode = mode;
    }
    if cli.branch {
        config.branching.enabled = true;
    }
    if let Some(threads) = cli.threads {
        config.branching.threads = threads.max(1);
    }
    Ok(config)
}

fn solve(cli: &Cli, instance: &Instance, config: &SolverConfig) -> anyhow::Result<Solution> {
    if config.branching.enabled {
        if cli.write_lp.is_some() {
            bail!("--write-lp cannot be combined with branching");
        }
        let outcome = bnb::solve::<HighsSolverInstance>(instance, config)?;
        info!(
            "Branch-and-bound explored {} nodes, pruned {}, root objective {:.4}",
            outcome.nodes_explored, outcome.nodes_pruned, outcome.root_objective
        );
        match outcome.best {
            Some(best) => Ok(best.to_solution(instance)),
            None => bail!("no vehicle count admits a feasible solution"),
        }
    } else {
        let mut colgen = ColumnGeneration::<HighsSolverInstance>::new(instance, config)?;
        let result = colgen.run(VehicleBounds::root(instance));
        if let Some(path) = &cli.write_lp {
            colgen.write_master(&path.to_string_lossy())?;
            info!("Wrote restricted master to {}", path.display());
        }
        Ok(result?.to_solution(instance))
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let instance = load_instance(&cli)?;
    let config = load_config(&cli)?;
    info!(
        "Solving {} ({} customers, capacity {}) with {} pricing",
        instance.name,
        instance.num_customers(),
        instance.capacity,
        config.pricing.mode
    );

    let solution = solve(&cli, &instance, &config)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&solution)?);
    } else {
        print!("{}", report::solution_table(&instance, &solution)?);
    }
    Ok(())
}
