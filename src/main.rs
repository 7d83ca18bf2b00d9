use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use serde_json::json;

use ico_optimizer::dataset::load_dataset;
use ico_optimizer::simulator::LogObserver;
use ico_optimizer::{
    FixedParameters, ObjectiveAdapter, ParticleSwarm, Reduction, SearchSpace, SelectionPolicy,
    SimulationContext, Simulator, Strategy, StrategyOptimizer, SwarmParams,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PolicyArg {
    Calendar,
    RandomPool,
}

impl From<PolicyArg> for SelectionPolicy {
    fn from(p: PolicyArg) -> Self {
        match p {
            PolicyArg::Calendar => SelectionPolicy::CalendarAligned,
            PolicyArg::RandomPool => SelectionPolicy::RandomizedPool,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ReductionArg {
    Worst,
    Mean,
    Single,
}

impl From<ReductionArg> for Reduction {
    fn from(r: ReductionArg) -> Self {
        match r {
            ReductionArg::Worst => Reduction::WorstCase,
            ReductionArg::Mean => Reduction::Mean,
            ReductionArg::Single => Reduction::Single,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "ICO participation strategy backtester and optimizer")]
struct Args {
    #[arg(long, default_value = "data/past-icos.csv")]
    icos: PathBuf,
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
    /// JSON file with fixed parameters; missing keys use defaults.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = PolicyArg::RandomPool)]
    policy: PolicyArg,
    #[arg(long, default_value_t = 20)]
    runs: usize,
    #[arg(long, value_enum, default_value_t = ReductionArg::Worst)]
    reduction: ReductionArg,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate one strategy: target factor, max duration, spread increase, advance %.
    Simulate {
        #[arg(long, value_delimiter = ',', default_value = "3,50,2,95")]
        strategy: Vec<f64>,
    },
    /// Search strategy space with particle swarm optimization.
    Optimize {
        #[arg(long, default_value_t = 1)]
        swarms: usize,
        #[arg(long, default_value_t = 500)]
        swarm_size: usize,
        #[arg(long, default_value_t = 0.5)]
        omega: f64,
        #[arg(long, default_value_t = 0.5)]
        phi_p: f64,
        #[arg(long, default_value_t = 0.5)]
        phi_t: f64,
        #[arg(long, default_value_t = 0.5)]
        phi_g: f64,
        #[arg(long, default_value_t = 5)]
        max_iter: usize,
        #[arg(long, default_value_t = 1e-8)]
        min_func: f64,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Average appreciation factor per day since listing.
    Factors {
        #[arg(long, default_value_t = 5)]
        min_samples: usize,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    if args.runs == 0 {
        bail!("--runs must be >= 1");
    }

    let fixed = match &args.config {
        Some(path) => FixedParameters::from_file(path)?,
        None => FixedParameters::default(),
    };
    let dataset = load_dataset(&args.icos, &args.data_dir)?;
    if dataset.is_empty() {
        bail!(
            "no listed ICOs found from {} and {}",
            args.icos.display(),
            args.data_dir.display()
        );
    }

    let policy = SelectionPolicy::from(args.policy);
    let ctx = Arc::new(SimulationContext::new(dataset, fixed, policy)?);
    info!(
        "simulating {} to {} with {} listed ICOs ({:?})",
        ctx.fixed.start_date,
        ctx.fixed.end_date,
        ctx.dataset.len(),
        policy
    );

    let adapter = ObjectiveAdapter::new(Arc::clone(&ctx), SearchSpace::default())
        .with_runs(args.runs)
        .with_reduction(args.reduction.into())
        .with_seed(args.seed);

    match args.command {
        Command::Simulate { strategy } => {
            let strategy = Strategy::from_vector(&strategy)?;
            let outcome =
                Simulator::new(&ctx).simulate_with(&strategy, args.seed, &mut LogObserver);
            println!(
                "seed={} final_cash={:.2} generation={} deployed={} harvested={}",
                args.seed, outcome.final_cash, outcome.generation, outcome.deployed, outcome.harvested
            );
            if !policy.is_deterministic() && args.runs > 1 {
                println!(
                    "{:?} profit over {} runs: {:.2}",
                    args.reduction,
                    args.runs,
                    adapter.profit(&strategy)
                );
            }
        }
        Command::Optimize {
            swarms,
            swarm_size,
            omega,
            phi_p,
            phi_t,
            phi_g,
            max_iter,
            min_func,
            out,
        } => {
            let swarm = SwarmParams {
                swarms,
                swarm_size,
                omega,
                phi_p,
                phi_t,
                phi_g,
                max_iter,
                min_func,
                ..Default::default()
            };
            let report =
                StrategyOptimizer::new(adapter, ParticleSwarm::new(swarm.clone())).optimize()?;

            println!("{:.2}", report.profit);
            println!("{:?}", report.vector);

            if let Some(out) = out {
                let payload = json!({
                    "generated_at_utc": Utc::now().to_rfc3339(),
                    "fixed_parameters": ctx.fixed,
                    "policy": policy,
                    "runs": args.runs,
                    "reduction": Reduction::from(args.reduction),
                    "search_space": SearchSpace::default(),
                    "swarm": swarm,
                    "result": report,
                });
                fs::write(&out, serde_json::to_string_pretty(&payload)?)
                    .with_context(|| format!("failed to write {}", out.display()))?;
                println!("Saved result: {}", out.display());
            }
        }
        Command::Factors { min_samples } => {
            for (offset, avg) in ctx.dataset.factors.average_by_offset(min_samples) {
                println!("{offset:>4} days: mean factor {:.3} over {} ICOs", avg.mean, avg.count);
            }
        }
    }

    Ok(())
}
