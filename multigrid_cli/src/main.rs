use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use multigrid_core::{
    Episode, VariantConfig,
    agent::{Controller, PlanningController, RandomController, collect_actions},
};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ControllerKind {
    /// Uniform random actions.
    Random,
    /// Shortest path to the nearest owned goal.
    Planner,
}

#[derive(Parser, Debug)]
#[command(version, about = "Roll out multi-agent gridworld episodes", long_about = None)]
struct Args {
    /// Named variant to run
    #[arg(short, long, default_value = "bottleneck-2a-7x5")]
    preset: String,

    /// Number of episodes
    #[arg(short, long, default_value_t = 10)]
    episodes: u32,

    /// Episode seed; random when omitted
    #[arg(short, long)]
    seed: Option<u64>,

    /// Controller driving every agent
    #[arg(short, long, value_enum, default_value_t = ControllerKind::Random)]
    controller: ControllerKind,

    /// Print the available presets and exit
    #[arg(long)]
    list: bool,
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("multigrid=info,multigrid_core=info,warn"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}

fn controllers(kind: ControllerKind, agents: usize, seed: u64) -> Vec<Box<dyn Controller>> {
    (0..agents)
        .map(|id| -> Box<dyn Controller> {
            match kind {
                ControllerKind::Random => Box::new(RandomController::new(id, seed.wrapping_add(id as u64))),
                ControllerKind::Planner => Box::new(PlanningController::new(id)),
            }
        })
        .collect()
}

#[derive(Debug, Default)]
struct Summary {
    successes: u32,
    truncated: u32,
    steps: u64,
}

fn run(args: &Args) -> Result<Summary> {
    let config = VariantConfig::preset(&args.preset)?;
    let seed = args.seed.unwrap_or_else(rand::random);
    info!(preset = %args.preset, seed, controller = ?args.controller, "starting rollout");

    let mut episode = Episode::new(config, seed).with_context(|| format!("creating {}", args.preset))?;
    let agents = episode.environment().agents().len();
    let mut controllers = controllers(args.controller, agents, seed);
    let mut summary = Summary::default();

    for n in 0..args.episodes {
        if n > 0 {
            episode.reset()?;
        }
        let mut returns = vec![0.0f32; agents];
        loop {
            let actions = collect_actions(&mut controllers, &episode);
            let outcome = episode.step(&actions)?;
            for (total, r) in returns.iter_mut().zip(&outcome.rewards) {
                *total += r;
            }
            if outcome.done {
                let steps = episode.environment().step_count();
                summary.steps += u64::from(steps);
                if outcome.info.success {
                    summary.successes += 1;
                }
                if outcome.truncated {
                    summary.truncated += 1;
                }
                info!(
                    episode = n,
                    steps,
                    success = outcome.info.success,
                    truncated = outcome.truncated,
                    side = ?outcome.info.side,
                    ?returns,
                    "episode done"
                );
                break;
            }
        }
        debug!(state = ?episode.state(), "final episode state");
    }
    Ok(summary)
}

fn main() -> Result<()> {
    init_logging()?;
    let args = Args::parse();

    if args.list {
        for name in VariantConfig::preset_names() {
            println!("{name}");
        }
        return Ok(());
    }
    if args.episodes == 0 {
        bail!("--episodes must be at least 1");
    }

    let summary = run(&args)?;
    let rate = f64::from(summary.successes) / f64::from(args.episodes);
    if summary.truncated == args.episodes {
        warn!("every episode ran out of steps");
    }
    info!(
        episodes = args.episodes,
        successes = summary.successes,
        truncated = summary.truncated,
        mean_steps = summary.steps as f64 / f64::from(args.episodes),
        success_rate = rate,
        "rollout finished"
    );
    Ok(())
}
