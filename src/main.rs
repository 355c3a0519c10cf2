use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use rand::{rngs::StdRng, SeedableRng};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use frozen_lake::{
    agent::QLearningAgent,
    config::Config,
    environment::Env,
    maps::MapName,
    model::{model_path, SavedModel},
    policy::{Greedy, QTable},
    render,
    rl::{self, ProgressObserver, TrainingObserver},
};

const DEFAULT_LOG_FILTER: &str = "frozen_lake=info";

/// Command line argument parser.
#[derive(Parser, Debug)]
#[command(name = "frozen_lake", version, about = "Q-learning on the frozen lake grid world", long_about = None)]
struct Cli {
    /// Configuration file (TOML, JSON or YAML). Defaults are used when absent.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train a Q-table and save it
    Train(TrainArgs),
    /// Replay one greedy episode with a saved Q-table
    Play(PlayArgs),
}

#[derive(Args, Debug)]
struct TrainArgs {
    #[arg(long, value_enum, default_value_t = MapName::Small)]
    map: MapName,

    /// Overrides `agent.episodes` from the configuration
    #[arg(long)]
    episodes: Option<usize>,

    /// 1 for a slippery lake, 0 for deterministic moves
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=1))]
    slippery: u8,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, default_value = "output/models")]
    output_dir: PathBuf,

    /// Continue training from a saved model instead of an empty table
    #[arg(long)]
    resume: Option<PathBuf>,

    /// Also write per-episode statistics as CSV
    #[arg(long)]
    stats: Option<PathBuf>,

    /// Hide the progress bar
    #[arg(long)]
    quiet: bool,
}

#[derive(Args, Debug)]
struct PlayArgs {
    #[arg(long, value_enum, default_value_t = MapName::Small)]
    map: MapName,

    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=1))]
    slippery: u8,

    /// Model file; defaults to the path `train` writes for this map
    #[arg(long)]
    model: Option<PathBuf>,

    #[arg(long, default_value = "output/models")]
    output_dir: PathBuf,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, default_value_t = 100)]
    max_steps: u32,
}

/// `RUST_LOG` when set and parseable, `frozen_lake=info` otherwise.
fn log_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn init_logging() {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    fmt()
        .with_env_filter(log_filter(rust_log.as_deref()))
        .with_writer(std::io::stderr)
        .init();
}

fn build_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => {
            info!(path = %path.display(), "reading configuration");
            Config::from_path(path).context("Unable to read configuration file")
        }
        None => Ok(Config::default()),
    }
}

fn train(mut config: Config, args: TrainArgs) -> Result<()> {
    config.env.slippery = args.slippery == 1;
    if let Some(episodes) = args.episodes {
        config.agent.episodes = episodes;
    }
    if args.seed.is_some() {
        config.training.seed = args.seed;
    }

    let env = Env::new(args.map.rows(), config.env.clone()).context("Invalid map")?;
    let table = match &args.resume {
        Some(path) => {
            let table = SavedModel::load_table(path)
                .with_context(|| format!("Unable to load model {}", path.display()))?;
            info!(path = %path.display(), states = table.len(), "resuming from saved model");
            table
        }
        None => QTable::new(),
    };
    let mut agent =
        QLearningAgent::with_table(&config.agent, table).context("Invalid agent parameters")?;
    let mut rng = build_rng(config.training.seed);

    println!(
        "Training on map {} ({})...",
        args.map,
        if config.env.slippery { "slippery" } else { "not slippery" }
    );
    let mut observer: Box<dyn TrainingObserver> = if args.quiet {
        Box::new(())
    } else {
        Box::new(ProgressObserver::new(config.agent.episodes)?)
    };
    let stats = rl::train(
        &env,
        &mut agent,
        config.agent.episodes,
        &config.training,
        &mut rng,
        observer.as_mut(),
    );

    let path = model_path(&args.output_dir, args.map.as_str(), config.env.slippery);
    SavedModel::from_table(agent.table(), args.map.as_str(), config.env.slippery)
        .save_to_file(&path)
        .context("Unable to save model")?;
    println!("Model saved to {}", path.display());

    if let Some(stats_path) = &args.stats {
        stats
            .write_csv(stats_path)
            .context("Unable to write statistics")?;
        println!("Statistics written to {}", stats_path.display());
    }

    println!(
        "Mean reward {:.3}, success rate {:.1}%",
        stats.mean_reward(),
        stats.success_rate() * 100.0
    );
    print!("{}", render::render_policy(&env, agent.table()));
    Ok(())
}

fn play(mut config: Config, args: PlayArgs) -> Result<()> {
    config.env.slippery = args.slippery == 1;
    let path = args
        .model
        .clone()
        .unwrap_or_else(|| model_path(&args.output_dir, args.map.as_str(), config.env.slippery));

    let saved = SavedModel::load_from_file(&path)
        .with_context(|| format!("Unable to load model {}", path.display()))?;
    let table = saved.to_table()?;

    let env = Env::new(args.map.rows(), config.env).context("Invalid map")?;
    if saved.map != args.map.as_str() || saved.slippery != env.params().slippery {
        warn!(
            model_map = %saved.map,
            model_slippery = saved.slippery,
            slippery = env.params().slippery,
            "model was trained with different settings"
        );
    }
    if table.is_empty() {
        bail!("Model {} holds no states", path.display());
    }

    let mut rng = build_rng(args.seed);
    let trajectory = rl::replay(&env, &table, &Greedy, args.max_steps, &mut rng);

    print!("{}", render::render_path(&env, &trajectory.path));
    println!();
    print!("{}", render::render_policy(&env, &table));
    let ending = if !trajectory.done {
        "step limit reached"
    } else if env.is_valid_pos(*trajectory.path.last().unwrap_or(&env.start_pos())) {
        "reached the goal"
    } else {
        "fell into a hole"
    };
    println!(
        "{} after {} steps, total reward {:.2}",
        ending,
        trajectory.path.len() - 1,
        trajectory.reward
    );
    Ok(())
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Train(args) => train(config, args),
        Commands::Play(args) => play(config, args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn rust_log_overrides_default_filter() {
        let filter = log_filter(Some("frozen_lake=debug"));
        assert_eq!(filter.to_string(), "frozen_lake=debug");
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn default_filter_without_rust_log() {
        assert_eq!(log_filter(None).to_string(), DEFAULT_LOG_FILTER);
        assert_eq!(log_filter(Some("  ")).to_string(), DEFAULT_LOG_FILTER);
        assert_eq!(log_filter(None).max_level_hint(), Some(LevelFilter::INFO));
    }
}
