use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use crate::agent::QLearningAgent;
use crate::config::TrainingParams;
use crate::environment::{Cell, Env, Pos};
use crate::error::{Error, Result};
use crate::policy::{ExplorationStrategy, QTable};

/// Per-episode training record, filled in episode order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingStats {
    pub rewards: Vec<f64>,
    pub steps: Vec<usize>,
    pub reached_goal: Vec<bool>,
}

#[derive(Serialize)]
struct EpisodeRow {
    episode: usize,
    reward: f64,
    steps: usize,
    reached_goal: bool,
}

impl TrainingStats {
    fn with_capacity(episodes: usize) -> Self {
        Self {
            rewards: Vec::with_capacity(episodes),
            steps: Vec::with_capacity(episodes),
            reached_goal: Vec::with_capacity(episodes),
        }
    }

    pub fn episodes(&self) -> usize {
        self.rewards.len()
    }

    pub fn mean_reward(&self) -> f64 {
        mean(self.rewards.iter().copied())
    }

    pub fn mean_steps(&self) -> f64 {
        mean(self.steps.iter().map(|s| *s as f64))
    }

    pub fn success_rate(&self) -> f64 {
        mean(self.reached_goal.iter().map(|g| if *g { 1.0 } else { 0.0 }))
    }

    /// Mean reward of the most recent `window` episodes.
    pub fn recent_mean_reward(&self, window: usize) -> f64 {
        let from = self.rewards.len().saturating_sub(window);
        mean(self.rewards[from..].iter().copied())
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for episode in 0..self.episodes() {
            writer.serialize(EpisodeRow {
                episode,
                reward: self.rewards[episode],
                steps: self.steps[episode],
                reached_goal: self.reached_goal[episode],
            })?;
        }
        writer
            .flush()
            .map_err(|e| Error::io("write statistics to", path, e))?;
        Ok(())
    }
}

fn mean(values: impl ExactSizeIterator<Item = f64>) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    values.sum::<f64>() / n as f64
}

/// Side channel notified after every finished episode. Must not touch
/// the random generator.
pub trait TrainingObserver {
    fn on_episode_end(&mut self, _stats: &TrainingStats, _epsilon: f64) {}

    fn on_training_end(&mut self, _stats: &TrainingStats) {}
}

impl TrainingObserver for () {}

/// Progress bar showing mean reward so far and current ε.
pub struct ProgressObserver {
    progress_bar: ProgressBar,
}

impl ProgressObserver {
    pub fn new(episodes: usize) -> Result<Self> {
        let progress_bar = ProgressBar::new(episodes as u64);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} episodes ({msg})")
                .map_err(|e| Error::ProgressBarTemplate {
                    message: e.to_string(),
                })?
                .progress_chars("=>-"),
        );
        Ok(Self { progress_bar })
    }

    pub fn message(&self) -> String {
        self.progress_bar.message()
    }
}

impl TrainingObserver for ProgressObserver {
    fn on_episode_end(&mut self, stats: &TrainingStats, epsilon: f64) {
        self.progress_bar.inc(1);
        if stats.episodes() == 1 || stats.episodes() % 100 == 0 {
            self.progress_bar.set_message(format!(
                "mean reward {:.2}, epsilon {:.3}",
                stats.mean_reward(),
                epsilon
            ));
        }
    }

    fn on_training_end(&mut self, stats: &TrainingStats) {
        self.progress_bar.finish_with_message(format!(
            "mean reward {:.2}, success {:.1}%",
            stats.mean_reward(),
            stats.success_rate() * 100.0
        ));
    }
}

struct EpisodeOutcome {
    reward: f64,
    steps: usize,
    reached_goal: bool,
}

/// Run one episode from the start cell until a terminal cell, or until
/// `max_steps` if a cap is set. Each step draws from `rng` first for the
/// action and then for the slip.
fn run_episode<R: Rng + ?Sized>(
    env: &Env,
    agent: &mut QLearningAgent,
    max_steps: Option<u32>,
    rng: &mut R,
) -> EpisodeOutcome {
    let mut state = env.reset();
    let mut outcome = EpisodeOutcome {
        reward: 0.0,
        steps: 0,
        reached_goal: false,
    };

    loop {
        if max_steps.is_some_and(|cap| outcome.steps >= cap as usize) {
            debug!(steps = outcome.steps, "episode hit the step cap");
            break;
        }
        let action = agent.select_action(state, rng);
        let transition = env.step(action, state, rng);
        agent.update(state, action, transition.reward, transition.pos);

        state = transition.pos;
        outcome.reward += transition.reward;
        outcome.steps += 1;

        if transition.done {
            outcome.reached_goal = env.cell(state) == Cell::Goal;
            break;
        }
    }
    outcome
}

/// Train `agent` for `episodes` episodes, decaying ε after each one.
///
/// Episodes run strictly in order against one shared generator, so a
/// seeded `rng` gives an identical table and identical statistics.
pub fn train<R, O>(
    env: &Env,
    agent: &mut QLearningAgent,
    episodes: usize,
    params: &TrainingParams,
    rng: &mut R,
    observer: &mut O,
) -> TrainingStats
where
    R: Rng + ?Sized,
    O: TrainingObserver + ?Sized,
{
    info!(
        episodes,
        epsilon = agent.epsilon(),
        max_steps = ?params.max_steps,
        "starting training"
    );
    let mut stats = TrainingStats::with_capacity(episodes);

    for episode in 0..episodes {
        let outcome = run_episode(env, agent, params.max_steps, rng);
        agent.decay_epsilon();

        stats.rewards.push(outcome.reward);
        stats.steps.push(outcome.steps);
        stats.reached_goal.push(outcome.reached_goal);

        if params.log_interval > 0 && (episode + 1) % params.log_interval == 0 {
            info!(
                episode = episode + 1,
                mean_reward = stats.recent_mean_reward(params.log_interval),
                epsilon = agent.epsilon(),
                states = agent.table().len(),
                "training progress"
            );
        }
        observer.on_episode_end(&stats, agent.epsilon());
    }

    observer.on_training_end(&stats);
    info!(
        mean_reward = stats.mean_reward(),
        mean_steps = stats.mean_steps(),
        success_rate = stats.success_rate(),
        "training finished"
    );
    stats
}

/// A replayed episode.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    /// Every visited position, starting with the start cell.
    pub path: Vec<Pos>,
    pub reward: f64,
    pub done: bool,
}

/// Follow `table` through `env` without learning, for at most
/// `max_steps` steps. The table is only read.
pub fn replay<S, R>(
    env: &Env,
    table: &QTable,
    strategy: &S,
    max_steps: u32,
    rng: &mut R,
) -> Trajectory
where
    S: ExplorationStrategy,
    R: Rng + ?Sized,
{
    let mut state = env.reset();
    let mut trajectory = Trajectory {
        path: vec![state],
        reward: 0.0,
        done: false,
    };

    for _ in 0..max_steps {
        let action = strategy.next_action(&table.values(state), rng);
        let transition = env.step(action, state, rng);
        state = transition.pos;
        trajectory.path.push(state);
        trajectory.reward += transition.reward;
        if transition.done {
            trajectory.done = true;
            break;
        }
    }
    trajectory
}
