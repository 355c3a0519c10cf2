use std::path::Path;

use config_file::FromConfigFile;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Full run configuration, read from a TOML (or JSON/YAML) file.
///
/// Every section and key is optional; missing values fall back to the
/// defaults below.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub agent: AgentParams,
    pub env: EnvParams,
    pub training: TrainingParams,
}

/// Q-learning hyper-parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentParams {
    /// Learning rate α, in (0, 1]
    pub alpha: f64,
    /// Discount factor γ, in (0, 1]
    pub gamma: f64,
    /// Initial exploration rate ε
    pub epsilon: f64,
    /// Multiplicative decay applied to ε after every episode
    pub epsilon_decay: f64,
    /// Floor for ε
    pub min_epsilon: f64,
    /// Number of training episodes
    pub episodes: usize,
}

impl Default for AgentParams {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            gamma: 0.95,
            epsilon: 0.3,
            epsilon_decay: 0.995,
            min_epsilon: 0.01,
            episodes: 10_000,
        }
    }
}

/// Environment settings: slip model and reward table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvParams {
    pub slippery: bool,
    pub slippery_prob: f64,
    /// Reward for every move that lands on a non-terminal cell
    pub penalty: f64,
    pub hole_penalty: f64,
    pub goal_reward: f64,
}

impl Default for EnvParams {
    fn default() -> Self {
        Self {
            slippery: true,
            slippery_prob: 0.3,
            penalty: -0.1,
            hole_penalty: -1.0,
            goal_reward: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingParams {
    /// Optional per-episode step cap. `None` runs every episode until a
    /// terminal cell is reached.
    pub max_steps: Option<u32>,
    /// Seed for the shared random generator; entropy-seeded when absent.
    pub seed: Option<u64>,
    /// Episodes between two logged summaries.
    pub log_interval: usize,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            max_steps: None,
            seed: None,
            log_interval: 1_000,
        }
    }
}

fn check(name: &'static str, value: f64, ok: bool, expected: &'static str) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(Error::InvalidParameter {
            name,
            value,
            expected,
        })
    }
}

fn unit_open(value: f64) -> bool {
    value > 0.0 && value <= 1.0
}

fn unit_closed(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}

impl AgentParams {
    pub fn validate(&self) -> Result<()> {
        check("alpha", self.alpha, unit_open(self.alpha), "0 < alpha <= 1")?;
        check("gamma", self.gamma, unit_open(self.gamma), "0 < gamma <= 1")?;
        check("epsilon", self.epsilon, unit_closed(self.epsilon), "0 <= epsilon <= 1")?;
        check(
            "min_epsilon",
            self.min_epsilon,
            unit_closed(self.min_epsilon) && self.min_epsilon <= self.epsilon,
            "0 <= min_epsilon <= epsilon",
        )?;
        check(
            "epsilon_decay",
            self.epsilon_decay,
            unit_open(self.epsilon_decay),
            "0 < epsilon_decay <= 1",
        )
    }
}

impl EnvParams {
    pub fn validate(&self) -> Result<()> {
        check(
            "slippery_prob",
            self.slippery_prob,
            unit_closed(self.slippery_prob),
            "0 <= slippery_prob <= 1",
        )?;
        check("penalty", self.penalty, self.penalty.is_finite(), "a finite number")?;
        check(
            "hole_penalty",
            self.hole_penalty,
            self.hole_penalty.is_finite(),
            "a finite number",
        )?;
        check(
            "goal_reward",
            self.goal_reward,
            self.goal_reward.is_finite(),
            "a finite number",
        )
    }
}

impl Config {
    /// Load and validate a configuration file. The format is picked from
    /// the file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let config = Config::from_config_file(path).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.agent.validate()?;
        self.env.validate()
    }
}
