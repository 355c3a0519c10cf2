use rand::Rng;

use crate::config::AgentParams;
use crate::environment::{Movement, Pos};
use crate::error::Result;
use crate::policy::{EpsilonGreedy, ExplorationStrategy, QTable};

/// Tabular Q-learning agent (off-policy TD control).
///
/// Holds the value table, the step size and discount, and the ε-greedy
/// exploration schedule. ε is the only hyper-parameter that changes
/// during training.
#[derive(Debug, Clone)]
pub struct QLearningAgent {
    table: QTable,
    alpha: f64,
    gamma: f64,
    exploration: EpsilonGreedy,
}

impl QLearningAgent {
    /// Fails if any hyper-parameter is out of range.
    pub fn new(params: &AgentParams) -> Result<Self> {
        Self::with_table(params, QTable::new())
    }

    /// Continue from an existing table, e.g. one loaded from disk.
    pub fn with_table(params: &AgentParams, table: QTable) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            table,
            alpha: params.alpha,
            gamma: params.gamma,
            exploration: EpsilonGreedy::new(
                params.epsilon,
                params.epsilon_decay,
                params.min_epsilon,
            ),
        })
    }

    pub fn table(&self) -> &QTable {
        &self.table
    }

    pub fn into_table(self) -> QTable {
        self.table
    }

    pub fn epsilon(&self) -> f64 {
        self.exploration.epsilon()
    }

    /// ε-greedy choice for `state`. The state's row is created if this
    /// is its first visit.
    pub fn select_action<R: Rng + ?Sized>(&mut self, state: Pos, rng: &mut R) -> Movement {
        let values = *self.table.entry(state);
        self.exploration.next_action(&values, rng)
    }

    /// Q(s,a) ← Q(s,a) + α [r + γ max_a' Q(s',a') − Q(s,a)]
    ///
    /// Applied even when `next_state` is terminal: terminal rows are never
    /// updated themselves, so they stay at zero and the target reduces to
    /// the reward.
    pub fn update(&mut self, state: Pos, action: Movement, reward: f64, next_state: Pos) {
        let max_next = self.table.max_value(next_state);
        let td_target = reward + self.gamma * max_next;
        let q = &mut self.table.entry(state)[action.index()];
        let td_error = td_target - *q;
        *q += self.alpha * td_error;
    }

    /// ε ← max(min_epsilon, ε · decay). Called once per finished episode.
    pub fn decay_epsilon(&mut self) {
        self.exploration.decay();
    }
}
