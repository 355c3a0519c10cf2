use std::collections::HashMap;

use ordered_float::OrderedFloat;
use rand::Rng;

use crate::environment::{Movement, Pos};

/// Action values for one state, indexed by `Movement::index`.
pub type ActionValues = [f64; Movement::COUNT];

/// State -> action-value table.
///
/// States are added lazily: an unseen position reads as all zeros, and
/// `entry` inserts that zero row the first time a position is referenced
/// mutably. Rows are never removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QTable {
    values: HashMap<Pos, ActionValues>,
}

impl QTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutable row for `pos`, inserting zeros on first reference.
    pub fn entry(&mut self, pos: Pos) -> &mut ActionValues {
        self.values.entry(pos).or_insert([0.0; Movement::COUNT])
    }

    /// Read-only view; unseen states are all zeros and are not inserted.
    pub fn values(&self, pos: Pos) -> ActionValues {
        self.values
            .get(&pos)
            .copied()
            .unwrap_or([0.0; Movement::COUNT])
    }

    pub fn get(&self, pos: Pos, movement: Movement) -> f64 {
        self.values(pos)[movement.index()]
    }

    pub fn contains(&self, pos: Pos) -> bool {
        self.values.contains_key(&pos)
    }

    pub fn max_value(&self, pos: Pos) -> f64 {
        self.values(pos)
            .iter()
            .copied()
            .map(OrderedFloat)
            .max()
            .map_or(0.0, OrderedFloat::into_inner)
    }

    pub fn greedy_action(&self, pos: Pos) -> Movement {
        max_value_action(&self.values(pos))
    }

    /// Visited states in row-major order.
    pub fn states(&self) -> Vec<Pos> {
        let mut states: Vec<Pos> = self.values.keys().copied().collect();
        states.sort();
        states
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Pos, &ActionValues)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(Pos, ActionValues)> for QTable {
    fn from_iter<I: IntoIterator<Item = (Pos, ActionValues)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Argmax over the action values. Ties go to the lowest action index
/// (Up, Down, Left, Right), so an untrained state always picks Up.
pub fn max_value_action(values: &ActionValues) -> Movement {
    Movement::ALL
        .into_iter()
        .fold(Movement::Up, |best, candidate| {
            if values[candidate.index()] > values[best.index()] {
                candidate
            } else {
                best
            }
        })
}

pub trait ExplorationStrategy {
    fn next_action<R: Rng + ?Sized>(&self, values: &ActionValues, rng: &mut R) -> Movement;

    /// Called once at the end of every training episode.
    fn decay(&mut self) {}
}

/// Always exploit. Draws nothing from the generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct Greedy;

impl ExplorationStrategy for Greedy {
    fn next_action<R: Rng + ?Sized>(&self, values: &ActionValues, _rng: &mut R) -> Movement {
        max_value_action(values)
    }
}

/// ε-greedy exploration with multiplicative decay towards a floor.
#[derive(Debug, Clone, PartialEq)]
pub struct EpsilonGreedy {
    epsilon: f64,
    decay: f64,
    min_epsilon: f64,
}

impl EpsilonGreedy {
    pub fn new(epsilon: f64, decay: f64, min_epsilon: f64) -> Self {
        EpsilonGreedy {
            epsilon,
            decay,
            min_epsilon,
        }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }
}

impl ExplorationStrategy for EpsilonGreedy {
    fn next_action<R: Rng + ?Sized>(&self, values: &ActionValues, rng: &mut R) -> Movement {
        if rng.gen::<f64>() < self.epsilon {
            return rng.gen::<Movement>();
        }
        max_value_action(values)
    }

    fn decay(&mut self) {
        self.epsilon = (self.epsilon * self.decay).max(self.min_epsilon);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::{rngs::StdRng, SeedableRng};
    use test_case::test_case;

    #[test]
    fn unseen_state_reads_zero_without_inserting() {
        let table = QTable::new();
        let pos = Pos::new(2, 3);
        assert_eq!(table.values(pos), [0.0; 4]);
        assert_eq!(table.max_value(pos), 0.0);
        assert!(!table.contains(pos));
    }

    #[test]
    fn entry_inserts_zero_row_once() {
        let mut table = QTable::new();
        let pos = Pos::new(1, 1);
        assert_eq!(*table.entry(pos), [0.0; 4]);
        table.entry(pos)[Movement::Left.index()] = 0.5;
        table.entry(pos);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(pos, Movement::Left), 0.5);
    }

    #[test_case([0.0, 0.0, 0.0, 0.0], Movement::Up; "all zero")]
    #[test_case([0.1, 0.3, 0.3, 0.2], Movement::Down; "tie goes to lower index")]
    #[test_case([-1.0, -0.5, -2.0, -0.1], Movement::Right; "all negative")]
    #[test_case([0.0, 0.0, 0.0, 1e-9], Movement::Right; "tiny margin")]
    fn argmax(values: ActionValues, expected: Movement) {
        assert_eq!(max_value_action(&values), expected);
    }

    #[test]
    fn zero_epsilon_is_greedy() {
        let strategy = EpsilonGreedy::new(0.0, 1.0, 0.0);
        let values = [0.0, 0.2, 0.7, 0.7];
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..200 {
            assert_eq!(strategy.next_action(&values, &mut rng), Movement::Left);
        }
    }

    #[test]
    fn full_epsilon_is_uniform() {
        let strategy = EpsilonGreedy::new(1.0, 1.0, 1.0);
        let values = [0.0, 0.0, 10.0, 0.0];
        let mut rng = StdRng::seed_from_u64(11);
        let trials = 40_000;
        let mut counts = [0usize; 4];
        for _ in 0..trials {
            counts[strategy.next_action(&values, &mut rng).index()] += 1;
        }
        for count in counts {
            assert_abs_diff_eq!(count as f64 / trials as f64, 0.25, epsilon = 0.02);
        }
    }

    #[test]
    fn decay_floors_at_minimum() {
        let mut strategy = EpsilonGreedy::new(0.5, 0.5, 0.1);
        let mut last = strategy.epsilon();
        for _ in 0..10 {
            strategy.decay();
            assert!(strategy.epsilon() <= last);
            assert!(strategy.epsilon() >= 0.1);
            last = strategy.epsilon();
        }
        assert_eq!(strategy.epsilon(), 0.1);
    }
}
