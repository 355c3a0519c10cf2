use ndarray::Array2;
use rand::{
    distributions::{Distribution, Standard},
    Rng,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EnvParams;
use crate::error::{Error, Result};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Cell {
    Start,
    Goal,
    Hole,
    Ice,
}

impl Cell {
    /// Any label other than `S`, `G` or `H` is walkable ice.
    pub fn from_char(c: char) -> Self {
        match c {
            'S' => Cell::Start,
            'G' => Cell::Goal,
            'H' => Cell::Hole,
            _ => Cell::Ice,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Cell::Start => 'S',
            Cell::Goal => 'G',
            Cell::Hole => 'H',
            Cell::Ice => 'F',
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Cell::Goal | Cell::Hole)
    }
}

// Action
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Movement {
    Up,
    Down,
    Left,
    Right,
}

impl Movement {
    pub const COUNT: usize = 4;
    pub const ALL: [Movement; Movement::COUNT] =
        [Movement::Up, Movement::Down, Movement::Left, Movement::Right];

    /// (row delta, column delta)
    pub fn into_vector(self) -> (isize, isize) {
        match self {
            Movement::Up    => (-1, 0),
            Movement::Down  => ( 1, 0),
            Movement::Left  => ( 0,-1),
            Movement::Right => ( 0, 1),
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Movement> {
        Movement::ALL.get(index).copied()
    }

    /// The two directions a slip can turn this movement into.
    pub fn perpendicular(self) -> [Movement; 2] {
        match self {
            Movement::Up | Movement::Down => [Movement::Left, Movement::Right],
            Movement::Left | Movement::Right => [Movement::Up, Movement::Down],
        }
    }

    pub fn arrow(self) -> char {
        match self {
            Movement::Up => '^',
            Movement::Down => 'v',
            Movement::Left => '<',
            Movement::Right => '>',
        }
    }
}

impl Distribution<Movement> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Movement {
        Movement::ALL[rng.gen_range(0..Movement::COUNT)]
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pos {
    pub row: usize,
    pub col: usize,
}

impl Pos {
    pub fn new(row: usize, col: usize) -> Self {
        Pos { row, col }
    }
}

/// Result of a single `Env::step`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transition {
    pub pos: Pos,
    pub reward: f64,
    pub done: bool,
}

/// Frozen lake grid world.
///
/// The environment holds no per-episode state: the agent's position is
/// passed into every `step` and the new position handed back, so the
/// same `Env` can be shared by training and replay.
#[derive(Debug, Clone)]
pub struct Env {
    map: Array2<Cell>,
    start: Pos,
    params: EnvParams,
}

impl Env {
    /// Build an environment from one string per row.
    ///
    /// Rows must all have the same length, and the map must hold exactly
    /// one `S` and at least one `G`.
    pub fn new<S: AsRef<str>>(rows: &[S], params: EnvParams) -> Result<Self> {
        params.validate()?;

        let width = match rows.first() {
            Some(row) => row.as_ref().chars().count(),
            None => return Err(Error::EmptyMap),
        };
        if width == 0 {
            return Err(Error::EmptyMap);
        }

        let mut cells = Vec::with_capacity(rows.len() * width);
        for (i, row) in rows.iter().enumerate() {
            let before = cells.len();
            cells.extend(row.as_ref().chars().map(Cell::from_char));
            let got = cells.len() - before;
            if got != width {
                return Err(Error::RaggedMap {
                    row: i,
                    expected: width,
                    got,
                });
            }
        }
        // Lengths were checked row by row above.
        let map = Array2::from_shape_vec((rows.len(), width), cells)
            .map_err(|_| Error::EmptyMap)?;

        let starts: Vec<Pos> = map
            .indexed_iter()
            .filter(|(_, cell)| **cell == Cell::Start)
            .map(|((row, col), _)| Pos { row, col })
            .collect();
        if starts.len() != 1 {
            return Err(Error::StartCount {
                count: starts.len(),
            });
        }
        if !map.iter().any(|cell| *cell == Cell::Goal) {
            return Err(Error::MissingGoal);
        }

        debug!(
            rows = rows.len(),
            cols = width,
            slippery = params.slippery,
            "map setup"
        );

        Ok(Self {
            map,
            start: starts[0],
            params,
        })
    }

    pub fn params(&self) -> &EnvParams {
        &self.params
    }

    /// (rows, cols)
    pub fn size(&self) -> (usize, usize) {
        self.map.dim()
    }

    pub fn cell(&self, pos: Pos) -> Cell {
        self.map[[pos.row, pos.col]]
    }

    pub fn start_pos(&self) -> Pos {
        self.start
    }

    /// Start of a new episode; always the same cell.
    pub fn reset(&self) -> Pos {
        self.start
    }

    pub fn is_terminal(&self, pos: Pos) -> bool {
        self.cell(pos).is_terminal()
    }

    pub fn is_valid_pos(&self, pos: Pos) -> bool {
        self.cell(pos) != Cell::Hole
    }

    /// Replace `movement` by one of its perpendiculars with probability
    /// `slippery_prob`. Draws nothing from `rng` on a non-slippery lake.
    pub fn slip<R: Rng + ?Sized>(&self, movement: Movement, rng: &mut R) -> Movement {
        if self.params.slippery && rng.gen::<f64>() < self.params.slippery_prob {
            movement.perpendicular()[rng.gen_range(0..2)]
        } else {
            movement
        }
    }

    /// Clamp each axis independently to the grid.
    fn check_movement(&self, pos: Pos, movement_vec: (isize, isize)) -> Pos {
        let (rows, cols) = self.size();
        let row = (pos.row as isize + movement_vec.0).clamp(0, rows as isize - 1);
        let col = (pos.col as isize + movement_vec.1).clamp(0, cols as isize - 1);
        Pos {
            row: row as usize,
            col: col as usize,
        }
    }

    /// Move one step from `pos`. Termination depends only on the
    /// destination cell.
    pub fn step<R: Rng + ?Sized>(&self, movement: Movement, pos: Pos, rng: &mut R) -> Transition {
        let movement = self.slip(movement, rng);
        let new_pos = self.check_movement(pos, movement.into_vector());

        let (reward, done) = match self.cell(new_pos) {
            Cell::Hole => (self.params.hole_penalty, true),
            Cell::Goal => (self.params.goal_reward, true),
            Cell::Start | Cell::Ice => (self.params.penalty, false),
        };

        Transition {
            pos: new_pos,
            reward,
            done,
        }
    }

    pub fn iter_all_coordinates(&self) -> EnvIter {
        EnvIter::new(self.size())
    }
}

/// Row-major iterator over every position of the grid.
pub struct EnvIter {
    next: Option<Pos>,
    size: (usize, usize),
}

impl EnvIter {
    fn new(size: (usize, usize)) -> EnvIter {
        let next = if size.0 > 0 && size.1 > 0 {
            Some(Pos { row: 0, col: 0 })
        } else {
            None
        };
        EnvIter { next, size }
    }
}

impl Iterator for EnvIter {
    type Item = Pos;

    fn next(&mut self) -> Option<Pos> {
        let current = self.next?;
        let mut following = Pos {
            row: current.row,
            col: current.col + 1,
        };
        if following.col == self.size.1 {
            following.col = 0;
            following.row += 1;
        }
        self.next = if following.row < self.size.0 {
            Some(following)
        } else {
            None
        };
        Some(current)
    }
}
