//! Plain-text pictures of the lake, a replayed path and a greedy policy.

use std::collections::HashSet;

use crate::environment::{Cell, Env, Pos};
use crate::policy::QTable;

/// The map, one line per row, with every visited non-terminal cell
/// drawn as `*`.
pub fn render_path(env: &Env, path: &[Pos]) -> String {
    let visited: HashSet<Pos> = path.iter().copied().collect();
    render_with(env, |pos, cell| {
        if visited.contains(&pos) && matches!(cell, Cell::Ice) {
            '*'
        } else {
            cell.as_char()
        }
    })
}

/// Greedy action arrow for every walkable cell the table has visited.
/// Holes, goals and unvisited cells keep their map label.
pub fn render_policy(env: &Env, table: &QTable) -> String {
    render_with(env, |pos, cell| {
        if cell.is_terminal() || !table.contains(pos) {
            cell.as_char()
        } else {
            table.greedy_action(pos).arrow()
        }
    })
}

fn render_with(env: &Env, mut label: impl FnMut(Pos, Cell) -> char) -> String {
    let (_, cols) = env.size();
    let mut out = String::new();
    for pos in env.iter_all_coordinates() {
        out.push(label(pos, env.cell(pos)));
        if pos.col + 1 == cols {
            out.push('\n');
        }
    }
    out
}
