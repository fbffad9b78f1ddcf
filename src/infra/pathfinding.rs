use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::infra::{Action, Position};
use crate::state::Grid;

#[derive(Clone, Eq, PartialEq)]
struct Node {
    pos: Position,
    f_score: i32,
    // Insertion order; breaks f-score ties so identical inputs expand identically.
    seq: u64,
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f_score
            .cmp(&self.f_score)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Stateless A* planner over the free cells of a [`Grid`].
///
/// Moves are 4-connected with unit cost and the heuristic is the Manhattan
/// distance, so returned paths are shortest paths.
pub struct GridPathfinder;

impl GridPathfinder {
    /// Action for the first step of a shortest path from `pos` to `target`.
    ///
    /// Returns [`Action::Stay`] when already at the target or when no path exists.
    pub fn next_action(pos: Position, target: Position, grid: &Grid) -> Action {
        if pos == target {
            return Action::Stay;
        }

        match Self::find_path(pos, target, grid) {
            Some(path) => path_to_action(pos, &path).unwrap_or(Action::Stay),
            None => Action::Stay,
        }
    }

    /// Shortest path from `start` to `goal`, both inclusive.
    #[tracing::instrument(level = "trace", skip(grid), fields(start_row = start.row, start_col = start.col, goal_row = goal.row, goal_col = goal.col))]
    pub fn find_path(start: Position, goal: Position, grid: &Grid) -> Option<Vec<Position>> {
        if !grid.contains(start) || !grid.is_free(goal) {
            if start == goal && grid.contains(start) {
                return Some(vec![goal]);
            }
            tracing::trace!("Start outside grid or goal not walkable");
            return None;
        }

        let mut open_set = BinaryHeap::new();
        let mut came_from: HashMap<Position, Position> = HashMap::new();
        let mut g_score: HashMap<Position, i32> = HashMap::new();
        let mut closed_set: HashSet<Position> = HashSet::new();
        let mut seq: u64 = 0;

        g_score.insert(start, 0);
        open_set.push(Node {
            pos: start,
            f_score: heuristic(start, goal),
            seq,
        });

        let mut expansions = 0usize;

        while let Some(Node { pos: current, .. }) = open_set.pop() {
            if current == goal {
                tracing::trace!(expansions, "Path found");
                return Some(reconstruct_path(&came_from, current));
            }

            if !closed_set.insert(current) {
                continue;
            }
            expansions += 1;

            let current_g = g_score.get(&current).copied().unwrap_or(0);

            for neighbor in current.neighbors() {
                if closed_set.contains(&neighbor) || !grid.is_free(neighbor) {
                    continue;
                }

                let tentative_g = current_g + 1;
                if tentative_g < g_score.get(&neighbor).copied().unwrap_or(i32::MAX) {
                    came_from.insert(neighbor, current);
                    g_score.insert(neighbor, tentative_g);
                    seq += 1;
                    open_set.push(Node {
                        pos: neighbor,
                        f_score: tentative_g + heuristic(neighbor, goal),
                        seq,
                    });
                }
            }
        }

        tracing::trace!(expansions, "No path found");
        None
    }
}

/// Action that moves from `current` onto the second entry of `path`.
pub fn path_to_action(current: Position, path: &[Position]) -> Option<Action> {
    let next = path.get(1)?;
    Action::from_displacement(next.row - current.row, next.col - current.col)
}

fn heuristic(a: Position, b: Position) -> i32 {
    a.distance(&b)
}

fn reconstruct_path(came_from: &HashMap<Position, Position>, mut current: Position) -> Vec<Position> {
    let mut path = vec![current];
    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}
