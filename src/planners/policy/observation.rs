//! Local observation encoder - converts a robot's surroundings to a flat feature vector

use crate::infra::Position;
use crate::state::{Cell, Grid};

/// Default half-width of the square window around the robot
pub const DEFAULT_RADIUS: usize = 2;

/// Fixed-length observation handed to a policy.
///
/// Layout: the `(2r+1)²` window around the robot in row-major order (1.0 for
/// blocked or outside the grid, 0.0 for free), followed by the row and column
/// offsets from the robot to its target.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalObservation {
    radius: usize,
    features: Vec<f32>,
}

impl LocalObservation {
    pub fn encode(pos: Position, target: Position, grid: &Grid, radius: usize) -> Self {
        let span = 2 * radius + 1;
        let reach = radius as i32;
        let mut features = Vec::with_capacity(Self::size_for(radius));

        for d_row in -reach..=reach {
            for d_col in -reach..=reach {
                let cell = grid
                    .get(Position::new(pos.row + d_row, pos.col + d_col))
                    .unwrap_or(Cell::Blocked);
                features.push(match cell {
                    Cell::Free => 0.0,
                    Cell::Blocked => 1.0,
                });
            }
        }
        debug_assert_eq!(features.len(), span * span);

        features.push((target.row - pos.row) as f32);
        features.push((target.col - pos.col) as f32);

        Self { radius, features }
    }

    /// Feature count for a window of the given radius.
    pub const fn size_for(radius: usize) -> usize {
        let span = 2 * radius + 1;
        span * span + 2
    }

    pub fn radius(&self) -> usize {
        self.radius
    }

    pub fn features(&self) -> &[f32] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    #[cfg(test)]
    /// Offset to the target as `(d_row, d_col)`.
    fn target_offset(&self) -> (f32, f32) {
        let n = self.features.len();
        (self.features[n - 2], self.features[n - 1])
    }

    #[cfg(test)]
    /// Window cell at `(d_row, d_col)` relative to the robot, true when blocked.
    fn is_blocked(&self, d_row: i32, d_col: i32) -> bool {
        let reach = self.radius as i32;
        if d_row.abs() > reach || d_col.abs() > reach {
            return true;
        }
        let span = 2 * self.radius + 1;
        let index = (d_row + reach) as usize * span + (d_col + reach) as usize;
        self.features[index] > 0.5
    }
}
