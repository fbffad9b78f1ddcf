use std::collections::{HashSet, VecDeque};

use crate::infra::Position;

/// Thresholds for oscillation detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StuckConfig {
    /// Number of recent positions kept
    pub capacity: usize,
    /// Minimum number of held positions before a verdict is given
    pub min_samples: usize,
    /// A history with at most this many distinct positions counts as stuck
    pub max_distinct: usize,
}

impl Default for StuckConfig {
    fn default() -> Self {
        Self {
            capacity: 6,
            min_samples: 4,
            max_distinct: 2,
        }
    }
}

/// Bounded history of one robot's recent positions.
///
/// Flags a robot that keeps dwelling on, or bouncing between, at most two cells.
#[derive(Debug, Clone)]
pub struct StuckDetector {
    config: StuckConfig,
    history: VecDeque<Position>,
}

impl StuckDetector {
    pub fn new(config: StuckConfig) -> Self {
        Self {
            config,
            history: VecDeque::with_capacity(config.capacity),
        }
    }

    /// Record `pos` and report whether the robot is oscillating.
    pub fn observe(&mut self, pos: Position) -> bool {
        if self.config.capacity == 0 {
            return false;
        }
        if self.history.len() == self.config.capacity {
            self.history.pop_front();
        }
        self.history.push_back(pos);

        if self.history.len() < self.config.min_samples {
            return false;
        }
        let distinct: HashSet<&Position> = self.history.iter().collect();
        distinct.len() <= self.config.max_distinct
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Held positions, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &Position> {
        self.history.iter()
    }
}

impl Default for StuckDetector {
    fn default() -> Self {
        Self::new(StuckConfig::default())
    }
}
