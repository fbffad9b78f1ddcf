use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::infra::RobotId;
use crate::planners::{StuckConfig, StuckDetector};

/// Per-robot transient state carried between ticks
#[derive(Debug, Clone)]
pub struct RobotState {
    pub detector: StuckDetector,
    /// Oscillation recovery - force path planning for N more ticks
    pub cooldown: u32,
}

impl RobotState {
    pub fn new(stuck: StuckConfig) -> Self {
        Self {
            detector: StuckDetector::new(stuck),
            cooldown: 0,
        }
    }

    pub fn in_cooldown(&self) -> bool {
        self.cooldown > 0
    }
}

impl Default for RobotState {
    fn default() -> Self {
        Self::new(StuckConfig::default())
    }
}

/// Keyed store of [`RobotState`], one lock per robot.
///
/// Entries are created on first access. The map lock is only held while a slot
/// is looked up, so robots never wait on each other.
#[derive(Debug)]
pub struct RobotStates {
    stuck: StuckConfig,
    slots: Mutex<HashMap<RobotId, Arc<Mutex<RobotState>>>>,
}

impl RobotStates {
    pub fn new(stuck: StuckConfig) -> Self {
        Self {
            stuck,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Slot for `robot_id`, inserted with a fresh state if missing.
    pub fn slot(&self, robot_id: RobotId) -> Arc<Mutex<RobotState>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            slots
                .entry(robot_id)
                .or_insert_with(|| Arc::new(Mutex::new(RobotState::new(self.stuck)))),
        )
    }

    /// Existing slot for `robot_id`, without creating one.
    pub fn get(&self, robot_id: RobotId) -> Option<Arc<Mutex<RobotState>>> {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&robot_id)
            .map(Arc::clone)
    }

    #[cfg(test)]
    fn contains(&self, robot_id: RobotId) -> bool {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&robot_id)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
