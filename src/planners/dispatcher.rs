use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::error::ConfigurationError;
use crate::infra::{Position, RobotId};

/// Largest fleet a single environment may declare.
pub const MAX_ROBOTS: usize = u16::MAX as usize;

/// FIFO of goal positions for one robot.
///
/// The current goal is always read from the head, so it cannot drift from the queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskQueue {
    goals: VecDeque<Position>,
}

impl TaskQueue {
    pub fn push(&mut self, goal: Position) {
        self.goals.push_back(goal);
    }

    pub fn current_goal(&self) -> Option<Position> {
        self.goals.front().copied()
    }

    /// Drop the head; returns it if there was one.
    pub fn complete_current(&mut self) -> Option<Position> {
        self.goals.pop_front()
    }

    pub fn len(&self) -> usize {
        self.goals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.goals.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.goals.iter()
    }
}

/// Per-robot task queues filled round-robin from a task pool.
///
/// Each queue sits behind its own lock so robots can be served concurrently.
#[derive(Debug, Default)]
pub struct TaskQueueDispatcher {
    queues: Vec<Mutex<TaskQueue>>,
}

impl TaskQueueDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all queues, giving pool entry `i` to robot `i % robot_count`.
    ///
    /// Invalid input, including a robot count above [`MAX_ROBOTS`], leaves the
    /// current queues untouched.
    pub fn initialize(
        &mut self,
        robot_count: usize,
        task_pool: &[Position],
    ) -> Result<(), ConfigurationError> {
        if robot_count == 0 {
            return Err(ConfigurationError::NoRobots);
        }
        if robot_count > MAX_ROBOTS {
            return Err(ConfigurationError::TooManyRobots {
                requested: robot_count,
                max: MAX_ROBOTS,
            });
        }
        if let Some((index, position)) = task_pool
            .iter()
            .enumerate()
            .find(|(_, pos)| pos.row < 0 || pos.col < 0)
        {
            return Err(ConfigurationError::InvalidTask {
                index,
                position: *position,
            });
        }

        let mut queues = vec![TaskQueue::default(); robot_count];
        for (index, goal) in task_pool.iter().enumerate() {
            queues[index % robot_count].push(*goal);
        }

        for (robot_id, queue) in queues.iter().enumerate() {
            debug!(
                "Robot {} assigned {} tasks, first goal {:?}",
                robot_id,
                queue.len(),
                queue.current_goal()
            );
        }

        self.queues = queues.into_iter().map(Mutex::new).collect();
        Ok(())
    }

    pub fn robot_count(&self) -> usize {
        self.queues.len()
    }

    pub fn current_goal(&self, robot_id: RobotId) -> Option<Position> {
        self.queue(robot_id)?.current_goal()
    }

    /// Pop the robot's current goal. Returns false for unknown robots or empty queues.
    pub fn complete_current(&self, robot_id: RobotId) -> bool {
        self.queue(robot_id)
            .and_then(|mut queue| queue.complete_current())
            .is_some()
    }

    /// Goals still queued for the robot, current goal included.
    pub fn remaining(&self, robot_id: RobotId) -> usize {
        self.queue(robot_id).map(|queue| queue.len()).unwrap_or(0)
    }

    pub fn total_remaining(&self) -> usize {
        (0..self.robot_count()).map(|id| self.remaining(id)).sum()
    }

    #[cfg(test)]
    fn snapshot(&self, robot_id: RobotId) -> Option<TaskQueue> {
        self.queue(robot_id).map(|queue| queue.clone())
    }

    fn queue(&self, robot_id: RobotId) -> Option<MutexGuard<'_, TaskQueue>> {
        self.queues
            .get(robot_id)
            .map(|queue| queue.lock().unwrap_or_else(PoisonError::into_inner))
    }
}
