use tracing::{debug, info, warn};

use crate::infra::{Action, Position, RobotId};
use crate::planners::Decision;

/// Trait for observing decision-engine events.
///
/// Every method has a no-op default so observers only implement what they need.
/// Observers are shared by concurrent decisions and must be `Send + Sync`.
pub trait DecisionObserver: Send + Sync {
    /// Called after an environment generation has been installed
    fn on_environment_initialized(&self, _generation: u64, _robot_count: usize, _task_count: usize) {}

    /// Called when a robot arrives at its current goal
    fn on_goal_completed(&self, _robot_id: RobotId, _goal: Position, _remaining: usize) {}

    /// Called when oscillation is detected and forced pathfinding begins
    fn on_stuck_detected(&self, _robot_id: RobotId, _position: Position) {}

    /// Called when a policy suggestion is not used
    fn on_policy_rejected(&self, _robot_id: RobotId, _suggested: Option<Action>, _reason: &str) {}

    /// Called for every decision returned to a caller
    fn on_decision(&self, _robot_id: RobotId, _position: Position, _decision: &Decision) {}
}

/// Observer that reports events through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl DecisionObserver for LoggingObserver {
    fn on_environment_initialized(&self, generation: u64, robot_count: usize, task_count: usize) {
        info!(
            "Environment generation {} ready: {} robots, {} tasks",
            generation, robot_count, task_count
        );
    }

    fn on_goal_completed(&self, robot_id: RobotId, goal: Position, remaining: usize) {
        info!(
            "Robot {} reached goal {} ({} tasks left)",
            robot_id, goal, remaining
        );
    }

    fn on_stuck_detected(&self, robot_id: RobotId, position: Position) {
        warn!(
            "Robot {} oscillating around {}, forcing path planning",
            robot_id, position
        );
    }

    fn on_policy_rejected(&self, robot_id: RobotId, suggested: Option<Action>, reason: &str) {
        debug!(
            "Robot {} policy suggestion {:?} rejected: {}",
            robot_id, suggested, reason
        );
    }

    fn on_decision(&self, robot_id: RobotId, position: Position, decision: &Decision) {
        debug!(
            robot_id,
            mode = ?decision.mode,
            "pos: {}, action: {}, target: {:?}, remaining: {}",
            position,
            decision.action,
            decision.target,
            decision.remaining_tasks
        );
    }
}
