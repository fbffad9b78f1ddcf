mod observer;
mod pathfinding;
mod types;

pub use observer::{DecisionObserver, LoggingObserver};
pub use pathfinding::{GridPathfinder, path_to_action};
pub use types::{Action, Position, RobotId};
