mod dispatcher;
mod engine;
pub mod policy;
mod stuck;

pub use dispatcher::{MAX_ROBOTS, TaskQueue, TaskQueueDispatcher};
pub use engine::{Decision, DecisionEngine, DecisionMode, EngineConfig, EngineStatus};
pub use stuck::{StuckConfig, StuckDetector};
