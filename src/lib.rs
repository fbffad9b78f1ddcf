pub mod config;
pub mod error;
pub mod infra;
pub mod planners;
#[cfg(feature = "grpc")]
pub mod service;
pub mod state;

// Re-export commonly used types for convenience
pub use error::{ConfigError, ConfigurationError, EngineError, GridError};
pub use infra::{Action, GridPathfinder, Position, RobotId};
pub use planners::policy::{NoPolicy, PolicySuggester, TimedPolicy};
pub use planners::{Decision, DecisionEngine, DecisionMode, EngineConfig};
pub use state::Grid;

// Re-export proto interface
#[cfg(feature = "grpc")]
pub mod robonav_interface {
    tonic::include_proto!("robonav.interface");
}
