use thiserror::Error;

use crate::infra::{Position, RobotId};

/// Rejected grid input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("grid has no cells")]
    Empty,

    #[error("grid row {row} has {actual} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("grid declares {height}x{width} but carries {cells} cells")]
    SizeMismatch {
        height: usize,
        width: usize,
        cells: usize,
    },
}

/// Bad or missing environment initialization data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("robot count must be at least 1")]
    NoRobots,

    #[error("robot count {requested} exceeds the limit of {max}")]
    TooManyRobots { requested: usize, max: usize },

    #[error("task {index} has negative coordinates {position}")]
    InvalidTask { index: usize, position: Position },
}

/// Errors surfaced to callers of the decision engine. All of them are
/// client errors scoped to one request; none leaves engine state modified.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("environment has not been initialized")]
    NotInitialized,

    #[error("unknown robot {robot_id} (environment has {robot_count} robots)")]
    UnknownRobot {
        robot_id: RobotId,
        robot_count: usize,
    },

    #[error("position {position} lies outside the {height}x{width} grid")]
    PositionOutOfBounds {
        position: Position,
        height: usize,
        width: usize,
    },

    #[error("invalid grid: {0}")]
    InvalidGrid(#[from] GridError),

    #[error("invalid environment: {0}")]
    Configuration(#[from] ConfigurationError),
}

/// Server settings could not be read from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{key} has invalid value {value:?}")]
    InvalidValue { key: &'static str, value: String },
}
