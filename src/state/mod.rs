mod grid;
mod robot_state;

pub use grid::{Cell, Grid};
pub use robot_state::{RobotState, RobotStates};
