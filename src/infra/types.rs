use std::fmt;

/// Robot identifier, as assigned by environment initialization (0-based).
pub type RobotId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub row: i32,
    pub col: i32,
}

impl Position {
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    pub fn distance(&self, other: &Position) -> i32 {
        (self.row - other.row).abs() + (self.col - other.col).abs()
    }

    /// Neighbours in Up, Down, Left, Right order.
    pub fn neighbors(&self) -> [Position; 4] {
        [
            Position::new(self.row - 1, self.col),
            Position::new(self.row + 1, self.col),
            Position::new(self.row, self.col - 1),
            Position::new(self.row, self.col + 1),
        ]
    }

    pub fn is_adjacent(&self, other: &Position) -> bool {
        self.distance(other) == 1
    }

    /// Position reached by applying `action` from here.
    pub fn step(&self, action: Action) -> Position {
        let (d_row, d_col) = action.delta();
        Position::new(self.row + d_row, self.col + d_col)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Discrete move of a robot for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Action {
    Stay = 0,
    Up = 1,
    Down = 2,
    Left = 3,
    Right = 4,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Stay,
        Action::Up,
        Action::Down,
        Action::Left,
        Action::Right,
    ];

    /// `(d_row, d_col)` displacement of this action.
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Action::Stay => (0, 0),
            Action::Up => (-1, 0),
            Action::Down => (1, 0),
            Action::Left => (0, -1),
            Action::Right => (0, 1),
        }
    }

    /// The action producing the given displacement, if it is a unit step (or zero).
    pub const fn from_displacement(d_row: i32, d_col: i32) -> Option<Action> {
        match (d_row, d_col) {
            (0, 0) => Some(Action::Stay),
            (-1, 0) => Some(Action::Up),
            (1, 0) => Some(Action::Down),
            (0, -1) => Some(Action::Left),
            (0, 1) => Some(Action::Right),
            _ => None,
        }
    }

    pub const fn index(self) -> u8 {
        self as u8
    }

    pub const fn as_str_name(self) -> &'static str {
        match self {
            Action::Stay => "STAY",
            Action::Up => "UP",
            Action::Down => "DOWN",
            Action::Left => "LEFT",
            Action::Right => "RIGHT",
        }
    }
}

impl TryFrom<i64> for Action {
    type Error = i64;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Action::Stay),
            1 => Ok(Action::Up),
            2 => Ok(Action::Down),
            3 => Ok(Action::Left),
            4 => Ok(Action::Right),
            other => Err(other),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_indices_match_wire_values() {
        let indices: Vec<u8> = Action::ALL.iter().map(|a| a.index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_displacement_mapping_is_exact() {
        for action in Action::ALL {
            let (d_row, d_col) = action.delta();
            assert_eq!(Action::from_displacement(d_row, d_col), Some(action));
        }
        assert_eq!(Action::from_displacement(1, 1), None);
        assert_eq!(Action::from_displacement(0, 2), None);
        assert_eq!(Action::from_displacement(-2, 0), None);
    }

    #[test]
    fn test_step_directions() {
        let origin = Position::new(3, 3);
        assert_eq!(origin.step(Action::Up), Position::new(2, 3));
        assert_eq!(origin.step(Action::Down), Position::new(4, 3));
        assert_eq!(origin.step(Action::Left), Position::new(3, 2));
        assert_eq!(origin.step(Action::Right), Position::new(3, 4));
        assert_eq!(origin.step(Action::Stay), origin);
    }

    #[test]
    fn test_action_try_from_rejects_out_of_range() {
        assert_eq!(Action::try_from(4), Ok(Action::Right));
        assert_eq!(Action::try_from(5), Err(5));
        assert_eq!(Action::try_from(-1), Err(-1));
    }
}
