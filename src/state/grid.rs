use crate::error::GridError;
use crate::infra::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cell {
    Free,
    Blocked,
}

impl Cell {
    /// 0 is free, anything else is an obstacle.
    pub fn from_raw(value: i32) -> Self {
        if value == 0 { Cell::Free } else { Cell::Blocked }
    }
}

/// Immutable obstacle grid supplied with each decision request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    height: usize,
    width: usize,
    cells: Vec<Cell>,
}

impl Grid {
    /// Build a grid from row-major rows, rejecting empty or ragged input.
    pub fn from_rows<R: AsRef<[i32]>>(rows: &[R]) -> Result<Self, GridError> {
        let width = rows.first().map(|row| row.as_ref().len()).unwrap_or(0);
        if rows.is_empty() || width == 0 {
            return Err(GridError::Empty);
        }

        let mut cells = Vec::with_capacity(rows.len() * width);
        for (row_index, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != width {
                return Err(GridError::RaggedRow {
                    row: row_index,
                    expected: width,
                    actual: row.len(),
                });
            }
            cells.extend(row.iter().copied().map(Cell::from_raw));
        }

        Ok(Self {
            height: rows.len(),
            width,
            cells,
        })
    }

    /// Build a grid from a flat row-major buffer of `height * width` cells.
    pub fn from_flat(height: usize, width: usize, raw: &[i32]) -> Result<Self, GridError> {
        if height == 0 || width == 0 {
            return Err(GridError::Empty);
        }
        if height.checked_mul(width) != Some(raw.len()) {
            return Err(GridError::SizeMismatch {
                height,
                width,
                cells: raw.len(),
            });
        }

        Ok(Self {
            height,
            width,
            cells: raw.iter().copied().map(Cell::from_raw).collect(),
        })
    }

    /// An obstacle-free grid.
    pub fn open(height: usize, width: usize) -> Self {
        Self {
            height,
            width,
            cells: vec![Cell::Free; height * width],
        }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn contains(&self, pos: Position) -> bool {
        self.index(pos).is_some()
    }

    /// Cell at `pos`, or `None` outside the grid.
    pub fn get(&self, pos: Position) -> Option<Cell> {
        self.index(pos).map(|index| self.cells[index])
    }

    /// In bounds and free.
    pub fn is_free(&self, pos: Position) -> bool {
        self.get(pos) == Some(Cell::Free)
    }

    pub fn with_blocked(mut self, positions: &[Position]) -> Self {
        for pos in positions {
            if let Some(index) = self.index(*pos) {
                self.cells[index] = Cell::Blocked;
            }
        }
        self
    }

    fn index(&self, pos: Position) -> Option<usize> {
        let row = usize::try_from(pos.row).ok()?;
        let col = usize::try_from(pos.col).ok()?;
        (row < self.height && col < self.width).then_some(row * self.width + col)
    }
}
