use std::ops::{Index, IndexMut, Range};

use serde::{Deserialize, Serialize};

use crate::Position;

/// Errors raised by coordinate-addressed grid writes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("Coordinates ({x}, {y}) are out of bounds for grid size ({width}, {height})")]
    OutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },
}

/// A dense 2D grid stored row-major.
///
/// Reads through [`Grid::get`] return `None` outside the grid; writes through
/// [`Grid::set`] report [`GridError::OutOfBounds`]. The `Index` impls panic on
/// out-of-range positions and are meant for coordinates already known valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid<T> {
    width: usize,
    height: usize,
    cells: Vec<T>,
}

impl<T> Grid<T> {
    /// Creates a grid filled with `T::default()`.
    ///
    /// # Arguments
    ///
    /// * `width`: The width of the grid.
    /// * `height`: The height of the grid.
    ///
    /// # Panics
    ///
    /// Panics if `width * height` overflows `usize`.
    pub fn new(width: usize, height: usize) -> Self
    where
        T: Default + Clone,
    {
        let size = width.checked_mul(height).expect("Grid size overflow");
        Grid {
            width,
            height,
            cells: vec![T::default(); size],
        }
    }

    /// Returns the width of the grid.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the height of the grid.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    fn offset(&self, pos: Position) -> Option<usize> {
        self.contains(pos).then(|| pos.y * self.width + pos.x)
    }

    #[inline]
    pub fn contains(&self, pos: Position) -> bool {
        pos.x < self.width && pos.y < self.height
    }

    /// Returns a reference to the cell at `pos`, or `None` outside the grid.
    pub fn get(&self, pos: Position) -> Option<&T> {
        self.offset(pos).map(|i| &self.cells[i])
    }

    pub fn get_mut(&mut self, pos: Position) -> Option<&mut T> {
        self.offset(pos).map(|i| &mut self.cells[i])
    }

    /// Overwrites the cell at `pos`.
    ///
    /// # Arguments
    ///
    /// * `pos`: The position to write.
    /// * `value`: The new cell value.
    ///
    /// # Errors
    ///
    /// Returns `GridError::OutOfBounds` if `pos` lies outside the grid.
    pub fn set(&mut self, pos: Position, value: T) -> Result<(), GridError> {
        let index = self.offset(pos).ok_or(GridError::OutOfBounds {
            x: pos.x,
            y: pos.y,
            width: self.width,
            height: self.height,
        })?;
        self.cells[index] = value;
        Ok(())
    }

    /// Writes `value` into columns `xs` of row `y`, clipped to the grid.
    ///
    /// # Arguments
    ///
    /// * `y`: The row to fill.
    /// * `xs`: The column range; columns past the right edge are ignored.
    /// * `value`: The value cloned into every cell.
    pub fn fill_row(&mut self, y: usize, xs: Range<usize>, value: T)
    where
        T: Clone,
    {
        if y >= self.height {
            return;
        }
        for x in xs.start..xs.end.min(self.width) {
            self[Position::new(x, y)] = value.clone();
        }
    }

    /// Writes `value` into rows `ys` of column `x`, clipped to the grid.
    pub fn fill_column(&mut self, x: usize, ys: Range<usize>, value: T)
    where
        T: Clone,
    {
        if x >= self.width {
            return;
        }
        for y in ys.start..ys.end.min(self.height) {
            self[Position::new(x, y)] = value.clone();
        }
    }

    /// Yields `(position, &cell)` in row-major order.
    pub fn enumerate(&self) -> impl Iterator<Item = (Position, &T)> {
        let width = self.width;
        self.cells
            .iter()
            .enumerate()
            .map(move |(index, cell)| (Position::new(index % width, index / width), cell))
    }
}

impl<T> Index<Position> for Grid<T> {
    type Output = T;

    #[inline]
    fn index(&self, pos: Position) -> &Self::Output {
        match self.offset(pos) {
            Some(idx) => &self.cells[idx],
            None => panic!(
                "Grid index ({}, {}) out of bounds for grid size ({}, {})",
                pos.x, pos.y, self.width, self.height
            ),
        }
    }
}

impl<T> IndexMut<Position> for Grid<T> {
    #[inline]
    fn index_mut(&mut self, pos: Position) -> &mut Self::Output {
        let (width, height) = (self.width, self.height);
        match self.offset(pos) {
            Some(idx) => &mut self.cells[idx],
            None => panic!(
                "Grid index ({}, {}) out of bounds for grid size ({}, {})",
                pos.x, pos.y, width, height
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_rejects_out_of_bounds() {
        let mut grid: Grid<u8> = Grid::new(3, 2);
        assert_eq!(
            grid.set(Position::new(3, 0), 1),
            Err(GridError::OutOfBounds {
                x: 3,
                y: 0,
                width: 3,
                height: 2
            })
        );
        assert!(grid.set(Position::new(2, 1), 7).is_ok());
        assert_eq!(grid.get(Position::new(2, 1)), Some(&7));
        assert_eq!(grid.get(Position::new(0, 2)), None);
    }

    #[test]
    fn fill_row_clips_to_width() {
        let mut grid: Grid<u8> = Grid::new(4, 3);
        grid.fill_row(1, 2..10, 9);
        grid.fill_row(3, 0..4, 9);
        assert!(grid.enumerate().all(|(p, v)| (*v == 9) == (p.y == 1 && p.x >= 2)));
    }

    #[test]
    fn fill_column_clips_to_height() {
        let mut grid: Grid<u8> = Grid::new(4, 3);
        grid.fill_column(3, 1..7, 1);
        grid.fill_column(4, 0..3, 1);
        assert!(grid.enumerate().all(|(p, v)| (*v == 1) == (p.x == 3 && p.y >= 1)));
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn index_panics_outside() {
        let grid: Grid<u8> = Grid::new(2, 2);
        let _ = grid[Position::new(2, 2)];
    }
}
