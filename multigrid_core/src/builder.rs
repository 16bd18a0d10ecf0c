use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    Position,
    cell::Cell,
    config::{ConfigError, VariantConfig},
    map::Grid,
};

/// An internal wall row and the column left open in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bottleneck {
    pub row: usize,
    pub gap: usize,
}

/// Walls of a freshly generated room.
#[derive(Debug, Clone)]
pub struct Layout {
    pub grid: Grid<Cell>,
    pub bottlenecks: Vec<Bottleneck>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridBuilder {
    width: usize,
    height: usize,
    fixed_layout: bool,
}

impl GridBuilder {
    pub fn new(width: usize, height: usize, fixed_layout: bool) -> Self {
        GridBuilder {
            width,
            height,
            fixed_layout,
        }
    }

    pub fn from_config(config: &VariantConfig) -> Self {
        Self::new(config.width, config.height, config.fixed_layout)
    }

    /// `floor((height - 3) / 2)` partitions fit between the border rows.
    pub fn num_bottlenecks(&self) -> usize {
        self.height.saturating_sub(3) / 2
    }

    /// An empty room surrounded by a single wall ring.
    pub fn walled_room(&self) -> Grid<Cell> {
        let (w, h) = (self.width, self.height);
        let mut grid = Grid::new(w, h);
        grid.fill_row(0, 0..w, Cell::Wall);
        grid.fill_row(h - 1, 0..w, Cell::Wall);
        grid.fill_column(0, 0..h, Cell::Wall);
        grid.fill_column(w - 1, 0..h, Cell::Wall);
        grid
    }

    /// Walled room cut in half by a solid wall on row `height / 2`.
    pub fn separated_room(&self) -> Grid<Cell> {
        let mut grid = self.walled_room();
        grid.fill_row(self.height / 2, 0..self.width, Cell::Wall);
        grid
    }

    /// Walled room with bottleneck partitions.
    ///
    /// A single partition sits on the middle row with a gap at column
    /// `width / 2`. Several partitions sit on rows `2, 4, ..` with one gap
    /// each, drawn from `[2, width - 3]` unless the layout is fixed.
    pub fn build<R: Rng>(&self, rng: &mut R) -> Result<Layout, ConfigError> {
        let (w, h) = (self.width, self.height);
        if w < 4 || h < 4 {
            return Err(ConfigError::GridTooSmall {
                width: w,
                height: h,
                min_width: 4,
                min_height: 4,
            });
        }

        let mut grid = self.walled_room();
        let count = self.num_bottlenecks();
        let bottlenecks = match count {
            0 => Vec::new(),
            1 => {
                let row = h / 2;
                let gap = w / 2;
                vec![Bottleneck { row, gap }]
            }
            _ => {
                if w < 5 {
                    return Err(ConfigError::NoBottleneckGap {
                        width: w,
                        bottlenecks: count,
                    });
                }
                (0..count)
                    .map(|i| {
                        let gap = if self.fixed_layout {
                            (w / 2).clamp(2, w - 3)
                        } else {
                            rng.random_range(2..=w - 3)
                        };
                        Bottleneck {
                            row: (i + 1) * 2,
                            gap,
                        }
                    })
                    .collect()
            }
        };
        for b in &bottlenecks {
            grid.fill_row(b.row, 0..b.gap, Cell::Wall);
            grid.fill_row(b.row, b.gap + 1..w, Cell::Wall);
        }
        debug!(width = w, height = h, ?bottlenecks, "room generated");
        Ok(Layout { grid, bottlenecks })
    }
}

/// Interior columns of `row` that are not walls.
pub fn open_columns(grid: &Grid<Cell>, row: usize) -> Vec<usize> {
    (1..grid.width().saturating_sub(1))
        .filter(|&x| !matches!(grid.get(Position::new(x, row)), Some(Cell::Wall)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::{SeedableRng, rngs::StdRng};

    fn walls(grid: &Grid<Cell>) -> Vec<Position> {
        grid.enumerate()
            .filter(|(_, cell)| matches!(cell, Cell::Wall))
            .map(|(pos, _)| pos)
            .collect()
    }

    #[test]
    fn single_bottleneck_centre_gap() {
        let mut rng = StdRng::seed_from_u64(0);
        let layout = GridBuilder::new(7, 5, false).build(&mut rng).unwrap();
        assert_eq!(layout.bottlenecks, vec![Bottleneck { row: 2, gap: 3 }]);
        assert_eq!(open_columns(&layout.grid, 2), vec![3]);
    }

    #[test]
    fn even_width_single_bottleneck_stays_open() {
        let mut rng = StdRng::seed_from_u64(0);
        let layout = GridBuilder::new(8, 6, false).build(&mut rng).unwrap();
        assert_eq!(open_columns(&layout.grid, 3), vec![4]);
    }

    #[test]
    fn border_is_a_single_wall_ring() {
        let grid = GridBuilder::new(6, 4, true).walled_room();
        for (pos, cell) in grid.enumerate() {
            let border = pos.x == 0 || pos.y == 0 || pos.x == 5 || pos.y == 3;
            assert_eq!(matches!(cell, Cell::Wall), border, "{pos:?}");
        }
    }

    #[test]
    fn height_four_has_no_partition() {
        let mut rng = StdRng::seed_from_u64(3);
        let layout = GridBuilder::new(5, 4, false).build(&mut rng).unwrap();
        assert!(layout.bottlenecks.is_empty());
    }

    #[test]
    fn separated_room_blocks_middle_row() {
        let grid = GridBuilder::new(7, 5, true).separated_room();
        assert!(open_columns(&grid, 2).is_empty());
        assert_eq!(open_columns(&grid, 1).len(), 5);
    }

    #[test]
    fn rejects_impossible_sizes() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            GridBuilder::new(3, 9, false).build(&mut rng),
            Err(ConfigError::GridTooSmall { .. })
        ));
        assert_eq!(
            GridBuilder::new(4, 9, false).build(&mut rng).unwrap_err(),
            ConfigError::NoBottleneckGap {
                width: 4,
                bottlenecks: 3
            }
        );
    }

    proptest! {
        #[test]
        fn every_partition_is_passable(
            width in 4usize..24,
            height in 4usize..24,
            fixed in any::<bool>(),
            seed in any::<u64>(),
        ) {
            let builder = GridBuilder::new(width, height, fixed);
            let mut rng = StdRng::seed_from_u64(seed);
            let Ok(layout) = builder.build(&mut rng) else {
                // Only narrow rooms with several partitions are refused.
                prop_assert!(width < 5 && builder.num_bottlenecks() > 1);
                return Ok(());
            };
            prop_assert_eq!(layout.bottlenecks.len(), builder.num_bottlenecks());
            for b in &layout.bottlenecks {
                prop_assert!(b.row > 0 && b.row < height - 1);
                prop_assert!(!open_columns(&layout.grid, b.row).is_empty());
                prop_assert!(open_columns(&layout.grid, b.row).contains(&b.gap));
            }
        }

        #[test]
        fn fixed_layout_ignores_rng(
            width in 5usize..20,
            height in 4usize..20,
            a in any::<u64>(),
            b in any::<u64>(),
        ) {
            let builder = GridBuilder::new(width, height, true);
            let first = builder.build(&mut StdRng::seed_from_u64(a)).unwrap();
            let second = builder.build(&mut StdRng::seed_from_u64(b)).unwrap();
            prop_assert_eq!(walls(&first.grid), walls(&second.grid));
        }
    }
}
