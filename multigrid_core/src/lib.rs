use serde::{Deserialize, Serialize};

pub mod agent;
pub mod builder;
pub mod cell;
pub mod config;
pub mod environment;
pub mod episode;
pub mod goal_zone;
pub mod map;
pub mod policy;
pub mod spawn;

pub use cell::{Cell, DoorColor, Goal};
pub use config::{ActionSet, ConfigError, RewardScheme, Scenario, VariantConfig};
pub use environment::{Action, AgentState, Environment};
pub use episode::{Episode, EpisodeError, StepInfo, StepOutcome};

/// Stable identifier of an agent. Ids are `0..num_agents` and survive resets.
pub type AgentId = usize;

/// Represents a 2D coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub const fn new(x: usize, y: usize) -> Self {
        Position { x, y }
    }

    /// The neighbouring position one cell towards `dir`, or `None` when that
    /// would leave the non-negative quadrant.
    pub fn step(self, dir: Direction) -> Option<Position> {
        let (dx, dy) = dir.delta();
        Some(Position {
            x: self.x.checked_add_signed(dx)?,
            y: self.y.checked_add_signed(dy)?,
        })
    }

    pub fn manhattan(self, other: Position) -> usize {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

/// Facing direction, numbered clockwise starting east.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Right = 0,
    Down = 1,
    Left = 2,
    Up = 3,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Right,
        Direction::Down,
        Direction::Left,
        Direction::Up,
    ];

    pub fn delta(self) -> (isize, isize) {
        match self {
            Direction::Right => (1, 0),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Up => (0, -1),
        }
    }

    /// Quarter turn clockwise.
    pub fn right(self) -> Self {
        Self::ALL[(self as usize + 1) % 4]
    }

    /// Quarter turn counter-clockwise.
    pub fn left(self) -> Self {
        Self::ALL[(self as usize + 3) % 4]
    }
}
