use tracing::trace;

use crate::{
    AgentId, Position,
    cell::{Cell, Goal},
    map::Grid,
};

/// How one zone cell was claimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// A new goal was written to an empty cell.
    Placed,
    /// The agent joined the owners of an existing goal.
    Shared,
    /// The goal went under the agent occupying the cell.
    UnderAgent(AgentId),
    /// Walls and doors never hold goals.
    Skipped,
}

/// Claims a run of goal cells around a target column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoalZonePlacer {
    radius: usize,
}

impl GoalZonePlacer {
    /// # Panics
    ///
    /// Panics if `radius` is zero.
    pub fn new(radius: usize) -> Self {
        assert!(radius >= 1, "goal zone radius must be at least 1");
        GoalZonePlacer { radius }
    }

    /// Columns of the zone around `target.x`, centre first, clipped to the grid.
    pub fn columns(&self, target: Position, width: usize) -> Vec<usize> {
        let mut columns = Vec::with_capacity(2 * self.radius - 1);
        for offset in 0..self.radius {
            if target.x + offset < width {
                columns.push(target.x + offset);
            }
            if offset > 0 {
                if let Some(x) = target.x.checked_sub(offset) {
                    columns.push(x);
                }
            }
        }
        columns
    }

    /// Claims the zone around `target` for `owner`.
    ///
    /// Existing ownership is never dropped: goals gain owners, and a cell held
    /// by an agent receives the goal underneath that agent.
    pub fn place(
        &self,
        grid: &mut Grid<Cell>,
        target: Position,
        owner: AgentId,
    ) -> Vec<(Position, Claim)> {
        self.columns(target, grid.width())
            .into_iter()
            .filter_map(|x| {
                let pos = Position::new(x, target.y);
                let cell = grid.get_mut(pos)?;
                let claim = claim(cell, owner);
                if claim != Claim::Placed {
                    trace!(owner, ?pos, ?claim, "goal zone conflict");
                }
                Some((pos, claim))
            })
            .collect()
    }
}

fn claim(cell: &mut Cell, owner: AgentId) -> Claim {
    match cell {
        Cell::Empty => {
            *cell = Cell::Goal(Goal::new(owner));
            Claim::Placed
        }
        Cell::Goal(goal) => {
            goal.add_owner(owner);
            Claim::Shared
        }
        Cell::Agent {
            id,
            standing_on: Some(goal),
        } => {
            goal.add_owner(owner);
            Claim::UnderAgent(*id)
        }
        Cell::Agent {
            id,
            standing_on: standing_on @ None,
        } => {
            *standing_on = Some(Goal::new(owner));
            Claim::UnderAgent(*id)
        }
        Cell::Wall | Cell::Door { .. } => Claim::Skipped,
    }
}
