use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::AgentId;

/// Color tag of a door.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DoorColor {
    Red,
    Blue,
}

/// A goal cell shared by one or more agents.
///
/// The owner set is never empty and only grows: owners are added by
/// [`Goal::add_owner`] and there is no way to remove one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    owners: BTreeSet<AgentId>,
}

impl Goal {
    pub fn new(owner: AgentId) -> Self {
        Goal {
            owners: BTreeSet::from([owner]),
        }
    }

    /// Adds `owner`, returning `false` if it already owned this goal.
    pub fn add_owner(&mut self, owner: AgentId) -> bool {
        self.owners.insert(owner)
    }

    pub fn is_owned_by(&self, agent: AgentId) -> bool {
        self.owners.contains(&agent)
    }

    pub fn owners(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.owners.iter().copied()
    }
}

/// Content of one grid cell.
///
/// An agent occupying a goal keeps that goal in `standing_on` until it
/// leaves, at which point the goal is written back to the grid.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Cell {
    #[default]
    Empty,
    Wall,
    Door {
        color: DoorColor,
        open: bool,
    },
    Goal(Goal),
    Agent {
        id: AgentId,
        standing_on: Option<Goal>,
    },
}

impl Cell {
    /// Goal visible at this cell, whether on the floor or under an agent.
    pub fn goal(&self) -> Option<&Goal> {
        match self {
            Cell::Goal(goal) => Some(goal),
            Cell::Agent { standing_on, .. } => standing_on.as_ref(),
            Cell::Empty | Cell::Wall | Cell::Door { .. } => None,
        }
    }

    /// Whether an agent may step onto this cell.
    pub fn can_enter(&self) -> bool {
        matches!(self, Cell::Empty | Cell::Goal(_))
    }

    pub fn agent(&self) -> Option<AgentId> {
        match self {
            Cell::Agent { id, .. } => Some(*id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goal_owners_only_grow() {
        let mut goal = Goal::new(2);
        assert!(goal.add_owner(0));
        assert!(!goal.add_owner(2));
        assert_eq!(goal.owners().collect::<Vec<_>>(), vec![0, 2]);
        assert!(goal.is_owned_by(0) && goal.is_owned_by(2));
        assert!(!goal.is_owned_by(1));
    }

    #[test]
    fn goal_visible_under_agent() {
        let cell = Cell::Agent {
            id: 1,
            standing_on: Some(Goal::new(1)),
        };
        assert!(cell.goal().is_some_and(|g| g.is_owned_by(1)));
        assert!(!cell.can_enter());
        assert_eq!(cell.agent(), Some(1));
        assert!(Cell::Goal(Goal::new(0)).can_enter());
        assert!(
            !Cell::Door {
                color: DoorColor::Red,
                open: true
            }
            .can_enter()
        );
    }
}
