use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{
    AgentId, Direction, Position,
    cell::{Cell, DoorColor, Goal},
    map::{Grid, GridError},
};

/// Represents actions an agent can take in one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Still,
    TurnLeft,
    TurnRight,
    /// Move one cell in the facing direction.
    Forward,
    /// Open the door directly in front.
    Open,
    /// Face `dir` and move one cell that way.
    Move(Direction),
}

/// Outcome of applying a single action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionResult {
    Idle,
    Turned,
    Moved,
    Opened(DoorColor),
    Blocked(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvironmentError {
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("Cannot place agent {agent} at {position:?}: cell holds {occupant:?}")]
    Occupied {
        agent: AgentId,
        position: Position,
        occupant: Cell,
    },
    #[error("Agent {0} is already placed")]
    DuplicateAgent(AgentId),
    #[error("Agent {found} placed out of order, expected agent {expected}")]
    OutOfOrder { expected: AgentId, found: AgentId },
    #[error("Expected {expected} actions, got {found}")]
    ActionCount { expected: usize, found: usize },
    #[error("Turn order {0:?} is not a permutation of the agent ids")]
    InvalidOrder(Vec<AgentId>),
}

/// Per-agent record owned by the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentState {
    pub id: AgentId,
    pub pos: Position,
    pub dir: Direction,
    /// Set the first step the agent stands on one of its goals.
    pub reached_goal_once: bool,
    pub done: bool,
}

/// Baseline result of one engine step, before scenario policies run.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineStep {
    pub rewards: Vec<f32>,
    pub results: Vec<ActionResult>,
    /// The step budget is exhausted.
    pub truncated: bool,
}

/// Grid world state for one episode.
///
/// Agents are indexed by id: `agents()[id].id == id`.
#[derive(Debug, Clone)]
pub struct Environment {
    grid: Grid<Cell>,
    agents: Vec<AgentState>,
    step_count: u32,
    max_steps: u32,
}

impl Environment {
    pub fn new(grid: Grid<Cell>, max_steps: u32) -> Self {
        Environment {
            grid,
            agents: Vec::new(),
            step_count: 0,
            max_steps,
        }
    }

    pub fn grid(&self) -> &Grid<Cell> {
        &self.grid
    }

    pub(crate) fn grid_mut(&mut self) -> &mut Grid<Cell> {
        &mut self.grid
    }

    pub fn agents(&self) -> &[AgentState] {
        &self.agents
    }

    pub fn agent(&self, id: AgentId) -> Option<&AgentState> {
        self.agents.get(id)
    }

    pub(crate) fn agents_mut(&mut self) -> &mut [AgentState] {
        &mut self.agents
    }

    pub fn step_count(&self) -> u32 {
        self.step_count
    }

    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    pub fn get(&self, pos: Position) -> Option<&Cell> {
        self.grid.get(pos)
    }

    /// Writes a structural object (wall, door, goal) at `pos`.
    pub fn put_object(&mut self, cell: Cell, pos: Position) -> Result<(), GridError> {
        self.grid.set(pos, cell)
    }

    /// Places the next agent. Agents must be placed in id order.
    ///
    /// Placing onto a goal makes that goal the agent's standing-on overlay.
    pub fn put_agent(
        &mut self,
        id: AgentId,
        pos: Position,
        dir: Direction,
    ) -> Result<(), EnvironmentError> {
        if id < self.agents.len() {
            return Err(EnvironmentError::DuplicateAgent(id));
        }
        if id != self.agents.len() {
            return Err(EnvironmentError::OutOfOrder {
                expected: self.agents.len(),
                found: id,
            });
        }

        let (width, height) = (self.grid.width(), self.grid.height());
        let cell = self.grid.get_mut(pos).ok_or(GridError::OutOfBounds {
            x: pos.x,
            y: pos.y,
            width,
            height,
        })?;
        let standing_on = match std::mem::take(cell) {
            Cell::Empty => None,
            Cell::Goal(goal) => Some(goal),
            occupant => {
                *cell = occupant.clone();
                return Err(EnvironmentError::Occupied {
                    agent: id,
                    position: pos,
                    occupant,
                });
            }
        };
        *cell = Cell::Agent { id, standing_on };
        self.agents.push(AgentState {
            id,
            pos,
            dir,
            reached_goal_once: false,
            done: false,
        });
        Ok(())
    }

    /// Goal under agent `id`, if any.
    pub fn standing_on(&self, id: AgentId) -> Option<&Goal> {
        let agent = self.agents.get(id)?;
        match self.grid.get(agent.pos)? {
            Cell::Agent {
                id: occupant,
                standing_on,
            } if *occupant == id => standing_on.as_ref(),
            _ => None,
        }
    }

    /// Whether agent `id` stands on a goal it owns.
    pub fn on_own_goal(&self, id: AgentId) -> bool {
        self.standing_on(id).is_some_and(|goal| goal.is_owned_by(id))
    }

    /// Open state of the door at `pos`, or `None` if there is no door.
    pub fn door_open(&self, pos: Position) -> Option<bool> {
        match self.grid.get(pos)? {
            Cell::Door { open, .. } => Some(*open),
            _ => None,
        }
    }

    /// Applies one action per agent in the given order and advances the step
    /// counter.
    ///
    /// # Arguments
    ///
    /// * `actions`: One action per agent, indexed by agent id.
    /// * `order`: The order agents act in; must hold every id exactly once.
    ///
    /// # Errors
    ///
    /// Rejects a wrong action count or an order that is not a permutation of
    /// the agent ids. Nothing is applied in that case.
    pub fn step(
        &mut self,
        actions: &[Action],
        order: &[AgentId],
    ) -> Result<EngineStep, EnvironmentError> {
        let n = self.agents.len();
        if actions.len() != n {
            return Err(EnvironmentError::ActionCount {
                expected: n,
                found: actions.len(),
            });
        }
        let mut seen = vec![false; n];
        for &id in order {
            match seen.get_mut(id) {
                Some(slot) if !*slot => *slot = true,
                _ => return Err(EnvironmentError::InvalidOrder(order.to_vec())),
            }
        }
        if order.len() != n {
            return Err(EnvironmentError::InvalidOrder(order.to_vec()));
        }

        self.step_count += 1;
        let mut results = vec![ActionResult::Idle; self.agents.len()];
        for &id in order {
            results[id] = self.apply_action(id, actions[id]);
            if let ActionResult::Blocked(reason) = results[id] {
                trace!(agent = id, action = ?actions[id], reason, "action blocked");
            }
        }
        self.check_markers();

        Ok(EngineStep {
            rewards: vec![0.0; n],
            results,
            truncated: self.step_count >= self.max_steps,
        })
    }

    /// Applies a single action for agent `id`, which must be placed.
    pub(crate) fn apply_action(&mut self, id: AgentId, action: Action) -> ActionResult {
        let dir = self.agents[id].dir;
        match action {
            Action::Still => ActionResult::Idle,
            Action::TurnLeft => {
                self.agents[id].dir = dir.left();
                ActionResult::Turned
            }
            Action::TurnRight => {
                self.agents[id].dir = dir.right();
                ActionResult::Turned
            }
            Action::Forward => self.move_agent(id, dir),
            Action::Move(towards) => {
                self.agents[id].dir = towards;
                self.move_agent(id, towards)
            }
            Action::Open => {
                let Some(front) = self.agents[id].pos.step(dir) else {
                    return ActionResult::Blocked("nothing in front");
                };
                match self.grid.get_mut(front) {
                    Some(Cell::Door { color, open }) => {
                        *open = true;
                        ActionResult::Opened(*color)
                    }
                    _ => ActionResult::Blocked("no door in front"),
                }
            }
        }
    }

    fn move_agent(&mut self, id: AgentId, dir: Direction) -> ActionResult {
        let current = self.agents[id].pos;
        let Some(target) = current.step(dir) else {
            return ActionResult::Blocked("target position is out of bounds");
        };
        match self.grid.get(target) {
            None => return ActionResult::Blocked("target position is out of bounds"),
            Some(Cell::Wall) => return ActionResult::Blocked("cannot move into a wall"),
            Some(Cell::Door { .. }) => return ActionResult::Blocked("cannot move into a door"),
            Some(Cell::Agent { .. }) => {
                return ActionResult::Blocked("target position is occupied by another agent");
            }
            Some(Cell::Empty | Cell::Goal(_)) => {}
        }

        // Leave the current cell, restoring whatever goal was underneath.
        let left_behind = match std::mem::take(&mut self.grid[current]) {
            Cell::Agent {
                standing_on: Some(goal),
                ..
            } => Cell::Goal(goal),
            _ => Cell::Empty,
        };
        self.grid[current] = left_behind;

        let standing_on = match std::mem::take(&mut self.grid[target]) {
            Cell::Goal(goal) => Some(goal),
            _ => None,
        };
        self.grid[target] = Cell::Agent { id, standing_on };
        self.agents[id].pos = target;
        ActionResult::Moved
    }

    /// Every agent record must match exactly one marker in the grid.
    fn check_markers(&self) {
        if cfg!(debug_assertions) {
            for agent in &self.agents {
                let markers = self
                    .grid
                    .enumerate()
                    .filter(|(_, cell)| cell.agent() == Some(agent.id))
                    .count();
                assert_eq!(markers, 1, "agent {} has {} markers", agent.id, markers);
                assert_eq!(self.grid[agent.pos].agent(), Some(agent.id));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(width: usize, height: usize) -> Environment {
        let mut grid = Grid::new(width, height);
        grid.fill_row(0, 0..width, Cell::Wall);
        grid.fill_row(height - 1, 0..width, Cell::Wall);
        grid.fill_column(0, 0..height, Cell::Wall);
        grid.fill_column(width - 1, 0..height, Cell::Wall);
        Environment::new(grid, 10)
    }

    #[test]
    fn put_object_rejects_out_of_bounds() {
        let mut env = room(5, 5);
        assert!(env.put_object(Cell::Wall, Position::new(5, 1)).is_err());
        assert!(env.put_object(Cell::Goal(Goal::new(0)), Position::new(2, 2)).is_ok());
    }

    #[test]
    fn put_agent_onto_goal_sets_overlay() {
        let mut env = room(5, 5);
        env.put_object(Cell::Goal(Goal::new(0)), Position::new(2, 2))
            .unwrap();
        env.put_agent(0, Position::new(2, 2), Direction::Right).unwrap();
        assert!(env.on_own_goal(0));

        let err = env.put_agent(1, Position::new(0, 0), Direction::Right);
        assert!(matches!(err, Err(EnvironmentError::Occupied { .. })));
        assert_eq!(env.get(Position::new(0, 0)), Some(&Cell::Wall));
        assert_eq!(
            env.put_agent(0, Position::new(1, 1), Direction::Right),
            Err(EnvironmentError::DuplicateAgent(0))
        );
    }

    #[test]
    fn moving_off_a_goal_restores_it() {
        let mut env = room(5, 5);
        env.put_object(Cell::Goal(Goal::new(0)), Position::new(2, 1))
            .unwrap();
        env.put_agent(0, Position::new(1, 1), Direction::Right).unwrap();

        assert_eq!(env.apply_action(0, Action::Forward), ActionResult::Moved);
        assert!(env.on_own_goal(0));
        assert_eq!(
            env.apply_action(0, Action::Move(Direction::Down)),
            ActionResult::Moved
        );
        assert!(env.standing_on(0).is_none());
        assert_eq!(
            env.get(Position::new(2, 1)),
            Some(&Cell::Goal(Goal::new(0)))
        );
        assert_eq!(env.agent(0).unwrap().dir, Direction::Down);
    }

    #[test]
    fn walls_and_agents_block() {
        let mut env = room(5, 5);
        env.put_agent(0, Position::new(1, 1), Direction::Up).unwrap();
        env.put_agent(1, Position::new(2, 1), Direction::Left).unwrap();
        assert!(matches!(
            env.apply_action(0, Action::Forward),
            ActionResult::Blocked(_)
        ));
        assert!(matches!(
            env.apply_action(1, Action::Forward),
            ActionResult::Blocked(_)
        ));
        assert_eq!(env.agent(0).unwrap().pos, Position::new(1, 1));
    }

    #[test]
    fn open_action_opens_door_in_front() {
        let mut env = room(5, 5);
        let door = Position::new(0, 2);
        env.put_object(
            Cell::Door {
                color: DoorColor::Red,
                open: false,
            },
            door,
        )
        .unwrap();
        env.put_agent(0, Position::new(1, 2), Direction::Down).unwrap();
        assert!(matches!(
            env.apply_action(0, Action::Open),
            ActionResult::Blocked(_)
        ));
        env.apply_action(0, Action::TurnRight);
        assert_eq!(
            env.apply_action(0, Action::Open),
            ActionResult::Opened(DoorColor::Red)
        );
        assert_eq!(env.door_open(door), Some(true));
        // Open doors are still not walkable.
        assert!(matches!(
            env.apply_action(0, Action::Forward),
            ActionResult::Blocked(_)
        ));
    }

    #[test]
    fn step_reports_budget() {
        let mut env = room(5, 5);
        env.put_agent(0, Position::new(1, 1), Direction::Right).unwrap();
        for _ in 0..9 {
            assert!(!env.step(&[Action::Still], &[0]).unwrap().truncated);
        }
        let last = env.step(&[Action::Still], &[0]).unwrap();
        assert!(last.truncated);
        assert_eq!(last.rewards, vec![0.0]);
        assert_eq!(last.results, vec![ActionResult::Idle]);
        assert_eq!(env.step_count(), 10);
    }

    #[test]
    fn agents_placed_out_of_order_are_rejected() {
        let mut env = room(5, 5);
        assert_eq!(
            env.put_agent(1, Position::new(1, 1), Direction::Right),
            Err(EnvironmentError::OutOfOrder {
                expected: 0,
                found: 1
            })
        );
        assert!(env.agents().is_empty());
        assert_eq!(env.get(Position::new(1, 1)), Some(&Cell::Empty));
    }

    #[test]
    fn step_rejects_bad_input_without_advancing() {
        let mut env = room(5, 5);
        env.put_agent(0, Position::new(1, 1), Direction::Right).unwrap();
        env.put_agent(1, Position::new(3, 3), Direction::Left).unwrap();
        let moves = [Action::Forward, Action::Forward];

        assert_eq!(
            env.step(&[Action::Forward], &[0, 1]),
            Err(EnvironmentError::ActionCount {
                expected: 2,
                found: 1
            })
        );
        assert_eq!(
            env.step(&moves, &[0, 2]),
            Err(EnvironmentError::InvalidOrder(vec![0, 2]))
        );
        assert_eq!(
            env.step(&moves, &[1, 1]),
            Err(EnvironmentError::InvalidOrder(vec![1, 1]))
        );
        assert_eq!(
            env.step(&moves, &[0]),
            Err(EnvironmentError::InvalidOrder(vec![0]))
        );
        assert_eq!(env.step_count(), 0);
        assert_eq!(env.agent(0).unwrap().pos, Position::new(1, 1));

        let step = env.step(&moves, &[1, 0]).unwrap();
        assert_eq!(step.results, vec![ActionResult::Moved, ActionResult::Moved]);
        assert_eq!(env.agent(1).unwrap().pos, Position::new(2, 3));
    }
}
