use std::{
    cmp::Ordering,
    collections::{BinaryHeap, HashMap},
};

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    AgentId, Direction, Position,
    cell::Cell,
    config::ActionSet,
    environment::{Action, AgentState, Environment},
    episode::Episode,
};

/// What a controller sees when choosing an action.
#[derive(Debug)]
pub struct AgentView<'a> {
    pub agent: &'a AgentState,
    pub env: &'a Environment,
    pub action_set: ActionSet,
}

/// Trait defining how an agent picks its action each step.
pub trait Controller {
    /// Returns the id of the agent this controller drives.
    fn id(&self) -> AgentId;

    /// Chooses an action from `view.action_set`.
    fn act(&mut self, view: &AgentView) -> Action;
}

/// Collects one action per agent for the next step of `episode`.
///
/// `controllers[i]` must drive agent `i`.
pub fn collect_actions(controllers: &mut [Box<dyn Controller>], episode: &Episode) -> Vec<Action> {
    let env = episode.environment();
    let action_set = episode.config().action_set;
    controllers
        .iter_mut()
        .map(|controller| match env.agent(controller.id()) {
            Some(agent) => controller.act(&AgentView {
                agent,
                env,
                action_set,
            }),
            None => Action::Still,
        })
        .collect()
}

/// Picks uniformly from the action set.
#[derive(Debug)]
pub struct RandomController {
    id: AgentId,
    rng: StdRng,
}

impl RandomController {
    pub fn new(id: AgentId, seed: u64) -> Self {
        Self {
            id,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Controller for RandomController {
    fn id(&self) -> AgentId {
        self.id
    }

    fn act(&mut self, view: &AgentView) -> Action {
        let actions = view.action_set.actions();
        actions[self.rng.random_range(0..actions.len())]
    }
}

/// Walks the shortest path to the nearest free goal cell the agent owns.
///
/// The path is recomputed every step since other agents move; they are
/// treated as obstacles for that step.
#[derive(Debug)]
pub struct PlanningController {
    id: AgentId,
}

impl PlanningController {
    pub fn new(id: AgentId) -> Self {
        Self { id }
    }

    /// A* over enterable cells with a Manhattan heuristic. The path includes
    /// `start` and `goal`.
    fn a_star_path(&self, start: Position, goal: Position, env: &Environment) -> Option<Vec<Position>> {
        #[derive(Clone, Eq, PartialEq)]
        struct PrioritizedItem {
            priority: usize,
            position: Position,
        }

        impl Ord for PrioritizedItem {
            fn cmp(&self, other: &Self) -> Ordering {
                // Reverse ordering for min-heap behavior
                other
                    .priority
                    .cmp(&self.priority)
                    .then_with(|| other.position.cmp(&self.position))
            }
        }

        impl PartialOrd for PrioritizedItem {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        let mut frontier = BinaryHeap::new();
        let mut came_from: HashMap<Position, Position> = HashMap::new();
        let mut cost_so_far: HashMap<Position, usize> = HashMap::new();

        frontier.push(PrioritizedItem {
            priority: 0,
            position: start,
        });
        cost_so_far.insert(start, 0);

        while let Some(PrioritizedItem {
            position: current, ..
        }) = frontier.pop()
        {
            if current == goal {
                let mut path = vec![goal];
                let mut step = goal;
                while step != start {
                    step = *came_from.get(&step)?;
                    path.push(step);
                }
                path.reverse();
                return Some(path);
            }

            let new_cost = cost_so_far[&current] + 1;
            for neighbor in Self::open_neighbors(current, env) {
                if cost_so_far.get(&neighbor).is_none_or(|&cost| new_cost < cost) {
                    cost_so_far.insert(neighbor, new_cost);
                    came_from.insert(neighbor, current);
                    frontier.push(PrioritizedItem {
                        priority: new_cost + neighbor.manhattan(goal),
                        position: neighbor,
                    });
                }
            }
        }
        None
    }

    fn open_neighbors(position: Position, env: &Environment) -> impl Iterator<Item = Position> + '_ {
        Direction::ALL
            .into_iter()
            .filter_map(move |dir| position.step(dir))
            .filter(move |&pos| env.get(pos).is_some_and(Cell::can_enter))
    }

    /// Free goal cells owned by this agent.
    fn find_goals(&self, env: &Environment) -> Vec<Position> {
        env.grid()
            .enumerate()
            .filter_map(|(pos, cell)| match cell {
                Cell::Goal(goal) if goal.is_owned_by(self.id) => Some(pos),
                _ => None,
            })
            .collect()
    }

    fn plan_to_nearest_goal(&self, start: Position, env: &Environment) -> Option<Vec<Position>> {
        self.find_goals(env)
            .into_iter()
            .filter_map(|goal| self.a_star_path(start, goal, env))
            .min_by_key(Vec::len)
    }
}

/// Converts a desired heading into an action of `set`.
fn heading_action(facing: Direction, towards: Direction, set: ActionSet) -> Action {
    match set {
        ActionSet::Move => Action::Move(towards),
        ActionSet::Small | ActionSet::Open => {
            if facing == towards {
                Action::Forward
            } else if facing.right() == towards {
                Action::TurnRight
            } else {
                Action::TurnLeft
            }
        }
    }
}

fn direction_between(from: Position, to: Position) -> Option<Direction> {
    Direction::ALL
        .into_iter()
        .find(|&dir| from.step(dir) == Some(to))
}

impl Controller for PlanningController {
    fn id(&self) -> AgentId {
        self.id
    }

    fn act(&mut self, view: &AgentView) -> Action {
        if view.env.on_own_goal(self.id) {
            return Action::Still;
        }
        let current = view.agent.pos;
        let next = self
            .plan_to_nearest_goal(current, view.env)
            .and_then(|path| path.get(1).copied());
        match next.and_then(|next| direction_between(current, next)) {
            Some(towards) => heading_action(view.agent.dir, towards, view.action_set),
            None => Action::Still,
        }
    }
}
