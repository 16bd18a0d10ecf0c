use rand::{Rng, seq::index};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    AgentId, Position,
    config::{ConfigError, SPAWN_CORNERS, VariantConfig},
};

/// Where an agent starts and which cell its goal zone is centred on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spawn {
    pub agent: AgentId,
    pub start: Position,
    pub goal: Position,
}

/// Bits of the corner rotation used for one- and two-agent episodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rotation {
    room_side: usize,
    corner: usize,
    goal_corner: usize,
}

impl Rotation {
    /// Moves to the opposite side and mirrors both corner choices, so the next
    /// agent starts where the previous one's goal side is not.
    fn advance(self) -> Self {
        Rotation {
            room_side: 1 - self.room_side,
            corner: 1 - self.goal_corner,
            goal_corner: 1 - self.corner,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnPlanner {
    width: usize,
    height: usize,
    fixed_layout: bool,
}

impl SpawnPlanner {
    pub fn new(width: usize, height: usize, fixed_layout: bool) -> Self {
        SpawnPlanner {
            width,
            height,
            fixed_layout,
        }
    }

    pub fn from_config(config: &VariantConfig) -> Self {
        Self::new(config.width, config.height, config.fixed_layout)
    }

    /// Interior corners grouped as `[[top-left, top-right], [bottom-left, bottom-right]]`.
    pub fn corners(&self) -> [[Position; 2]; 2] {
        let (right, bottom) = (self.width - 2, self.height - 2);
        [
            [Position::new(1, 1), Position::new(right, 1)],
            [Position::new(1, bottom), Position::new(right, bottom)],
        ]
    }

    /// Assigns a start corner and goal target to agents `0..num_agents`.
    pub fn plan<R: Rng>(&self, num_agents: usize, rng: &mut R) -> Result<Vec<Spawn>, ConfigError> {
        if num_agents > SPAWN_CORNERS {
            return Err(ConfigError::TooManyAgents {
                requested: num_agents,
                available: SPAWN_CORNERS,
            });
        }
        let spawns = if num_agents < 3 {
            self.rotate(num_agents, rng)
        } else {
            self.sample(num_agents, rng)
        };
        debug!(?spawns, "spawns planned");
        Ok(spawns)
    }

    fn rotate<R: Rng>(&self, num_agents: usize, rng: &mut R) -> Vec<Spawn> {
        let corners = self.corners();
        let mut rotation = if self.fixed_layout {
            Rotation {
                room_side: 0,
                corner: 0,
                goal_corner: 0,
            }
        } else {
            Rotation {
                room_side: rng.random_range(0..2),
                corner: rng.random_range(0..2),
                goal_corner: rng.random_range(0..2),
            }
        };

        let mut spawns = Vec::with_capacity(num_agents);
        for agent in 0..num_agents {
            spawns.push(Spawn {
                agent,
                start: corners[rotation.room_side][rotation.corner],
                goal: corners[1 - rotation.room_side][rotation.goal_corner],
            });
            rotation = rotation.advance();
        }
        spawns
    }

    fn sample<R: Rng>(&self, num_agents: usize, rng: &mut R) -> Vec<Spawn> {
        let corners = self.corners().concat();
        let picks: Vec<usize> = if self.fixed_layout {
            (0..num_agents).collect()
        } else {
            index::sample(rng, corners.len(), num_agents).into_vec()
        };

        picks
            .into_iter()
            .enumerate()
            .map(|(agent, pick)| {
                let start = corners[pick];
                let goal = Position::new(start.x, self.height - 1 - start.y);
                assert_ne!(
                    start.y, goal.y,
                    "agent {agent} would start on its own goal row"
                );
                Spawn { agent, start, goal }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::{SeedableRng, rngs::StdRng};
    use std::collections::HashSet;

    #[test]
    fn fixed_two_agent_rotation() {
        let planner = SpawnPlanner::new(7, 5, true);
        let spawns = planner.plan(2, &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(
            spawns,
            vec![
                Spawn {
                    agent: 0,
                    start: Position::new(1, 1),
                    goal: Position::new(1, 3),
                },
                Spawn {
                    agent: 1,
                    start: Position::new(5, 3),
                    goal: Position::new(5, 1),
                },
            ]
        );
    }

    #[test]
    fn four_agents_mirror_rows() {
        let planner = SpawnPlanner::new(9, 9, true);
        let spawns = planner.plan(4, &mut StdRng::seed_from_u64(0)).unwrap();
        let starts: HashSet<_> = spawns.iter().map(|s| s.start).collect();
        assert_eq!(starts.len(), 4);
        for spawn in &spawns {
            assert_eq!(spawn.goal.x, spawn.start.x);
            assert_eq!(spawn.goal.y, 8 - spawn.start.y);
        }
    }

    #[test]
    fn five_agents_is_a_configuration_error() {
        let planner = SpawnPlanner::new(9, 9, false);
        assert_eq!(
            planner.plan(5, &mut StdRng::seed_from_u64(0)),
            Err(ConfigError::TooManyAgents {
                requested: 5,
                available: 4
            })
        );
    }

    proptest! {
        #[test]
        fn never_targets_own_start(
            width in 4usize..16,
            height in 4usize..16,
            agents in 1usize..=4,
            fixed in any::<bool>(),
            seed in any::<u64>(),
        ) {
            let planner = SpawnPlanner::new(width, height, fixed);
            let spawns = planner.plan(agents, &mut StdRng::seed_from_u64(seed)).unwrap();
            prop_assert_eq!(spawns.len(), agents);

            let starts: HashSet<_> = spawns.iter().map(|s| s.start).collect();
            prop_assert_eq!(starts.len(), agents);
            for spawn in &spawns {
                prop_assert_ne!(spawn.start, spawn.goal);
                prop_assert_ne!(spawn.start.y, spawn.goal.y);
            }
        }

        #[test]
        fn fixed_layout_is_deterministic(agents in 1usize..=4, a in any::<u64>(), b in any::<u64>()) {
            let planner = SpawnPlanner::new(9, 7, true);
            let first = planner.plan(agents, &mut StdRng::seed_from_u64(a)).unwrap();
            let second = planner.plan(agents, &mut StdRng::seed_from_u64(b)).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
