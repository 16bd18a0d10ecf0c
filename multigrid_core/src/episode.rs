use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom, seq::index};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    AgentId, Direction, Position,
    builder::{Bottleneck, GridBuilder},
    cell::{Cell, DoorColor},
    config::{ActionSet, ConfigError, Scenario, VariantConfig},
    environment::{Action, Environment, EnvironmentError},
    goal_zone::GoalZonePlacer,
    map::GridError,
    policy::{RewardPolicy, Termination, Verdict, finisher},
    spawn::SpawnPlanner,
};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EpisodeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Environment(#[from] EnvironmentError),
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("Episode has finished; reset before stepping again")]
    Finished,
    #[error("Expected {expected} actions, got {found}")]
    ActionCount { expected: usize, found: usize },
    #[error("Agent {agent}: {action:?} is not part of the {set:?} action set")]
    InvalidAction {
        agent: AgentId,
        action: Action,
        set: ActionSet,
    },
}

/// Extra per-step information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StepInfo {
    pub success: bool,
    /// Side agent 0's goal is on, for the comm variant.
    pub side: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub rewards: Vec<f32>,
    pub dones: Vec<bool>,
    /// The scenario reached success or failure.
    pub terminated: bool,
    /// The step budget ran out.
    pub truncated: bool,
    pub done: bool,
    pub info: StepInfo,
}

/// Red and blue door coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doors {
    pub red: Position,
    pub blue: Position,
}

/// What was generated on the last reset, plus the running verdict.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EpisodeState {
    pub bottlenecks: Vec<Bottleneck>,
    pub starts: Vec<Position>,
    /// Goal zone centres and their owner.
    pub goal_targets: Vec<(AgentId, Position)>,
    pub doors: Option<Doors>,
    pub side: Option<usize>,
    pub verdict: Option<Verdict>,
    /// Completed resets, including the one done on construction.
    pub resets: u64,
}

/// One episode: generation on reset, policy evaluation on every step.
pub struct Episode {
    config: VariantConfig,
    rng: StdRng,
    env: Environment,
    termination: Termination,
    reward: RewardPolicy,
    state: EpisodeState,
    done: bool,
}

impl Episode {
    /// Validates `config` and generates the first episode.
    pub fn new(config: VariantConfig, seed: u64) -> Result<Self, EpisodeError> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(seed);
        let (env, termination, mut state) = generate(&config, &mut rng)?;
        state.resets = 1;
        Ok(Episode {
            config,
            rng,
            env,
            termination,
            reward: RewardPolicy::from_config(&config),
            state,
            done: false,
        })
    }

    /// Discards the current grid and generates a new one. Agent ids are kept.
    pub fn reset(&mut self) -> Result<(), EpisodeError> {
        self.config.validate()?;
        let (env, termination, mut state) = generate(&self.config, &mut self.rng)?;
        state.resets = self.state.resets + 1;
        self.env = env;
        self.termination = termination;
        self.state = state;
        self.done = false;
        Ok(())
    }

    /// Applies one action per agent (indexed by id) and evaluates the step.
    pub fn step(&mut self, actions: &[Action]) -> Result<StepOutcome, EpisodeError> {
        if self.done {
            return Err(EpisodeError::Finished);
        }
        let n = self.env.agents().len();
        if actions.len() != n {
            return Err(EpisodeError::ActionCount {
                expected: n,
                found: actions.len(),
            });
        }
        let set = self.config.action_set;
        if let Some((agent, &action)) = actions
            .iter()
            .enumerate()
            .find(|(_, action)| !set.contains(**action))
        {
            return Err(EpisodeError::InvalidAction { agent, action, set });
        }

        let mut order: Vec<AgentId> = (0..n).collect();
        if !self.config.fixed_layout {
            order.shuffle(&mut self.rng);
        }
        let engine = self.env.step(actions, &order)?;

        let verdict = self.termination.evaluate(&self.env);
        let on_goal: Vec<bool> = (0..n).map(|id| self.env.on_own_goal(id)).collect();
        let finisher = finisher(&order, &engine.results, &on_goal);
        let mut rewards = engine.rewards;
        self.reward.apply(
            verdict,
            &on_goal,
            finisher,
            self.env.agents_mut(),
            &mut rewards,
        );

        let terminated = verdict.is_terminal();
        let done = terminated || engine.truncated;
        if done {
            for agent in self.env.agents_mut() {
                agent.done = true;
            }
            self.done = true;
            debug!(
                scenario = ?self.config.scenario,
                steps = self.env.step_count(),
                ?verdict,
                ?finisher,
                truncated = engine.truncated,
                "episode finished"
            );
        }
        self.state.verdict = Some(verdict);

        Ok(StepOutcome {
            rewards,
            dones: vec![done; n],
            terminated,
            truncated: engine.truncated,
            done,
            info: StepInfo {
                success: verdict == Verdict::Success,
                side: self.termination.side(),
            },
        })
    }

    pub fn config(&self) -> &VariantConfig {
        &self.config
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn state(&self) -> &EpisodeState {
        &self.state
    }

    pub fn is_done(&self) -> bool {
        self.done
    }
}

type Generated = (Environment, Termination, EpisodeState);

fn generate(config: &VariantConfig, rng: &mut StdRng) -> Result<Generated, EpisodeError> {
    let generated = match config.scenario {
        Scenario::Bottleneck => generate_bottleneck(config, rng)?,
        Scenario::Comm => generate_comm(config, rng)?,
        Scenario::RedBlueDoor => generate_red_blue_door(config, rng)?,
    };
    debug!(scenario = ?config.scenario, state = ?generated.2, "episode reset");
    Ok(generated)
}

fn generate_bottleneck(config: &VariantConfig, rng: &mut StdRng) -> Result<Generated, EpisodeError> {
    let layout = GridBuilder::from_config(config).build(rng)?;
    let spawns = SpawnPlanner::from_config(config).plan(config.num_agents, rng)?;
    let placer = GoalZonePlacer::new(config.goal_zone);

    let mut env = Environment::new(layout.grid, config.max_steps);
    for spawn in &spawns {
        env.put_agent(spawn.agent, spawn.start, Direction::Right)?;
        placer.place(env.grid_mut(), spawn.goal, spawn.agent);
    }

    let state = EpisodeState {
        bottlenecks: layout.bottlenecks,
        starts: spawns.iter().map(|s| s.start).collect(),
        goal_targets: spawns.iter().map(|s| (s.agent, s.goal)).collect(),
        ..EpisodeState::default()
    };
    Ok((env, Termination::AllOnGoal, state))
}

fn generate_comm(config: &VariantConfig, rng: &mut StdRng) -> Result<Generated, EpisodeError> {
    let (w, h) = (config.width, config.height);
    let mid = w / 2;
    let side = if config.fixed_layout {
        0
    } else {
        rng.random_range(0..2)
    };
    let columns = [1, w - 2];
    let starts = vec![Position::new(mid, 1), Position::new(mid, h - 2)];
    let goal_targets = vec![
        (0, Position::new(columns[side], 1)),
        (1, Position::new(columns[0], h - 2)),
        (1, Position::new(columns[1], h - 2)),
    ];

    let mut env = Environment::new(
        GridBuilder::from_config(config).separated_room(),
        config.max_steps,
    );
    for (id, &start) in starts.iter().enumerate() {
        env.put_agent(id, start, Direction::Right)?;
    }
    let placer = GoalZonePlacer::new(config.goal_zone);
    for &(owner, target) in &goal_targets {
        placer.place(env.grid_mut(), target, owner);
    }

    let state = EpisodeState {
        starts,
        goal_targets,
        side: Some(side),
        ..EpisodeState::default()
    };
    Ok((env, Termination::Comm { side, split: mid }, state))
}

fn generate_red_blue_door(
    config: &VariantConfig,
    rng: &mut StdRng,
) -> Result<Generated, EpisodeError> {
    let (w, h) = (config.width, config.height);
    let mid = h / 2;
    let (starts, red_row, blue_row) = if config.fixed_layout {
        (vec![Position::new(1, mid), Position::new(w - 2, mid)], mid, mid)
    } else {
        let xs = index::sample(rng, w - 2, 2);
        let ys = index::sample(rng, h - 2, 2);
        let starts = xs
            .iter()
            .zip(ys.iter())
            .map(|(x, y)| Position::new(x + 1, y + 1))
            .collect();
        (starts, rng.random_range(1..=h - 2), rng.random_range(1..=h - 2))
    };
    let doors = Doors {
        red: Position::new(0, red_row),
        blue: Position::new(w - 1, blue_row),
    };

    let mut env = Environment::new(GridBuilder::from_config(config).walled_room(), config.max_steps);
    for (pos, color) in [(doors.red, DoorColor::Red), (doors.blue, DoorColor::Blue)] {
        env.put_object(Cell::Door { color, open: false }, pos)?;
    }
    for (id, &start) in starts.iter().enumerate() {
        env.put_agent(id, start, Direction::Down)?;
    }

    let state = EpisodeState {
        starts,
        doors: Some(doors),
        ..EpisodeState::default()
    };
    Ok((env, Termination::red_blue_door(doors.red, doors.blue), state))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_config_fails_before_any_step() {
        let config = VariantConfig {
            num_agents: 5,
            ..VariantConfig::preset("bottleneck-4a-9x9").unwrap()
        };
        assert!(matches!(
            Episode::new(config, 0),
            Err(EpisodeError::Config(ConfigError::TooManyAgents { .. }))
        ));
    }

    #[test]
    fn step_checks_actions() {
        let mut episode = Episode::new(VariantConfig::preset("bottleneck-2a-7x5").unwrap(), 0).unwrap();
        assert_eq!(
            episode.step(&[Action::Still]),
            Err(EpisodeError::ActionCount {
                expected: 2,
                found: 1
            })
        );
        assert_eq!(
            episode.step(&[Action::Still, Action::Open]),
            Err(EpisodeError::InvalidAction {
                agent: 1,
                action: Action::Open,
                set: ActionSet::Move
            })
        );
        assert!(episode.step(&[Action::Still, Action::Still]).is_ok());
    }

    #[test]
    fn finished_episode_refuses_steps_until_reset() {
        let config = VariantConfig {
            max_steps: 2,
            ..VariantConfig::preset("bottleneck-2a-7x5").unwrap()
        };
        let mut episode = Episode::new(config, 1).unwrap();
        let still = [Action::Still, Action::Still];
        assert!(!episode.step(&still).unwrap().done);
        let last = episode.step(&still).unwrap();
        assert!(last.done && last.truncated && !last.terminated);
        assert!(!last.info.success);
        assert!(episode.environment().agents().iter().all(|a| a.done));
        assert_eq!(episode.step(&still), Err(EpisodeError::Finished));

        episode.reset().unwrap();
        assert_eq!(episode.state().resets, 2);
        assert_eq!(episode.environment().step_count(), 0);
        assert!(episode.step(&still).is_ok());
    }

    #[test]
    fn random_door_layout_keeps_agents_apart() {
        let config = VariantConfig::preset("red-blue-door-6x6").unwrap();
        let mut episode = Episode::new(config, 42).unwrap();
        for _ in 0..20 {
            let state = episode.state();
            assert_eq!(state.starts.len(), 2);
            assert_ne!(state.starts[0], state.starts[1]);
            let doors = state.doors.unwrap();
            assert_eq!(doors.red.x, 0);
            assert_eq!(doors.blue.x, 5);
            assert_eq!(episode.environment().door_open(doors.red), Some(false));
            assert_eq!(episode.environment().door_open(doors.blue), Some(false));
            episode.reset().unwrap();
        }
    }

    #[test]
    fn comm_side_is_reported() {
        let mut episode = Episode::new(VariantConfig::preset("comm-2a-7x5").unwrap(), 5).unwrap();
        let side = episode.state().side;
        assert!(matches!(side, Some(0 | 1)));
        let outcome = episode.step(&[Action::Still, Action::Still]).unwrap();
        assert_eq!(outcome.info.side, side);
        assert!(!outcome.done);
    }
}
