use serde::{Deserialize, Serialize};

use crate::{Direction, environment::Action};

/// Number of interior corners agents can spawn in.
pub const SPAWN_CORNERS: usize = 4;

/// Which layout and termination rules an episode follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scenario {
    /// Agents cross one or more walled partitions to reach corner goal zones.
    Bottleneck,
    /// Two agents in separated halves must agree on a side.
    Comm,
    /// The red door has to be opened before the blue one.
    RedBlueDoor,
}

/// Discrete actions available to every agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionSet {
    /// Still, turn left, turn right, forward.
    Small,
    /// Still plus an absolute move in each direction.
    Move,
    /// [`ActionSet::Small`] plus opening the door in front.
    Open,
}

impl ActionSet {
    pub fn actions(self) -> &'static [Action] {
        const SMALL: [Action; 4] = [
            Action::Still,
            Action::TurnLeft,
            Action::TurnRight,
            Action::Forward,
        ];
        const MOVE: [Action; 5] = [
            Action::Still,
            Action::Move(Direction::Right),
            Action::Move(Direction::Down),
            Action::Move(Direction::Left),
            Action::Move(Direction::Up),
        ];
        const OPEN: [Action; 5] = [
            Action::Still,
            Action::TurnLeft,
            Action::TurnRight,
            Action::Forward,
            Action::Open,
        ];
        match self {
            ActionSet::Small => &SMALL,
            ActionSet::Move => &MOVE,
            ActionSet::Open => &OPEN,
        }
    }

    pub fn contains(self, action: Action) -> bool {
        self.actions().contains(&action)
    }
}

/// How rewards are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RewardScheme {
    /// Reward only on success, shared or zero-sum per [`VariantConfig::zero_sum`].
    Terminal,
    /// `-1/max_steps` per step, `+1` on success, `+1` the first time each agent
    /// reaches its goal.
    Shaped,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Grid {width}x{height} is smaller than the {min_width}x{min_height} minimum")]
    GridTooSmall {
        width: usize,
        height: usize,
        min_width: usize,
        min_height: usize,
    },
    #[error("Width {width} leaves no gap column for {bottlenecks} bottleneck rows (need at least 5)")]
    NoBottleneckGap { width: usize, bottlenecks: usize },
    #[error("At least one agent is required")]
    NoAgents,
    #[error("{requested} agents requested but only {available} spawn corners exist")]
    TooManyAgents { requested: usize, available: usize },
    #[error("{scenario:?} needs exactly {expected} agents, got {found}")]
    AgentCount {
        scenario: Scenario,
        expected: usize,
        found: usize,
    },
    #[error("Goal zone radius {radius} must be between 1 and {max}")]
    GoalZoneRadius { radius: usize, max: usize },
    #[error("Step budget must be positive")]
    ZeroStepBudget,
    #[error("{scenario:?} requires the {required:?} action set, got {found:?}")]
    ActionSetMismatch {
        scenario: Scenario,
        required: ActionSet,
        found: ActionSet,
    },
    #[error("Unknown preset '{0}'")]
    UnknownPreset(String),
}

/// Full parameterization of one episode variant.
///
/// Named presets are plain data in [`PRESETS`]; there is no per-variant type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VariantConfig {
    pub scenario: Scenario,
    pub width: usize,
    pub height: usize,
    pub num_agents: usize,
    /// Replace every random draw with a constant.
    pub fixed_layout: bool,
    /// Goal zone radius `k`; a zone spans up to `2k - 1` cells of one row.
    pub goal_zone: usize,
    pub max_steps: u32,
    pub action_set: ActionSet,
    pub reward: RewardScheme,
    /// Terminal reward magnitude.
    pub success_reward: f32,
    pub zero_sum: bool,
}

impl VariantConfig {
    /// Looks up a named preset.
    pub fn preset(name: &str) -> Result<Self, ConfigError> {
        PRESETS
            .iter()
            .find(|(preset, _)| *preset == name)
            .map(|(_, config)| *config)
            .ok_or_else(|| ConfigError::UnknownPreset(name.to_string()))
    }

    pub fn preset_names() -> impl Iterator<Item = &'static str> {
        PRESETS.iter().map(|(name, _)| *name)
    }

    /// Number of bottleneck rows the builder lays out for this height.
    pub fn num_bottlenecks(&self) -> usize {
        self.height.saturating_sub(3) / 2
    }

    /// Checks every constraint generation relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (min_width, min_height) = match self.scenario {
            Scenario::Comm => (5, 5),
            Scenario::Bottleneck | Scenario::RedBlueDoor => (4, 4),
        };
        if self.width < min_width || self.height < min_height {
            return Err(ConfigError::GridTooSmall {
                width: self.width,
                height: self.height,
                min_width,
                min_height,
            });
        }
        if self.num_agents == 0 {
            return Err(ConfigError::NoAgents);
        }
        if self.max_steps == 0 {
            return Err(ConfigError::ZeroStepBudget);
        }

        let max_radius = match self.scenario {
            Scenario::Bottleneck => {
                let bottlenecks = self.num_bottlenecks();
                if bottlenecks > 1 && self.width < 5 {
                    return Err(ConfigError::NoBottleneckGap {
                        width: self.width,
                        bottlenecks,
                    });
                }
                if self.num_agents > SPAWN_CORNERS {
                    return Err(ConfigError::TooManyAgents {
                        requested: self.num_agents,
                        available: SPAWN_CORNERS,
                    });
                }
                self.width - 2
            }
            Scenario::Comm => {
                self.expect_agents(2)?;
                // Zones on either side must stay clear of the spawn column.
                let mid = self.width / 2;
                (mid - 1).min(self.width - 2 - mid)
            }
            Scenario::RedBlueDoor => {
                self.expect_agents(2)?;
                if self.action_set != ActionSet::Open {
                    return Err(ConfigError::ActionSetMismatch {
                        scenario: self.scenario,
                        required: ActionSet::Open,
                        found: self.action_set,
                    });
                }
                self.width - 2
            }
        };
        if self.goal_zone == 0 || self.goal_zone > max_radius {
            return Err(ConfigError::GoalZoneRadius {
                radius: self.goal_zone,
                max: max_radius,
            });
        }
        Ok(())
    }

    fn expect_agents(&self, expected: usize) -> Result<(), ConfigError> {
        if self.num_agents != expected {
            return Err(ConfigError::AgentCount {
                scenario: self.scenario,
                expected,
                found: self.num_agents,
            });
        }
        Ok(())
    }
}

const fn bottleneck(
    width: usize,
    height: usize,
    num_agents: usize,
    fixed_layout: bool,
    goal_zone: usize,
    max_steps: u32,
    reward: RewardScheme,
) -> VariantConfig {
    VariantConfig {
        scenario: Scenario::Bottleneck,
        width,
        height,
        num_agents,
        fixed_layout,
        goal_zone,
        max_steps,
        action_set: ActionSet::Move,
        reward,
        success_reward: 1.0,
        zero_sum: false,
    }
}

const fn red_blue_door(size: usize) -> VariantConfig {
    VariantConfig {
        scenario: Scenario::RedBlueDoor,
        width: size,
        height: size,
        num_agents: 2,
        fixed_layout: false,
        goal_zone: 1,
        max_steps: 512,
        action_set: ActionSet::Open,
        reward: RewardScheme::Terminal,
        success_reward: 1.0,
        zero_sum: false,
    }
}

/// Named presets.
pub const PRESETS: &[(&str, VariantConfig)] = &[
    (
        "bottleneck-1a-5x5",
        VariantConfig {
            action_set: ActionSet::Small,
            ..bottleneck(5, 5, 1, true, 1, 10_000, RewardScheme::Terminal)
        },
    ),
    (
        "bottleneck-2a-7x5",
        bottleneck(7, 5, 2, true, 1, 10_000, RewardScheme::Terminal),
    ),
    (
        "bottleneck-2a-7x5-shaped",
        bottleneck(7, 5, 2, true, 1, 100, RewardScheme::Shaped),
    ),
    (
        "bottleneck-2a-9x9",
        bottleneck(9, 9, 2, false, 2, 256, RewardScheme::Shaped),
    ),
    (
        "bottleneck-4a-9x9",
        bottleneck(9, 9, 4, false, 2, 256, RewardScheme::Shaped),
    ),
    (
        "bottleneck-4a-9x9-zero-sum",
        VariantConfig {
            zero_sum: true,
            ..bottleneck(9, 9, 4, false, 1, 256, RewardScheme::Terminal)
        },
    ),
    (
        "comm-2a-7x5",
        VariantConfig {
            scenario: Scenario::Comm,
            width: 7,
            height: 5,
            num_agents: 2,
            fixed_layout: false,
            goal_zone: 1,
            max_steps: 64,
            action_set: ActionSet::Move,
            reward: RewardScheme::Terminal,
            success_reward: 1.0,
            zero_sum: false,
        },
    ),
    ("red-blue-door-6x6", red_blue_door(6)),
    ("red-blue-door-8x8", red_blue_door(8)),
    ("red-blue-door-10x10", red_blue_door(10)),
    ("red-blue-door-12x12", red_blue_door(12)),
];
