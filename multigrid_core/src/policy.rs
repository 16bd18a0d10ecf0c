use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    AgentId, Position,
    config::{RewardScheme, VariantConfig},
    environment::{ActionResult, AgentState, Environment},
};

/// Outcome of evaluating the termination rule for one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Continue,
    Success,
    Failure,
}

impl Verdict {
    pub fn is_terminal(self) -> bool {
        self != Verdict::Continue
    }
}

/// Whether every agent stands on a goal it owns.
pub fn all_on_goal(env: &Environment) -> bool {
    env.agents().iter().all(|agent| env.on_own_goal(agent.id))
}

/// Scenario-specific termination state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// Success once every agent is on one of its goals.
    AllOnGoal,
    /// Agent 1 must pick the side agent 0's goal is on, then both meet in one
    /// column. Columns left of `split` are side 0.
    Comm { side: usize, split: usize },
    /// The red door must be open by the time the blue one opens.
    RedBlueDoor {
        red: Position,
        blue: Position,
        red_opened_at: Option<u32>,
    },
}

impl Termination {
    pub fn red_blue_door(red: Position, blue: Position) -> Self {
        Termination::RedBlueDoor {
            red,
            blue,
            red_opened_at: None,
        }
    }

    /// Side reported in step info, for the comm variant.
    pub fn side(&self) -> Option<usize> {
        match self {
            Termination::Comm { side, .. } => Some(*side),
            _ => None,
        }
    }

    pub fn evaluate(&mut self, env: &Environment) -> Verdict {
        match self {
            Termination::AllOnGoal => {
                if all_on_goal(env) {
                    Verdict::Success
                } else {
                    Verdict::Continue
                }
            }
            Termination::Comm { side, split } => {
                let (Some(speaker), Some(listener)) = (env.agent(0), env.agent(1)) else {
                    return Verdict::Continue;
                };
                if !env.on_own_goal(listener.id) {
                    return Verdict::Continue;
                }
                let chosen = usize::from(listener.pos.x >= *split);
                if chosen != *side {
                    Verdict::Failure
                } else if env.on_own_goal(speaker.id) && speaker.pos.x == listener.pos.x {
                    Verdict::Success
                } else {
                    Verdict::Continue
                }
            }
            Termination::RedBlueDoor {
                red,
                blue,
                red_opened_at,
            } => {
                if red_opened_at.is_none() && env.door_open(*red) == Some(true) {
                    debug!(step = env.step_count(), "red door opened");
                    *red_opened_at = Some(env.step_count());
                }
                match env.door_open(*blue) {
                    Some(true) if red_opened_at.is_some() => Verdict::Success,
                    Some(true) => Verdict::Failure,
                    _ => Verdict::Continue,
                }
            }
        }
    }
}

/// Adds a terminal reward credited to `target`.
///
/// `target` gains `reward`. Under zero-sum the other agents split `-reward`
/// equally, so the credit sums to zero.
pub fn credit_terminal(rewards: &mut [f32], target: AgentId, reward: f32, zero_sum: bool) {
    let others = rewards.len().saturating_sub(1);
    for (id, r) in rewards.iter_mut().enumerate() {
        if id == target {
            *r += reward;
        } else if zero_sum {
            *r -= reward / others as f32;
        }
    }
}

/// The agent whose action completed this step's outcome.
///
/// Scans `order` backwards for the last agent that either moved onto one of
/// its own goals or opened a door. Falls back to the last agent in `order`
/// standing on its own goal.
pub fn finisher(order: &[AgentId], results: &[ActionResult], on_goal: &[bool]) -> Option<AgentId> {
    let owns_goal = |id: AgentId| on_goal.get(id).copied().unwrap_or(false);
    order
        .iter()
        .rev()
        .copied()
        .find(|&id| match results.get(id) {
            Some(ActionResult::Moved) => owns_goal(id),
            Some(ActionResult::Opened(_)) => true,
            _ => false,
        })
        .or_else(|| order.iter().rev().copied().find(|&id| owns_goal(id)))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardPolicy {
    scheme: RewardScheme,
    reward: f32,
    zero_sum: bool,
    max_steps: u32,
}

impl RewardPolicy {
    pub fn new(scheme: RewardScheme, reward: f32, zero_sum: bool, max_steps: u32) -> Self {
        RewardPolicy {
            scheme,
            reward,
            zero_sum,
            max_steps,
        }
    }

    pub fn from_config(config: &VariantConfig) -> Self {
        Self::new(
            config.reward,
            config.success_reward,
            config.zero_sum,
            config.max_steps,
        )
    }

    /// Adds this step's rewards on top of the engine's baseline.
    ///
    /// # Arguments
    ///
    /// * `verdict`: The termination verdict for the step.
    /// * `on_goal`: `on_goal[id]` is the success predicate for agent `id` after the step.
    /// * `finisher`: The agent credited with a zero-sum success, see [`finisher`].
    /// * `agents`: Agent records; the shaped scheme sets `reached_goal_once`.
    /// * `rewards`: Per-agent rewards to add to.
    pub fn apply(
        &self,
        verdict: Verdict,
        on_goal: &[bool],
        finisher: Option<AgentId>,
        agents: &mut [AgentState],
        rewards: &mut [f32],
    ) {
        match self.scheme {
            RewardScheme::Terminal if verdict != Verdict::Success => {}
            RewardScheme::Terminal if self.zero_sum => match finisher {
                Some(target) => credit_terminal(rewards, target, self.reward, true),
                None => debug!("zero-sum success without a finishing agent"),
            },
            RewardScheme::Terminal => {
                for r in rewards.iter_mut() {
                    *r += self.reward;
                }
            }
            RewardScheme::Shaped => {
                let step_penalty = -1.0 / self.max_steps as f32;
                for ((agent, r), &on_goal) in agents.iter_mut().zip(rewards.iter_mut()).zip(on_goal)
                {
                    *r += if verdict == Verdict::Success {
                        self.reward
                    } else {
                        step_penalty
                    };
                    if on_goal && !agent.reached_goal_once {
                        agent.reached_goal_once = true;
                        *r += self.reward;
                    }
                }
            }
        }
    }
}
