//! Environment step.
use crate::record::Record;
use ndarray::Array2;

/// Represents an observation, reward and done flags emitted by a single environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Observation after the step.
    pub obs: Vec<f32>,

    /// Reward.
    pub reward: f32,

    /// Flag denoting if episode is terminated.
    pub is_terminated: bool,

    /// Flag denoting if episode is truncated, e.g., by a time limit.
    pub is_truncated: bool,
}

impl Step {
    #[inline]
    /// Terminated or truncated.
    pub fn is_done(&self) -> bool {
        self.is_terminated || self.is_truncated
    }
}

/// Summary of a finished episode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeInfo {
    /// Cumulative (undiscounted) reward of the episode.
    pub reward: f32,

    /// The number of steps of the episode.
    pub length: usize,
}

/// Output of [`VecEnv::step`](crate::VecEnv::step).
///
/// Environments whose episodes ended in this step have already been reset.
/// For those rows, `obs` holds the initial observation of the next episode
/// while `terminal_obs` holds the last observation of the finished one.
/// For other rows both arrays are identical.
#[derive(Debug, Clone)]
pub struct VecStep {
    /// Observations to act on at the next step, `[num_envs, obs_dim]`.
    pub obs: Array2<f32>,

    /// Observations reached by this step, `[num_envs, obs_dim]`.
    pub terminal_obs: Array2<f32>,

    /// Rewards.
    pub reward: Vec<f32>,

    /// Termination flags.
    pub is_terminated: Vec<i8>,

    /// Truncation flags.
    pub is_truncated: Vec<i8>,

    /// Episodes finished in this step.
    pub episode_infos: Vec<EpisodeInfo>,

    /// Records returned by [`Env::step`](crate::Env::step), one per environment.
    pub records: Vec<Record>,
}

impl VecStep {
    /// Returns `true` for environments whose episodes ended in this step.
    pub fn is_done(&self) -> Vec<bool> {
        self.is_terminated
            .iter()
            .zip(&self.is_truncated)
            .map(|(t, u)| *t == 1 || *u == 1)
            .collect()
    }
}
