//! Env rollers, collecting experience from vectorized environments.
//!
//! [`TransitionReplayEnvRoller`] feeds a replay buffer for off-policy learning.
//! [`StepEnvRoller`] returns fixed-length [`Trajectories`] for on-policy learning.
mod step;
mod trajectories;
mod transition_replay;
pub use step::StepEnvRoller;
pub use trajectories::{Trajectories, TrajectoryBatch};
pub use transition_replay::{TransitionReplayEnvRoller, TransitionReplayEnvRollerConfig};
use pivot_core::record::Record;

/// Summary of a rollout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rollout {
    /// The number of environment frames, summed over environments.
    pub frames: usize,

    /// Returns of the episodes finished during the rollout.
    pub episode_rewards: Vec<f32>,

    /// Records of every environment step.
    pub env_records: Vec<Record>,
}

impl Rollout {
    /// Appends another rollout.
    pub fn extend(&mut self, other: Rollout) {
        self.frames += other.frames;
        self.episode_rewards.extend(other.episode_rewards);
        self.env_records.extend(other.env_records);
    }
}
