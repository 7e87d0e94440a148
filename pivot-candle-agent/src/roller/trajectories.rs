use crate::util::array2_to_tensor;
use anyhow::Result;
use candle_core::{Device, Tensor};
use ndarray::{Array2, Axis};
use pivot_core::record::Record;
use rand::{seq::SliceRandom, Rng};

/// Fixed-length rollout of a vectorized environment.
///
/// Per-step vectors are flattened with index `t * num_envs + env`.
#[derive(Debug, Clone)]
pub struct Trajectories {
    /// The number of steps.
    pub num_steps: usize,

    /// The number of environments.
    pub num_envs: usize,

    /// Observations the actions were taken on, `[num_steps * num_envs, obs_dim]`.
    pub obs: Array2<f32>,

    /// Sampled actions before clipping, `[num_steps * num_envs, act_dim]`.
    pub actions: Array2<f32>,

    /// Log probabilities of the actions under the rollout policy.
    pub logprobs: Vec<f32>,

    /// Value estimates of the observations.
    pub values: Vec<f32>,

    /// Rewards.
    pub rewards: Vec<f32>,

    /// 1 where the episode ended at this step.
    pub dones: Vec<f32>,

    /// Value estimates of the observations following the last step, one per environment.
    pub final_values: Vec<f32>,

    /// Advantages, filled by [`PpoPolicyGradient::process_rollout`](crate::ppo::PpoPolicyGradient::process_rollout).
    pub advantages: Vec<f32>,

    /// Returns, filled by [`PpoPolicyGradient::process_rollout`](crate::ppo::PpoPolicyGradient::process_rollout).
    pub returns: Vec<f32>,

    /// The number of environment frames.
    pub frames: usize,

    /// Returns of the episodes finished during the rollout.
    pub episode_rewards: Vec<f32>,

    /// Records of every environment step.
    pub env_records: Vec<Record>,
}

/// Tensors of selected transitions of [`Trajectories`].
pub struct TrajectoryBatch {
    /// Observations.
    pub obs: Tensor,

    /// Actions.
    pub actions: Tensor,

    /// Log probabilities under the rollout policy.
    pub logprobs: Tensor,

    /// Value estimates at rollout time.
    pub values: Tensor,

    /// Returns.
    pub returns: Tensor,

    /// Advantages, not normalized.
    pub advantages: Vec<f32>,
}

impl Trajectories {
    /// The number of transitions.
    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    /// Returns `true` if there is no transition.
    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }

    /// Splits a random permutation of the transitions into chunks of `batch_size`.
    ///
    /// Every transition appears exactly once; the last chunk may be shorter.
    pub fn shuffled_batches(&self, batch_size: usize, rng: &mut impl Rng) -> Vec<Vec<usize>> {
        let mut ixs = (0..self.len()).collect::<Vec<_>>();
        ixs.shuffle(rng);
        ixs.chunks(batch_size.max(1)).map(|c| c.to_vec()).collect()
    }

    /// Selects transitions.
    pub fn select(&self, ixs: &[usize], device: &Device) -> Result<TrajectoryBatch> {
        let pick = |xs: &[f32]| ixs.iter().map(|&i| xs[i]).collect::<Vec<_>>();
        let n = ixs.len();

        Ok(TrajectoryBatch {
            obs: array2_to_tensor(&self.obs.select(Axis(0), ixs), device)?,
            actions: array2_to_tensor(&self.actions.select(Axis(0), ixs), device)?,
            logprobs: Tensor::from_vec(pick(&self.logprobs), n, device)?,
            values: Tensor::from_vec(pick(&self.values), n, device)?,
            returns: Tensor::from_vec(pick(&self.returns), n, device)?,
            advantages: pick(&self.advantages),
        })
    }
}
