//! A batch of transitions.
use ndarray::Array2;

/// Transitions `(o_t, a_t, o_t+1, r_t, terminated_t, truncated_t)`, one per row.
///
/// Used both for pushing the output of a vectorized step into the buffer and for
/// batches sampled from it.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionBatch {
    /// Observations, `[n, obs_dim]`.
    pub obs: Array2<f32>,

    /// Actions, `[n, act_dim]`.
    pub act: Array2<f32>,

    /// Next observations, `[n, obs_dim]`.
    pub next_obs: Array2<f32>,

    /// Rewards.
    pub reward: Vec<f32>,

    /// Termination flags.
    pub is_terminated: Vec<i8>,

    /// Truncation flags.
    pub is_truncated: Vec<i8>,
}

impl TransitionBatch {
    /// The number of transitions.
    pub fn len(&self) -> usize {
        self.reward.len()
    }

    /// Returns `true` if the batch holds no transition.
    pub fn is_empty(&self) -> bool {
        self.reward.is_empty()
    }
}
