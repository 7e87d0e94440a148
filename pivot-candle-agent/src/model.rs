//! Policy models.
//!
//! Both models start with a [`NormalizeObservations`](crate::normalize::NormalizeObservations)
//! block and expose their parameters as layer groups for
//! [`LayeredAdamConfig`](crate::opt::LayeredAdamConfig).
mod deterministic;
mod stochastic;
pub use deterministic::{DeterministicPolicyModel, DeterministicPolicyModelConfig};
pub use stochastic::{StochasticPolicyModel, StochasticPolicyModelConfig};
use anyhow::Result;
use candle_core::Tensor;
use pivot_core::BoxSpace;
use std::path::Path;

/// Maps `tanh` outputs in `[-1, 1]` to the action space.
pub(crate) fn rescale_action(xs: &Tensor, action_space: &BoxSpace) -> Result<Tensor> {
    let dim = action_space.dim();
    let device = xs.device();
    let low = Tensor::from_slice(action_space.low.as_slice(), (1, dim), device)?;
    let high = Tensor::from_slice(action_space.high.as_slice(), (1, dim), device)?;
    let half = ((&high - &low)? * 0.5)?;
    Ok(((xs + 1.0)?.broadcast_mul(&half)?.broadcast_add(&low))?)
}

pub(crate) fn save_files(
    path: &Path,
    varmap: &candle_nn::VarMap,
    normalizer: &crate::normalize::NormalizeObservations,
) -> Result<()> {
    std::fs::create_dir_all(path)?;
    varmap.save(path.join("model.safetensors"))?;
    normalizer.save(path.join("normalizer.yaml"))?;
    Ok(())
}
