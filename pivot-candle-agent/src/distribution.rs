//! Diagonal Gaussian over actions with a state-independent log standard deviation.
use anyhow::Result;
use candle_core::{Tensor, D};
use rand::Rng;
use rand_distr::StandardNormal;

const LOG_SQRT_2PI: f64 = 0.918_938_533_204_672_7;

/// Log density of `action` summed over action dimensions.
///
/// `mean` and `action` are `[batch, act_dim]`, `log_std` is `[act_dim]`. Returns `[batch]`.
pub fn log_prob(mean: &Tensor, log_std: &Tensor, action: &Tensor) -> Result<Tensor> {
    let log_std = log_std.broadcast_as(mean.shape())?;
    let var = (&log_std * 2.0)?.exp()?;
    let sq = (action - mean)?.sqr()?;
    let lp = (((sq / (var * 2.0)?)?.neg()? - log_std)? - LOG_SQRT_2PI)?;
    Ok(lp.sum(D::Minus1)?)
}

/// Entropy of the distribution, a scalar since it does not depend on the state.
pub fn entropy(log_std: &Tensor) -> Result<Tensor> {
    Ok((log_std + (0.5 + LOG_SQRT_2PI))?.sum_all()?)
}

/// Draws `mean + exp(log_std) * eps` with `eps` from `rng`.
pub fn sample(mean: &Tensor, log_std: &Tensor, rng: &mut impl Rng) -> Result<Tensor> {
    let n = mean.elem_count();
    let eps = (0..n)
        .map(|_| rng.sample::<f32, _>(StandardNormal))
        .collect::<Vec<_>>();
    let eps = Tensor::from_vec(eps, mean.shape(), mean.device())?;
    let std = log_std.exp()?.broadcast_as(mean.shape())?;
    Ok((mean + (std * eps)?)?)
}
