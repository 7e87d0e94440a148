//! Models and algorithms of pivot implemented with [candle](https://crates.io/crates/candle-core).
//!
//! * [`ddpg`]: deep deterministic policy gradient on a [`model::DeterministicPolicyModel`].
//! * [`ppo`]: proximal policy optimization on a [`model::StochasticPolicyModel`].
//! * [`roller`]: env rollers collecting experience for the algorithms.
//! * [`reinforcer`]: implementations of [`pivot_core::Reinforcer`] combining the above.
pub mod ddpg;
pub mod distribution;
pub mod mlp;
pub mod model;
pub mod noise;
pub mod normalize;
pub mod opt;
pub mod ppo;
pub mod reinforcer;
pub mod roller;
pub mod util;

#[cfg(test)]
mod testing;
use anyhow::Result;
use candle_core::Tensor;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq)]
/// Device for using candle.
///
/// This enum is added because [`candle_core::Device`] does not support serialization.
pub enum Device {
    /// The main CPU device.
    Cpu,

    /// A CUDA device. Falls back to the CPU when CUDA is not available.
    Cuda(usize),
}

impl Device {
    /// Creates the candle device.
    pub fn build(self) -> Result<candle_core::Device> {
        match self {
            Self::Cpu => Ok(candle_core::Device::Cpu),
            Self::Cuda(n) => Ok(candle_core::Device::cuda_if_available(n)?),
        }
    }
}

#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq, Default)]
/// Activation functions of hidden layers.
pub enum Activation {
    /// Identity.
    None,

    /// Rectified linear unit.
    ReLU,

    /// Hyperbolic tangent.
    #[default]
    Tanh,
}

impl Activation {
    /// Applies the activation function.
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        Ok(match self {
            Self::None => xs.clone(),
            Self::ReLU => xs.relu()?,
            Self::Tanh => xs.tanh()?,
        })
    }
}
