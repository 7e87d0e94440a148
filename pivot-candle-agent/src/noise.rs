//! Ornstein-Uhlenbeck exploration noise.
use ndarray::Array2;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

/// Configuration of [`OuNoise`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct OuNoiseConfig {
    /// Scale of the diffusion term.
    pub std_dev: f64,

    /// Mean reversion rate.
    pub theta: f64,

    /// Time step.
    pub dt: f64,

    /// Long-run mean.
    pub mu: f64,
}

impl Default for OuNoiseConfig {
    fn default() -> Self {
        Self {
            std_dev: 0.2,
            theta: 0.15,
            dt: 0.01,
            mu: 0.0,
        }
    }
}

impl OuNoiseConfig {
    /// Sets the scale of the diffusion term.
    pub fn std_dev(mut self, v: f64) -> Self {
        self.std_dev = v;
        self
    }
}

/// One Ornstein-Uhlenbeck process per environment:
/// `x += theta * (mu - x) * dt + std_dev * sqrt(dt) * N(0, 1)`.
pub struct OuNoise {
    config: OuNoiseConfig,
    state: Array2<f64>,
    rng: StdRng,
}

impl OuNoise {
    /// Processes for `num_envs` environments with `act_dim` action dimensions, all at `mu`.
    pub fn new(config: OuNoiseConfig, num_envs: usize, act_dim: usize, seed: u64) -> Self {
        let state = Array2::from_elem((num_envs, act_dim), config.mu);
        Self {
            config,
            state,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Advances every process one step and returns the new states.
    pub fn sample(&mut self) -> Array2<f32> {
        let OuNoiseConfig {
            std_dev,
            theta,
            dt,
            mu,
        } = self.config;
        let scale = std_dev * dt.sqrt();
        for x in self.state.iter_mut() {
            let n: f64 = self.rng.sample(StandardNormal);
            *x += theta * (mu - *x) * dt + scale * n;
        }
        self.state.mapv(|x| x as f32)
    }

    /// Resets the process of environment `env_ix` to `mu`.
    pub fn reset(&mut self, env_ix: usize) {
        let mu = self.config.mu;
        self.state.row_mut(env_ix).fill(mu);
    }

    /// Resets every process.
    pub fn reset_all(&mut self) {
        self.state.fill(self.config.mu);
    }
}
