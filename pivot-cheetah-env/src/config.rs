//! Configuration of [`HalfCheetahEnv`](crate::HalfCheetahEnv).
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Name of the only supported task.
pub(crate) const HALF_CHEETAH_V2: &str = "HalfCheetah-v2";

/// Configuration of [`HalfCheetahEnv`](crate::HalfCheetahEnv).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct HalfCheetahConfig {
    /// Name of the task, must be `HalfCheetah-v2`.
    pub name: String,

    /// Weight of the forward velocity term of the reward.
    pub forward_reward_weight: f64,

    /// Weight of the squared action penalty.
    pub ctrl_cost_weight: f64,

    /// Half width of the uniform noise added to the initial joint positions,
    /// also the scale of the Gaussian noise on the initial velocities.
    pub reset_noise_scale: f64,

    /// Episodes are truncated after this number of steps.
    pub max_episode_steps: usize,

    /// Integration time step.
    pub dt: f64,

    /// Integration steps per environment step.
    pub frame_skip: usize,
}

impl Default for HalfCheetahConfig {
    fn default() -> Self {
        Self {
            name: HALF_CHEETAH_V2.to_string(),
            forward_reward_weight: 1.0,
            ctrl_cost_weight: 0.1,
            reset_noise_scale: 0.1,
            max_episode_steps: 1000,
            dt: 0.01,
            frame_skip: 5,
        }
    }
}

impl HalfCheetahConfig {
    /// Sets the name of the task.
    pub fn name(mut self, v: impl Into<String>) -> Self {
        self.name = v.into();
        self
    }

    /// Sets the weight of the squared action penalty.
    pub fn ctrl_cost_weight(mut self, v: f64) -> Self {
        self.ctrl_cost_weight = v;
        self
    }

    /// Sets the scale of the reset noise.
    pub fn reset_noise_scale(mut self, v: f64) -> Self {
        self.reset_noise_scale = v;
        self
    }

    /// Sets the episode length.
    pub fn max_episode_steps(mut self, v: usize) -> Self {
        self.max_episode_steps = v;
        self
    }

    /// Duration of a single environment step.
    pub fn step_duration(&self) -> f64 {
        self.dt * self.frame_skip as f64
    }

    /// Loads [`HalfCheetahConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`HalfCheetahConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
