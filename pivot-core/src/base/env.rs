//! Environment.
use super::{BoxSpace, Step, VecStep};
use crate::record::Record;
use anyhow::Result;
use ndarray::Array2;

/// Represents an environment, typically an MDP with continuous observation and action.
pub trait Env {
    /// Configurations.
    type Config: Clone;

    /// Builds an environment with a given random seed.
    fn build(config: &Self::Config, seed: i64) -> Result<Self>
    where
        Self: Sized;

    /// Space of observations.
    fn observation_space(&self) -> &BoxSpace;

    /// Space of actions.
    fn action_space(&self) -> &BoxSpace;

    /// Resets the environment and returns the initial observation.
    fn reset(&mut self) -> Result<Vec<f32>>;

    /// Performes an environment step.
    ///
    /// The returned [`Record`] holds auxiliary values of the step, e.g., components of reward.
    fn step(&mut self, act: &[f32]) -> Result<(Step, Record)>;
}

/// A set of environments stepped in lockstep.
///
/// Observations and actions are arrays of shape `[num_envs, dim]`.
/// Environments reset automatically when their episodes end; see [`VecStep`].
pub trait VecEnv {
    /// The number of environments.
    fn num_envs(&self) -> usize;

    /// Space of an observation of a single environment.
    fn observation_space(&self) -> &BoxSpace;

    /// Space of an action of a single environment.
    fn action_space(&self) -> &BoxSpace;

    /// Resets all environments.
    fn reset(&mut self) -> Result<Array2<f32>>;

    /// Applies actions to all environments.
    fn step(&mut self, act: &Array2<f32>) -> Result<VecStep>;
}
