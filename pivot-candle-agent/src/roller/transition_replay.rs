use super::Rollout;
use crate::{
    model::DeterministicPolicyModel,
    noise::{OuNoise, OuNoiseConfig},
    normalize::RunningMeanStd,
    util::{array2_to_tensor, tensor_to_array2},
};
use anyhow::Result;
use log::{debug, info};
use ndarray::Array2;
use pivot_core::{
    replay_buffer::{CircularReplayBuffer, CircularReplayBufferConfig, TransitionBatch},
    ExperienceBufferBase, ReplayBufferBase, VecEnv,
};
use serde::{Deserialize, Serialize};

const RETURN_CLIP: f32 = 10.0;

/// Configuration of [`TransitionReplayEnvRoller`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct TransitionReplayEnvRollerConfig {
    /// Replay buffer.
    pub replay_buffer: CircularReplayBufferConfig,

    /// Action noise.
    pub action_noise: OuNoiseConfig,

    /// Whether sampled rewards are scaled by the running std of discounted returns.
    pub normalize_returns: bool,

    /// Discount factor of the returns used for normalization.
    pub discount_factor: f64,
}

impl Default for TransitionReplayEnvRollerConfig {
    fn default() -> Self {
        Self {
            replay_buffer: CircularReplayBufferConfig::default(),
            action_noise: OuNoiseConfig::default(),
            normalize_returns: true,
            discount_factor: 0.99,
        }
    }
}

/// Steps the environment with a noisy deterministic policy and stores the
/// transitions in a [`CircularReplayBuffer`].
pub struct TransitionReplayEnvRoller<V: VecEnv> {
    env: V,
    noise: OuNoise,
    buffer: CircularReplayBuffer,
    last_obs: Option<Array2<f32>>,
    normalize_returns: bool,
    discount_factor: f64,
    ret_rms: RunningMeanStd,
    accumulated_returns: Vec<f64>,
}

impl<V: VecEnv> TransitionReplayEnvRoller<V> {
    /// Constructs the roller. `seed` drives the noise and buffer sampling.
    pub fn build(config: &TransitionReplayEnvRollerConfig, env: V, seed: u64) -> Result<Self> {
        let num_envs = env.num_envs();
        let obs_dim = env.observation_space().dim();
        let act_dim = env.action_space().dim();
        let buffer_config = config.replay_buffer.clone().seed(seed);
        info!(
            "Replay buffer: capacity = {}, initial size = {}",
            buffer_config.capacity, buffer_config.initial_size
        );

        Ok(Self {
            noise: OuNoise::new(config.action_noise.clone(), num_envs, act_dim, seed),
            buffer: CircularReplayBuffer::build(&buffer_config, obs_dim, act_dim)?,
            env,
            last_obs: None,
            normalize_returns: config.normalize_returns,
            discount_factor: config.discount_factor,
            ret_rms: RunningMeanStd::new(1),
            accumulated_returns: vec![0.0; num_envs],
        })
    }

    /// Returns `true` once the buffer holds enough transitions.
    pub fn is_ready_for_sampling(&self) -> bool {
        self.buffer.is_ready_for_sampling()
    }

    /// The replay buffer.
    pub fn buffer(&self) -> &CircularReplayBuffer {
        &self.buffer
    }

    fn current_obs(&mut self, model: &mut DeterministicPolicyModel) -> Result<Array2<f32>> {
        match &self.last_obs {
            Some(obs) => Ok(obs.clone()),
            None => {
                let obs = self.env.reset()?;
                model.normalizer_mut().update(&obs);
                self.noise.reset_all();
                Ok(obs)
            }
        }
    }

    /// Runs `steps` steps of every environment and stores the transitions.
    pub fn rollout(&mut self, model: &mut DeterministicPolicyModel, steps: usize) -> Result<Rollout> {
        let action_space = self.env.action_space().clone();
        let mut obs = self.current_obs(model)?;
        let mut rollout = Rollout::default();

        for _ in 0..steps {
            let act = model.action(&array2_to_tensor(&obs, model.device())?)?;
            let mut act = tensor_to_array2(&act)? + self.noise.sample();
            for mut row in act.rows_mut() {
                if let Some(row) = row.as_slice_mut() {
                    action_space.clip(row);
                }
            }

            let step = self.env.step(&act)?;
            if self.normalize_returns {
                self.update_returns(&step.reward)?;
            }
            for (i, done) in step.is_done().into_iter().enumerate() {
                if done {
                    self.noise.reset(i);
                    self.accumulated_returns[i] = 0.0;
                }
            }
            model.normalizer_mut().update(&step.obs);

            rollout.frames += step.reward.len();
            rollout
                .episode_rewards
                .extend(step.episode_infos.iter().map(|info| info.reward));
            rollout.env_records.extend(step.records);
            self.buffer.push(TransitionBatch {
                obs,
                act,
                next_obs: step.terminal_obs,
                reward: step.reward,
                is_terminated: step.is_terminated,
                is_truncated: step.is_truncated,
            })?;
            obs = step.obs;
        }

        self.last_obs = Some(obs);
        Ok(rollout)
    }

    fn update_returns(&mut self, reward: &[f32]) -> Result<()> {
        let gamma = self.discount_factor;
        for (acc, r) in self.accumulated_returns.iter_mut().zip(reward) {
            *acc = *acc * gamma + *r as f64;
        }
        let returns = self
            .accumulated_returns
            .iter()
            .map(|r| *r as f32)
            .collect::<Vec<_>>();
        self.ret_rms
            .update(&Array2::from_shape_vec((returns.len(), 1), returns)?);
        Ok(())
    }

    /// Samples transitions. With return normalization, rewards are divided by the
    /// running std of discounted returns and clipped to `[-10, 10]`.
    pub fn sample(&mut self, batch_size: usize) -> Result<TransitionBatch> {
        let mut batch = self.buffer.batch(batch_size)?;
        if self.normalize_returns {
            let std = self.ret_rms.std()[0] as f32;
            debug!("Return std = {}", std);
            for r in batch.reward.iter_mut() {
                *r = (*r / std).clamp(-RETURN_CLIP, RETURN_CLIP);
            }
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mlp::MlpConfig, model::DeterministicPolicyModelConfig, testing::point_vec_env, Activation,
    };
    use candle_core::Device;
    use pivot_core::BoxSpace;

    fn model() -> Result<DeterministicPolicyModel> {
        DeterministicPolicyModelConfig {
            input_shape: 3,
            policy_backbone: MlpConfig::new(3, vec![8], Activation::Tanh),
            value_backbone: MlpConfig::new(5, vec![8], Activation::Tanh),
        }
        .instantiate(&BoxSpace::uniform(2, -1.0, 1.0), &Device::Cpu)
    }

    fn config(normalize_returns: bool) -> TransitionReplayEnvRollerConfig {
        TransitionReplayEnvRollerConfig {
            replay_buffer: CircularReplayBufferConfig::default()
                .capacity(100)
                .initial_size(10),
            normalize_returns,
            ..Default::default()
        }
    }

    #[test]
    fn test_rollout_fills_buffer() -> Result<()> {
        let mut model = model()?;
        let mut roller = TransitionReplayEnvRoller::build(&config(false), point_vec_env(2, 3)?, 0)?;
        assert!(roller.sample(4).is_err());

        let rollout = roller.rollout(&mut model, 4)?;
        assert_eq!(rollout.frames, 8);
        assert_eq!(rollout.episode_rewards.len(), 2);
        assert_eq!(rollout.env_records.len(), 8);
        assert_eq!(roller.buffer().len(), 8);
        assert!(!roller.is_ready_for_sampling());

        roller.rollout(&mut model, 1)?;
        assert!(roller.is_ready_for_sampling());

        let batch = roller.sample(16)?;
        assert_eq!(batch.len(), 16);
        assert!(batch.act.iter().all(|a| (-1.0..=1.0).contains(a)));
        // Rewards are raw without return normalization.
        assert!(batch.reward.iter().all(|r| *r < 0.0));
        Ok(())
    }

    #[test]
    fn test_normalized_rewards_are_clipped() -> Result<()> {
        let mut model = model()?;
        let mut roller = TransitionReplayEnvRoller::build(&config(true), point_vec_env(1, 50)?, 0)?;
        roller.rollout(&mut model, 20)?;
        let batch = roller.sample(32)?;
        assert!(batch.reward.iter().all(|r| r.abs() <= 10.0));
        Ok(())
    }
}
