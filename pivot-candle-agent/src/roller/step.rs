use super::Trajectories;
use crate::{
    model::StochasticPolicyModel,
    util::{array2_to_tensor, tensor_to_array2},
};
use anyhow::Result;
use log::trace;
use ndarray::{concatenate, Array2, ArrayView2, Axis};
use pivot_core::VecEnv;
use rand::{rngs::StdRng, SeedableRng};

fn views(xs: &[Array2<f32>]) -> Vec<ArrayView2<'_, f32>> {
    xs.iter().map(|x| x.view()).collect()
}

/// Steps the environment with a stochastic policy and returns the trajectories.
///
/// The last observation is kept between rollouts, so consecutive rollouts
/// continue the same episodes.
pub struct StepEnvRoller<V: VecEnv> {
    env: V,
    last_obs: Option<Array2<f32>>,
    rng: StdRng,
}

impl<V: VecEnv> StepEnvRoller<V> {
    /// Constructs the roller. `seed` drives action sampling.
    pub fn new(env: V, seed: u64) -> Self {
        Self {
            env,
            last_obs: None,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// The environment.
    pub fn env(&self) -> &V {
        &self.env
    }

    fn current_obs(&mut self, model: &mut StochasticPolicyModel) -> Result<Array2<f32>> {
        match &self.last_obs {
            Some(obs) => Ok(obs.clone()),
            None => {
                let obs = self.env.reset()?;
                model.normalizer_mut().update(&obs);
                Ok(obs)
            }
        }
    }

    /// Runs `number_of_steps` steps of every environment.
    pub fn rollout(
        &mut self,
        model: &mut StochasticPolicyModel,
        number_of_steps: usize,
    ) -> Result<Trajectories> {
        let num_envs = self.env.num_envs();
        let device = model.device().clone();
        let action_space = self.env.action_space().clone();
        let mut obs = self.current_obs(model)?;

        let mut obs_buf = Vec::with_capacity(number_of_steps);
        let mut act_buf = Vec::with_capacity(number_of_steps);
        let mut logprobs = Vec::with_capacity(number_of_steps * num_envs);
        let mut values = Vec::with_capacity(number_of_steps * num_envs);
        let mut rewards = Vec::with_capacity(number_of_steps * num_envs);
        let mut dones = Vec::with_capacity(number_of_steps * num_envs);
        let mut episode_rewards = vec![];
        let mut env_records = Vec::with_capacity(number_of_steps * num_envs);

        for _ in 0..number_of_steps {
            let (act, logprob, value) = model.step(&array2_to_tensor(&obs, &device)?, &mut self.rng)?;
            let act = tensor_to_array2(&act)?;
            let mut act_env = act.clone();
            for mut row in act_env.rows_mut() {
                if let Some(row) = row.as_slice_mut() {
                    action_space.clip(row);
                }
            }

            let step = self.env.step(&act_env)?;
            model.normalizer_mut().update(&step.obs);

            obs_buf.push(obs);
            act_buf.push(act);
            logprobs.extend(logprob.to_vec1::<f32>()?);
            values.extend(value.to_vec1::<f32>()?);
            rewards.extend(step.reward.iter().copied());
            dones.extend(step.is_done().into_iter().map(|d| d as i32 as f32));
            episode_rewards.extend(step.episode_infos.iter().map(|info| info.reward));
            env_records.extend(step.records);
            obs = step.obs;
        }

        let final_values = model.value(&array2_to_tensor(&obs, &device)?)?.to_vec1::<f32>()?;
        self.last_obs = Some(obs);
        trace!("Rollout of {} steps x {} envs", number_of_steps, num_envs);

        Ok(Trajectories {
            num_steps: number_of_steps,
            num_envs,
            obs: concatenate(Axis(0), &views(&obs_buf))?,
            actions: concatenate(Axis(0), &views(&act_buf))?,
            logprobs,
            values,
            rewards,
            dones,
            final_values,
            advantages: vec![],
            returns: vec![],
            frames: number_of_steps * num_envs,
            episode_rewards,
            env_records,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mlp::MlpConfig, model::StochasticPolicyModelConfig, testing::point_vec_env, Activation,
    };
    use candle_core::Device;
    use pivot_core::BoxSpace;

    #[test]
    fn test_rollout_layout() -> Result<()> {
        let mut model = StochasticPolicyModelConfig {
            input_shape: 3,
            backbone: MlpConfig::new(3, vec![8], Activation::Tanh),
        }
        .instantiate(&BoxSpace::uniform(2, -1.0, 1.0), &Device::Cpu)?;
        let mut roller = StepEnvRoller::new(point_vec_env(2, 4)?, 0);

        let traj = roller.rollout(&mut model, 6)?;
        assert_eq!(traj.len(), 12);
        assert_eq!(traj.obs.dim(), (12, 3));
        assert_eq!(traj.actions.dim(), (12, 2));
        assert_eq!(traj.final_values.len(), 2);
        assert_eq!(traj.frames, 12);
        // Both envs truncate at the 4th step.
        assert_eq!(traj.dones[6..8].to_vec(), vec![1.0, 1.0]);
        assert_eq!(traj.dones.iter().sum::<f32>(), 2.0);
        assert_eq!(traj.episode_rewards.len(), 2);
        assert_eq!(traj.env_records.len(), 12);

        // The next rollout continues where this one stopped.
        let traj2 = roller.rollout(&mut model, 2)?;
        assert_eq!(traj2.dones, vec![0.0, 0.0, 1.0, 1.0]);
        // Normalizer saw the reset and every step.
        assert!((model.normalizer().stats().count - 18.0).abs() < 1e-3);
        Ok(())
    }
}
