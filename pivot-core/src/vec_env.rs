//! Vectorized environment running its instances sequentially.
use crate::{error::PivotError, record::Record, BoxSpace, Env, EpisodeInfo, VecEnv, VecStep};
use anyhow::Result;
use log::{debug, info};
use ndarray::{Array2, ArrayView1};

/// Runs `parallel_envs` instances of `E` one after another in the calling thread.
///
/// Instance `i` is built with seed `seed + i`. An instance is reset as soon as
/// its episode ends, so [`VecEnv::step`] always returns observations to act on.
pub struct DummyVecEnv<E: Env> {
    envs: Vec<E>,
    observation_space: BoxSpace,
    action_space: BoxSpace,
    episode_rewards: Vec<f32>,
    episode_lengths: Vec<usize>,
}

impl<E: Env> DummyVecEnv<E> {
    /// Builds `parallel_envs` environments from the same configuration.
    pub fn build(config: &E::Config, parallel_envs: usize, seed: i64) -> Result<Self> {
        if parallel_envs == 0 {
            return Err(
                PivotError::InvalidConfig("parallel_envs must be positive".to_string()).into(),
            );
        }
        let envs = (0..parallel_envs)
            .map(|i| E::build(config, seed + i as i64))
            .collect::<Result<Vec<_>>>()?;
        let observation_space = envs[0].observation_space().clone();
        let action_space = envs[0].action_space().clone();
        info!(
            "Built {} environment(s), obs dim = {}, act dim = {}",
            parallel_envs,
            observation_space.dim(),
            action_space.dim()
        );

        Ok(Self {
            envs,
            observation_space,
            action_space,
            episode_rewards: vec![0.0; parallel_envs],
            episode_lengths: vec![0; parallel_envs],
        })
    }

    fn stack(&self, rows: Vec<Vec<f32>>) -> Result<Array2<f32>> {
        let n = rows.len();
        let dim = self.observation_space.dim();
        let flat = rows.into_iter().flatten().collect::<Vec<_>>();
        Ok(Array2::from_shape_vec((n, dim), flat)?)
    }
}

impl<E: Env> VecEnv for DummyVecEnv<E> {
    fn num_envs(&self) -> usize {
        self.envs.len()
    }

    fn observation_space(&self) -> &BoxSpace {
        &self.observation_space
    }

    fn action_space(&self) -> &BoxSpace {
        &self.action_space
    }

    fn reset(&mut self) -> Result<Array2<f32>> {
        let obs = self
            .envs
            .iter_mut()
            .map(|env| env.reset())
            .collect::<Result<Vec<_>>>()?;
        self.episode_rewards.iter_mut().for_each(|r| *r = 0.0);
        self.episode_lengths.iter_mut().for_each(|l| *l = 0);
        self.stack(obs)
    }

    fn step(&mut self, act: &Array2<f32>) -> Result<VecStep> {
        let n = self.envs.len();
        let act_dim = self.action_space.dim();
        if act.shape() != [n, act_dim] {
            return Err(PivotError::ShapeMismatch {
                name: "actions".to_string(),
                expected: vec![n, act_dim],
                actual: act.shape().to_vec(),
            }
            .into());
        }

        let mut obs = Vec::with_capacity(n);
        let mut terminal_obs = Vec::with_capacity(n);
        let mut reward = Vec::with_capacity(n);
        let mut is_terminated = Vec::with_capacity(n);
        let mut is_truncated = Vec::with_capacity(n);
        let mut episode_infos = vec![];
        let mut records: Vec<Record> = Vec::with_capacity(n);

        for (i, env) in self.envs.iter_mut().enumerate() {
            let a: ArrayView1<f32> = act.row(i);
            let a = a.iter().copied().collect::<Vec<_>>();
            let (step, record) = env.step(&a)?;
            records.push(record);

            self.episode_rewards[i] += step.reward;
            self.episode_lengths[i] += 1;
            reward.push(step.reward);
            is_terminated.push(step.is_terminated as i8);
            is_truncated.push(step.is_truncated as i8);

            if step.is_done() {
                let info = EpisodeInfo {
                    reward: self.episode_rewards[i],
                    length: self.episode_lengths[i],
                };
                debug!("Episode finished in env {}: {:?}", i, info);
                episode_infos.push(info);
                self.episode_rewards[i] = 0.0;
                self.episode_lengths[i] = 0;
                obs.push(env.reset()?);
            } else {
                obs.push(step.obs.clone());
            }
            terminal_obs.push(step.obs);
        }

        Ok(VecStep {
            obs: self.stack(obs)?,
            terminal_obs: self.stack(terminal_obs)?,
            reward,
            is_terminated,
            is_truncated,
            episode_infos,
            records,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Step;

    /// Counts steps and finishes an episode after `horizon` steps.
    #[derive(Clone)]
    struct Counter {
        t: usize,
        seed: i64,
        horizon: usize,
        obs_space: BoxSpace,
        act_space: BoxSpace,
    }

    impl Env for Counter {
        type Config = usize;

        fn build(config: &Self::Config, seed: i64) -> Result<Self> {
            Ok(Self {
                t: 0,
                seed,
                horizon: *config,
                obs_space: BoxSpace::uniform(2, -100.0, 100.0),
                act_space: BoxSpace::uniform(1, -1.0, 1.0),
            })
        }

        fn observation_space(&self) -> &BoxSpace {
            &self.obs_space
        }

        fn action_space(&self) -> &BoxSpace {
            &self.act_space
        }

        fn reset(&mut self) -> Result<Vec<f32>> {
            self.t = 0;
            Ok(vec![0.0, self.seed as f32])
        }

        fn step(&mut self, act: &[f32]) -> Result<(Step, Record)> {
            self.t += 1;
            let step = Step {
                obs: vec![self.t as f32, self.seed as f32],
                reward: act[0],
                is_terminated: false,
                is_truncated: self.t == self.horizon,
            };
            Ok((step, Record::from_scalar("t", self.t as f32)))
        }
    }

    #[test]
    fn test_seeds_and_auto_reset() -> Result<()> {
        let mut env = DummyVecEnv::<Counter>::build(&3, 2, 10)?;
        let obs = env.reset()?;
        assert_eq!(obs.row(0).to_vec(), vec![0.0, 10.0]);
        assert_eq!(obs.row(1).to_vec(), vec![0.0, 11.0]);

        let act = Array2::from_elem((2, 1), 0.5f32);
        env.step(&act)?;
        env.step(&act)?;
        let step = env.step(&act)?;

        assert_eq!(step.is_truncated, vec![1, 1]);
        assert_eq!(step.terminal_obs.row(0).to_vec(), vec![3.0, 10.0]);
        assert_eq!(step.obs.row(0).to_vec(), vec![0.0, 10.0]);
        assert_eq!(step.episode_infos.len(), 2);
        assert_eq!(step.episode_infos[0].length, 3);
        assert!((step.episode_infos[0].reward - 1.5).abs() < 1e-6);
        assert_eq!(step.records.len(), 2);
        assert_eq!(step.records[1].get_scalar("t"), Ok(3.0));
        Ok(())
    }

    #[test]
    fn test_zero_envs_is_rejected() {
        let err = DummyVecEnv::<Counter>::build(&3, 0, 0)
            .err()
            .and_then(|e| e.downcast::<PivotError>().ok());
        assert_eq!(
            err,
            Some(PivotError::InvalidConfig("parallel_envs must be positive".to_string()))
        );
    }

    #[test]
    fn test_action_shape_is_checked() -> Result<()> {
        let mut env = DummyVecEnv::<Counter>::build(&3, 2, 0)?;
        env.reset()?;
        let act = Array2::from_elem((1, 1), 0.0f32);
        assert!(env.step(&act).is_err());
        Ok(())
    }
}
