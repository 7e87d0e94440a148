//! A small environment for tests.
use anyhow::Result;
use pivot_core::{record::Record, BoxSpace, DummyVecEnv, Env, Step};

/// A point pushed around in 3 dimensions by 2-dimensional actions.
/// Reward is the negative distance to the origin, which is also recorded as `distance`.
/// Episodes are truncated after `horizon` steps.
pub struct PointEnv {
    x: [f32; 3],
    t: usize,
    horizon: usize,
    seed: i64,
    obs_space: BoxSpace,
    act_space: BoxSpace,
}

impl Env for PointEnv {
    type Config = usize;

    fn build(config: &usize, seed: i64) -> Result<Self> {
        Ok(Self {
            x: [0.0; 3],
            t: 0,
            horizon: *config,
            seed,
            obs_space: BoxSpace::uniform(3, f32::MIN, f32::MAX),
            act_space: BoxSpace::uniform(2, -1.0, 1.0),
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
        self.x = [1.0, -1.0, 0.1 * self.seed as f32];
        Ok(self.x.to_vec())
    }

    fn step(&mut self, act: &[f32]) -> Result<(Step, Record)> {
        self.t += 1;
        self.x[0] += 0.1 * act[0];
        self.x[1] += 0.1 * act[1];
        let dist = self.x.iter().map(|x| x * x).sum::<f32>().sqrt();
        let step = Step {
            obs: self.x.to_vec(),
            reward: -dist,
            is_terminated: false,
            is_truncated: self.t >= self.horizon,
        };
        Ok((step, Record::from_scalar("distance", dist)))
    }
}

pub fn point_vec_env(parallel_envs: usize, horizon: usize) -> Result<DummyVecEnv<PointEnv>> {
    DummyVecEnv::build(&horizon, parallel_envs, 0)
}
