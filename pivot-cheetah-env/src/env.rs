//! Half-cheetah running task.
use crate::{
    body::{CheetahState, NQ, NU},
    config::{HalfCheetahConfig, HALF_CHEETAH_V2},
};
use anyhow::Result;
use log::{info, trace};
use pivot_core::{
    error::PivotError,
    record::{Record, RecordValue},
    BoxSpace, Env, Step,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Keys of the scalars in the record returned by every step.
pub const STEP_RECORD_KEYS: [&str; 3] = ["reward_run", "reward_ctrl", "x_velocity"];

/// The half-cheetah running task.
///
/// The reward of a step is
/// `forward_reward_weight * x_velocity - ctrl_cost_weight * |a|^2`,
/// where `x_velocity` is the displacement of the torso divided by the step
/// duration. Episodes never terminate and are truncated after
/// `max_episode_steps` steps. Actions outside `[-1, 1]` are clipped.
pub struct HalfCheetahEnv {
    config: HalfCheetahConfig,
    state: CheetahState,
    rng: StdRng,
    t: usize,
    obs_space: BoxSpace,
    act_space: BoxSpace,
}

impl HalfCheetahEnv {
    fn check_state(&self) -> Result<()> {
        if self.state.is_finite() {
            Ok(())
        } else {
            Err(PivotError::NonFiniteState(format!(
                "{} at step {}",
                self.config.name, self.t
            ))
            .into())
        }
    }

    /// Position of the torso along the x axis.
    pub fn x_position(&self) -> f64 {
        self.state.qpos[0]
    }
}

impl Env for HalfCheetahEnv {
    type Config = HalfCheetahConfig;

    fn build(config: &Self::Config, seed: i64) -> Result<Self> {
        if config.name != HALF_CHEETAH_V2 {
            return Err(PivotError::UnknownEnvironment(config.name.clone()).into());
        }
        info!("Build {} with seed {}", config.name, seed);

        Ok(Self {
            config: config.clone(),
            state: CheetahState::default(),
            rng: StdRng::seed_from_u64(seed as u64),
            t: 0,
            obs_space: BoxSpace::uniform(2 * NQ - 1, f32::NEG_INFINITY, f32::INFINITY),
            act_space: BoxSpace::uniform(NU, -1.0, 1.0),
        })
    }

    fn observation_space(&self) -> &BoxSpace {
        &self.obs_space
    }

    fn action_space(&self) -> &BoxSpace {
        &self.act_space
    }

    fn reset(&mut self) -> Result<Vec<f32>> {
        let scale = self.config.reset_noise_scale;
        let mut state = CheetahState::default();
        for q in state.qpos.iter_mut() {
            *q += self.rng.gen_range(-scale..=scale);
        }
        for qd in state.qvel.iter_mut() {
            *qd += scale * self.rng.sample::<f64, _>(StandardNormal);
        }
        self.state = state;
        self.t = 0;
        Ok(self.state.observation())
    }

    fn step(&mut self, act: &[f32]) -> Result<(Step, Record)> {
        if act.len() != NU {
            return Err(PivotError::ShapeMismatch {
                name: "action".to_string(),
                expected: vec![NU],
                actual: vec![act.len()],
            }
            .into());
        }
        let mut clipped = act.to_vec();
        self.act_space.clip(&mut clipped);
        let mut ctrl = [0.0; NU];
        for (c, a) in ctrl.iter_mut().zip(clipped.iter()) {
            *c = *a as f64;
        }

        let x_before = self.x_position();
        for _ in 0..self.config.frame_skip {
            self.state.integrate(&ctrl, self.config.dt);
        }
        self.t += 1;
        self.check_state()?;

        let x_velocity = (self.x_position() - x_before) / self.config.step_duration();
        let reward_run = self.config.forward_reward_weight * x_velocity;
        let reward_ctrl = -self.config.ctrl_cost_weight * ctrl.iter().map(|a| a * a).sum::<f64>();
        let reward = reward_run + reward_ctrl;
        trace!("t = {}, x_velocity = {:.3}, reward = {:.3}", self.t, x_velocity, reward);

        let step = Step {
            obs: self.state.observation(),
            reward: reward as f32,
            is_terminated: false,
            is_truncated: self.t >= self.config.max_episode_steps,
        };
        let record = Record::from_slice(&[
            ("reward_run", RecordValue::Scalar(reward_run as f32)),
            ("reward_ctrl", RecordValue::Scalar(reward_ctrl as f32)),
            ("x_velocity", RecordValue::Scalar(x_velocity as f32)),
        ]);
        Ok((step, record))
    }
}
