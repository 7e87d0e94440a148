//! Proximal policy optimization.
use crate::{
    model::StochasticPolicyModel,
    opt::{clip_grad_norm, LayeredOptimizer},
    roller::{Trajectories, TrajectoryBatch},
    util::explained_variance,
};
use anyhow::Result;
use candle_core::{DType, Tensor};
use pivot_core::{
    record::{Record, RecordValue},
    schedule::{Schedule, ScheduleConfig},
};
use serde::{Deserialize, Serialize};

/// Configuration of [`PpoPolicyGradient`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct PpoConfig {
    /// Weight of the entropy bonus.
    pub entropy_coefficient: f64,

    /// Weight of the value loss.
    pub value_coefficient: f64,

    /// Maximum L2 norm of the gradients.
    pub max_grad_norm: f64,

    /// Discount factor.
    pub discount_factor: f64,

    /// Lambda of generalized advantage estimation.
    pub gae_lambda: f64,

    /// Clip range as a function of training progress.
    pub cliprange: ScheduleConfig,
}

impl PpoConfig {
    /// Sets the clip range schedule.
    pub fn cliprange(mut self, v: impl Into<ScheduleConfig>) -> Self {
        self.cliprange = v.into();
        self
    }
}

/// Generalized advantage estimation over `[num_steps, num_envs]` flattened row-major.
///
/// The value after the last step is `final_values`. `dones[t]` cuts bootstrapping
/// from step `t` to `t + 1`. Returns `(advantages, returns)`.
pub fn generalized_advantage_estimation(
    rewards: &[f32],
    values: &[f32],
    dones: &[f32],
    final_values: &[f32],
    num_envs: usize,
    discount_factor: f32,
    gae_lambda: f32,
) -> (Vec<f32>, Vec<f32>) {
    let num_steps = rewards.len() / num_envs.max(1);
    let mut advantages = vec![0f32; rewards.len()];

    for e in 0..num_envs {
        let mut last_gae = 0f32;
        for t in (0..num_steps).rev() {
            let i = t * num_envs + e;
            let next_value = match t + 1 == num_steps {
                true => final_values[e],
                false => values[i + num_envs],
            };
            let not_done = 1.0 - dones[i];
            let delta = rewards[i] + discount_factor * next_value * not_done - values[i];
            last_gae = delta + discount_factor * gae_lambda * not_done * last_gae;
            advantages[i] = last_gae;
        }
    }

    let returns = advantages.iter().zip(values).map(|(a, v)| a + v).collect();
    (advantages, returns)
}

fn normalize(xs: &[f32]) -> Vec<f32> {
    let n = xs.len() as f32;
    let mean = xs.iter().sum::<f32>() / n;
    let var = match xs.len() {
        0 | 1 => 0.0,
        _ => xs.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / (n - 1.0),
    };
    let std = var.sqrt();
    xs.iter().map(|x| (x - mean) / (std + 1e-8)).collect()
}

/// PPO with clipped surrogate objective and clipped value loss.
pub struct PpoPolicyGradient {
    config: PpoConfig,
}

impl PpoPolicyGradient {
    /// Constructs the algorithm.
    pub fn new(config: PpoConfig) -> Self {
        Self { config }
    }

    /// Configuration.
    pub fn config(&self) -> &PpoConfig {
        &self.config
    }

    /// Fills advantages and returns of the trajectories.
    pub fn process_rollout(&self, traj: &mut Trajectories) {
        let (advantages, returns) = generalized_advantage_estimation(
            &traj.rewards,
            &traj.values,
            &traj.dones,
            &traj.final_values,
            traj.num_envs,
            self.config.discount_factor as f32,
            self.config.gae_lambda as f32,
        );
        traj.advantages = advantages;
        traj.returns = returns;
    }

    /// Performs one optimization step on a batch. `progress` selects the clip range.
    pub fn optimizer_step(
        &self,
        model: &StochasticPolicyModel,
        optimizer: &mut LayeredOptimizer,
        batch: &TrajectoryBatch,
        progress: f64,
    ) -> Result<Record> {
        let clip = self.config.cliprange.value(progress);
        let device = batch.obs.device();
        let n = batch.advantages.len();
        let adv = Tensor::from_vec(normalize(&batch.advantages), n, device)?;

        let (logprob, entropy, value) = model.evaluate(&batch.obs, &batch.actions)?;

        // Policy loss
        let log_ratio = (&logprob - &batch.logprobs)?;
        let ratio = log_ratio.exp()?;
        let surr1 = (&ratio * &adv)?;
        let surr2 = (ratio.clamp(1.0 - clip, 1.0 + clip)? * &adv)?;
        let policy_loss = surr1.minimum(&surr2)?.mean_all()?.neg()?;

        // Value loss
        let value_clipped =
            (&batch.values + (&value - &batch.values)?.clamp(-clip, clip)?)?;
        let loss1 = (&value - &batch.returns)?.sqr()?;
        let loss2 = (value_clipped - &batch.returns)?.sqr()?;
        let value_loss = (loss1.maximum(&loss2)?.mean_all()? * 0.5)?;

        let loss = ((&policy_loss + (&value_loss * self.config.value_coefficient)?)?
            - (&entropy * self.config.entropy_coefficient)?)?;

        let mut grads = loss.backward()?;
        let grad_norm = clip_grad_norm(&mut grads, &optimizer.vars(), self.config.max_grad_norm)?;
        optimizer.step(&grads)?;

        let approx_kl = (log_ratio.sqr()?.mean_all()? * 0.5)?.to_scalar::<f32>()?;
        let clip_fraction = ((ratio - 1.0)?.abs()?.gt(clip)?)
            .to_dtype(DType::F32)?
            .mean_all()?
            .to_scalar::<f32>()?;
        let ev = explained_variance(
            &batch.values.to_vec1::<f32>()?,
            &batch.returns.to_vec1::<f32>()?,
        );
        let advantage_norm = batch.advantages.iter().map(|a| a * a).sum::<f32>().sqrt();

        Ok(Record::from_slice(&[
            ("policy_loss", RecordValue::Scalar(policy_loss.to_scalar::<f32>()?)),
            ("value_loss", RecordValue::Scalar(value_loss.to_scalar::<f32>()?)),
            ("policy_entropy", RecordValue::Scalar(entropy.to_scalar::<f32>()?)),
            ("approx_kl_divergence", RecordValue::Scalar(approx_kl)),
            ("clip_fraction", RecordValue::Scalar(clip_fraction)),
            ("grad_norm", RecordValue::Scalar(grad_norm)),
            ("explained_variance", RecordValue::Scalar(ev)),
            ("advantage_norm", RecordValue::Scalar(advantage_norm)),
        ]))
    }

    /// Keys reported by [`optimizer_step`](Self::optimizer_step).
    pub fn metric_keys() -> &'static [&'static str] {
        &[
            "policy_loss",
            "value_loss",
            "policy_entropy",
            "approx_kl_divergence",
            "clip_fraction",
            "grad_norm",
            "explained_variance",
            "advantage_norm",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mlp::MlpConfig, model::StochasticPolicyModelConfig, opt::LayeredAdamConfig, Activation,
    };
    use candle_core::Device;
    use ndarray::Array2;
    use pivot_core::{schedule::LinearSchedule, BoxSpace};
    use rand::{rngs::StdRng, SeedableRng};

    fn config() -> PpoConfig {
        PpoConfig {
            entropy_coefficient: 0.01,
            value_coefficient: 0.5,
            max_grad_norm: 0.5,
            discount_factor: 0.99,
            gae_lambda: 0.95,
            cliprange: LinearSchedule::new(0.1, 0.0).into(),
        }
    }

    #[test]
    fn test_gae_single_env() {
        let (adv, ret) = generalized_advantage_estimation(
            &[1.0, 1.0, 1.0],
            &[0.0, 0.0, 0.0],
            &[0.0, 1.0, 0.0],
            &[10.0],
            1,
            0.5,
            1.0,
        );
        // Step 1 ends an episode, so step 0 sees only step 1's reward.
        assert_eq!(adv, vec![1.5, 1.0, 6.0]);
        assert_eq!(ret, adv);
    }

    #[test]
    fn test_gae_envs_are_independent() {
        // Two envs interleaved: [t0e0, t0e1, t1e0, t1e1].
        let (adv, _) = generalized_advantage_estimation(
            &[1.0, 0.0, 1.0, 0.0],
            &[0.0; 4],
            &[0.0; 4],
            &[0.0, 2.0],
            2,
            1.0,
            1.0,
        );
        assert_eq!(adv, vec![2.0, 2.0, 1.0, 2.0]);
    }

    #[test]
    fn test_optimizer_step_reports() -> Result<()> {
        let model = StochasticPolicyModelConfig {
            input_shape: 3,
            backbone: MlpConfig::new(3, vec![8], Activation::Tanh),
        }
        .instantiate(&BoxSpace::uniform(2, -1.0, 1.0), &Device::Cpu)?;
        let mut opt = LayeredAdamConfig::default()
            .lr(vec![1e-4, 1e-3, 1e-3])
            .layer_groups(true)
            .build(model.layer_groups()?)?;
        let ppo = PpoPolicyGradient::new(config());

        let n = 6;
        let obs = Array2::from_shape_fn((n, 3), |(i, j)| (i as f32 - j as f32) * 0.3);
        let obs_t = crate::util::array2_to_tensor(&obs, &Device::Cpu)?;
        let (act, logp, value) = model.step(&obs_t, &mut StdRng::seed_from_u64(1))?;
        let mut traj = Trajectories {
            num_steps: n,
            num_envs: 1,
            obs,
            actions: crate::util::tensor_to_array2(&act)?,
            logprobs: logp.to_vec1()?,
            values: value.to_vec1()?,
            rewards: (0..n).map(|i| i as f32).collect(),
            dones: vec![0.0; n],
            final_values: vec![0.0],
            advantages: vec![],
            returns: vec![],
            frames: n,
            episode_rewards: vec![],
            env_records: vec![],
        };
        ppo.process_rollout(&mut traj);
        let ixs = (0..n).collect::<Vec<_>>();
        let batch = traj.select(&ixs, &Device::Cpu)?;
        let record = ppo.optimizer_step(&model, &mut opt, &batch, 0.0)?;

        for key in PpoPolicyGradient::metric_keys() {
            assert!(record.get_scalar(key).is_ok(), "missing {}", key);
        }
        // The first step runs with the rollout policy.
        assert!(record.get_scalar("approx_kl_divergence")? < 1e-6);
        assert_eq!(record.get_scalar("clip_fraction")?, 0.0);
        assert!(record.get_scalar("grad_norm")? > 0.0);
        Ok(())
    }
}
