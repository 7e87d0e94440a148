//! Deep deterministic policy gradient.
use crate::{
    model::DeterministicPolicyModel,
    opt::LayeredOptimizer,
    util::array2_to_tensor,
};
use anyhow::{Context, Result};
use candle_core::{Device, Tensor};
use candle_nn::loss::mse;
use pivot_core::{
    record::{Record, RecordValue},
    replay_buffer::TransitionBatch,
};
use serde::{Deserialize, Serialize};

/// Configuration of [`DeepDeterministicPolicyGradient`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct DdpgConfig {
    /// Discount factor.
    pub discount_factor: f64,

    /// Soft update coefficient of the target model.
    pub tau: f64,
}

impl Default for DdpgConfig {
    fn default() -> Self {
        Self {
            discount_factor: 0.99,
            tau: 0.01,
        }
    }
}

impl DdpgConfig {
    /// Sets the discount factor.
    pub fn discount_factor(mut self, v: f64) -> Self {
        self.discount_factor = v;
        self
    }

    /// Sets the soft update coefficient.
    pub fn tau(mut self, v: f64) -> Self {
        self.tau = v;
        self
    }
}

/// DDPG with a target model tracking the trained one.
pub struct DeepDeterministicPolicyGradient {
    config: DdpgConfig,
    target_model: Option<DeterministicPolicyModel>,
}

impl DeepDeterministicPolicyGradient {
    /// Constructs the algorithm. The target model is created by [`initialize`](Self::initialize).
    pub fn new(config: DdpgConfig) -> Self {
        Self {
            config,
            target_model: None,
        }
    }

    /// Creates the target model as a copy of `model`.
    pub fn initialize(&mut self, model: &DeterministicPolicyModel) -> Result<()> {
        self.target_model = Some(model.duplicate()?);
        Ok(())
    }

    /// The target model, if initialized.
    pub fn target_model(&self) -> Option<&DeterministicPolicyModel> {
        self.target_model.as_ref()
    }

    fn tensors(batch: &TransitionBatch, device: &Device) -> Result<[Tensor; 5]> {
        let n = batch.len();
        let not_terminated = batch
            .is_terminated
            .iter()
            .map(|t| 1.0 - *t as f32)
            .collect::<Vec<_>>();
        Ok([
            array2_to_tensor(&batch.obs, device)?,
            array2_to_tensor(&batch.act, device)?,
            array2_to_tensor(&batch.next_obs, device)?,
            Tensor::from_slice(&batch.reward[..], n, device)?,
            Tensor::from_vec(not_terminated, n, device)?,
        ])
    }

    /// Performs one optimization step and a soft update of the target model.
    ///
    /// Returns `policy_loss` and `value_loss`.
    pub fn optimizer_step(
        &mut self,
        model: &DeterministicPolicyModel,
        optimizer: &mut LayeredOptimizer,
        batch: &TransitionBatch,
    ) -> Result<Record> {
        let target_model = self
            .target_model
            .as_mut()
            .context("DDPG is not initialized")?;
        let [obs, act, next_obs, reward, not_terminated] = Self::tensors(batch, model.device())?;

        let target = {
            let next_act = target_model.action(&next_obs)?;
            let next_q = target_model.value(&next_obs, &next_act)?;
            let gamma = self.config.discount_factor;
            (reward + ((next_q * not_terminated)? * gamma)?)?.detach()
        };
        let value_loss = mse(&model.value(&obs, &act)?, &target)?;
        let policy_loss = model.value(&obs, &model.action(&obs)?)?.mean_all()?.neg()?;

        // Critic parameters take value loss gradients, policy parameters policy loss gradients.
        let mut grads = value_loss.backward()?;
        let policy_grads = policy_loss.backward()?;
        for var in model.policy_vars()? {
            grads.remove(var.as_tensor());
            if let Some(g) = policy_grads.get(var.as_tensor()) {
                grads.insert(var.as_tensor(), g.clone());
            }
        }
        optimizer.step(&grads)?;
        target_model.soft_update_from(model, self.config.tau)?;

        Ok(Record::from_slice(&[
            (
                "policy_loss",
                RecordValue::Scalar(policy_loss.to_scalar::<f32>()?),
            ),
            (
                "value_loss",
                RecordValue::Scalar(value_loss.to_scalar::<f32>()?),
            ),
        ]))
    }

    /// Keys reported by [`optimizer_step`](Self::optimizer_step).
    pub fn metric_keys() -> &'static [&'static str] {
        &["policy_loss", "value_loss"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mlp::MlpConfig, model::DeterministicPolicyModelConfig, opt::LayeredAdamConfig, Activation,
    };
    use ndarray::Array2;
    use pivot_core::BoxSpace;

    fn batch(n: usize) -> TransitionBatch {
        TransitionBatch {
            obs: Array2::from_shape_fn((n, 3), |(i, j)| (i + j) as f32 * 0.1),
            act: Array2::from_shape_fn((n, 2), |(i, _)| if i % 2 == 0 { 0.5 } else { -0.5 }),
            next_obs: Array2::from_shape_fn((n, 3), |(i, j)| (i * j) as f32 * 0.1),
            reward: (0..n).map(|i| i as f32 * 0.1).collect(),
            is_terminated: (0..n).map(|i| (i == 0) as i8).collect(),
            is_truncated: vec![0; n],
        }
    }

    fn model() -> Result<DeterministicPolicyModel> {
        let config = DeterministicPolicyModelConfig {
            input_shape: 3,
            policy_backbone: MlpConfig::new(3, vec![16], Activation::Tanh),
            value_backbone: MlpConfig::new(5, vec![16], Activation::Tanh),
        };
        config.instantiate(&BoxSpace::uniform(2, -1.0, 1.0), &Device::Cpu)
    }

    #[test]
    fn test_requires_initialize() -> Result<()> {
        let model = model()?;
        let mut opt = LayeredAdamConfig::default().build(model.layer_groups()?)?;
        let mut ddpg = DeepDeterministicPolicyGradient::new(DdpgConfig::default());
        assert!(ddpg.optimizer_step(&model, &mut opt, &batch(4)).is_err());
        Ok(())
    }

    #[test]
    fn test_value_loss_decreases() -> Result<()> {
        let model = model()?;
        let mut opt = LayeredAdamConfig::default()
            .lr(vec![1e-3, 1e-2, 1e-2])
            .layer_groups(true)
            .build(model.layer_groups()?)?;
        let mut ddpg = DeepDeterministicPolicyGradient::new(DdpgConfig::default());
        ddpg.initialize(&model)?;

        let batch = batch(8);
        let first = ddpg.optimizer_step(&model, &mut opt, &batch)?;
        let mut last = first.clone();
        for _ in 0..100 {
            last = ddpg.optimizer_step(&model, &mut opt, &batch)?;
        }
        assert!(last.get_scalar("value_loss")? < first.get_scalar("value_loss")?);
        assert!(last.get_scalar("policy_loss")?.is_finite());
        Ok(())
    }

    #[test]
    fn test_target_follows_model() -> Result<()> {
        let model = model()?;
        let mut opt = LayeredAdamConfig::default()
            .lr(vec![1e-2])
            .build(model.layer_groups()?)?;
        let mut ddpg = DeepDeterministicPolicyGradient::new(DdpgConfig::default().tau(1.0));
        ddpg.initialize(&model)?;
        ddpg.optimizer_step(&model, &mut opt, &batch(4))?;

        let obs = array2_to_tensor(&batch(4).obs, &Device::Cpu)?;
        let target = ddpg.target_model().map(|m| m.action(&obs)).transpose()?;
        let diff = match target {
            Some(t) => (t - model.action(&obs)?)?.abs()?.sum_all()?.to_scalar::<f32>()?,
            None => f32::INFINITY,
        };
        assert!(diff < 1e-6);
        Ok(())
    }
}
